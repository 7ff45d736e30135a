//! Module descriptors and the registration builder.
//!
//! ```
//! use platynui_xpath_bind::{ModuleDescriptor, simple_node::SimpleNode};
//!
//! #[derive(Default)]
//! struct MathModule;
//!
//! let module = ModuleDescriptor::<MathModule, SimpleNode>::builder("math")
//!     .static_module()
//!     .function("sqrt", |x: f64| x.sqrt())
//!     .build()
//!     .unwrap();
//! assert_eq!(module.namespace(), "urn:platynui:ext:math");
//! assert_eq!(module.groups().len(), 1);
//! ```
use std::any::{TypeId, type_name};
use std::sync::Arc;

use crate::consts::DEFAULT_MODULE_NS_PREFIX;
use crate::dependency::DependencyDescriptor;
use crate::error::{BindError, SequenceTypeError, TypeSlot};
use crate::function::{
    BoundFunction, FunctionAttributes, FunctionDescriptor, NativeCall, NativeFunction,
    NativeMethod, Parameter,
};
use crate::model::{XdmNode, is_ncname};
use crate::namespaces::NamespaceBindings;
use crate::native::NativeType;
use crate::overload::{OverloadGroup, group_functions};
use crate::sequence_type::SequenceType;
use crate::xdm::ExpandedName;

/// A native type whose functions are exposed to queries.
pub trait ExtensionModule<N: XdmNode>: Default + Send + Sync + Sized + 'static {
    fn describe() -> Result<ModuleDescriptor<Self, N>, BindError>;
}

pub struct ModuleDescriptor<M, N> {
    type_name: &'static str,
    type_id: TypeId,
    name: Arc<str>,
    namespace: String,
    namespaces: NamespaceBindings,
    functions: Vec<BoundFunction<M, N>>,
    groups: Vec<OverloadGroup>,
    dependencies: Vec<DependencyDescriptor<M>>,
    is_static: bool,
}

impl<M, N> std::fmt::Debug for ModuleDescriptor<M, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("type_name", &self.type_name)
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("functions", &self.functions.len())
            .field("dependencies", &self.dependencies)
            .field("is_static", &self.is_static)
            .finish()
    }
}

impl<M: Default + Send + Sync + 'static, N: XdmNode> ModuleDescriptor<M, N> {
    pub fn builder(name: impl Into<String>) -> ModuleBuilder<M, N> {
        ModuleBuilder::new(name)
    }
}

impl<M, N> ModuleDescriptor<M, N> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn namespaces(&self) -> &NamespaceBindings {
        &self.namespaces
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDescriptor> {
        self.functions.iter().map(|f| &f.descriptor)
    }

    pub(crate) fn bound(&self, index: usize) -> Option<&BoundFunction<M, N>> {
        self.functions.get(index)
    }

    pub fn groups(&self) -> &[OverloadGroup] {
        &self.groups
    }

    pub fn dependencies(&self) -> &[DependencyDescriptor<M>] {
        &self.dependencies
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Origins of every native type the module's functions use.
    pub fn native_types(&self) -> impl Iterator<Item = &NativeType> {
        self.functions.iter().flat_map(|f| {
            f.descriptor
                .parameters
                .iter()
                .map(|p| &p.native)
                .chain(std::iter::once(&f.descriptor.return_native))
        })
    }
}

struct PendingFunction<M, N> {
    name: String,
    attributes: FunctionAttributes,
    parameters: Vec<NativeType>,
    return_native: NativeType,
    call: NativeCall<M, N>,
    is_method: bool,
}

/// Collects functions of a module and validates them on [`build`](Self::build).
pub struct ModuleBuilder<M, N> {
    name: String,
    namespace: Option<String>,
    namespaces: NamespaceBindings,
    is_static: bool,
    pending: Vec<PendingFunction<M, N>>,
    dependencies: Vec<DependencyDescriptor<M>>,
}

impl<M: Default + Send + Sync + 'static, N: XdmNode> ModuleBuilder<M, N> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            namespaces: NamespaceBindings::with_builtins(),
            is_static: false,
            pending: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Namespace URI of the module's functions; must be absolute.
    pub fn namespace(mut self, uri: impl Into<String>) -> Self {
        self.namespace = Some(uri.into());
        self
    }

    /// Prefix binding available to lexical sequence types of this module.
    pub fn bind_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.bind(prefix, uri);
        self
    }

    /// Functions run without a module instance; no methods or dependencies.
    pub fn static_module(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn function<Args, F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: NativeFunction<N, Args>,
    {
        self.function_with(name, FunctionAttributes::default(), f)
    }

    pub fn function_with<Args, F>(
        mut self,
        name: impl Into<String>,
        attributes: FunctionAttributes,
        f: F,
    ) -> Self
    where
        F: NativeFunction<N, Args>,
    {
        self.pending.push(PendingFunction {
            name: name.into(),
            attributes,
            parameters: F::parameter_types(),
            return_native: F::return_type(),
            call: f.into_call::<M>(),
            is_method: false,
        });
        self
    }

    pub fn method<Args, F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: NativeMethod<M, N, Args>,
    {
        self.method_with(name, FunctionAttributes::default(), f)
    }

    pub fn method_with<Args, F>(
        mut self,
        name: impl Into<String>,
        attributes: FunctionAttributes,
        f: F,
    ) -> Self
    where
        F: NativeMethod<M, N, Args>,
    {
        self.pending.push(PendingFunction {
            name: name.into(),
            attributes,
            parameters: F::parameter_types(),
            return_native: F::return_type(),
            call: f.into_call(),
            is_method: true,
        });
        self
    }

    /// Declare a settable member that wants an injected value of type `D`.
    pub fn dependency<D, F>(mut self, property: impl Into<String>, setter: F) -> Self
    where
        D: Clone + Send + Sync + 'static,
        F: Fn(&mut M, D) + Send + Sync + 'static,
    {
        self.dependencies
            .push(DependencyDescriptor::new::<D, F>(property, setter));
        self
    }

    fn resolve_namespace(&self) -> Result<String, BindError> {
        match &self.namespace {
            None => Ok(format!("{DEFAULT_MODULE_NS_PREFIX}{}", self.name)),
            Some(ns) => match url::Url::parse(ns) {
                Ok(_) => Ok(ns.clone()),
                Err(e) => Err(BindError::InvalidNamespace {
                    module: self.name.clone(),
                    namespace: ns.clone(),
                    reason: e.to_string(),
                }),
            },
        }
    }

    fn describe_function(
        &self,
        module: &Arc<str>,
        namespace: &str,
        pending: &PendingFunction<M, N>,
    ) -> Result<FunctionDescriptor, BindError> {
        let signature = |message: String| BindError::Signature {
            module: self.name.clone(),
            function: pending.name.clone(),
            message,
        };
        if !is_ncname(&pending.name) {
            return Err(BindError::InvalidName {
                module: self.name.clone(),
                name: pending.name.clone(),
            });
        }
        if self.is_static && pending.is_method {
            return Err(signature(
                "methods need a module instance and cannot be bound on a static module".into(),
            ));
        }
        let arity = pending.parameters.len();
        if let Some(index) = pending.attributes.max_index()
            && index >= arity
        {
            return Err(signature(format!(
                "override for parameter {} but the function takes {arity}",
                index + 1
            )));
        }

        let infer = |native: &NativeType, lexical: Option<&str>, slot: TypeSlot| {
            SequenceType::infer(native, lexical, &self.namespaces).map_err(|source| {
                BindError::TypeInference {
                    module: self.name.clone(),
                    function: pending.name.clone(),
                    slot,
                    source,
                }
            })
        };
        let parameters = pending
            .parameters
            .iter()
            .enumerate()
            .map(|(i, native)| {
                Ok(Parameter {
                    name: pending
                        .attributes
                        .parameter_name(i)
                        .map_or_else(|| format!("arg{}", i + 1), str::to_string),
                    sequence_type: infer(
                        native,
                        pending.attributes.parameter_override(i),
                        TypeSlot::Parameter(i),
                    )?,
                    native: native.clone(),
                })
            })
            .collect::<Result<Vec<_>, BindError>>()?;
        let return_type = infer(
            &pending.return_native,
            pending.attributes.return_override(),
            TypeSlot::Return,
        )?;
        if return_type.is_empty_sequence() && !pending.return_native.is_void() {
            return Err(BindError::TypeInference {
                module: self.name.clone(),
                function: pending.name.clone(),
                slot: TypeSlot::Return,
                source: SequenceTypeError::Incompatible {
                    declared: pending
                        .attributes
                        .return_override()
                        .unwrap_or("empty-sequence()")
                        .to_string(),
                    native: pending.return_native.name,
                    reason: "only a unit result can be declared empty",
                },
            });
        }

        Ok(FunctionDescriptor {
            name: ExpandedName::ns(namespace, pending.name.clone()),
            parameters,
            return_type,
            return_native: pending.return_native.clone(),
            has_side_effects: pending.attributes.has_side_effects(),
            module: Arc::clone(module),
        })
    }

    pub fn build(self) -> Result<ModuleDescriptor<M, N>, BindError> {
        if !is_ncname(&self.name) {
            return Err(BindError::InvalidName {
                module: self.name.clone(),
                name: self.name.clone(),
            });
        }
        if self.is_static
            && let Some(dep) = self.dependencies.first()
        {
            return Err(BindError::Signature {
                module: self.name.clone(),
                function: dep.property.clone(),
                message: "static modules cannot receive dependencies".into(),
            });
        }
        let namespace = self.resolve_namespace()?;
        let module: Arc<str> = Arc::from(self.name.as_str());

        let mut functions = Vec::with_capacity(self.pending.len());
        for pending in &self.pending {
            let descriptor = self.describe_function(&module, &namespace, pending)?;
            functions.push(BoundFunction {
                descriptor,
                call: Arc::clone(&pending.call),
            });
        }
        let descriptors: Vec<FunctionDescriptor> =
            functions.iter().map(|f| f.descriptor.clone()).collect();
        let groups = group_functions(&self.name, &descriptors)?;

        tracing::debug!(
            module = %self.name,
            namespace = %namespace,
            functions = functions.len(),
            groups = groups.len(),
            dependencies = self.dependencies.len(),
            "module described"
        );
        Ok(ModuleDescriptor {
            type_name: type_name::<M>(),
            type_id: TypeId::of::<M>(),
            name: module,
            namespace,
            namespaces: self.namespaces,
            functions,
            groups,
            dependencies: self.dependencies,
            is_static: self.is_static,
        })
    }
}
