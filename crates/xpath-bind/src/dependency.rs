//! Injection of engine-provided resources into module instances.
//!
//! A module declares each dependency with the exact type it wants (for example
//! `Arc<dyn ItemFactory<N>>`). At first use the providers below are offered in a
//! fixed order and the first one of that type is assigned. Anything else keeps the
//! module's default value.
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::model::QName;
use crate::native::{NativeShape, NativeType};

/// Handle describing the hosting query processor.
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
}

/// Plain [`Processor`] implementation carrying name and version strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorInfo {
    pub name: String,
    pub version: String,
}

impl ProcessorInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Processor for ProcessorInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }
}

/// Node construction offered by the engine.
pub trait ItemFactory<N>: Send + Sync {
    /// Build an element. Engines return the document node wrapping it.
    fn element(
        &self,
        name: &QName,
        attributes: &[(QName, String)],
        content: Option<&str>,
    ) -> Result<N, Error>;
}

/// Document and collection lookup offered by the engine.
pub trait NodeResolver<N>: Send + Sync {
    fn doc_node(&self, _uri: &str) -> Result<Option<N>, Error> {
        Ok(None)
    }
    fn collection_nodes(&self, _uri: Option<&str>) -> Result<Vec<N>, Error> {
        Ok(vec![])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Processor,
    ItemFactory,
    Resolver,
}

/// Resources available for injection, in matching order.
pub struct DependencyProviders<N> {
    processor: Option<Arc<dyn Processor>>,
    item_factory: Option<Arc<dyn ItemFactory<N>>>,
    resolver: Option<Arc<dyn NodeResolver<N>>>,
}

impl<N> Default for DependencyProviders<N> {
    fn default() -> Self {
        Self {
            processor: None,
            item_factory: None,
            resolver: None,
        }
    }
}

impl<N> Clone for DependencyProviders<N> {
    fn clone(&self) -> Self {
        Self {
            processor: self.processor.clone(),
            item_factory: self.item_factory.clone(),
            resolver: self.resolver.clone(),
        }
    }
}

impl<N> fmt::Debug for DependencyProviders<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyProviders")
            .field("processor", &self.processor.as_ref().map(|p| p.name().to_string()))
            .field("item_factory", &self.item_factory.is_some())
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl<N: 'static> DependencyProviders<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn with_item_factory(mut self, factory: Arc<dyn ItemFactory<N>>) -> Self {
        self.item_factory = Some(factory);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn NodeResolver<N>>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn candidates(&self) -> [(ProviderKind, Option<&dyn Any>); 3] {
        [
            (
                ProviderKind::Processor,
                self.processor.as_ref().map(|p| p as &dyn Any),
            ),
            (
                ProviderKind::ItemFactory,
                self.item_factory.as_ref().map(|p| p as &dyn Any),
            ),
            (
                ProviderKind::Resolver,
                self.resolver.as_ref().map(|p| p as &dyn Any),
            ),
        ]
    }
}

type Injector<M> = Arc<dyn Fn(&mut M, &dyn Any) -> bool + Send + Sync>;

/// A settable member of a module instance that wants an injected value.
pub struct DependencyDescriptor<M> {
    pub native_type: NativeType,
    pub property: String,
    inject: Injector<M>,
}

impl<M: 'static> DependencyDescriptor<M> {
    pub fn new<D, F>(property: impl Into<String>, setter: F) -> Self
    where
        D: Clone + Send + Sync + 'static,
        F: Fn(&mut M, D) + Send + Sync + 'static,
    {
        Self {
            native_type: NativeType::reference::<D>(NativeShape::Item),
            property: property.into(),
            inject: Arc::new(move |module: &mut M, value: &dyn Any| {
                match value.downcast_ref::<D>() {
                    Some(v) => {
                        setter(module, v.clone());
                        true
                    }
                    None => false,
                }
            }),
        }
    }

    /// Assign `value` if it has the declared type.
    pub fn try_inject(&self, module: &mut M, value: &dyn Any) -> bool {
        (self.inject)(module, value)
    }
}

impl<M> Clone for DependencyDescriptor<M> {
    fn clone(&self) -> Self {
        Self {
            native_type: self.native_type.clone(),
            property: self.property.clone(),
            inject: Arc::clone(&self.inject),
        }
    }
}

impl<M> fmt::Debug for DependencyDescriptor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyDescriptor")
            .field("native_type", &self.native_type.name)
            .field("property", &self.property)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub injected: Vec<(String, ProviderKind)>,
    /// Properties left at their default value.
    pub skipped: Vec<String>,
}

/// Resolve `dependencies` of `instance` against `providers`; first match wins.
pub fn initialize<M: 'static, N: 'static>(
    module: &str,
    instance: &mut M,
    dependencies: &[DependencyDescriptor<M>],
    providers: &DependencyProviders<N>,
) -> InitReport {
    let mut report = InitReport::default();
    for dep in dependencies {
        let mut matched = None;
        for (kind, value) in providers.candidates() {
            if let Some(v) = value
                && dep.try_inject(instance, v)
            {
                matched = Some(kind);
                break;
            }
        }
        match matched {
            Some(kind) => {
                tracing::debug!(module, property = %dep.property, ?kind, "dependency injected");
                report.injected.push((dep.property.clone(), kind));
            }
            None => {
                tracing::debug!(
                    module,
                    property = %dep.property,
                    native = dep.native_type.name,
                    "no provider for dependency, keeping default"
                );
                report.skipped.push(dep.property.clone());
            }
        }
    }
    report
}
