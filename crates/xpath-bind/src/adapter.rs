use std::sync::{Arc, OnceLock};

use crate::dependency::{DependencyProviders, InitReport, initialize};
use crate::error::Error;
use crate::extension::{Arity, CallCtx, ExtensionFunction};
use crate::generator::AdapterUnit;
use crate::model::XdmNode;
use crate::module::ModuleDescriptor;
use crate::sequence_type::SequenceType;
use crate::xdm::{ExpandedName, XdmSequence};

/// Module instance shared by all adapters of one instantiation.
///
/// Created on first call; dependencies are injected before it is published.
pub struct ModuleInstance<M, N> {
    module: Arc<ModuleDescriptor<M, N>>,
    providers: DependencyProviders<N>,
    instance: OnceLock<M>,
    report: OnceLock<InitReport>,
}

impl<M: Default + Send + Sync + 'static, N: XdmNode> ModuleInstance<M, N> {
    pub fn new(module: Arc<ModuleDescriptor<M, N>>, providers: DependencyProviders<N>) -> Self {
        Self {
            module,
            providers,
            instance: OnceLock::new(),
            report: OnceLock::new(),
        }
    }

    pub fn get(&self) -> &M {
        self.instance.get_or_init(|| {
            let mut m = M::default();
            if !self.module.is_static() {
                let report = initialize(
                    self.module.name(),
                    &mut m,
                    self.module.dependencies(),
                    &self.providers,
                );
                let _ = self.report.set(report);
            }
            m
        })
    }

    /// Outcome of dependency injection, once the instance exists.
    pub fn report(&self) -> Option<&InitReport> {
        self.report.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.instance.get().is_some()
    }
}

/// An [`AdapterUnit`] bound to a module instance; what the engine registers.
pub struct BoundExtension<M, N> {
    unit: Arc<AdapterUnit<M, N>>,
    instance: Arc<ModuleInstance<M, N>>,
}

impl<M, N> BoundExtension<M, N> {
    pub fn new(unit: Arc<AdapterUnit<M, N>>, instance: Arc<ModuleInstance<M, N>>) -> Self {
        Self { unit, instance }
    }

    pub fn unit(&self) -> &AdapterUnit<M, N> {
        &self.unit
    }

    pub fn instance(&self) -> &Arc<ModuleInstance<M, N>> {
        &self.instance
    }
}

impl<M: Default + Send + Sync + 'static, N: XdmNode> ExtensionFunction<N> for BoundExtension<M, N> {
    fn name(&self) -> &ExpandedName {
        &self.unit.identity
    }

    fn argument_types(&self) -> &[SequenceType] {
        &self.unit.argument_types
    }

    fn min_arity(&self) -> Arity {
        self.unit.min_arity
    }

    fn max_arity(&self) -> Arity {
        self.unit.max_arity
    }

    fn result_type(&self, actual: &[SequenceType]) -> Result<SequenceType, Error> {
        self.unit.result_type(actual)
    }

    fn has_side_effects(&self) -> bool {
        self.unit.has_side_effects
    }

    fn call(&self, ctx: &CallCtx<'_, N>, args: &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error> {
        self.unit.invoke(self.instance.get(), ctx.namespaces, args)
    }
}
