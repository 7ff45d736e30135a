//! Batched validation and loading of adapter units.
//!
//! All modules of a [`Batch`] are checked together. A single error diagnostic
//! fails the whole batch so the engine never sees a partial function set.
use std::any::type_name;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;

use crate::adapter::{BoundExtension, ModuleInstance};
use crate::consts::{DUMP_DIR_ENV, ERR_NS, FNS, XML_URI, XS};
use crate::dependency::DependencyProviders;
use crate::error::BindError;
use crate::extension::{ExtensionFunction, ExtensionRegistry};
use crate::generator::{AdapterUnit, generate};
use crate::model::XdmNode;
use crate::module::{ExtensionModule, ModuleDescriptor};
use crate::native::origin_of;
use crate::registry::ModuleRegistry;
use crate::xdm::ExpandedName;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoaderOptions {
    /// Directory receiving one rendered dispatch plan per module.
    pub dump_dir: Option<PathBuf>,
    /// Treat warnings like errors.
    pub fail_on_warnings: bool,
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    pub fn with_fail_on_warnings(mut self, yes: bool) -> Self {
        self.fail_on_warnings = yes;
        self
    }

    /// Defaults, with `dump_dir` taken from `PLATYNUI_XPATH_BIND_DUMP_DIR` when set.
    pub fn from_env() -> Self {
        Self {
            dump_dir: std::env::var_os(DUMP_DIR_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub module: String,
    pub function: String,
    pub message: String,
}

impl Diagnostic {
    fn new(severity: Severity, module: &str, function: impl ToString, message: String) -> Self {
        Self {
            severity,
            module: module.to_string(),
            function: function.to_string(),
            message,
        }
    }
}

/// A module's adapter units with the type parameters erased.
trait PendingModule<N>: Send + Sync {
    fn name(&self) -> &str;
    fn identities(&self) -> Vec<ExpandedName>;
    fn check(&self, out: &mut Vec<Diagnostic>);
    fn origins(&self, out: &mut BTreeSet<&'static str>);
    fn render(&self) -> String;
    fn instantiate(&self, providers: &DependencyProviders<N>) -> Vec<Arc<dyn ExtensionFunction<N>>>;
}

struct ModuleUnits<M, N> {
    module: Arc<ModuleDescriptor<M, N>>,
    units: Vec<Arc<AdapterUnit<M, N>>>,
}

const RESERVED_NAMESPACES: [&str; 4] = [XS, FNS, XML_URI, ERR_NS];

fn check_unit<M, N>(module: &str, unit: &AdapterUnit<M, N>, out: &mut Vec<Diagnostic>) {
    let mut error = |message: String| {
        out.push(Diagnostic::new(Severity::Error, module, &unit.identity, message));
    };
    let arities: Vec<usize> = unit.dispatch.iter().map(|e| e.arity).collect();
    if arities.is_empty() {
        error("no overloads".into());
        return;
    }
    if arities.windows(2).any(|w| w[0] >= w[1]) {
        error(format!("dispatch table not strictly ordered by arity: {arities:?}"));
    }
    if arities.first() != Some(&unit.min_arity) || arities.last() != Some(&unit.max_arity) {
        error(format!(
            "arity range {}..={} does not match overloads {arities:?}",
            unit.min_arity, unit.max_arity
        ));
        return;
    }
    if unit.result_types.len() != unit.max_arity - unit.min_arity + 1 {
        error("result type table does not cover the arity range".into());
    }
    if unit.argument_types.len() != unit.max_arity {
        error("declared argument types do not match the highest arity".into());
    }
    for entry in &unit.dispatch {
        if entry.inputs.len() != entry.arity {
            error(format!("overload #{} has {} input conversions", entry.arity, entry.inputs.len()));
        }
        if entry
            .arity
            .checked_sub(unit.min_arity)
            .and_then(|i| unit.result_types.get(i))
            .is_none_or(Option::is_none)
        {
            error(format!("overload #{} has no result type", entry.arity));
        }
    }

    let mut warn = |message: String| {
        out.push(Diagnostic::new(Severity::Warning, module, &unit.identity, message));
    };
    let gaps: Vec<usize> = (unit.min_arity..=unit.max_arity)
        .filter(|a| !arities.contains(a))
        .collect();
    if !gaps.is_empty() {
        warn(format!("no overload for arities {gaps:?}; such calls fail"));
    }
    for entry in &unit.dispatch {
        for (k, input) in entry.inputs.iter().enumerate() {
            if let Some(declared) = unit.argument_types.get(k)
                && declared != &input.sequence_type
            {
                warn(format!(
                    "parameter {} of #{} is {} but declared as {declared}",
                    k + 1,
                    entry.arity,
                    input.sequence_type
                ));
            }
        }
    }
}

impl<M: Default + Send + Sync + 'static, N: XdmNode> PendingModule<N> for ModuleUnits<M, N> {
    fn name(&self) -> &str {
        self.module.name()
    }

    fn identities(&self) -> Vec<ExpandedName> {
        self.units.iter().map(|u| u.identity.clone()).collect()
    }

    fn check(&self, out: &mut Vec<Diagnostic>) {
        let ns = self.module.namespace();
        if RESERVED_NAMESPACES.contains(&ns) {
            out.push(Diagnostic::new(
                Severity::Error,
                self.name(),
                "*",
                format!("namespace {ns} is reserved"),
            ));
        }
        for unit in &self.units {
            check_unit(self.name(), unit, out);
        }
    }

    fn origins(&self, out: &mut BTreeSet<&'static str>) {
        out.insert(origin_of(self.module.type_name()));
        out.insert(origin_of(type_name::<N>()));
        for native in self.module.native_types() {
            out.insert(native.origin());
        }
    }

    fn render(&self) -> String {
        let mut out = format!(
            "module {} ({}) namespace={}{}\n",
            self.module.name(),
            self.module.type_name(),
            self.module.namespace(),
            if self.module.is_static() { " static" } else { "" }
        );
        for dep in self.module.dependencies() {
            out.push_str(&format!("  dependency {}: {}\n", dep.property, dep.native_type));
        }
        for unit in &self.units {
            out.push_str(&unit.render());
        }
        out
    }

    fn instantiate(&self, providers: &DependencyProviders<N>) -> Vec<Arc<dyn ExtensionFunction<N>>> {
        let instance = Arc::new(ModuleInstance::new(
            Arc::clone(&self.module),
            providers.clone(),
        ));
        self.units
            .iter()
            .map(|u| {
                Arc::new(BoundExtension::new(Arc::clone(u), Arc::clone(&instance)))
                    as Arc<dyn ExtensionFunction<N>>
            })
            .collect()
    }
}

/// Modules queued for one compilation.
pub struct Batch<N> {
    modules: Vec<Box<dyn PendingModule<N>>>,
}

impl<N> Default for Batch<N> {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
        }
    }
}

impl<N: XdmNode> Batch<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the adapter units of `module` and queue them.
    pub fn add_module<M>(mut self, module: Arc<ModuleDescriptor<M, N>>) -> Result<Self, BindError>
    where
        M: Default + Send + Sync + 'static,
    {
        let units = generate(&module)?.into_iter().map(Arc::new).collect();
        self.modules.push(Box::new(ModuleUnits { module, units }));
        Ok(self)
    }

    /// Describe `M` through `registry` and queue it.
    pub fn add<M: ExtensionModule<N>>(self, registry: &ModuleRegistry) -> Result<Self, BindError> {
        let module = registry.describe::<M, N>()?;
        self.add_module(module)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Compiles batches one at a time.
#[derive(Debug, Default)]
pub struct Loader {
    options: LoaderOptions,
    lock: Mutex<()>,
}

impl Loader {
    pub fn new(options: LoaderOptions) -> Self {
        Self {
            options,
            lock: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn compile<N: XdmNode>(&self, batch: Batch<N>) -> Result<LoadedBatch<N>, BindError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut diagnostics = Vec::new();
        let mut seen: HashMap<ExpandedName, &str> = HashMap::new();
        for m in &batch.modules {
            m.check(&mut diagnostics);
            for identity in m.identities() {
                if let Some(owner) = seen.get(&identity) {
                    diagnostics.push(Diagnostic::new(
                        Severity::Error,
                        m.name(),
                        &identity,
                        format!("function already provided by module '{owner}'"),
                    ));
                } else {
                    seen.insert(identity, m.name());
                }
            }
        }

        let mut references = BTreeSet::new();
        references.insert(origin_of(type_name::<Loader>()));
        for m in &batch.modules {
            m.origins(&mut references);
        }

        for d in diagnostics.iter().filter(|d| d.severity == Severity::Warning) {
            tracing::warn!(module = %d.module, function = %d.function, "{}", d.message);
        }
        let fatal = diagnostics.iter().find(|d| {
            d.severity == Severity::Error || (self.options.fail_on_warnings && d.severity == Severity::Warning)
        });
        let rendered: Vec<(String, String)> = batch
            .modules
            .iter()
            .map(|m| (m.name().to_string(), m.render()))
            .collect();
        if let Some(dir) = &self.options.dump_dir {
            write_dumps(dir, &rendered);
        }
        if let Some(d) = fatal {
            let dump = rendered
                .iter()
                .find(|(name, _)| *name == d.module)
                .map(|(_, text)| text.clone());
            return Err(BindError::Compilation {
                module: d.module.clone(),
                function: d.function.clone(),
                diagnostic: d.message.clone(),
                dump,
            });
        }

        let mut functions = Vec::new();
        for m in &batch.modules {
            for identity in m.identities() {
                functions.push((m.name().to_string(), identity));
            }
        }
        tracing::debug!(
            modules = batch.modules.len(),
            functions = functions.len(),
            warnings = diagnostics.len(),
            "binding batch compiled"
        );
        Ok(LoadedBatch {
            modules: batch.modules,
            functions,
            references: references.into_iter().collect(),
            diagnostics,
        })
    }
}

fn write_dumps(dir: &Path, rendered: &[(String, String)]) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        tracing::warn!(dir = %dir.display(), error = %e, "cannot create dump directory");
        return;
    }
    for (name, text) in rendered {
        let path = dir.join(format!("{name}.plan.txt"));
        match std::fs::write(&path, text) {
            Ok(()) => tracing::debug!(path = %path.display(), "dispatch plan written"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot write dispatch plan"),
        }
    }
}

/// Successfully compiled batch, ready to be instantiated.
pub struct LoadedBatch<N> {
    modules: Vec<Box<dyn PendingModule<N>>>,
    functions: Vec<(String, ExpandedName)>,
    references: Vec<&'static str>,
    diagnostics: Vec<Diagnostic>,
}

impl<N: XdmNode> LoadedBatch<N> {
    /// `(module, function)` pairs in emission order.
    pub fn functions(&self) -> &[(String, ExpandedName)] {
        &self.functions
    }

    /// Crates whose types the bound functions reference.
    pub fn references(&self) -> &[&'static str] {
        &self.references
    }

    /// Warnings produced while compiling.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Plugin objects in emission order. Each module gets one fresh instance.
    pub fn instantiate(&self, providers: &DependencyProviders<N>) -> Vec<Arc<dyn ExtensionFunction<N>>> {
        self.modules
            .iter()
            .flat_map(|m| m.instantiate(providers))
            .collect()
    }

    pub fn register(&self, registry: &mut ExtensionRegistry<N>, providers: &DependencyProviders<N>) -> usize {
        let functions = self.instantiate(providers);
        let n = functions.len();
        for f in functions {
            registry.register(f);
        }
        n
    }
}
