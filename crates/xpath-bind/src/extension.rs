//! Engine-side contract of an extension function, plus a registry to host them.
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, ErrorCode};
use crate::namespaces::NamespaceBindings;
use crate::sequence_type::SequenceType;
use crate::xdm::{ExpandedName, XdmItem, XdmSequence};

pub type Arity = usize;

/// Per-call state handed to an extension function by the engine.
pub struct CallCtx<'a, N> {
    /// In-scope namespaces of the calling expression.
    pub namespaces: &'a NamespaceBindings,
    pub context_item: Option<&'a XdmItem<N>>,
}

impl<'a, N> CallCtx<'a, N> {
    pub fn new(namespaces: &'a NamespaceBindings) -> Self {
        Self {
            namespaces,
            context_item: None,
        }
    }

    pub fn with_context_item(mut self, item: &'a XdmItem<N>) -> Self {
        self.context_item = Some(item);
        self
    }
}

/// A plugin object the engine calls for one function name and arity range.
pub trait ExtensionFunction<N>: Send + Sync {
    fn name(&self) -> &ExpandedName;
    /// Declared argument types checked by the engine before a call.
    fn argument_types(&self) -> &[SequenceType];
    fn min_arity(&self) -> Arity;
    fn max_arity(&self) -> Arity;
    fn result_type(&self, actual: &[SequenceType]) -> Result<SequenceType, Error>;
    fn has_side_effects(&self) -> bool;
    fn call(&self, ctx: &CallCtx<'_, N>, args: &[XdmSequence<N>]) -> Result<XdmSequence<N>, Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No function with this name exists.
    Unknown(ExpandedName),
    /// Function exists, but not for the requested arity.
    WrongArity {
        name: ExpandedName,
        available: Vec<Arity>,
    },
}

impl ResolveError {
    pub fn into_error(self) -> Error {
        match self {
            ResolveError::Unknown(name) => {
                Error::from_code(ErrorCode::XPST0017, format!("unknown function {name}"))
            }
            ResolveError::WrongArity { name, available } => Error::from_code(
                ErrorCode::XPST0017,
                format!("function {name} is not defined for this arity (available: {available:?})"),
            ),
        }
    }
}

/// Extension functions by name; each entry covers `min_arity..=max_arity`.
pub struct ExtensionRegistry<N> {
    fns: HashMap<ExpandedName, Vec<Arc<dyn ExtensionFunction<N>>>>,
}

impl<N> Default for ExtensionRegistry<N> {
    fn default() -> Self {
        Self {
            fns: HashMap::new(),
        }
    }
}

impl<N> ExtensionRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: Arc<dyn ExtensionFunction<N>>) {
        let entry = self.fns.entry(function.name().clone()).or_default();
        entry.push(function);
        // narrower ranges first so the most specific registration wins
        entry.sort_by_key(|f| (f.max_arity() - f.min_arity(), f.min_arity()));
    }

    pub fn resolve(
        &self,
        name: &ExpandedName,
        arity: Arity,
    ) -> Result<&Arc<dyn ExtensionFunction<N>>, ResolveError> {
        let Some(candidates) = self.fns.get(name) else {
            return Err(ResolveError::Unknown(name.clone()));
        };
        if let Some(found) = candidates
            .iter()
            .find(|f| (f.min_arity()..=f.max_arity()).contains(&arity))
        {
            return Ok(found);
        }
        let mut available: Vec<Arity> = candidates
            .iter()
            .flat_map(|f| f.min_arity()..=f.max_arity())
            .collect();
        available.sort_unstable();
        available.dedup();
        Err(ResolveError::WrongArity {
            name: name.clone(),
            available,
        })
    }

    /// Resolve and call, checking argument counts against the declared types.
    pub fn invoke(
        &self,
        name: &ExpandedName,
        ctx: &CallCtx<'_, N>,
        args: &[XdmSequence<N>],
    ) -> Result<XdmSequence<N>, Error> {
        let function = self
            .resolve(name, args.len())
            .map_err(ResolveError::into_error)?;
        for (i, (arg, declared)) in args.iter().zip(function.argument_types()).enumerate() {
            if !declared.accepts_len(arg.len()) {
                return Err(Error::from_code(
                    ErrorCode::XPTY0004,
                    format!(
                        "argument {} of {name}: {} items do not match {declared}",
                        i + 1,
                        arg.len()
                    ),
                ));
            }
        }
        function.call(ctx, args)
    }

    pub fn contains(&self, name: &ExpandedName) -> bool {
        self.fns.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &ExpandedName> {
        self.fns.keys()
    }

    pub fn len(&self) -> usize {
        self.fns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}
