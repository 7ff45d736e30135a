//! Turns overload groups into adapter units with an arity-indexed dispatch table.
use std::fmt::Write as _;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::convert::{InputTransform, OutputTransform};
use crate::error::{BindError, Error, ErrorCode};
use crate::function::NativeCall;
use crate::model::XdmNode;
use crate::module::ModuleDescriptor;
use crate::namespaces::NamespaceBindings;
use crate::sequence_type::SequenceType;
use crate::xdm::{ExpandedName, XdmSequence};

/// One overload of a group: its arity, native call and conversions.
pub struct DispatchEntry<M, N> {
    pub arity: usize,
    pub call: NativeCall<M, N>,
    pub inputs: Vec<InputTransform>,
    pub output: OutputTransform,
}

impl<M, N> std::fmt::Debug for DispatchEntry<M, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchEntry")
            .field("arity", &self.arity)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

/// Callable unit for one function name.
#[derive(Debug)]
pub struct AdapterUnit<M, N> {
    pub identity: ExpandedName,
    pub module: Arc<str>,
    /// Parameter types of the highest-arity overload.
    pub argument_types: Vec<SequenceType>,
    /// Result type per arity, indexed by `argc - min_arity`; `None` marks a gap.
    pub result_types: Vec<Option<SequenceType>>,
    pub min_arity: usize,
    pub max_arity: usize,
    pub has_side_effects: bool,
    /// Sorted by arity.
    pub dispatch: Vec<DispatchEntry<M, N>>,
}

fn no_overload(identity: &ExpandedName, argc: usize) -> Error {
    Error::from_code(
        ErrorCode::XPST0017,
        format!("function {identity} has no overload taking {argc} arguments"),
    )
}

impl<M, N: XdmNode> AdapterUnit<M, N> {
    /// Declared result type for a call with `actual.len()` arguments.
    pub fn result_type(&self, actual: &[SequenceType]) -> Result<SequenceType, Error> {
        actual
            .len()
            .checked_sub(self.min_arity)
            .and_then(|i| self.result_types.get(i))
            .and_then(Option::clone)
            .ok_or_else(|| no_overload(&self.identity, actual.len()))
    }

    pub fn entry(&self, argc: usize) -> Option<&DispatchEntry<M, N>> {
        self.dispatch
            .binary_search_by_key(&argc, |e| e.arity)
            .ok()
            .map(|i| &self.dispatch[i])
    }

    /// Dispatch on argument count, convert the arguments and the result.
    pub fn invoke(
        &self,
        module: &M,
        namespaces: &NamespaceBindings,
        args: &[XdmSequence<N>],
    ) -> Result<XdmSequence<N>, Error> {
        let argc = args.len();
        let entry = self
            .entry(argc)
            .ok_or_else(|| no_overload(&self.identity, argc))?;
        tracing::trace!(function = %self.identity, arity = argc, "dispatch");

        let mut values = SmallVec::with_capacity(argc);
        for (k, (input, arg)) in entry.inputs.iter().zip(args).enumerate() {
            let v = input.apply(arg.clone(), namespaces).map_err(|e| {
                e.in_context(format_args!("{}#{argc} argument {}", self.identity, k + 1))
            })?;
            values.push(v);
        }
        let result = (entry.call)(module, values)
            .map_err(|e| e.in_context(format_args!("{}#{argc}", self.identity)))?;
        entry
            .output
            .apply(result, namespaces)
            .map_err(|e| e.in_context(format_args!("{}#{argc} result", self.identity)))
    }

    /// Human-readable dispatch plan.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} [{}..={}] module={}{}",
            self.identity,
            self.min_arity,
            self.max_arity,
            self.module,
            if self.has_side_effects { " side-effects" } else { "" }
        );
        let args: Vec<String> = self.argument_types.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "  declared ({})", args.join(", "));
        for entry in &self.dispatch {
            let inputs: Vec<String> = entry
                .inputs
                .iter()
                .map(|i| format!("{} <- {}", i.native, i.sequence_type))
                .collect();
            let result = self
                .result_types
                .get(entry.arity - self.min_arity)
                .and_then(Option::as_ref)
                .map_or_else(|| "?".to_string(), ToString::to_string);
            let _ = writeln!(
                out,
                "  #{}: ({}) -> {} as {}",
                entry.arity,
                inputs.join(", "),
                entry.output.native,
                result
            );
        }
        out
    }
}

/// Build one adapter unit per overload group of `module`.
pub fn generate<M, N>(module: &ModuleDescriptor<M, N>) -> Result<Vec<AdapterUnit<M, N>>, BindError>
where
    N: XdmNode,
{
    let mut units = Vec::with_capacity(module.groups().len());
    for group in module.groups() {
        let broken = |message: &str| BindError::Signature {
            module: module.name().to_string(),
            function: group.name.to_string(),
            message: message.to_string(),
        };
        let mut result_types = vec![None; group.max_arity - group.min_arity + 1];
        let mut dispatch = Vec::with_capacity(group.members.len());
        let mut argument_types = Vec::new();
        let mut has_side_effects = false;

        for &index in &group.members {
            let bound = module
                .bound(index)
                .ok_or_else(|| broken("overload group refers to an unknown function"))?;
            let d = &bound.descriptor;
            let slot = result_types
                .get_mut(d.arity() - group.min_arity)
                .ok_or_else(|| broken("arity outside of the group's range"))?;
            *slot = Some(if d.return_type.is_empty_sequence() {
                SequenceType::optional_item(d.return_native.clone())
            } else {
                d.return_type.clone()
            });
            has_side_effects |= d.has_side_effects;
            argument_types = d.parameters.iter().map(|p| p.sequence_type.clone()).collect();
            dispatch.push(DispatchEntry {
                arity: d.arity(),
                call: Arc::clone(&bound.call),
                inputs: d
                    .parameters
                    .iter()
                    .map(|p| InputTransform::new(p.sequence_type.clone(), p.native.clone()))
                    .collect(),
                output: OutputTransform::new(d.return_type.clone(), d.return_native.clone()),
            });
        }
        units.push(AdapterUnit {
            identity: group.name.clone(),
            module: module.name_arc(),
            argument_types,
            result_types,
            min_arity: group.min_arity,
            max_arity: group.max_arity,
            has_side_effects,
            dispatch,
        });
    }
    tracing::debug!(module = module.name(), units = units.len(), "adapter units generated");
    Ok(units)
}
