//! Grouping of registered functions into arity-dispatched overload groups.
use itertools::Itertools;

use crate::error::BindError;
use crate::function::FunctionDescriptor;
use crate::xdm::ExpandedName;

/// Functions sharing a name, distinguished by parameter count only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadGroup {
    pub name: ExpandedName,
    /// Indices into the module's function list, ascending by arity.
    pub members: Vec<usize>,
    pub min_arity: usize,
    pub max_arity: usize,
}

impl OverloadGroup {
    /// Whether every arity in `min_arity..=max_arity` has an overload.
    pub fn is_contiguous(&self) -> bool {
        self.members.len() == self.max_arity - self.min_arity + 1
    }
}

/// Bucket `functions` by name and validate each bucket.
///
/// Groups are returned in order of first registration. A bucket holding two
/// functions with the same parameter count is rejected.
pub fn group_functions(
    module: &str,
    functions: &[FunctionDescriptor],
) -> Result<Vec<OverloadGroup>, BindError> {
    let buckets = functions
        .iter()
        .enumerate()
        .into_group_map_by(|(_, f)| f.name.clone());
    let order: Vec<&ExpandedName> = functions.iter().map(|f| &f.name).unique().collect();

    let mut groups = Vec::with_capacity(order.len());
    for name in order {
        let Some(bucket) = buckets.get(name) else {
            continue;
        };
        if let Some(arity) = bucket.iter().map(|(_, f)| f.arity()).duplicates().next() {
            return Err(BindError::AmbiguousOverload {
                module: module.to_string(),
                function: name.to_string(),
                arity,
            });
        }
        let members: Vec<usize> = bucket
            .iter()
            .sorted_by_key(|(_, f)| f.arity())
            .map(|(i, _)| *i)
            .collect();
        let (min_arity, max_arity) = match (members.first(), members.last()) {
            (Some(&lo), Some(&hi)) => (functions[lo].arity(), functions[hi].arity()),
            _ => continue,
        };
        groups.push(OverloadGroup {
            name: name.clone(),
            members,
            min_arity,
            max_arity,
        });
    }
    Ok(groups)
}
