//! Native Rust functions as XPath extension functions.
//!
//! A module registers typed closures with a [`ModuleBuilder`]. Their sequence types
//! are inferred from the Rust signature (or declared lexically), overloads sharing a
//! name are grouped by arity, and the [`Loader`] turns the groups into
//! [`ExtensionFunction`] plugin objects for the engine.
pub mod adapter;
pub mod atomic;
pub mod consts;
pub mod convert;
pub mod dependency;
pub mod error;
pub mod extension;
pub mod function;
pub mod generator;
pub mod loader;
pub mod model;
pub mod module;
pub mod namespaces;
pub mod native;
pub mod overload;
pub mod registry;
pub mod sequence_type;
pub mod simple_node;
pub mod xdm;

pub use adapter::{BoundExtension, ModuleInstance};
pub use atomic::AtomicType;
pub use dependency::{
    DependencyProviders, InitReport, ItemFactory, NodeResolver, Processor, ProcessorInfo,
    ProviderKind,
};
pub use error::{BindError, Error, ErrorCode, SequenceTypeError, TypeSlot};
pub use extension::{CallCtx, ExtensionFunction, ExtensionRegistry, ResolveError};
pub use function::{FunctionAttributes, FunctionDescriptor, Parameter};
pub use generator::{AdapterUnit, generate};
pub use loader::{Batch, Diagnostic, LoadedBatch, Loader, LoaderOptions, Severity};
pub use model::{NodeKind, QName, XdmNode};
pub use module::{ExtensionModule, ModuleBuilder, ModuleDescriptor};
pub use namespaces::NamespaceBindings;
pub use native::{NativeParam, NativeReturn, NativeType, NativeValue, Node};
pub use overload::{OverloadGroup, group_functions};
pub use registry::ModuleRegistry;
pub use sequence_type::{ItemKind, ItemType, Occurrence, SequenceType};
pub use simple_node::{SimpleItemFactory, SimpleNode};
pub use xdm::{ExpandedName, XdmAtomicValue, XdmItem, XdmSequence};

#[cfg(test)]
use criterion as _;
#[cfg(test)]
use tempfile as _;
