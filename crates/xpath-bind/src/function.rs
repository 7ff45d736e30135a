//! Function descriptors and the typed closure traits used to register them.
use std::collections::BTreeMap;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{Error, ErrorCode};
use crate::model::XdmNode;
use crate::native::{NativeParam, NativeReturn, NativeType, NativeValue};
use crate::sequence_type::SequenceType;
use crate::xdm::ExpandedName;

/// Arguments handed to a native call, already converted.
pub type NativeArgs<N> = SmallVec<[NativeValue<N>; 4]>;

/// Type-erased native call. `M` is the module instance the call runs against.
pub type NativeCall<M, N> =
    Arc<dyn Fn(&M, NativeArgs<N>) -> Result<NativeValue<N>, Error> + Send + Sync>;

/// Declarative overrides attached to a registered function.
///
/// ```
/// use platynui_xpath_bind::FunctionAttributes;
///
/// let attrs = FunctionAttributes::new()
///     .returns("element(item)*")
///     .param(0, "xs:string?")
///     .param_name(0, "pattern");
/// assert_eq!(attrs.parameter_override(0), Some("xs:string?"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionAttributes {
    returns: Option<String>,
    params: BTreeMap<usize, String>,
    param_names: BTreeMap<usize, String>,
    side_effects: bool,
}

impl FunctionAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returns(mut self, lexical: impl Into<String>) -> Self {
        self.returns = Some(lexical.into());
        self
    }

    /// Lexical sequence type of the zero-based parameter `index`.
    pub fn param(mut self, index: usize, lexical: impl Into<String>) -> Self {
        self.params.insert(index, lexical.into());
        self
    }

    pub fn param_name(mut self, index: usize, name: impl Into<String>) -> Self {
        self.param_names.insert(index, name.into());
        self
    }

    pub fn side_effects(mut self, yes: bool) -> Self {
        self.side_effects = yes;
        self
    }

    pub fn return_override(&self) -> Option<&str> {
        self.returns.as_deref()
    }

    pub fn parameter_override(&self, index: usize) -> Option<&str> {
        self.params.get(&index).map(String::as_str)
    }

    pub fn parameter_name(&self, index: usize) -> Option<&str> {
        self.param_names.get(&index).map(String::as_str)
    }

    pub fn has_side_effects(&self) -> bool {
        self.side_effects
    }

    /// Highest parameter index any override refers to.
    pub(crate) fn max_index(&self) -> Option<usize> {
        let a = self.params.keys().next_back().copied();
        let b = self.param_names.keys().next_back().copied();
        a.max(b)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub sequence_type: SequenceType,
    pub native: NativeType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub name: ExpandedName,
    pub parameters: Vec<Parameter>,
    pub return_type: SequenceType,
    pub return_native: NativeType,
    pub has_side_effects: bool,
    pub module: Arc<str>,
}

impl FunctionDescriptor {
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }
}

/// A described function together with its native call.
pub struct BoundFunction<M, N> {
    pub descriptor: FunctionDescriptor,
    pub call: NativeCall<M, N>,
}

impl<M, N> Clone for BoundFunction<M, N> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            call: Arc::clone(&self.call),
        }
    }
}

impl<M, N> core::fmt::Debug for BoundFunction<M, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoundFunction")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

fn next_arg<N>(args: &mut impl Iterator<Item = NativeValue<N>>) -> Result<NativeValue<N>, Error> {
    args.next()
        .ok_or_else(|| Error::from_code(ErrorCode::XPST0017, "missing argument for native call"))
}

/// Free function usable as extension function: `Fn(A1, .., An) -> R`.
pub trait NativeFunction<N, Args>: Send + Sync + 'static {
    fn parameter_types() -> Vec<NativeType>;
    fn return_type() -> NativeType;
    fn into_call<M: 'static>(self) -> NativeCall<M, N>;
}

/// Function of a module instance: `Fn(&M, A1, .., An) -> R`.
pub trait NativeMethod<M, N, Args>: Send + Sync + 'static {
    fn parameter_types() -> Vec<NativeType>;
    fn return_type() -> NativeType;
    fn into_call(self) -> NativeCall<M, N>;
}

macro_rules! impl_native_callables {
    ($(($ty:ident, $var:ident)),*) => {
        impl<N, F, R, $($ty,)*> NativeFunction<N, ($($ty,)*)> for F
        where
            N: XdmNode,
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: NativeReturn<N>,
            $($ty: NativeParam<N>,)*
        {
            fn parameter_types() -> Vec<NativeType> {
                vec![$(<$ty as NativeParam<N>>::native_type()),*]
            }

            fn return_type() -> NativeType {
                R::native_type()
            }

            fn into_call<M: 'static>(self) -> NativeCall<M, N> {
                Arc::new(move |_: &M, args: NativeArgs<N>| {
                    #[allow(unused_mut, unused_variables)]
                    let mut args = args.into_iter();
                    $(let $var = <$ty as NativeParam<N>>::from_native(next_arg(&mut args)?)?;)*
                    (self)($($var),*).into_native()
                })
            }
        }

        impl<M, N, F, R, $($ty,)*> NativeMethod<M, N, ($($ty,)*)> for F
        where
            M: 'static,
            N: XdmNode,
            F: Fn(&M, $($ty),*) -> R + Send + Sync + 'static,
            R: NativeReturn<N>,
            $($ty: NativeParam<N>,)*
        {
            fn parameter_types() -> Vec<NativeType> {
                vec![$(<$ty as NativeParam<N>>::native_type()),*]
            }

            fn return_type() -> NativeType {
                R::native_type()
            }

            fn into_call(self) -> NativeCall<M, N> {
                Arc::new(move |module: &M, args: NativeArgs<N>| {
                    #[allow(unused_mut, unused_variables)]
                    let mut args = args.into_iter();
                    $(let $var = <$ty as NativeParam<N>>::from_native(next_arg(&mut args)?)?;)*
                    (self)(module, $($var),*).into_native()
                })
            }
        }
    };
}

impl_native_callables!();
impl_native_callables!((A1, a1));
impl_native_callables!((A1, a1), (A2, a2));
impl_native_callables!((A1, a1), (A2, a2), (A3, a3));
impl_native_callables!((A1, a1), (A2, a2), (A3, a3), (A4, a4));
impl_native_callables!((A1, a1), (A2, a2), (A3, a3), (A4, a4), (A5, a5));
impl_native_callables!((A1, a1), (A2, a2), (A3, a3), (A4, a4), (A5, a5), (A6, a6));
