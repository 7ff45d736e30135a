//! Description and dynamic representation of native Rust values crossing the binding.
//!
//! [`NativeParam`] and [`NativeReturn`] play the role reflection plays elsewhere: every
//! type usable in a bound signature describes itself as a [`NativeType`] and converts
//! from/to the type-erased [`NativeValue`] the dispatch table passes around.
use std::any::{TypeId, type_name};
use std::fmt;
use std::ops::Deref;

use chrono::{DateTime, FixedOffset, NaiveDate};

use crate::atomic::AtomicType;
use crate::error::{Error, ErrorCode};
use crate::model::{QName, XdmNode};
use crate::xdm::XdmItem;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NativeShape {
    Void,
    Atomic(AtomicType),
    Node,
    Item,
    Array(Box<NativeType>),
    Nullable(Box<NativeType>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeType {
    pub name: &'static str,
    pub id: TypeId,
    pub shape: NativeShape,
    /// Values of this type are always present (no absent/null state of their own).
    pub value_type: bool,
}

impl NativeType {
    pub fn new<T: ?Sized + 'static>(shape: NativeShape, value_type: bool) -> Self {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
            shape,
            value_type,
        }
    }

    pub fn atomic<T: 'static>(atomic: AtomicType) -> Self {
        Self::new::<T>(NativeShape::Atomic(atomic), true)
    }

    /// Enums travel as their string form.
    pub fn enumeration<T: 'static>() -> Self {
        Self::atomic::<T>(AtomicType::String)
    }

    /// A type that may be absent in its native representation; inferred as `?`.
    ///
    /// Built-in types (`String`, `Node<N>`, `XdmItem<N>`) are value types; wrap them in
    /// `Option<T>` to get `?`.
    pub fn reference<T: 'static>(shape: NativeShape) -> Self {
        Self::new::<T>(shape, false)
    }

    pub fn void() -> Self {
        Self::new::<()>(NativeShape::Void, true)
    }

    pub fn is_void(&self) -> bool {
        matches!(self.shape, NativeShape::Void)
    }

    pub fn atomic_type(&self) -> Option<AtomicType> {
        match &self.shape {
            NativeShape::Atomic(a) => Some(*a),
            _ => None,
        }
    }

    /// Crate (or `core` for primitives) that declares this type.
    pub fn origin(&self) -> &'static str {
        origin_of(self.name)
    }

    /// Value used when an optional argument is absent, if the type has one.
    pub fn default_value<N>(&self) -> Option<NativeValue<N>> {
        match &self.shape {
            NativeShape::Nullable(_) => Some(NativeValue::Null),
            NativeShape::Array(_) => Some(NativeValue::Sequence(Vec::new())),
            _ if !self.value_type => Some(NativeValue::Null),
            NativeShape::Atomic(a) => match a {
                AtomicType::Boolean => Some(NativeValue::Bool(false)),
                AtomicType::String | AtomicType::UntypedAtomic | AtomicType::AnyUri => {
                    Some(NativeValue::String(String::new()))
                }
                AtomicType::Double | AtomicType::Decimal => Some(NativeValue::Double(0.0)),
                AtomicType::Float => Some(NativeValue::Float(0.0)),
                t if t.is_unsigned() => Some(NativeValue::UInt(0)),
                t if t.is_integral() => Some(NativeValue::Int(0)),
                _ => None,
            },
            NativeShape::Void | NativeShape::Node | NativeShape::Item => None,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub(crate) fn origin_of(type_name: &str) -> &str {
    let head = type_name.split('<').next().unwrap_or(type_name);
    match head.split_once("::") {
        Some((root, _)) => root.trim_start_matches('&'),
        None => "core",
    }
}

/// Type-erased native value as seen by the dispatch table.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue<N> {
    Unit,
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    String(String),
    QName(QName),
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
    Node(N),
    Item(XdmItem<N>),
    Sequence(Vec<NativeValue<N>>),
}

impl<N> NativeValue<N> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NativeValue::Unit => "unit",
            NativeValue::Null => "null",
            NativeValue::Bool(_) => "bool",
            NativeValue::Int(_) => "signed integer",
            NativeValue::UInt(_) => "unsigned integer",
            NativeValue::Float(_) => "f32",
            NativeValue::Double(_) => "f64",
            NativeValue::String(_) => "string",
            NativeValue::QName(_) => "QName",
            NativeValue::DateTime(_) => "date-time",
            NativeValue::Date(_) => "date",
            NativeValue::Node(_) => "node",
            NativeValue::Item(_) => "item",
            NativeValue::Sequence(_) => "sequence",
        }
    }

    pub fn into_string(self) -> Result<String, Error> {
        match self {
            NativeValue::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }

    pub fn into_i128(self) -> Result<i128, Error> {
        match self {
            NativeValue::Int(i) => Ok(i128::from(i)),
            NativeValue::UInt(u) => Ok(i128::from(u)),
            other => Err(mismatch("integer", &other)),
        }
    }

    pub fn into_f64(self) -> Result<f64, Error> {
        match self {
            NativeValue::Double(d) => Ok(d),
            NativeValue::Float(f) => Ok(f64::from(f)),
            NativeValue::Int(i) => Ok(i as f64),
            NativeValue::UInt(u) => Ok(u as f64),
            other => Err(mismatch("floating point number", &other)),
        }
    }
}

pub(crate) fn mismatch<N>(expected: &str, got: &NativeValue<N>) -> Error {
    Error::from_code(
        ErrorCode::XPTY0004,
        format!("expected native {expected}, got {}", got.kind_name()),
    )
}

#[doc(hidden)]
pub fn unknown_variant<T>(value: &str) -> Error {
    Error::from_code(
        ErrorCode::FORG0001,
        format!("'{value}' is not a variant of {}", type_name::<T>()),
    )
}

/// A native type accepted as parameter of a bound function.
pub trait NativeParam<N>: Sized + 'static {
    fn native_type() -> NativeType;
    fn from_native(value: NativeValue<N>) -> Result<Self, Error>;
}

/// A native type returned from a bound function.
pub trait NativeReturn<N>: 'static {
    fn native_type() -> NativeType;
    fn into_native(self) -> Result<NativeValue<N>, Error>;
}

/// Navigable node cursor parameter or result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node<N>(pub N);

impl<N> Node<N> {
    pub fn into_inner(self) -> N {
        self.0
    }
}

impl<N> Deref for Node<N> {
    type Target = N;

    fn deref(&self) -> &N {
        &self.0
    }
}

impl<N: XdmNode> NativeParam<N> for Node<N> {
    fn native_type() -> NativeType {
        NativeType::new::<Self>(NativeShape::Node, true)
    }

    fn from_native(value: NativeValue<N>) -> Result<Self, Error> {
        match value {
            NativeValue::Node(n) | NativeValue::Item(XdmItem::Node(n)) => Ok(Node(n)),
            other => Err(mismatch("node", &other)),
        }
    }
}

impl<N: XdmNode> NativeReturn<N> for Node<N> {
    fn native_type() -> NativeType {
        <Self as NativeParam<N>>::native_type()
    }

    fn into_native(self) -> Result<NativeValue<N>, Error> {
        Ok(NativeValue::Node(self.0))
    }
}

impl<N: XdmNode> NativeParam<N> for XdmItem<N> {
    fn native_type() -> NativeType {
        NativeType::new::<Self>(NativeShape::Item, true)
    }

    fn from_native(value: NativeValue<N>) -> Result<Self, Error> {
        match value {
            NativeValue::Item(item) => Ok(item),
            NativeValue::Node(n) => Ok(XdmItem::Node(n)),
            other => Err(mismatch("item", &other)),
        }
    }
}

impl<N: XdmNode> NativeReturn<N> for XdmItem<N> {
    fn native_type() -> NativeType {
        <Self as NativeParam<N>>::native_type()
    }

    fn into_native(self) -> Result<NativeValue<N>, Error> {
        Ok(NativeValue::Item(self))
    }
}

macro_rules! native_int {
    ($($ty:ty => $atomic:ident, $variant:ident, $wide:ty);* $(;)?) => {$(
        impl<N: XdmNode> NativeParam<N> for $ty {
            fn native_type() -> NativeType {
                NativeType::atomic::<$ty>(AtomicType::$atomic)
            }

            fn from_native(value: NativeValue<N>) -> Result<Self, Error> {
                let v = value.into_i128()?;
                <$ty>::try_from(v).map_err(|_| {
                    Error::from_code(
                        ErrorCode::FORG0001,
                        format!("value {v} out of range for {}", stringify!($ty)),
                    )
                })
            }
        }

        impl<N: XdmNode> NativeReturn<N> for $ty {
            fn native_type() -> NativeType {
                NativeType::atomic::<$ty>(AtomicType::$atomic)
            }

            fn into_native(self) -> Result<NativeValue<N>, Error> {
                Ok(NativeValue::$variant(<$wide>::from(self)))
            }
        }
    )*};
}

native_int! {
    i8 => Byte, Int, i64;
    i16 => Short, Int, i64;
    i32 => Int, Int, i64;
    i64 => Long, Int, i64;
    u8 => UnsignedByte, UInt, u64;
    u16 => UnsignedShort, UInt, u64;
    u32 => UnsignedInt, UInt, u64;
    u64 => UnsignedLong, UInt, u64;
}

impl<N: XdmNode> NativeParam<N> for f64 {
    fn native_type() -> NativeType {
        NativeType::atomic::<f64>(AtomicType::Double)
    }

    fn from_native(value: NativeValue<N>) -> Result<Self, Error> {
        value.into_f64()
    }
}

impl<N: XdmNode> NativeReturn<N> for f64 {
    fn native_type() -> NativeType {
        NativeType::atomic::<f64>(AtomicType::Double)
    }

    fn into_native(self) -> Result<NativeValue<N>, Error> {
        Ok(NativeValue::Double(self))
    }
}

impl<N: XdmNode> NativeParam<N> for f32 {
    fn native_type() -> NativeType {
        NativeType::atomic::<f32>(AtomicType::Float)
    }

    fn from_native(value: NativeValue<N>) -> Result<Self, Error> {
        match value {
            NativeValue::Float(f) => Ok(f),
            other => other.into_f64().map(|d| d as f32),
        }
    }
}

impl<N: XdmNode> NativeReturn<N> for f32 {
    fn native_type() -> NativeType {
        NativeType::atomic::<f32>(AtomicType::Float)
    }

    fn into_native(self) -> Result<NativeValue<N>, Error> {
        Ok(NativeValue::Float(self))
    }
}

macro_rules! native_scalar {
    ($($ty:ty => $atomic:ident, $variant:ident);* $(;)?) => {$(
        impl<N: XdmNode> NativeParam<N> for $ty {
            fn native_type() -> NativeType {
                NativeType::atomic::<$ty>(AtomicType::$atomic)
            }

            fn from_native(value: NativeValue<N>) -> Result<Self, Error> {
                match value {
                    NativeValue::$variant(v) => Ok(v),
                    other => Err(mismatch(stringify!($ty), &other)),
                }
            }
        }

        impl<N: XdmNode> NativeReturn<N> for $ty {
            fn native_type() -> NativeType {
                NativeType::atomic::<$ty>(AtomicType::$atomic)
            }

            fn into_native(self) -> Result<NativeValue<N>, Error> {
                Ok(NativeValue::$variant(self))
            }
        }
    )*};
}

native_scalar! {
    bool => Boolean, Bool;
    String => String, String;
    QName => QName, QName;
    DateTime<FixedOffset> => DateTime, DateTime;
    NaiveDate => Date, Date;
}

impl<N: XdmNode, T: NativeParam<N>> NativeParam<N> for Vec<T> {
    fn native_type() -> NativeType {
        NativeType::new::<Self>(NativeShape::Array(Box::new(T::native_type())), false)
    }

    fn from_native(value: NativeValue<N>) -> Result<Self, Error> {
        match value {
            NativeValue::Sequence(items) => items.into_iter().map(T::from_native).collect(),
            NativeValue::Null => Ok(Vec::new()),
            other => Ok(vec![T::from_native(other)?]),
        }
    }
}

impl<N: XdmNode, T: NativeReturn<N>> NativeReturn<N> for Vec<T> {
    fn native_type() -> NativeType {
        NativeType::new::<Self>(NativeShape::Array(Box::new(T::native_type())), false)
    }

    fn into_native(self) -> Result<NativeValue<N>, Error> {
        self.into_iter()
            .map(T::into_native)
            .collect::<Result<Vec<_>, _>>()
            .map(NativeValue::Sequence)
    }
}

impl<N: XdmNode, T: NativeParam<N>> NativeParam<N> for Option<T> {
    fn native_type() -> NativeType {
        NativeType::new::<Self>(NativeShape::Nullable(Box::new(T::native_type())), false)
    }

    fn from_native(value: NativeValue<N>) -> Result<Self, Error> {
        match value {
            NativeValue::Null => Ok(None),
            other => T::from_native(other).map(Some),
        }
    }
}

impl<N: XdmNode, T: NativeReturn<N>> NativeReturn<N> for Option<T> {
    fn native_type() -> NativeType {
        NativeType::new::<Self>(NativeShape::Nullable(Box::new(T::native_type())), false)
    }

    fn into_native(self) -> Result<NativeValue<N>, Error> {
        match self {
            Some(v) => v.into_native(),
            None => Ok(NativeValue::Null),
        }
    }
}

impl<N: XdmNode> NativeReturn<N> for () {
    fn native_type() -> NativeType {
        NativeType::void()
    }

    fn into_native(self) -> Result<NativeValue<N>, Error> {
        Ok(NativeValue::Unit)
    }
}

impl<N: XdmNode, T: NativeReturn<N>, E: Into<Error> + 'static> NativeReturn<N> for Result<T, E> {
    fn native_type() -> NativeType {
        T::native_type()
    }

    fn into_native(self) -> Result<NativeValue<N>, Error> {
        self.map_err(Into::into)?.into_native()
    }
}

/// Implements [`NativeParam`] and [`NativeReturn`] for enums that implement
/// `FromStr` and `Display`; they are exchanged as `xs:string`.
#[macro_export]
macro_rules! native_enum {
    ($($ty:ty),+ $(,)?) => {$(
        impl<N: $crate::XdmNode> $crate::native::NativeParam<N> for $ty {
            fn native_type() -> $crate::native::NativeType {
                $crate::native::NativeType::enumeration::<$ty>()
            }

            fn from_native(
                value: $crate::native::NativeValue<N>,
            ) -> ::core::result::Result<Self, $crate::Error> {
                let s = value.into_string()?;
                <$ty as ::core::str::FromStr>::from_str(&s)
                    .map_err(|_| $crate::native::unknown_variant::<$ty>(&s))
            }
        }

        impl<N: $crate::XdmNode> $crate::native::NativeReturn<N> for $ty {
            fn native_type() -> $crate::native::NativeType {
                $crate::native::NativeType::enumeration::<$ty>()
            }

            fn into_native(
                self,
            ) -> ::core::result::Result<$crate::native::NativeValue<N>, $crate::Error> {
                ::core::result::Result::Ok($crate::native::NativeValue::String(self.to_string()))
            }
        }
    )+};
}
