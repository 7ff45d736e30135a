use crate::consts::XS;
use crate::xdm::ExpandedName;

/// XML Schema atomic types a binding can declare or carry natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicType {
    AnyAtomic,
    UntypedAtomic,
    String,
    Boolean,
    Decimal,
    Integer,
    Long,
    Int,
    Short,
    Byte,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    Double,
    Float,
    QName,
    AnyUri,
    DateTime,
    Date,
}

const TABLE: &[(AtomicType, &str)] = &[
    (AtomicType::AnyAtomic, "anyAtomicType"),
    (AtomicType::UntypedAtomic, "untypedAtomic"),
    (AtomicType::String, "string"),
    (AtomicType::Boolean, "boolean"),
    (AtomicType::Decimal, "decimal"),
    (AtomicType::Integer, "integer"),
    (AtomicType::Long, "long"),
    (AtomicType::Int, "int"),
    (AtomicType::Short, "short"),
    (AtomicType::Byte, "byte"),
    (AtomicType::UnsignedLong, "unsignedLong"),
    (AtomicType::UnsignedInt, "unsignedInt"),
    (AtomicType::UnsignedShort, "unsignedShort"),
    (AtomicType::UnsignedByte, "unsignedByte"),
    (AtomicType::Double, "double"),
    (AtomicType::Float, "float"),
    (AtomicType::QName, "QName"),
    (AtomicType::AnyUri, "anyURI"),
    (AtomicType::DateTime, "dateTime"),
    (AtomicType::Date, "date"),
];

impl AtomicType {
    pub fn local_name(self) -> &'static str {
        TABLE
            .iter()
            .find(|(t, _)| *t == self)
            .map_or("anyAtomicType", |(_, n)| n)
    }

    pub fn name(self) -> ExpandedName {
        ExpandedName::xs(self.local_name())
    }

    /// Look up a built-in atomic type by expanded name. Only the `xs` namespace is known.
    pub fn from_name(name: &ExpandedName) -> Option<Self> {
        if name.ns_uri.as_deref() != Some(XS) {
            return None;
        }
        TABLE
            .iter()
            .find(|(_, n)| *n == name.local)
            .map(|(t, _)| *t)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integral()
            || matches!(self, AtomicType::Decimal | AtomicType::Double | AtomicType::Float)
    }

    pub fn is_integral(self) -> bool {
        matches!(
            self,
            AtomicType::Integer
                | AtomicType::Long
                | AtomicType::Int
                | AtomicType::Short
                | AtomicType::Byte
                | AtomicType::UnsignedLong
                | AtomicType::UnsignedInt
                | AtomicType::UnsignedShort
                | AtomicType::UnsignedByte
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            AtomicType::UnsignedLong
                | AtomicType::UnsignedInt
                | AtomicType::UnsignedShort
                | AtomicType::UnsignedByte
        )
    }

    /// Inclusive value range of the integral types, as `i128` to cover `u64`.
    pub fn integral_range(self) -> Option<(i128, i128)> {
        Some(match self {
            AtomicType::Integer | AtomicType::Long => (i128::from(i64::MIN), i128::from(i64::MAX)),
            AtomicType::Int => (i128::from(i32::MIN), i128::from(i32::MAX)),
            AtomicType::Short => (i128::from(i16::MIN), i128::from(i16::MAX)),
            AtomicType::Byte => (i128::from(i8::MIN), i128::from(i8::MAX)),
            AtomicType::UnsignedLong => (0, i128::from(u64::MAX)),
            AtomicType::UnsignedInt => (0, i128::from(u32::MAX)),
            AtomicType::UnsignedShort => (0, i128::from(u16::MAX)),
            AtomicType::UnsignedByte => (0, i128::from(u8::MAX)),
            _ => return None,
        })
    }
}
