use chrono::{DateTime, FixedOffset, NaiveDate};
use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExpandedName {
    pub ns_uri: Option<String>,
    pub local: String,
}

impl ExpandedName {
    pub fn new(ns_uri: Option<String>, local: impl Into<String>) -> Self {
        Self {
            ns_uri,
            local: local.into(),
        }
    }

    pub fn ns(ns_uri: &str, local: impl Into<String>) -> Self {
        Self::new(Some(ns_uri.to_string()), local)
    }

    pub fn xs(local: impl Into<String>) -> Self {
        Self::ns(crate::consts::XS, local)
    }
}

impl fmt::Display for ExpandedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ns_uri.as_deref() {
            Some(crate::consts::XS) => write!(f, "xs:{}", self.local),
            Some(ns) => write!(f, "Q{{{}}}{}", ns, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// The part of the XDM atomic value space that native bindings exchange.
///
/// Sized integer subtypes are kept distinct so a binding can return exactly the
/// type it declares (`xs:int` vs `xs:long`) without a lossy round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum XdmAtomicValue {
    Boolean(bool),
    String(String),
    UntypedAtomic(String),
    AnyUri(String),
    Integer(i64),
    Decimal(f64),
    Double(f64),
    Float(f32),
    Long(i64),
    Int(i32),
    Short(i16),
    Byte(i8),
    UnsignedLong(u64),
    UnsignedInt(u32),
    UnsignedShort(u16),
    UnsignedByte(u8),
    QName {
        ns_uri: Option<String>,
        prefix: Option<String>,
        local: String,
    },
    DateTime(DateTime<FixedOffset>),
    Date {
        date: NaiveDate,
        tz: Option<FixedOffset>,
    },
}

impl XdmAtomicValue {
    /// Name of the most specific `xs:` type of this value.
    pub fn type_name(&self) -> &'static str {
        use XdmAtomicValue::*;
        match self {
            Boolean(_) => "boolean",
            String(_) => "string",
            UntypedAtomic(_) => "untypedAtomic",
            AnyUri(_) => "anyURI",
            Integer(_) => "integer",
            Decimal(_) => "decimal",
            Double(_) => "double",
            Float(_) => "float",
            Long(_) => "long",
            Int(_) => "int",
            Short(_) => "short",
            Byte(_) => "byte",
            UnsignedLong(_) => "unsignedLong",
            UnsignedInt(_) => "unsignedInt",
            UnsignedShort(_) => "unsignedShort",
            UnsignedByte(_) => "unsignedByte",
            QName { .. } => "QName",
            DateTime(_) => "dateTime",
            Date { .. } => "date",
        }
    }

    /// Lexical form as produced by `fn:string`.
    pub fn lexical(&self) -> std::string::String {
        use XdmAtomicValue::*;
        match self {
            Boolean(b) => b.to_string(),
            String(s) | UntypedAtomic(s) | AnyUri(s) => s.clone(),
            Integer(i) | Long(i) => i.to_string(),
            Decimal(d) | Double(d) => format_double(*d),
            Float(f) => format_double(f64::from(*f)),
            Int(i) => i.to_string(),
            Short(i) => i.to_string(),
            Byte(i) => i.to_string(),
            UnsignedLong(u) => u.to_string(),
            UnsignedInt(u) => u.to_string(),
            UnsignedShort(u) => u.to_string(),
            UnsignedByte(u) => u.to_string(),
            QName { prefix, local, .. } => match prefix {
                Some(p) if !p.is_empty() => format!("{p}:{local}"),
                _ => local.clone(),
            },
            DateTime(dt) => dt.to_rfc3339(),
            Date { date, tz } => match tz {
                Some(offset) => format!("{}{}", date.format("%Y-%m-%d"), offset),
                None => date.format("%Y-%m-%d").to_string(),
            },
        }
    }
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "INF".to_string() } else { "-INF".to_string() }
    } else {
        d.to_string()
    }
}

pub type XdmSequence<N> = Vec<XdmItem<N>>;

#[derive(Debug, Clone, PartialEq)]
pub enum XdmItem<N> {
    Node(N),
    Atomic(XdmAtomicValue),
}

impl<N> From<XdmAtomicValue> for XdmItem<N> {
    fn from(a: XdmAtomicValue) -> Self {
        XdmItem::Atomic(a)
    }
}

impl<N> fmt::Display for XdmItem<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XdmItem::Node(_) => write!(f, "<node>"),
            XdmItem::Atomic(a) => write!(f, "{:?}", a),
        }
    }
}
