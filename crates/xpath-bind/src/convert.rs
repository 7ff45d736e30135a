//! Value conversion between XDM sequences and native values.
//!
//! [`InputTransform`] materializes one positional argument for the native call and
//! [`OutputTransform`] turns the native result back into a sequence. Atomic values
//! are coerced with [`change_type`], which implements the subset of XPath casting
//! the native representations need.
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

use crate::atomic::AtomicType;
use crate::error::{Error, ErrorCode};
use crate::model::{NodeKind, QName, XdmNode, first_element_descendant_or_self, is_ncname};
use crate::namespaces::NamespaceBindings;
use crate::native::{NativeShape, NativeType, NativeValue, mismatch};
use crate::sequence_type::{ItemKind, ItemType, Occurrence, SequenceType};
use crate::xdm::{XdmAtomicValue, XdmItem, XdmSequence};

fn type_error(msg: impl Into<String>) -> Error {
    Error::from_code(ErrorCode::XPTY0004, msg)
}

fn cast_error(value: &XdmAtomicValue, target: AtomicType) -> Error {
    Error::from_code(
        ErrorCode::FORG0001,
        format!(
            "cannot cast '{}' (xs:{}) to xs:{}",
            value.lexical(),
            value.type_name(),
            target.local_name()
        ),
    )
}

enum Number {
    Int(i128),
    Float(f64),
}

fn numeric(value: &XdmAtomicValue) -> Option<Number> {
    use XdmAtomicValue as A;
    Some(match value {
        A::Integer(i) | A::Long(i) => Number::Int(i128::from(*i)),
        A::Int(i) => Number::Int(i128::from(*i)),
        A::Short(i) => Number::Int(i128::from(*i)),
        A::Byte(i) => Number::Int(i128::from(*i)),
        A::UnsignedLong(u) => Number::Int(i128::from(*u)),
        A::UnsignedInt(u) => Number::Int(i128::from(*u)),
        A::UnsignedShort(u) => Number::Int(i128::from(*u)),
        A::UnsignedByte(u) => Number::Int(i128::from(*u)),
        A::Decimal(d) | A::Double(d) => Number::Float(*d),
        A::Float(f) => Number::Float(f64::from(*f)),
        _ => return None,
    })
}

fn textual(value: &XdmAtomicValue) -> Option<&str> {
    match value {
        XdmAtomicValue::String(s) | XdmAtomicValue::UntypedAtomic(s) | XdmAtomicValue::AnyUri(s) => {
            Some(s.trim())
        }
        _ => None,
    }
}

fn to_bool(value: &XdmAtomicValue, target: AtomicType) -> Result<bool, Error> {
    if let XdmAtomicValue::Boolean(b) = value {
        return Ok(*b);
    }
    if let Some(n) = numeric(value) {
        return Ok(match n {
            Number::Int(i) => i != 0,
            Number::Float(f) => !(f == 0.0 || f.is_nan()),
        });
    }
    match textual(value) {
        Some("true" | "1") => Ok(true),
        Some("false" | "0") => Ok(false),
        Some(_) => Err(cast_error(value, target)),
        None => Err(type_error(format!(
            "xs:{} cannot be converted to xs:boolean",
            value.type_name()
        ))),
    }
}

fn to_integer(value: &XdmAtomicValue, target: AtomicType) -> Result<i128, Error> {
    let v = match numeric(value) {
        Some(Number::Int(i)) => i,
        Some(Number::Float(f)) => {
            if !f.is_finite() {
                return Err(Error::from_code(
                    ErrorCode::FOCA0002,
                    format!("cannot convert {} to xs:{}", value.lexical(), target.local_name()),
                ));
            }
            let t = f.trunc();
            if t.abs() >= 1.0e38 {
                return Err(cast_error(value, target));
            }
            t as i128
        }
        None => match value {
            XdmAtomicValue::Boolean(b) => i128::from(*b),
            _ => match textual(value) {
                Some(s) => s
                    .strip_prefix('+')
                    .unwrap_or(s)
                    .parse::<i128>()
                    .map_err(|_| cast_error(value, target))?,
                None => {
                    return Err(type_error(format!(
                        "xs:{} cannot be converted to xs:{}",
                        value.type_name(),
                        target.local_name()
                    )));
                }
            },
        },
    };
    match target.integral_range() {
        Some((lo, hi)) if v < lo || v > hi => Err(Error::from_code(
            ErrorCode::FORG0001,
            format!("value {v} out of range for xs:{}", target.local_name()),
        )),
        _ => Ok(v),
    }
}

fn parse_double(s: &str) -> Option<f64> {
    match s {
        "INF" | "+INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ if s.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => None,
        _ => s.parse::<f64>().ok(),
    }
}

fn to_double(value: &XdmAtomicValue, target: AtomicType) -> Result<f64, Error> {
    match numeric(value) {
        Some(Number::Int(i)) => Ok(i as f64),
        Some(Number::Float(f)) => Ok(f),
        None => match value {
            XdmAtomicValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            _ => match textual(value) {
                Some(s) => parse_double(s).ok_or_else(|| cast_error(value, target)),
                None => Err(type_error(format!(
                    "xs:{} cannot be converted to xs:{}",
                    value.type_name(),
                    target.local_name()
                ))),
            },
        },
    }
}

/// Parse a lexical QName against in-scope namespaces. An unprefixed name has no
/// namespace.
pub fn parse_qname(lexical: &str, namespaces: &NamespaceBindings) -> Result<QName, Error> {
    let invalid = || {
        Error::from_code(
            ErrorCode::FORG0001,
            format!("'{lexical}' is not a valid lexical QName"),
        )
    };
    let s = lexical.trim();
    let (prefix, local) = match s.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, s),
    };
    if !is_ncname(local) || prefix.is_some_and(|p| !is_ncname(p)) {
        return Err(invalid());
    }
    let ns_uri = match prefix {
        Some(p) => Some(
            namespaces
                .resolve(p)
                .ok_or_else(|| {
                    Error::from_code(
                        ErrorCode::FONS0004,
                        format!("no namespace bound to prefix '{p}'"),
                    )
                })?
                .to_string(),
        ),
        None => None,
    };
    Ok(QName {
        prefix: prefix.map(str::to_string),
        local: local.to_string(),
        ns_uri,
    })
}

fn to_qname(value: XdmAtomicValue, namespaces: &NamespaceBindings) -> Result<QName, Error> {
    match value {
        XdmAtomicValue::QName {
            ns_uri,
            prefix,
            local,
        } => Ok(QName {
            prefix,
            local,
            ns_uri,
        }),
        XdmAtomicValue::String(s) | XdmAtomicValue::UntypedAtomic(s) => parse_qname(&s, namespaces),
        other => Err(type_error(format!(
            "xs:{} cannot be converted to xs:QName",
            other.type_name()
        ))),
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

fn to_datetime(value: &XdmAtomicValue) -> Result<DateTime<FixedOffset>, Error> {
    match value {
        XdmAtomicValue::DateTime(d) => Ok(*d),
        XdmAtomicValue::Date { date, tz } => date
            .and_hms_opt(0, 0, 0)
            .and_then(|dt| dt.and_local_timezone(tz.unwrap_or_else(utc)).single())
            .ok_or_else(|| cast_error(value, AtomicType::DateTime)),
        _ => match textual(value) {
            Some(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .or_else(|| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|n| n.and_utc().fixed_offset())
                })
                .ok_or_else(|| cast_error(value, AtomicType::DateTime)),
            None => Err(type_error(format!(
                "xs:{} cannot be converted to xs:dateTime",
                value.type_name()
            ))),
        },
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let date = s.get(..10)?;
    let rest = s.get(10..)?;
    let tz_ok = rest.is_empty()
        || rest == "Z"
        || (rest.len() == 6 && (rest.starts_with('+') || rest.starts_with('-')));
    if !tz_ok {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn to_date(value: &XdmAtomicValue) -> Result<NaiveDate, Error> {
    match value {
        XdmAtomicValue::Date { date, .. } => Ok(*date),
        XdmAtomicValue::DateTime(d) => Ok(d.date_naive()),
        _ => match textual(value) {
            Some(s) => parse_date(s).ok_or_else(|| cast_error(value, AtomicType::Date)),
            None => Err(type_error(format!(
                "xs:{} cannot be converted to xs:date",
                value.type_name()
            ))),
        },
    }
}

/// Convert an atomic value into the native representation of `target`.
pub fn change_type<N>(
    value: XdmAtomicValue,
    target: AtomicType,
    namespaces: &NamespaceBindings,
) -> Result<NativeValue<N>, Error> {
    match target {
        AtomicType::AnyAtomic => Ok(NativeValue::Item(XdmItem::Atomic(value))),
        AtomicType::String | AtomicType::UntypedAtomic | AtomicType::AnyUri => {
            Ok(NativeValue::String(value.lexical()))
        }
        AtomicType::Boolean => to_bool(&value, target).map(NativeValue::Bool),
        AtomicType::Double | AtomicType::Decimal => to_double(&value, target).map(NativeValue::Double),
        AtomicType::Float => to_double(&value, target).map(|d| NativeValue::Float(d as f32)),
        AtomicType::QName => to_qname(value, namespaces).map(NativeValue::QName),
        AtomicType::DateTime => to_datetime(&value).map(NativeValue::DateTime),
        AtomicType::Date => to_date(&value).map(NativeValue::Date),
        t => {
            let v = to_integer(&value, t)?;
            if t.is_unsigned() {
                u64::try_from(v)
                    .map(NativeValue::UInt)
                    .map_err(|_| cast_error(&value, t))
            } else {
                i64::try_from(v)
                    .map(NativeValue::Int)
                    .map_err(|_| cast_error(&value, t))
            }
        }
    }
}

fn out_of_range(v: i128, target: AtomicType) -> Error {
    Error::from_code(
        ErrorCode::FORG0001,
        format!("value {v} out of range for xs:{}", target.local_name()),
    )
}

/// Build the atomic value of type `target` from its native representation.
pub fn atomic_from_native<N>(
    value: NativeValue<N>,
    target: AtomicType,
) -> Result<XdmAtomicValue, Error> {
    use XdmAtomicValue as A;
    if let Some((lo, hi)) = target.integral_range() {
        let v = value.into_i128()?;
        if v < lo || v > hi {
            return Err(out_of_range(v, target));
        }
        let err = |_| out_of_range(v, target);
        return Ok(match target {
            AtomicType::Integer => A::Integer(i64::try_from(v).map_err(err)?),
            AtomicType::Long => A::Long(i64::try_from(v).map_err(err)?),
            AtomicType::Int => A::Int(i32::try_from(v).map_err(err)?),
            AtomicType::Short => A::Short(i16::try_from(v).map_err(err)?),
            AtomicType::Byte => A::Byte(i8::try_from(v).map_err(err)?),
            AtomicType::UnsignedLong => A::UnsignedLong(u64::try_from(v).map_err(err)?),
            AtomicType::UnsignedInt => A::UnsignedInt(u32::try_from(v).map_err(err)?),
            AtomicType::UnsignedShort => A::UnsignedShort(u16::try_from(v).map_err(err)?),
            _ => A::UnsignedByte(u8::try_from(v).map_err(err)?),
        });
    }
    match (target, value) {
        (AtomicType::AnyAtomic, NativeValue::Item(XdmItem::Atomic(a))) => Ok(a),
        (AtomicType::Boolean, NativeValue::Bool(b)) => Ok(A::Boolean(b)),
        (AtomicType::String, NativeValue::String(s)) => Ok(A::String(s)),
        (AtomicType::UntypedAtomic, NativeValue::String(s)) => Ok(A::UntypedAtomic(s)),
        (AtomicType::AnyUri, NativeValue::String(s)) => Ok(A::AnyUri(s)),
        (AtomicType::Float, NativeValue::Float(f)) => Ok(A::Float(f)),
        (AtomicType::Double, v) => v.into_f64().map(A::Double),
        (AtomicType::Decimal, v) => v.into_f64().map(A::Decimal),
        (AtomicType::QName, NativeValue::QName(q)) => Ok(A::QName {
            ns_uri: q.ns_uri,
            prefix: q.prefix,
            local: q.local,
        }),
        (AtomicType::DateTime, NativeValue::DateTime(d)) => Ok(A::DateTime(d)),
        (AtomicType::Date, NativeValue::Date(date)) => Ok(A::Date { date, tz: None }),
        (t, v) => Err(mismatch(&format!("value for xs:{}", t.local_name()), &v)),
    }
}

fn atomize<N: XdmNode>(item: XdmItem<N>) -> XdmAtomicValue {
    match item {
        XdmItem::Atomic(a) => a,
        XdmItem::Node(n) => XdmAtomicValue::UntypedAtomic(n.string_value()),
    }
}

fn name_matches<N: XdmNode>(node: &N, name: Option<&crate::xdm::ExpandedName>) -> bool {
    match name {
        None => true,
        Some(expected) => node.name().is_some_and(|q| &q.expanded() == expected),
    }
}

/// Whether `node` matches the node test of `ty`.
pub fn node_matches<N: XdmNode>(node: &N, ty: &ItemType) -> bool {
    let kind = node.kind();
    match ty.kind {
        ItemKind::AnyItem | ItemKind::AnyNode => true,
        ItemKind::Atomic => false,
        ItemKind::Element | ItemKind::SchemaElement => {
            kind == NodeKind::Element && name_matches(node, ty.name.as_ref())
        }
        ItemKind::Attribute | ItemKind::SchemaAttribute => {
            kind == NodeKind::Attribute && name_matches(node, ty.name.as_ref())
        }
        ItemKind::Text => kind == NodeKind::Text,
        ItemKind::Comment => kind == NodeKind::Comment,
        ItemKind::ProcessingInstruction => {
            kind == NodeKind::ProcessingInstruction
                && ty.name.as_ref().is_none_or(|t| {
                    node.name().is_some_and(|q| q.local == t.local)
                })
        }
        ItemKind::Document => {
            kind == NodeKind::Document
                && ty.document_element.as_deref().is_none_or(|e| {
                    node.children()
                        .iter()
                        .find(|c| c.kind() == NodeKind::Element)
                        .is_some_and(|c| node_matches(c, e))
                })
        }
    }
}

/// Atomic type an item is coerced to, if `ty` is an atomic type at all.
fn declared_atomic(ty: &ItemType) -> Option<AtomicType> {
    (ty.kind == ItemKind::Atomic).then(|| ty.atomic_type().unwrap_or(AtomicType::AnyAtomic))
}

fn cast_atomic<N>(
    value: XdmAtomicValue,
    target: AtomicType,
    namespaces: &NamespaceBindings,
) -> Result<XdmAtomicValue, Error> {
    if target == AtomicType::AnyAtomic {
        return Ok(value);
    }
    atomic_from_native(change_type::<N>(value, target, namespaces)?, target)
}

/// Materializes one argument for a native call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputTransform {
    pub sequence_type: SequenceType,
    pub native: NativeType,
}

impl InputTransform {
    pub fn new(sequence_type: SequenceType, native: NativeType) -> Self {
        Self {
            sequence_type,
            native,
        }
    }

    fn absent<N>(&self) -> Result<NativeValue<N>, Error> {
        self.native.default_value().ok_or_else(|| {
            type_error(format!(
                "empty sequence not allowed for {}",
                self.sequence_type
            ))
        })
    }

    pub fn apply<N: XdmNode>(
        &self,
        arg: XdmSequence<N>,
        namespaces: &NamespaceBindings,
    ) -> Result<NativeValue<N>, Error> {
        let (item, occurrence) = match &self.sequence_type {
            SequenceType::Empty => {
                if !arg.is_empty() {
                    return Err(type_error("expected empty-sequence()"));
                }
                return self.absent();
            }
            SequenceType::Typed { item, occurrence } => (item, *occurrence),
        };
        let len = arg.len();
        if !occurrence.accepts(len) {
            let expected = match occurrence {
                Occurrence::One => "exactly one item",
                Occurrence::ZeroOrOne => "at most one item",
                _ => "at least one item",
            };
            return Err(type_error(format!(
                "expected {expected} of type {}, got {len}",
                self.sequence_type
            )));
        }
        if occurrence.allows_many() {
            return arg
                .into_iter()
                .map(|i| convert_item(i, item, namespaces))
                .collect::<Result<Vec<_>, _>>()
                .map(NativeValue::Sequence);
        }
        match arg.into_iter().next() {
            Some(i) => convert_item(i, item, namespaces),
            None => self.absent(),
        }
    }
}

fn convert_item<N: XdmNode>(
    item: XdmItem<N>,
    ty: &ItemType,
    namespaces: &NamespaceBindings,
) -> Result<NativeValue<N>, Error> {
    match &ty.native.shape {
        NativeShape::Atomic(target) => change_type(atomize(item), *target, namespaces),
        NativeShape::Node => match item {
            XdmItem::Node(n) if node_matches(&n, ty) => Ok(NativeValue::Node(n)),
            XdmItem::Node(n) => Err(type_error(format!(
                "{:?} node does not match {ty}",
                n.kind()
            ))),
            XdmItem::Atomic(a) => Err(type_error(format!(
                "expected {ty}, got xs:{}",
                a.type_name()
            ))),
        },
        NativeShape::Item => {
            if let Some(target) = declared_atomic(ty) {
                return cast_atomic::<N>(atomize(item), target, namespaces)
                    .map(|a| NativeValue::Item(XdmItem::Atomic(a)));
            }
            if ty.kind.is_node() {
                match &item {
                    XdmItem::Node(n) if !node_matches(n, ty) => {
                        return Err(type_error(format!(
                            "{:?} node does not match {ty}",
                            n.kind()
                        )));
                    }
                    XdmItem::Atomic(a) => {
                        return Err(type_error(format!(
                            "expected {ty}, got xs:{}",
                            a.type_name()
                        )));
                    }
                    XdmItem::Node(_) => {}
                }
            }
            Ok(NativeValue::Item(item))
        }
        other => Err(type_error(format!("no item conversion for native {other:?}"))),
    }
}

/// Converts a native result into the sequence the engine receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTransform {
    pub sequence_type: SequenceType,
    pub native: NativeType,
}

impl OutputTransform {
    pub fn new(sequence_type: SequenceType, native: NativeType) -> Self {
        Self {
            sequence_type,
            native,
        }
    }

    pub fn apply<N: XdmNode>(
        &self,
        value: NativeValue<N>,
        namespaces: &NamespaceBindings,
    ) -> Result<XdmSequence<N>, Error> {
        let mut out = Vec::new();
        self.push(value, namespaces, &mut out)?;
        Ok(out)
    }

    fn push<N: XdmNode>(
        &self,
        value: NativeValue<N>,
        namespaces: &NamespaceBindings,
        out: &mut XdmSequence<N>,
    ) -> Result<(), Error> {
        let item = self.sequence_type.item();
        let unwrap_element = item.is_some_and(|i| i.kind == ItemKind::Element);
        let atomic_item = item.and_then(declared_atomic);
        match value {
            NativeValue::Unit | NativeValue::Null => {}
            NativeValue::Sequence(values) => {
                for v in values {
                    self.push(v, namespaces, out)?;
                }
            }
            NativeValue::Item(i) if atomic_item.is_some() => {
                let target = atomic_item.unwrap_or(AtomicType::AnyAtomic);
                out.push(XdmItem::Atomic(cast_atomic::<N>(atomize(i), target, namespaces)?));
            }
            NativeValue::Node(n) | NativeValue::Item(XdmItem::Node(n)) => {
                if unwrap_element {
                    let e = first_element_descendant_or_self(&n).ok_or_else(|| {
                        type_error("constructed node contains no element")
                    })?;
                    out.push(XdmItem::Node(e));
                } else {
                    out.push(XdmItem::Node(n));
                }
            }
            NativeValue::Item(XdmItem::Atomic(a)) => out.push(XdmItem::Atomic(a)),
            scalar => {
                let native_atomic = item
                    .and_then(|i| i.native.atomic_type())
                    .ok_or_else(|| mismatch("atomic native type", &scalar))?;
                let natural = atomic_from_native(scalar, native_atomic)?;
                let declared = item
                    .and_then(ItemType::atomic_type)
                    .filter(|t| *t != AtomicType::AnyAtomic && *t != native_atomic);
                let value = match declared {
                    Some(t) => atomic_from_native(change_type::<N>(natural, t, namespaces)?, t)?,
                    None => natural,
                };
                out.push(XdmItem::Atomic(value));
            }
        }
        Ok(())
    }
}
