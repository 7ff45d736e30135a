use super::parser::{LexicalItem, LexicalName, LexicalSequenceType, NameTest, SequenceTypeParser};
use super::{ItemKind, ItemType, Occurrence, SequenceType};
use crate::atomic::AtomicType;
use crate::consts::XS;
use crate::error::SequenceTypeError;
use crate::namespaces::NamespaceBindings;
use crate::native::{NativeShape, NativeType};
use crate::xdm::ExpandedName;

pub(super) fn infer(
    native: &NativeType,
    lexical: Option<&str>,
    namespaces: &NamespaceBindings,
) -> Result<SequenceType, SequenceTypeError> {
    let element = element_type(native)?;
    match lexical {
        None => Ok(from_native(native, element)),
        Some(text) => {
            let parsed = SequenceTypeParser::parse_lexical(text)?;
            from_lexical(native, element, parsed, namespaces, text)
        }
    }
}

/// The item-level native type; cardinality may be expressed by one wrapper only.
fn element_type(native: &NativeType) -> Result<&NativeType, SequenceTypeError> {
    let nested = |what| SequenceTypeError::Nested {
        what,
        native: native.name,
    };
    match &native.shape {
        NativeShape::Array(inner) => match &inner.shape {
            NativeShape::Nullable(_) => Err(SequenceTypeError::NullableInSequence {
                native: native.name,
            }),
            NativeShape::Array(_) => Err(nested("arrays")),
            NativeShape::Void => Err(nested("unit values")),
            _ => Ok(inner),
        },
        NativeShape::Nullable(inner) => match &inner.shape {
            NativeShape::Nullable(_) => Err(nested("options")),
            NativeShape::Array(_) => Err(nested("optional arrays")),
            NativeShape::Void => Err(nested("unit values")),
            _ => Ok(inner),
        },
        _ => Ok(native),
    }
}

fn item_of(element: &NativeType) -> ItemType {
    match element.shape {
        NativeShape::Atomic(a) => ItemType::atomic(a, element.clone()),
        NativeShape::Node => ItemType::new(ItemKind::AnyNode, element.clone()),
        _ => ItemType::new(ItemKind::AnyItem, element.clone()),
    }
}

fn from_native(native: &NativeType, element: &NativeType) -> SequenceType {
    if native.is_void() {
        return SequenceType::Empty;
    }
    let occurrence = match native.shape {
        NativeShape::Array(_) => Occurrence::ZeroOrMore,
        NativeShape::Nullable(_) => Occurrence::ZeroOrOne,
        _ if native.value_type => Occurrence::One,
        _ => Occurrence::ZeroOrOne,
    };
    SequenceType::typed(item_of(element), occurrence)
}

fn has_default(native: &NativeType) -> bool {
    native.default_value::<()>().is_some()
}

fn from_lexical(
    native: &NativeType,
    element: &NativeType,
    parsed: LexicalSequenceType,
    namespaces: &NamespaceBindings,
    text: &str,
) -> Result<SequenceType, SequenceTypeError> {
    let incompatible = |reason| SequenceTypeError::Incompatible {
        declared: text.to_string(),
        native: native.name,
        reason,
    };
    let (item, occurrence) = match parsed {
        LexicalSequenceType::Empty => {
            return if native.is_void() || has_default(native) {
                Ok(SequenceType::Empty)
            } else {
                Err(incompatible("the native type has no value for an empty sequence"))
            };
        }
        LexicalSequenceType::Typed(item, occurrence) => (item, occurrence),
    };
    let item = resolve_item(&item, element, namespaces, text)?;

    if native.is_void() {
        if !occurrence.allows_empty() {
            return Err(incompatible("a unit result is always empty"));
        }
        return Ok(SequenceType::typed(item, occurrence));
    }

    match element.shape {
        NativeShape::Atomic(_) if item.kind.is_node() => {
            return Err(incompatible("node tests need a node native type"));
        }
        NativeShape::Node if item.kind == ItemKind::Atomic => {
            return Err(incompatible("atomic types need an atomic native type"));
        }
        _ => {}
    }

    let is_array = matches!(native.shape, NativeShape::Array(_));
    if occurrence.allows_many() && !is_array {
        return Err(incompatible("'+' and '*' need a Vec native type"));
    }
    if !occurrence.allows_many() && is_array {
        return Err(incompatible("a Vec native type needs '+' or '*'"));
    }
    if occurrence == Occurrence::ZeroOrOne && !has_default(native) {
        return Err(incompatible("'?' needs an Option native type"));
    }
    Ok(SequenceType::typed(item, occurrence))
}

fn resolve_name(
    name: &LexicalName,
    default_ns: Option<&str>,
    namespaces: &NamespaceBindings,
    text: &str,
) -> Result<ExpandedName, SequenceTypeError> {
    let ns_uri = match &name.prefix {
        Some(p) => Some(
            namespaces
                .resolve(p)
                .ok_or_else(|| SequenceTypeError::UnboundPrefix {
                    prefix: p.clone(),
                    lexical: text.to_string(),
                })?
                .to_string(),
        ),
        None => default_ns.map(str::to_string),
    };
    Ok(ExpandedName::new(ns_uri, name.local.clone()))
}

fn resolve_name_test(
    test: Option<&NameTest>,
    namespaces: &NamespaceBindings,
    text: &str,
) -> Result<Option<ExpandedName>, SequenceTypeError> {
    match test {
        None | Some(NameTest::Wildcard) => Ok(None),
        Some(NameTest::Name(n)) => resolve_name(n, None, namespaces, text).map(Some),
    }
}

fn resolve_type_name(
    ty: Option<&LexicalName>,
    namespaces: &NamespaceBindings,
    text: &str,
) -> Result<Option<ExpandedName>, SequenceTypeError> {
    ty.map(|t| resolve_name(t, Some(XS), namespaces, text))
        .transpose()
}

fn resolve_item(
    item: &LexicalItem,
    element: &NativeType,
    namespaces: &NamespaceBindings,
    text: &str,
) -> Result<ItemType, SequenceTypeError> {
    let native = element.clone();
    Ok(match item {
        LexicalItem::AnyItem => ItemType::new(ItemKind::AnyItem, native),
        LexicalItem::AnyNode => ItemType::new(ItemKind::AnyNode, native),
        LexicalItem::Text => ItemType::new(ItemKind::Text, native),
        LexicalItem::Comment => ItemType::new(ItemKind::Comment, native),
        LexicalItem::Atomic(name) => {
            // Unprefixed atomic type names are taken from the xs namespace.
            let expanded = resolve_name(name, Some(XS), namespaces, text)?;
            let atomic = AtomicType::from_name(&expanded).ok_or_else(|| {
                SequenceTypeError::UnknownAtomicType {
                    name: expanded.to_string(),
                }
            })?;
            ItemType::atomic(atomic, native)
        }
        LexicalItem::ProcessingInstruction(target) => ItemType {
            name: target.as_ref().map(|t| ExpandedName::new(None, t.clone())),
            ..ItemType::new(ItemKind::ProcessingInstruction, native)
        },
        LexicalItem::Element { name, ty, nillable } => ItemType {
            name: resolve_name_test(name.as_ref(), namespaces, text)?,
            schema_type: resolve_type_name(ty.as_ref(), namespaces, text)?,
            nillable: *nillable,
            ..ItemType::new(ItemKind::Element, native)
        },
        LexicalItem::Attribute { name, ty } => ItemType {
            name: resolve_name_test(name.as_ref(), namespaces, text)?,
            schema_type: resolve_type_name(ty.as_ref(), namespaces, text)?,
            ..ItemType::new(ItemKind::Attribute, native)
        },
        LexicalItem::SchemaElement(name) => ItemType {
            name: Some(resolve_name(name, None, namespaces, text)?),
            ..ItemType::new(ItemKind::SchemaElement, native)
        },
        LexicalItem::SchemaAttribute(name) => ItemType {
            name: Some(resolve_name(name, None, namespaces, text)?),
            ..ItemType::new(ItemKind::SchemaAttribute, native)
        },
        LexicalItem::Document(inner) => ItemType {
            document_element: inner
                .as_deref()
                .map(|e| resolve_item(e, element, namespaces, text).map(Box::new))
                .transpose()?,
            ..ItemType::new(ItemKind::Document, native)
        },
    })
}
