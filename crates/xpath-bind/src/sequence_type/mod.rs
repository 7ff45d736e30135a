//! Sequence types of bound parameters and results.
//!
//! A [`SequenceType`] is inferred once per signature slot, either from a lexical
//! declaration such as `element(item)*` or from the native Rust type alone.
use core::fmt;

use crate::atomic::AtomicType;
use crate::error::SequenceTypeError;
use crate::namespaces::NamespaceBindings;
use crate::native::NativeType;
use crate::xdm::ExpandedName;

mod infer;
pub mod parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    One,
    ZeroOrOne,
    OneOrMore,
    ZeroOrMore,
}

impl Occurrence {
    pub fn allows_empty(self) -> bool {
        matches!(self, Occurrence::ZeroOrOne | Occurrence::ZeroOrMore)
    }

    pub fn allows_many(self) -> bool {
        matches!(self, Occurrence::OneOrMore | Occurrence::ZeroOrMore)
    }

    pub fn indicator(self) -> &'static str {
        match self {
            Occurrence::One => "",
            Occurrence::ZeroOrOne => "?",
            Occurrence::OneOrMore => "+",
            Occurrence::ZeroOrMore => "*",
        }
    }

    /// Whether a sequence of `len` items satisfies this occurrence.
    pub fn accepts(self, len: usize) -> bool {
        match self {
            Occurrence::One => len == 1,
            Occurrence::ZeroOrOne => len <= 1,
            Occurrence::OneOrMore => len >= 1,
            Occurrence::ZeroOrMore => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    AnyItem,
    Atomic,
    AnyNode,
    Attribute,
    Element,
    Comment,
    Document,
    ProcessingInstruction,
    Text,
    SchemaAttribute,
    SchemaElement,
}

impl ItemKind {
    pub fn is_node(self) -> bool {
        !matches!(self, ItemKind::AnyItem | ItemKind::Atomic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemType {
    pub kind: ItemKind,
    /// Native type of a single item (the element type of arrays and nullables).
    pub native: NativeType,
    /// Atomic type name, or the name tested by an element/attribute/PI/schema test.
    pub name: Option<ExpandedName>,
    pub schema_type: Option<ExpandedName>,
    pub nillable: bool,
    /// Element test nested in `document-node(...)`.
    pub document_element: Option<Box<ItemType>>,
}

impl ItemType {
    pub fn new(kind: ItemKind, native: NativeType) -> Self {
        Self {
            kind,
            native,
            name: None,
            schema_type: None,
            nillable: false,
            document_element: None,
        }
    }

    pub fn atomic(atomic: AtomicType, native: NativeType) -> Self {
        Self {
            name: Some(atomic.name()),
            ..Self::new(ItemKind::Atomic, native)
        }
    }

    /// Declared atomic type, if this is an atomic item type.
    pub fn atomic_type(&self) -> Option<AtomicType> {
        if self.kind != ItemKind::Atomic {
            return None;
        }
        self.name.as_ref().and_then(AtomicType::from_name)
    }
}

fn write_name_test(f: &mut fmt::Formatter<'_>, it: &ItemType) -> fmt::Result {
    match (&it.name, &it.schema_type) {
        (None, None) => Ok(()),
        (name, ty) => {
            match name {
                Some(n) => write!(f, "{n}")?,
                None => f.write_str("*")?,
            }
            if let Some(t) = ty {
                write!(f, ", {t}")?;
                if it.nillable {
                    f.write_str("?")?;
                }
            }
            Ok(())
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ItemKind::AnyItem => f.write_str("item()"),
            ItemKind::AnyNode => f.write_str("node()"),
            ItemKind::Text => f.write_str("text()"),
            ItemKind::Comment => f.write_str("comment()"),
            ItemKind::Atomic => match &self.name {
                Some(n) => write!(f, "{n}"),
                None => f.write_str("xs:anyAtomicType"),
            },
            ItemKind::ProcessingInstruction => match &self.name {
                Some(n) => write!(f, "processing-instruction({})", n.local),
                None => f.write_str("processing-instruction()"),
            },
            ItemKind::Document => match &self.document_element {
                Some(e) => write!(f, "document-node({e})"),
                None => f.write_str("document-node()"),
            },
            ItemKind::Element => {
                f.write_str("element(")?;
                write_name_test(f, self)?;
                f.write_str(")")
            }
            ItemKind::Attribute => {
                f.write_str("attribute(")?;
                write_name_test(f, self)?;
                f.write_str(")")
            }
            ItemKind::SchemaElement | ItemKind::SchemaAttribute => {
                let kw = if self.kind == ItemKind::SchemaElement {
                    "schema-element"
                } else {
                    "schema-attribute"
                };
                match &self.name {
                    Some(n) => write!(f, "{kw}({n})"),
                    None => write!(f, "{kw}()"),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SequenceType {
    Empty,
    Typed {
        item: ItemType,
        occurrence: Occurrence,
    },
}

impl SequenceType {
    /// Infer the sequence type of a signature slot.
    ///
    /// With a lexical declaration the declared type wins, provided it is compatible
    /// with `native`. Without one the type is derived from `native` alone.
    pub fn infer(
        native: &NativeType,
        lexical: Option<&str>,
        namespaces: &NamespaceBindings,
    ) -> Result<SequenceType, SequenceTypeError> {
        infer::infer(native, lexical, namespaces)
    }

    pub fn typed(item: ItemType, occurrence: Occurrence) -> Self {
        SequenceType::Typed { item, occurrence }
    }

    /// `item()?`, reported for overloads that return nothing.
    pub fn optional_item(native: NativeType) -> Self {
        Self::typed(ItemType::new(ItemKind::AnyItem, native), Occurrence::ZeroOrOne)
    }

    pub fn item(&self) -> Option<&ItemType> {
        match self {
            SequenceType::Empty => None,
            SequenceType::Typed { item, .. } => Some(item),
        }
    }

    pub fn occurrence(&self) -> Option<Occurrence> {
        match self {
            SequenceType::Empty => None,
            SequenceType::Typed { occurrence, .. } => Some(*occurrence),
        }
    }

    pub fn is_empty_sequence(&self) -> bool {
        matches!(self, SequenceType::Empty)
    }

    /// Whether a sequence of `len` items satisfies the cardinality of this type.
    pub fn accepts_len(&self, len: usize) -> bool {
        match self {
            SequenceType::Empty => len == 0,
            SequenceType::Typed { occurrence, .. } => occurrence.accepts(len),
        }
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceType::Empty => f.write_str("empty-sequence()"),
            SequenceType::Typed { item, occurrence } => {
                write!(f, "{item}{}", occurrence.indicator())
            }
        }
    }
}
