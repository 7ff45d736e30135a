use pest::Parser;
use pest::iterators::Pair;

use super::Occurrence;
use crate::error::SequenceTypeError;

#[derive(pest_derive::Parser)]
#[grammar = "sequence_type.pest"]
pub struct SequenceTypeParser;

/// Unresolved lexical QName.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalName {
    pub prefix: Option<String>,
    pub local: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameTest {
    Wildcard,
    Name(LexicalName),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexicalItem {
    AnyItem,
    AnyNode,
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
    Document(Option<Box<LexicalItem>>),
    Element {
        name: Option<NameTest>,
        ty: Option<LexicalName>,
        nillable: bool,
    },
    Attribute {
        name: Option<NameTest>,
        ty: Option<LexicalName>,
    },
    SchemaElement(LexicalName),
    SchemaAttribute(LexicalName),
    Atomic(LexicalName),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexicalSequenceType {
    Empty,
    Typed(LexicalItem, Occurrence),
}

fn syntax(lexical: &str, message: impl Into<String>) -> SequenceTypeError {
    SequenceTypeError::Syntax {
        lexical: lexical.to_string(),
        message: message.into(),
    }
}

impl SequenceTypeParser {
    pub fn parse_lexical(input: &str) -> Result<LexicalSequenceType, SequenceTypeError> {
        let mut pairs = Self::parse(Rule::sequence_type, input).map_err(|e| {
            syntax(input, e.variant.message().into_owned())
        })?;
        let root = pairs
            .next()
            .ok_or_else(|| syntax(input, "empty parse"))?;
        let first = root
            .into_inner()
            .find(|p| p.as_rule() != Rule::EOI)
            .ok_or_else(|| syntax(input, "missing sequence type"))?;
        match first.as_rule() {
            Rule::empty_sequence => Ok(LexicalSequenceType::Empty),
            Rule::typed_sequence => {
                let mut inner = first.into_inner();
                let item = inner
                    .next()
                    .ok_or_else(|| syntax(input, "missing item type"))?;
                let occurrence = match inner.next().map(|p| p.as_str()) {
                    None => Occurrence::One,
                    Some("?") => Occurrence::ZeroOrOne,
                    Some("*") => Occurrence::ZeroOrMore,
                    Some("+") => Occurrence::OneOrMore,
                    Some(other) => return Err(syntax(input, format!("bad occurrence '{other}'"))),
                };
                Ok(LexicalSequenceType::Typed(
                    build_item_type(input, item)?,
                    occurrence,
                ))
            }
            other => Err(syntax(input, format!("unexpected {other:?}"))),
        }
    }
}

fn first_inner<'i>(input: &str, pair: Pair<'i, Rule>) -> Result<Pair<'i, Rule>, SequenceTypeError> {
    let rule = pair.as_rule();
    pair.into_inner()
        .next()
        .ok_or_else(|| syntax(input, format!("incomplete {rule:?}")))
}

fn build_item_type(input: &str, pair: Pair<'_, Rule>) -> Result<LexicalItem, SequenceTypeError> {
    debug_assert_eq!(pair.as_rule(), Rule::item_type);
    let inner = first_inner(input, pair)?;
    match inner.as_rule() {
        Rule::any_item => Ok(LexicalItem::AnyItem),
        Rule::atomic_type => Ok(LexicalItem::Atomic(build_qname(input, first_inner(input, inner)?)?)),
        Rule::kind_test => build_kind_test(input, first_inner(input, inner)?),
        other => Err(syntax(input, format!("unexpected {other:?}"))),
    }
}

fn build_kind_test(input: &str, kind: Pair<'_, Rule>) -> Result<LexicalItem, SequenceTypeError> {
    match kind.as_rule() {
        Rule::any_kind_test => Ok(LexicalItem::AnyNode),
        Rule::text_test => Ok(LexicalItem::Text),
        Rule::comment_test => Ok(LexicalItem::Comment),
        Rule::pi_test => {
            let target = match kind.into_inner().next() {
                None => None,
                Some(p) if p.as_rule() == Rule::pi_name => Some(p.as_str().to_string()),
                Some(p) => Some(
                    p.into_inner()
                        .next()
                        .map(|s| s.as_str().trim().to_string())
                        .unwrap_or_default(),
                ),
            };
            Ok(LexicalItem::ProcessingInstruction(target))
        }
        Rule::document_test => match kind.into_inner().next() {
            None => Ok(LexicalItem::Document(None)),
            Some(p) => Ok(LexicalItem::Document(Some(Box::new(build_kind_test(input, p)?)))),
        },
        Rule::element_test => {
            let mut name = None;
            let mut ty = None;
            let mut nillable = false;
            for p in kind.into_inner() {
                match p.as_rule() {
                    Rule::name_or_wildcard => name = Some(build_name_test(input, p)?),
                    Rule::type_name => ty = Some(build_qname(input, first_inner(input, p)?)?),
                    Rule::nillable => nillable = true,
                    _ => {}
                }
            }
            Ok(LexicalItem::Element { name, ty, nillable })
        }
        Rule::attribute_test => {
            let mut name = None;
            let mut ty = None;
            for p in kind.into_inner() {
                match p.as_rule() {
                    Rule::name_or_wildcard => name = Some(build_name_test(input, p)?),
                    Rule::type_name => ty = Some(build_qname(input, first_inner(input, p)?)?),
                    _ => {}
                }
            }
            Ok(LexicalItem::Attribute { name, ty })
        }
        Rule::schema_element_test => Ok(LexicalItem::SchemaElement(build_qname(
            input,
            first_inner(input, kind)?,
        )?)),
        Rule::schema_attribute_test => Ok(LexicalItem::SchemaAttribute(build_qname(
            input,
            first_inner(input, kind)?,
        )?)),
        other => Err(syntax(input, format!("unexpected {other:?}"))),
    }
}

fn build_name_test(input: &str, pair: Pair<'_, Rule>) -> Result<NameTest, SequenceTypeError> {
    let inner = first_inner(input, pair)?;
    match inner.as_rule() {
        Rule::wildcard => Ok(NameTest::Wildcard),
        _ => Ok(NameTest::Name(build_qname(input, inner)?)),
    }
}

fn build_qname(input: &str, pair: Pair<'_, Rule>) -> Result<LexicalName, SequenceTypeError> {
    debug_assert_eq!(pair.as_rule(), Rule::qname);
    let mut prefix = None;
    let mut local = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::prefix => prefix = Some(p.as_str().to_string()),
            Rule::local_part => local = Some(p.as_str().to_string()),
            _ => {}
        }
    }
    let local = local.ok_or_else(|| syntax(input, "missing local name"))?;
    Ok(LexicalName { prefix, local })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> LexicalSequenceType {
        SequenceTypeParser::parse_lexical(s).unwrap()
    }

    fn name(prefix: Option<&str>, local: &str) -> LexicalName {
        LexicalName {
            prefix: prefix.map(str::to_string),
            local: local.to_string(),
        }
    }

    #[test]
    fn atomic_with_occurrence() {
        assert_eq!(
            parse("xs:double+"),
            LexicalSequenceType::Typed(
                LexicalItem::Atomic(name(Some("xs"), "double")),
                Occurrence::OneOrMore
            )
        );
    }

    #[test]
    fn element_with_type_and_nillable() {
        assert_eq!(
            parse("element(item, xs:string?)*"),
            LexicalSequenceType::Typed(
                LexicalItem::Element {
                    name: Some(NameTest::Name(name(None, "item"))),
                    ty: Some(name(Some("xs"), "string")),
                    nillable: true,
                },
                Occurrence::ZeroOrMore
            )
        );
    }

    #[test]
    fn document_with_schema_element() {
        assert_eq!(
            parse("document-node( schema-element(p:order) )"),
            LexicalSequenceType::Typed(
                LexicalItem::Document(Some(Box::new(LexicalItem::SchemaElement(name(
                    Some("p"),
                    "order"
                ))))),
                Occurrence::One
            )
        );
    }

    #[test]
    fn processing_instruction_literal_target() {
        assert_eq!(
            parse("processing-instruction('xml-stylesheet')?"),
            LexicalSequenceType::Typed(
                LexicalItem::ProcessingInstruction(Some("xml-stylesheet".into())),
                Occurrence::ZeroOrOne
            )
        );
    }

    #[test]
    fn empty_sequence_takes_no_occurrence() {
        assert_eq!(parse("empty-sequence()"), LexicalSequenceType::Empty);
        assert!(SequenceTypeParser::parse_lexical("empty-sequence()?").is_err());
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "element(", "xs:", "item()**", "node(a)", "1abc"] {
            let err = SequenceTypeParser::parse_lexical(bad).unwrap_err();
            assert!(matches!(err, SequenceTypeError::Syntax { .. }), "{bad}");
        }
    }
}
