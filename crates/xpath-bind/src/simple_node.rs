//! Minimal in-memory tree implementing [`XdmNode`], used by tests, demos and as the
//! node model behind [`SimpleItemFactory`].
//!
//! ```
//! use platynui_xpath_bind::simple_node::{doc, elem, text, attr};
//! use platynui_xpath_bind::XdmNode;
//!
//! let d = doc().child(elem("root").attr(attr("id", "r")).child(text("Hi"))).build();
//! assert_eq!(d.children()[0].name().unwrap().local, "root");
//! assert_eq!(d.string_value(), "Hi");
//! ```
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use crate::dependency::ItemFactory;
use crate::error::Error;
use crate::model::{NodeKind, QName, XdmNode};

struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    parent: RwLock<Weak<Inner>>,
    attributes: RwLock<Vec<SimpleNode>>,
    children: RwLock<Vec<SimpleNode>>,
}

/// Arc-backed node; equality is identity.
#[derive(Clone)]
pub struct SimpleNode(Arc<Inner>);

impl PartialEq for SimpleNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SimpleNode {}

impl fmt::Debug for SimpleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &self.0.value)
            .finish()
    }
}

impl SimpleNode {
    fn leaf(kind: NodeKind, name: Option<QName>, value: Option<String>) -> Self {
        SimpleNode(Arc::new(Inner {
            kind,
            name,
            value,
            parent: RwLock::new(Weak::new()),
            attributes: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
        }))
    }

    fn adopt(&self, child: &SimpleNode) {
        if let Ok(mut p) = child.0.parent.write() {
            *p = Arc::downgrade(&self.0);
        }
    }
}

pub struct SimpleNodeBuilder {
    node: SimpleNode,
    attributes: Vec<SimpleNode>,
    children: Vec<SimpleNode>,
}

impl SimpleNodeBuilder {
    fn new(kind: NodeKind, name: Option<QName>) -> Self {
        Self {
            node: SimpleNode::leaf(kind, name, None),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(mut self, attribute: SimpleNode) -> Self {
        debug_assert_eq!(attribute.kind(), NodeKind::Attribute);
        self.attributes.push(attribute);
        self
    }

    pub fn child(mut self, child: impl Into<NodeOrBuilder>) -> Self {
        let node = match child.into() {
            NodeOrBuilder::Node(n) => n,
            NodeOrBuilder::Builder(b) => b.build(),
        };
        self.children.push(node);
        self
    }

    pub fn build(self) -> SimpleNode {
        for a in &self.attributes {
            self.node.adopt(a);
        }
        for c in &self.children {
            self.node.adopt(c);
        }
        if let Ok(mut attrs) = self.node.0.attributes.write() {
            attrs.extend(self.attributes);
        }
        if let Ok(mut kids) = self.node.0.children.write() {
            kids.extend(self.children);
        }
        self.node
    }
}

pub enum NodeOrBuilder {
    Node(SimpleNode),
    Builder(SimpleNodeBuilder),
}

impl From<SimpleNode> for NodeOrBuilder {
    fn from(n: SimpleNode) -> Self {
        NodeOrBuilder::Node(n)
    }
}

impl From<SimpleNodeBuilder> for NodeOrBuilder {
    fn from(b: SimpleNodeBuilder) -> Self {
        NodeOrBuilder::Builder(b)
    }
}

pub fn doc() -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Document, None)
}

pub fn elem(name: &str) -> SimpleNodeBuilder {
    SimpleNodeBuilder::new(NodeKind::Element, Some(QName::local(name)))
}

pub fn elem_ns(ns_uri: &str, name: &str) -> SimpleNodeBuilder {
    let qn = QName {
        prefix: None,
        local: name.to_string(),
        ns_uri: Some(ns_uri.to_string()),
    };
    SimpleNodeBuilder::new(NodeKind::Element, Some(qn))
}

pub fn attr(name: &str, value: &str) -> SimpleNode {
    SimpleNode::leaf(
        NodeKind::Attribute,
        Some(QName::local(name)),
        Some(value.to_string()),
    )
}

pub fn text(value: &str) -> SimpleNode {
    SimpleNode::leaf(NodeKind::Text, None, Some(value.to_string()))
}

pub fn comment(value: &str) -> SimpleNode {
    SimpleNode::leaf(NodeKind::Comment, None, Some(value.to_string()))
}

impl XdmNode for SimpleNode {
    fn kind(&self) -> NodeKind {
        self.0.kind
    }

    fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }

    fn string_value(&self) -> String {
        match self.0.kind {
            NodeKind::Element | NodeKind::Document => {
                fn collect(n: &SimpleNode, out: &mut String) {
                    for c in n.children() {
                        match c.kind() {
                            NodeKind::Text => out.push_str(c.0.value.as_deref().unwrap_or("")),
                            NodeKind::Element => collect(&c, out),
                            _ => {}
                        }
                    }
                }
                let mut out = String::new();
                collect(self, &mut out);
                out
            }
            _ => self.0.value.clone().unwrap_or_default(),
        }
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent.read().ok()?.upgrade().map(SimpleNode)
    }

    fn children(&self) -> Vec<Self> {
        self.0.children.read().map(|v| v.clone()).unwrap_or_default()
    }

    fn attributes(&self) -> Vec<Self> {
        self.0.attributes.read().map(|v| v.clone()).unwrap_or_default()
    }
}

/// Item factory producing [`SimpleNode`] trees.
///
/// Like the builders of real engines, constructed elements are returned wrapped in a
/// document node.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleItemFactory;

impl ItemFactory<SimpleNode> for SimpleItemFactory {
    fn element(
        &self,
        name: &QName,
        attributes: &[(QName, String)],
        content: Option<&str>,
    ) -> Result<SimpleNode, Error> {
        let mut b = SimpleNodeBuilder::new(NodeKind::Element, Some(name.clone()));
        for (n, v) in attributes {
            b = b.attr(SimpleNode::leaf(
                NodeKind::Attribute,
                Some(n.clone()),
                Some(v.clone()),
            ));
        }
        if let Some(t) = content {
            b = b.child(text(t));
        }
        Ok(doc().child(b).build())
    }
}
