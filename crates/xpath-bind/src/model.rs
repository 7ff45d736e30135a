use crate::xdm::ExpandedName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
            ns_uri: None,
        }
    }

    pub fn expanded(&self) -> ExpandedName {
        ExpandedName::new(self.ns_uri.clone(), self.local.clone())
    }
}

/// Navigation surface of the engine's node model that bindings rely on.
///
/// Only what the input/output transforms need is required here: node kind and name
/// for kind tests, string value for atomization and parent/child access for the
/// element unwrapping of constructed documents.
pub trait XdmNode: Clone + Eq + core::fmt::Debug + Send + Sync + 'static {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> Option<QName>;
    fn string_value(&self) -> String;
    fn parent(&self) -> Option<Self>;
    fn children(&self) -> Vec<Self>;
    fn attributes(&self) -> Vec<Self>;

    /// Root of the tree containing this node.
    fn root(&self) -> Self {
        let mut cur = self.clone();
        while let Some(p) = cur.parent() {
            cur = p;
        }
        cur
    }
}

/// First element on the descendant-or-self axis, in document order.
pub fn first_element_descendant_or_self<N: XdmNode>(node: &N) -> Option<N> {
    if node.kind() == NodeKind::Element {
        return Some(node.clone());
    }
    let mut stack: Vec<N> = node.children();
    stack.reverse();
    while let Some(n) = stack.pop() {
        if n.kind() == NodeKind::Element {
            return Some(n);
        }
        let mut kids = n.children();
        kids.reverse();
        stack.extend(kids);
    }
    None
}

/// Whether `s` is a non-colonized XML name.
pub fn is_ncname(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
