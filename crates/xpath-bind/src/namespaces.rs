use std::collections::HashMap;

use crate::consts::{FNS, XML_URI, XS};

/// Prefix to namespace URI table used to resolve lexical QNames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceBindings {
    pub by_prefix: HashMap<String, String>,
}

impl NamespaceBindings {
    /// Bindings with the implicit `xs`, `fn` and `xml` prefixes.
    pub fn with_builtins() -> Self {
        let mut ns = Self::default();
        ns.bind("xs", XS);
        ns.bind("fn", FNS);
        ns.bind("xml", XML_URI);
        ns
    }

    pub fn bind(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.by_prefix.insert(prefix.into(), uri.into());
    }

    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.by_prefix.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_prefix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_prefix.is_empty()
    }
}
