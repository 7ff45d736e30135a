/// XML Schema namespace (`xs:` prefix).
pub const XS: &str = "http://www.w3.org/2001/XMLSchema";
/// Default function namespace of XPath 2.0 (`fn:` prefix).
pub const FNS: &str = "http://www.w3.org/2005/xpath-functions";
/// The implicit `xml` namespace.
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";
/// Namespace of the W3C error codes (`err:` prefix).
pub const ERR_NS: &str = "http://www.w3.org/2005/xqt-errors";

/// Prefix of the namespace synthesized for modules that do not declare one.
pub const DEFAULT_MODULE_NS_PREFIX: &str = "urn:platynui:ext:";

/// Environment variable that enables writing dispatch plans to a directory.
pub const DUMP_DIR_ENV: &str = "PLATYNUI_XPATH_BIND_DUMP_DIR";
