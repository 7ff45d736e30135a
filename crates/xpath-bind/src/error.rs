use crate::consts::ERR_NS;
use crate::xdm::ExpandedName;
use core::fmt;
use std::sync::Arc;

/// Error codes emitted by bound extension functions at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOER0000, // generic error raised by a native function
    FORG0001, // invalid lexical form / conversion failure
    FORG0004, // one-or-more / zero-or-one violated
    FORG0005, // exactly-one violated
    FOCA0002, // invalid lexical value (NaN/INF to integer)
    FONS0004, // no namespace found for prefix
    XPTY0004, // type error
    XPST0017, // unknown function or wrong arity
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::FORG0001 => "FORG0001",
            ErrorCode::FORG0004 => "FORG0004",
            ErrorCode::FORG0005 => "FORG0005",
            ErrorCode::FOCA0002 => "FOCA0002",
            ErrorCode::FONS0004 => "FONS0004",
            ErrorCode::XPTY0004 => "XPTY0004",
            ErrorCode::XPST0017 => "XPST0017",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// The QName of this code in the `err:` namespace.
    pub fn qname(&self) -> ExpandedName {
        ExpandedName::ns(ERR_NS, self.as_str())
    }

    pub fn from_local(local: &str) -> Self {
        use ErrorCode::*;
        match local {
            "FOER0000" => FOER0000,
            "FORG0001" => FORG0001,
            "FORG0004" => FORG0004,
            "FORG0005" => FORG0005,
            "FOCA0002" => FOCA0002,
            "FONS0004" => FONS0004,
            "XPTY0004" => XPTY0004,
            "XPST0017" => XPST0017,
            _ => Unknown,
        }
    }
}

/// Dynamic error surfaced to the query engine.
#[derive(Debug, Clone, thiserror::Error)]
pub struct Error {
    pub code: ExpandedName,
    pub message: String,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn new_qname(code: ExpandedName, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            source: None,
        }
    }

    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::new_qname(code.qname(), msg)
    }

    pub fn code_enum(&self) -> ErrorCode {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            ErrorCode::from_local(&self.code.local)
        } else {
            ErrorCode::Unknown
        }
    }

    pub fn format_code(&self) -> String {
        if self.code.ns_uri.as_deref() == Some(ERR_NS) {
            format!("err:{}", self.code.local)
        } else if let Some(ns) = &self.code.ns_uri {
            format!("Q{{{}}}{}", ns, self.code.local)
        } else {
            self.code.local.clone()
        }
    }

    pub fn with_source(
        mut self,
        source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>,
    ) -> Self {
        self.source = source.into();
        self
    }

    /// Prefix the message with call-site context, keeping code and source.
    pub fn in_context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error: {} ({})", self.message, self.format_code())
    }
}

/// Failure while turning a lexical or native type into a [`crate::SequenceType`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceTypeError {
    #[error("invalid sequence type '{lexical}': {message}")]
    Syntax { lexical: String, message: String },
    #[error("namespace prefix '{prefix}' is not bound (in '{lexical}')")]
    UnboundPrefix { prefix: String, lexical: String },
    #[error("unknown atomic type '{name}'")]
    UnknownAtomicType { name: String },
    #[error("nullable element type inside a sequence in native type {native}; declare the cardinality once")]
    NullableInSequence { native: &'static str },
    #[error("nested {what} in native type {native} cannot be represented as an XDM sequence")]
    Nested { what: &'static str, native: &'static str },
    #[error("sequence type '{declared}' is incompatible with native type {native}: {reason}")]
    Incompatible {
        declared: String,
        native: &'static str,
        reason: &'static str,
    },
}

/// Where in a signature a sequence type was being inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSlot {
    Return,
    Parameter(usize),
}

impl fmt::Display for TypeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSlot::Return => f.write_str("return type"),
            TypeSlot::Parameter(i) => write!(f, "parameter {}", i + 1),
        }
    }
}

/// Registration-time failure. None of these are recoverable for the module involved.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BindError {
    #[error("function '{function}' in module '{module}' has more than one overload with {arity} parameters; same arity not allowed")]
    AmbiguousOverload {
        module: String,
        function: String,
        arity: usize,
    },
    #[error("'{name}' in module '{module}' is not a valid function name")]
    InvalidName { module: String, name: String },
    #[error("module '{module}' declares invalid namespace '{namespace}': {reason}")]
    InvalidNamespace {
        module: String,
        namespace: String,
        reason: String,
    },
    #[error("function '{function}' in module '{module}': {message}")]
    Signature {
        module: String,
        function: String,
        message: String,
    },
    #[error("function '{function}' in module '{module}', {slot}: {source}")]
    TypeInference {
        module: String,
        function: String,
        slot: TypeSlot,
        #[source]
        source: SequenceTypeError,
    },
    #[error("binding batch failed for function '{function}' in module '{module}': {diagnostic}")]
    Compilation {
        module: String,
        function: String,
        diagnostic: String,
        dump: Option<String>,
    },
}

impl BindError {
    pub fn module(&self) -> &str {
        match self {
            BindError::AmbiguousOverload { module, .. }
            | BindError::InvalidName { module, .. }
            | BindError::InvalidNamespace { module, .. }
            | BindError::Signature { module, .. }
            | BindError::TypeInference { module, .. }
            | BindError::Compilation { module, .. } => module,
        }
    }
}
