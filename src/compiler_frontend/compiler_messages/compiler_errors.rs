use rustc_hash::FxHashMap;
use std::fmt;

/// Where in the template an error came from.
///
/// Directive handlers only know the offset of the node they were called for.
/// The walker resolves that offset to a line through the injected line lookup
/// before the error leaves the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextLocation {
    #[default]
    Unknown,
    Offset(usize),
    Line {
        offset: usize,
        line: usize,
    },
    EndOfInput,
}

impl TextLocation {
    pub fn line(&self) -> Option<usize> {
        match self {
            TextLocation::Line { line, .. } => Some(*line),
            _ => None,
        }
    }

    pub fn offset(&self) -> Option<usize> {
        match self {
            TextLocation::Offset(offset) | TextLocation::Line { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

impl fmt::Display for TextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextLocation::Unknown => write!(f, "unknown location"),
            TextLocation::Offset(offset) => write!(f, "offset {}", offset),
            TextLocation::Line { line, .. } => write!(f, "line {}", line),
            TextLocation::EndOfInput => write!(f, "EOF"),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, Hash, PartialEq)]
pub enum ErrorMetaDataKey {
    Directive,
    Expression,
    OpenedOnLine,

    // Optional suggestions
    PrimarySuggestion,
    SuggestedReplacement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompilerError {
    pub msg: String,
    pub location: TextLocation,
    pub error_type: ErrorType,

    // Extra structured detail for tooling that reports the error
    pub metadata: FxHashMap<ErrorMetaDataKey, String>,
}

impl CompilerError {
    pub fn new(msg: impl Into<String>, location: TextLocation, error_type: ErrorType) -> Self {
        CompilerError {
            msg: msg.into(),
            location,
            error_type,
            metadata: FxHashMap::default(),
        }
    }

    /// Create a new syntax error for a directive expression that has the wrong shape
    pub fn new_syntax_error(msg: impl Into<String>, location: TextLocation) -> Self {
        Self::new(msg, location, ErrorType::Syntax)
    }

    /// Unmatched or misordered block directives
    pub fn new_structure_error(msg: impl Into<String>, location: TextLocation) -> Self {
        Self::new(msg, location, ErrorType::Structure)
    }

    /// The parser handed over a tree the compiler can't make sense of
    pub fn new_tree_error(msg: impl Into<String>, location: TextLocation) -> Self {
        Self::new(msg, location, ErrorType::Tree)
    }

    pub fn new_config_error(msg: impl Into<String>) -> Self {
        Self::new(msg, TextLocation::Unknown, ErrorType::Config)
    }

    pub fn with_location(mut self, location: TextLocation) -> Self {
        self.location = location;
        self
    }

    pub fn with_metadata(mut self, key: ErrorMetaDataKey, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value.into());
        self
    }

    pub fn new_metadata_entry(&mut self, key: ErrorMetaDataKey, value: impl Into<String>) {
        self.metadata.insert(key, value.into());
    }

    pub fn line(&self) -> Option<usize> {
        self.location.line()
    }
}

impl fmt::Display for CompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            error_type_to_str(&self.error_type),
            self.location,
            self.msg
        )?;

        if let Some(suggestion) = self.metadata.get(&ErrorMetaDataKey::PrimarySuggestion) {
            write!(f, ". {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for CompilerError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Structure,
    Syntax,
    Tree,
    Config,
}

pub fn error_type_to_str(e_type: &ErrorType) -> &'static str {
    match e_type {
        ErrorType::Structure => "Structure Error",
        ErrorType::Syntax => "Syntax Error",
        ErrorType::Tree => "Malformed Template Tree",
        ErrorType::Config => "Malformed Config",
    }
}

/// Returns a new CompilerError for a directive expression with the wrong shape.
///
/// Usage:
/// `return_syntax_error!("message", location, {
///     Directive => "set",
///     PrimarySuggestion => "Use `target = value`",
/// })`;
#[macro_export]
macro_rules! return_syntax_error {
    ($msg:expr, $loc:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError {
            msg: $msg.into(),
            location: $loc,
            error_type: $crate::compiler_frontend::compiler_messages::compiler_errors::ErrorType::Syntax,
            metadata: {
                let mut map = rustc_hash::FxHashMap::default();
                $(
                    map.insert(
                        $crate::compiler_frontend::compiler_messages::compiler_errors::ErrorMetaDataKey::$key,
                        String::from($value),
                    );
                )*
                map
            },
        })
    };

    ($msg:expr, $loc:expr) => {
        return Err(
            $crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError::new_syntax_error(
                $msg, $loc,
            ),
        )
    };
}

/// Returns a new CompilerError for unmatched or misordered block directives.
#[macro_export]
macro_rules! return_structure_error {
    ($msg:expr, $loc:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError {
            msg: $msg.into(),
            location: $loc,
            error_type: $crate::compiler_frontend::compiler_messages::compiler_errors::ErrorType::Structure,
            metadata: {
                let mut map = rustc_hash::FxHashMap::default();
                $(
                    map.insert(
                        $crate::compiler_frontend::compiler_messages::compiler_errors::ErrorMetaDataKey::$key,
                        String::from($value),
                    );
                )*
                map
            },
        })
    };

    ($msg:expr, $loc:expr) => {
        return Err(
            $crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError::new_structure_error(
                $msg, $loc,
            ),
        )
    };
}

/// Returns a new CompilerError for input the parser should never have produced.
#[macro_export]
macro_rules! return_tree_error {
    ($msg:expr, $loc:expr) => {
        return Err(
            $crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError::new_tree_error(
                $msg, $loc,
            ),
        )
    };
}
