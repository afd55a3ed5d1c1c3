//! Error types for discovery and generation.
//!
//! Problems are reported at three levels:
//!
//! - [`Error`] aborts the whole pass (I/O, unparsable source, or a type with
//!   no descriptor, since the type model is then incomplete)
//! - [`MalformedUnit`] skips one mapping unit; the rest of the pass continues
//! - [`Diagnostic`] is informational: a target field with no source takes its
//!   value from the target's `Default` impl

use crate::types::ModuleId;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a generation pass.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading a source file or writing generated code failed
    #[error("I/O error on `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing generated code to a caller-supplied writer failed
    #[error("failed to write generated code")]
    Write(#[source] io::Error),

    /// A source file is not valid Rust
    #[error("failed to parse `{module}`: {source}")]
    Parse {
        module: ModuleId,
        #[source]
        source: syn::Error,
    },

    /// A mapping function refers to a type with no descriptor
    #[error("`{unit}::{function}` refers to `{ty}`, which has no type descriptor")]
    DescriptorLookup {
        unit: String,
        function: String,
        ty: String,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A mapping unit that cannot be generated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mapping unit `{unit}` is malformed: {reason}")]
pub struct MalformedUnit {
    pub unit: String,
    pub reason: MalformedReason,
}

impl MalformedUnit {
    pub fn new(unit: impl Into<String>, reason: MalformedReason) -> Self {
        Self {
            unit: unit.into(),
            reason,
        }
    }
}

/// Why a mapping unit was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedReason {
    #[error("base `{0}` is not a known type")]
    MissingBase(String),

    #[error("base `{0}` has no named fields to construct it from")]
    BaseWithoutConstructor(String),

    #[error("`{function}` must take `self`")]
    MissingReceiver { function: String },

    #[error("`{function}` has no source parameter")]
    NoParameters { function: String },

    #[error("`{function}` has no return type")]
    NoReturnType { function: String },

    #[error("`{function}` returns `{target}`, which has no named fields to construct it from")]
    TargetWithoutConstructor { function: String, target: String },

    #[error("`{function}` uses a type that cannot be represented: {detail}")]
    UnsupportedSignature { function: String, detail: String },

    #[error("`{function}` borrows its source as `&`, but sibling `{sibling}` takes it as `&mut`")]
    SharedSourceToMutSibling { function: String, sibling: String },

    #[error("invalid `#[mapper]` arguments: {0}")]
    InvalidArguments(String),

    #[error("{} target field(s) have no source", .0.len())]
    Unresolved(Vec<Diagnostic>),
}

/// A target constructor parameter no origin was found for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub unit: String,
    pub function: String,
    pub target: String,
    pub parameter: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}::{}`: no source for `{}.{}`; the field falls back to `Default::default()`",
            self.unit, self.function, self.target, self.parameter
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_unit_message() {
        let err = MalformedUnit::new(
            "StudentMapper",
            MalformedReason::NoParameters {
                function: "build".to_string(),
            },
        );
        assert_eq!(
            err.to_string(),
            "mapping unit `StudentMapper` is malformed: `build` has no source parameter"
        );
    }

    #[test]
    fn test_descriptor_lookup_message() {
        let err = Error::DescriptorLookup {
            unit: "StudentMapper".to_string(),
            function: "to_dto".to_string(),
            ty: "StudentEntity".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "`StudentMapper::to_dto` refers to `StudentEntity`, which has no type descriptor"
        );
    }

    #[test]
    fn test_diagnostic_message() {
        let diagnostic = Diagnostic {
            unit: "StudentMapper".to_string(),
            function: "to_dto".to_string(),
            target: "StudentDto".to_string(),
            parameter: "full_name".to_string(),
        };
        assert!(diagnostic.to_string().contains("no source for `StudentDto.full_name`"));
    }
}
