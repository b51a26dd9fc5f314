use std::fmt;

use log::warn;
use thiserror::Error;

use crate::ast::Declaration;

pub mod rust;

/// A trait for code generators that translate the parsed declarations into
/// target language source.
pub trait CodeGenerator {
    /// Translates the declarations into one contiguous source text.
    ///
    /// Declarations without an emission rule are skipped and reported in
    /// [`GeneratedSource::diagnostics`]; they never stop generation.
    fn generate(&mut self, declarations: &[Declaration]) -> Result<GeneratedSource, CompileError>;
}

/// The output of a generator run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    /// The complete generated file.
    pub source: String,
    /// Declarations that were skipped, in the order they were met.
    pub diagnostics: Vec<Diagnostic>,
}

/// A recoverable problem found during generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Kind of the skipped declaration, e.g. `coclass`.
    pub kind: &'static str,
    /// Name of the skipped declaration, if it has one.
    pub name: Option<String>,
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic and logs it as a warning.
    pub fn new(kind: &'static str, name: Option<String>, message: impl Into<String>) -> Self {
        let diagnostic = Diagnostic {
            kind,
            name,
            message: message.into(),
        };
        warn!("{diagnostic}");
        diagnostic
    }

    /// Records that `declaration` has no emission rule.
    pub fn unsupported(declaration: &Declaration, message: impl Into<String>) -> Self {
        Diagnostic::new(
            declaration.kind_name(),
            declaration.name().map(str::to_string),
            message,
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "skipped {} '{name}': {}", self.kind, self.message),
            None => write!(f, "skipped {}: {}", self.kind, self.message),
        }
    }
}

/// Error type for generation failures.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to format generated source: {0}")]
    Format(#[from] fmt::Error),
}
