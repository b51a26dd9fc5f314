use std::fmt;

use thiserror::Error;

/// Location of a token in the IDL source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    /// Byte offset from the start of the input.
    pub offset: usize,
    /// Line number (1-based).
    pub line: usize,
    /// Column number (1-based).
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Scanner failures. All of them end the scan.
#[derive(Debug, Error)]
pub enum LexError {
    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: Position },

    #[error("unterminated string starting at {pos}")]
    UnterminatedString { pos: Position },

    #[error("unexpected non-comment '/' at {pos}")]
    MalformedComment { pos: Position },

    #[error("read failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Parser failures. A parse either yields every declaration or none.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("syntax error at {pos}: expected {expected}, found {found}")]
    Syntax {
        expected: String,
        found: String,
        pos: Position,
    },

    #[error("import statement at {pos} names no files")]
    EmptyImport { pos: Position },

    #[error("unexpected end of input at {pos}: expected {expected}")]
    UnexpectedEof { expected: String, pos: Position },
}

impl ParseError {
    /// Source position the error refers to, when it has one.
    pub fn position(&self) -> Option<Position> {
        match self {
            ParseError::Lex(LexError::UnexpectedChar { pos, .. })
            | ParseError::Lex(LexError::UnterminatedString { pos })
            | ParseError::Lex(LexError::MalformedComment { pos })
            | ParseError::Syntax { pos, .. }
            | ParseError::EmptyImport { pos }
            | ParseError::UnexpectedEof { pos, .. } => Some(*pos),
            ParseError::Lex(LexError::Io(_)) => None,
        }
    }
}

/// Anything that can stop the whole IDL to Rust translation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Generate(#[from] crate::generators::CompileError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
