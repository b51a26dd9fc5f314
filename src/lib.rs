//! # comidl
//!
//! comidl reads MIDL, the interface definition language used to describe COM
//! components, and translates the declarations into Rust source that mirrors
//! their binary layout: `#[repr(C)]` structs, integer constants for enums,
//! type aliases, and vtable structs for interfaces.
//!
//! ## Core Components
//!
//! - **Lexer** (`lexer`): Turns the input into a stream of tokens with positions.
//! - **Parser** (`parser`): Consumes tokens to build the declaration tree.
//! - **AST** (`ast`): The declaration tree (interfaces, enums, structs, typedefs, ...).
//! - **Generators** (`generators`): Walk the tree and write target source.
//! - **Errors** (`error`): Scan, parse and generation failures.
//!
//! ## Usage
//!
//! The typical compilation flow is:
//! 1.  **Lexing**: `Lexer::new(reader)` creates a token stream.
//! 2.  **Parsing**: `Parser::new(reader)?.parse()?` returns the declarations in source order.
//! 3.  **Generation**: A `CodeGenerator` (like `RustGenerator`) turns them into one source file.
//!
//! [`translate`] runs all three steps.
//!
//! ## Example
//!
//! ```rust
//! use comidl::generators::rust::GeneratorConfig;
//!
//! let source = r#"
//!     [object, uuid(00000000-0000-0000-0000-000000000001)]
//!     interface IFoo : IUnknown {
//!         HRESULT Bar([in] long x);
//!     }
//! "#;
//!
//! let output = comidl::translate(source.as_bytes(), GeneratorConfig::default()).unwrap();
//! assert!(output.source.contains("pub struct IFooVtbl"));
//! assert!(output.diagnostics.is_empty());
//! ```

use std::io::BufRead;

pub mod ast;
pub mod error;
pub mod generators;
pub mod lexer;
pub mod parser;

pub use ast::Declaration;
pub use error::{Error, LexError, ParseError, Position, Result};
pub use generators::{
    CodeGenerator, CompileError, Diagnostic, GeneratedSource,
    rust::{GeneratorConfig, RustGenerator},
};
pub use parser::Parser;

/// Parses MIDL source held in memory.
pub fn parse_str(source: &str) -> std::result::Result<Vec<Declaration>, ParseError> {
    parse_reader(source.as_bytes())
}

/// Parses MIDL source from any buffered reader.
pub fn parse_reader<R: BufRead>(reader: R) -> std::result::Result<Vec<Declaration>, ParseError> {
    Parser::new(reader)?.parse()
}

/// Parses `reader` and generates Rust declarations for it.
///
/// Nothing is generated unless the whole input parses.
pub fn translate<R: BufRead>(reader: R, config: GeneratorConfig) -> Result<GeneratedSource> {
    let declarations = parse_reader(reader)?;
    let mut generator = RustGenerator::new(Some(config));
    Ok(generator.generate(&declarations)?)
}
