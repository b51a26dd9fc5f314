use std::io::BufRead;

use log::debug;

use crate::{
    ast::{
        Attribute, CoClassDef, ConstExpr, ConstValue, Declaration, EnumDef, EnumValue,
        InterfaceDef, LibraryDef, MethodDef, ModuleConstant, ModuleDef, Param, PassThroughKind,
        StructDef, StructField, TypedefDef,
    },
    error::ParseError,
    lexer::{Keyword, Lexer, Token, TokenKind},
};

/// A type followed by pointer stars and an optional name.
struct Declarator {
    type_name: String,
    indirection: usize,
    name: Option<String>,
}

/// The `Parser` struct is responsible for parsing MIDL source into an ordered
/// list of [`Declaration`]s.
///
/// Tokens are pulled from the lexer one at a time; only the current token is
/// held. Any mismatch aborts the whole parse.
pub struct Parser<R> {
    lexer: Lexer<R>,
    current_token: Token,
}

impl<R: BufRead> Parser<R> {
    /// Creates a new parser and grabs the first token.
    pub fn new(reader: R) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(reader);
        let current_token = Self::pull(&mut lexer)?;
        Ok(Parser {
            lexer,
            current_token,
        })
    }

    /// Fetches the next token, or `Eof` once the input is exhausted.
    fn pull(lexer: &mut Lexer<R>) -> Result<Token, ParseError> {
        if lexer.advance() {
            return Ok(lexer.current().clone());
        }
        match lexer.take_error() {
            Some(e) => Err(e.into()),
            None => Ok(lexer.current().clone()),
        }
    }

    /// Advances the parser to the next token.
    fn advance(&mut self) -> Result<(), ParseError> {
        self.current_token = Self::pull(&mut self.lexer)?;
        Ok(())
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current_token.kind == *kind
    }

    /// Consumes the current token if it matches `kind`.
    fn eat(&mut self, kind: &TokenKind) -> Result<bool, ParseError> {
        if self.check(kind) {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Builds the error for a current token that does not fit the grammar.
    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        let pos = self.current_token.position;
        match &self.current_token.kind {
            TokenKind::Eof => ParseError::UnexpectedEof {
                expected: expected.into(),
                pos,
            },
            found => ParseError::Syntax {
                expected: expected.into(),
                found: found.to_string(),
                pos,
            },
        }
    }

    /// Checks if the current token matches an expected kind, consumes it, and advances.
    /// Returns an error if the current token does not match the expected kind.
    fn consume(&mut self, expected: TokenKind) -> Result<(), ParseError> {
        if self.check(&expected) {
            self.advance()
        } else {
            Err(self.unexpected(expected.to_string()))
        }
    }

    /// Helper to consume an Identifier and return its string value.
    fn consume_identifier(&mut self, what: &str) -> Result<String, ParseError> {
        let name = match &self.current_token.kind {
            TokenKind::Identifier(id) => id.clone(),
            _ => return Err(self.unexpected(what)),
        };
        self.advance()?;
        Ok(name)
    }

    fn consume_string(&mut self, what: &str) -> Result<String, ParseError> {
        let value = match &self.current_token.kind {
            TokenKind::LiteralString(s) => s.clone(),
            _ => return Err(self.unexpected(what)),
        };
        self.advance()?;
        Ok(value)
    }

    // --- Core Parsing Functions ---

    /// Parses the whole input.
    ///
    /// Declarations are returned in source order. Empty input yields an
    /// empty list.
    pub fn parse(mut self) -> Result<Vec<Declaration>, ParseError> {
        let mut declarations = Vec::new();
        while !self.check(&TokenKind::Eof) {
            self.parse_declaration(false, &mut declarations)?;
        }
        Ok(declarations)
    }

    /// Parses one declaration and appends what it produces to `out`.
    ///
    /// `nested` is set inside `library` and `module` bodies, where `importlib`
    /// and `const` are also accepted.
    fn parse_declaration(
        &mut self,
        nested: bool,
        out: &mut Vec<Declaration>,
    ) -> Result<(), ParseError> {
        let first = out.len();

        // An attribute list binds to the declaration keyword that follows it.
        let attributes = if self.check(&TokenKind::OpenBracket) {
            let attributes = self.parse_attributes(false)?;
            match self.current_token.kind {
                TokenKind::Keyword(
                    Keyword::Interface
                    | Keyword::CoClass
                    | Keyword::Library
                    | Keyword::Module
                    | Keyword::Enum
                    | Keyword::Struct,
                ) => {}
                _ => {
                    return Err(self.unexpected(
                        "'interface', 'coclass', 'library', 'module', 'enum' or 'struct' after an attribute list",
                    ));
                }
            }
            attributes
        } else {
            Vec::new()
        };

        match self.current_token.kind {
            TokenKind::Keyword(Keyword::Import) => out.push(self.parse_import()?),
            TokenKind::Keyword(Keyword::Interface) => out.push(self.parse_interface(attributes)?),
            TokenKind::Keyword(Keyword::CoClass) => out.push(self.parse_coclass(attributes)?),
            TokenKind::Keyword(Keyword::Library) => out.push(self.parse_library(attributes)?),
            TokenKind::Keyword(Keyword::Module) => out.push(self.parse_module(attributes)?),
            TokenKind::Keyword(Keyword::Enum) => {
                self.advance()?;
                let name = self.consume_identifier("enum name")?;
                let values = self.parse_enum_body()?;
                self.eat(&TokenKind::Semicolon)?;
                out.push(Declaration::Enum(EnumDef {
                    name,
                    attributes,
                    values,
                }));
            }
            TokenKind::Keyword(Keyword::Struct) => {
                self.advance()?;
                let name = self.consume_identifier("struct name")?;
                let fields = self.parse_struct_body()?;
                self.eat(&TokenKind::Semicolon)?;
                out.push(Declaration::Struct(StructDef {
                    name,
                    attributes,
                    fields,
                }));
            }
            TokenKind::Keyword(Keyword::Typedef) => self.parse_typedef(out)?,
            TokenKind::Keyword(Keyword::CppQuote) => out.push(self.parse_cpp_quote()?),
            TokenKind::Keyword(Keyword::MidlPragma) => out.push(self.parse_midl_pragma()?),
            TokenKind::Keyword(Keyword::ImportLib) if nested => out.push(self.parse_importlib()?),
            TokenKind::Keyword(Keyword::Const) if nested => out.push(self.parse_constant()?),
            _ => return Err(self.unexpected("a declaration")),
        }

        for decl in &out[first..] {
            debug!(
                "parsed {} {}",
                decl.kind_name(),
                decl.name().unwrap_or_default()
            );
        }
        Ok(())
    }

    // --- Attributes ---

    /// Parses `[ attr, attr(value), ... ]`. An empty list is legal.
    fn parse_attribute_list(&mut self) -> Result<Vec<Attribute>, ParseError> {
        self.parse_attributes(true)
    }

    /// Parses an attribute list. Parameter attributes such as `in` or
    /// `unique` are rejected unless `allow_param` is set.
    fn parse_attributes(&mut self, allow_param: bool) -> Result<Vec<Attribute>, ParseError> {
        self.consume(TokenKind::OpenBracket)?;
        let mut attributes = Vec::new();

        if !self.check(&TokenKind::CloseBracket) {
            loop {
                attributes.push(self.parse_attribute(allow_param)?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }

        self.consume(TokenKind::CloseBracket)?;
        Ok(attributes)
    }

    fn parse_attribute(&mut self, allow_param: bool) -> Result<Attribute, ParseError> {
        let kind = match self.current_token.kind {
            TokenKind::Attribute(kind) if allow_param || !kind.is_param_attribute() => kind,
            TokenKind::Attribute(_) => {
                return Err(self.unexpected("an interface or type attribute"));
            }
            _ => return Err(self.unexpected("an attribute")),
        };
        self.advance()?;

        if !self.eat(&TokenKind::OpenParen)? {
            return Ok(Attribute::new(kind));
        }
        let value = self.parse_attribute_value()?;
        self.consume(TokenKind::CloseParen)?;
        Ok(Attribute::with_value(kind, value))
    }

    /// The single argument of `attr(value)`.
    fn parse_attribute_value(&mut self) -> Result<String, ParseError> {
        let mut prefix = String::new();
        while self.eat(&TokenKind::Star)? {
            prefix.push('*');
        }
        let value = match &self.current_token.kind {
            TokenKind::Identifier(s) | TokenKind::LiteralNumber(s) | TokenKind::LiteralString(s) => {
                s.clone()
            }
            // e.g. pointer_default(unique)
            TokenKind::Attribute(kind) => kind.as_str().to_string(),
            _ => return Err(self.unexpected("an attribute argument")),
        };
        self.advance()?;
        Ok(prefix + &value)
    }

    // --- Types ---

    /// Parses `[const] word... [*...] [name]`.
    ///
    /// Without stars the last identifier is the name, so `unsigned long x`
    /// yields type `unsigned long` and name `x`.
    fn parse_declarator(&mut self) -> Result<Declarator, ParseError> {
        let mut words: Vec<String> = Vec::new();
        let mut last_is_identifier = false;

        loop {
            match &self.current_token.kind {
                TokenKind::Identifier(word) => {
                    words.push(word.clone());
                    last_is_identifier = true;
                }
                TokenKind::Keyword(Keyword::Long) => {
                    words.push("long".to_string());
                    last_is_identifier = false;
                }
                TokenKind::Keyword(Keyword::Const) => {
                    words.push("const".to_string());
                    last_is_identifier = false;
                }
                _ => break,
            }
            self.advance()?;
        }

        let mut indirection = 0;
        while self.eat(&TokenKind::Star)? {
            indirection += 1;
            // `char * const p`
            self.eat(&TokenKind::Keyword(Keyword::Const))?;
        }

        let name = if indirection > 0 {
            Some(self.consume_identifier("a name after the pointer type")?)
        } else if last_is_identifier && words.iter().filter(|w| *w != "const").count() > 1 {
            words.pop()
        } else {
            None
        };

        if words.iter().all(|w| w == "const") {
            return Err(self.unexpected("a type name"));
        }

        Ok(Declarator {
            type_name: words.join(" "),
            indirection,
            name,
        })
    }

    /// Parses a declarator that must carry a name.
    fn parse_named_declarator(&mut self, what: &str) -> Result<Declarator, ParseError> {
        let declarator = self.parse_declarator()?;
        if declarator.name.is_none() {
            return Err(self.unexpected(what));
        }
        Ok(declarator)
    }

    /// Consumes an optional `[]` array suffix.
    fn parse_array_suffix(&mut self) -> Result<bool, ParseError> {
        if self.eat(&TokenKind::OpenBracket)? {
            self.consume(TokenKind::CloseBracket)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // --- Import ---

    fn parse_import(&mut self) -> Result<Declaration, ParseError> {
        let pos = self.current_token.position;
        self.consume(TokenKind::Keyword(Keyword::Import))?;

        let mut files = Vec::new();
        if matches!(self.current_token.kind, TokenKind::LiteralString(_)) {
            loop {
                files.push(self.consume_string("an import file name")?);
                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }
        if files.is_empty() {
            return Err(ParseError::EmptyImport { pos });
        }

        self.consume(TokenKind::Semicolon)?;
        Ok(Declaration::Import(files))
    }

    // --- Interface Parsing ---

    fn parse_interface(&mut self, attributes: Vec<Attribute>) -> Result<Declaration, ParseError> {
        self.consume(TokenKind::Keyword(Keyword::Interface))?;
        let name = self.consume_identifier("interface name")?;
        let parent = if self.eat(&TokenKind::Colon)? {
            Some(self.consume_identifier("parent interface name")?)
        } else {
            None
        };

        self.consume(TokenKind::OpenBrace)?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::CloseBrace) {
            methods.push(self.parse_method()?);
        }
        self.consume(TokenKind::CloseBrace)?;
        self.eat(&TokenKind::Semicolon)?;

        Ok(Declaration::Interface(InterfaceDef {
            name,
            parent,
            attributes,
            methods,
        }))
    }

    /// Parses `[attrs] returnType name(params);`.
    fn parse_method(&mut self) -> Result<MethodDef, ParseError> {
        let attributes = if self.check(&TokenKind::OpenBracket) {
            self.parse_attribute_list()?
        } else {
            Vec::new()
        };

        let signature = self.parse_named_declarator("a method name")?;
        let params = self.parse_params()?;
        self.consume(TokenKind::Semicolon)?;

        let mut return_type = signature.type_name;
        return_type.push_str(&"*".repeat(signature.indirection));

        Ok(MethodDef {
            name: signature.name.unwrap_or_default(),
            return_type,
            params,
            attributes,
        })
    }

    /// Parses `( param, ... )`. A lone `void` means no parameters.
    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.consume(TokenKind::OpenParen)?;
        let mut params = Vec::new();

        if !self.check(&TokenKind::CloseParen) {
            loop {
                let attributes = if self.check(&TokenKind::OpenBracket) {
                    self.parse_attribute_list()?
                } else {
                    Vec::new()
                };

                let declarator = self.parse_declarator()?;
                let Some(name) = declarator.name else {
                    let is_void = attributes.is_empty()
                        && params.is_empty()
                        && declarator.indirection == 0
                        && declarator.type_name == "void"
                        && self.check(&TokenKind::CloseParen);
                    if is_void {
                        break;
                    }
                    return Err(self.unexpected("a parameter name"));
                };

                let array = self.parse_array_suffix()?;
                params.push(Param {
                    attributes,
                    type_name: declarator.type_name,
                    indirection: declarator.indirection,
                    name,
                    array,
                });

                if !self.eat(&TokenKind::Comma)? {
                    break;
                }
            }
        }

        self.consume(TokenKind::CloseParen)?;
        Ok(params)
    }

    // --- Enum Parsing ---

    /// Parses `{ NAME [= expr], ... }`. A trailing comma is accepted.
    fn parse_enum_body(&mut self) -> Result<Vec<EnumValue>, ParseError> {
        self.consume(TokenKind::OpenBrace)?;
        let mut values = Vec::new();

        while !self.check(&TokenKind::CloseBrace) {
            let name = self.consume_identifier("enum value name")?;
            let value = if self.eat(&TokenKind::Assign)? {
                Some(self.parse_const_expr()?)
            } else {
                None
            };
            values.push(EnumValue { name, value });

            if !self.eat(&TokenKind::Comma)? {
                break;
            }
        }

        self.consume(TokenKind::CloseBrace)?;
        Ok(values)
    }

    /// Parses `operand [| operand ...]`.
    fn parse_const_expr(&mut self) -> Result<ConstExpr, ParseError> {
        let mut operands = Vec::new();
        loop {
            let operand = match &self.current_token.kind {
                TokenKind::Identifier(s) | TokenKind::LiteralNumber(s) => s.clone(),
                _ => return Err(self.unexpected("a number or name")),
            };
            self.advance()?;
            operands.push(operand);

            if !self.eat(&TokenKind::Pipe)? {
                break;
            }
        }
        Ok(ConstExpr { operands })
    }

    // --- Struct and Typedef Parsing ---

    /// Parses `{ [attrs] type name; ... }`.
    fn parse_struct_body(&mut self) -> Result<Vec<StructField>, ParseError> {
        self.consume(TokenKind::OpenBrace)?;
        let mut fields = Vec::new();

        while !self.check(&TokenKind::CloseBrace) {
            let attributes = if self.check(&TokenKind::OpenBracket) {
                self.parse_attribute_list()?
            } else {
                Vec::new()
            };
            let declarator = self.parse_named_declarator("a field name")?;
            let array = self.parse_array_suffix()?;
            self.consume(TokenKind::Semicolon)?;

            fields.push(StructField {
                type_name: declarator.type_name,
                indirection: declarator.indirection,
                name: declarator.name.unwrap_or_default(),
                array,
                attributes,
            });
        }

        self.consume(TokenKind::CloseBrace)?;
        Ok(fields)
    }

    /// Parses `typedef [attrs] type name[, *name...];` and the inline
    /// `typedef [attrs] enum|struct [tag] { ... } name;` form.
    fn parse_typedef(&mut self, out: &mut Vec<Declaration>) -> Result<(), ParseError> {
        self.consume(TokenKind::Keyword(Keyword::Typedef))?;
        let attributes = if self.check(&TokenKind::OpenBracket) {
            self.parse_attribute_list()?
        } else {
            Vec::new()
        };

        let inline = match self.current_token.kind {
            TokenKind::Keyword(kw @ (Keyword::Enum | Keyword::Struct)) => Some(kw),
            _ => None,
        };

        let first = match inline {
            Some(keyword) => {
                self.advance()?;
                let tag = match &self.current_token.kind {
                    TokenKind::Identifier(tag) => {
                        let tag = tag.clone();
                        self.advance()?;
                        Some(tag)
                    }
                    _ => None,
                };

                if self.check(&TokenKind::OpenBrace) {
                    let body = match keyword {
                        Keyword::Enum => InlineBody::Enum(self.parse_enum_body()?),
                        _ => InlineBody::Struct(self.parse_struct_body()?),
                    };
                    let name = self.consume_identifier("typedef name")?;
                    out.push(match body {
                        InlineBody::Enum(values) => Declaration::Enum(EnumDef {
                            name: name.clone(),
                            attributes: attributes.clone(),
                            values,
                        }),
                        InlineBody::Struct(fields) => Declaration::Struct(StructDef {
                            name: name.clone(),
                            attributes: attributes.clone(),
                            fields,
                        }),
                    });
                    name
                } else {
                    // `typedef struct tag alias;`
                    let Some(tag) = tag else {
                        return Err(self.unexpected("a tag name or '{'"));
                    };
                    let mut indirection = 0;
                    while self.eat(&TokenKind::Star)? {
                        indirection += 1;
                    }
                    let name = self.consume_identifier("typedef name")?;
                    out.push(Declaration::Typedef(TypedefDef {
                        name,
                        type_name: tag.clone(),
                        indirection,
                        attributes: attributes.clone(),
                    }));
                    tag
                }
            }
            None => {
                let declarator = self.parse_named_declarator("typedef name")?;
                out.push(Declaration::Typedef(TypedefDef {
                    name: declarator.name.unwrap_or_default(),
                    type_name: declarator.type_name.clone(),
                    indirection: declarator.indirection,
                    attributes: attributes.clone(),
                }));
                declarator.type_name
            }
        };

        // Additional declarators share the base type: `..., *PFOO;`
        while self.eat(&TokenKind::Comma)? {
            let mut indirection = 0;
            while self.eat(&TokenKind::Star)? {
                indirection += 1;
            }
            let name = self.consume_identifier("typedef name")?;
            out.push(Declaration::Typedef(TypedefDef {
                name,
                type_name: first.clone(),
                indirection,
                attributes: attributes.clone(),
            }));
        }

        self.consume(TokenKind::Semicolon)?;
        Ok(())
    }

    // --- CoClass, Library and Module Parsing ---

    /// Parses `coclass Name { [attrs] interface IName; ... }`.
    fn parse_coclass(&mut self, attributes: Vec<Attribute>) -> Result<Declaration, ParseError> {
        self.consume(TokenKind::Keyword(Keyword::CoClass))?;
        let name = self.consume_identifier("coclass name")?;
        self.consume(TokenKind::OpenBrace)?;

        let mut interfaces = Vec::new();
        while !self.check(&TokenKind::CloseBrace) {
            let attributes = if self.check(&TokenKind::OpenBracket) {
                self.parse_attribute_list()?
            } else {
                Vec::new()
            };
            self.consume(TokenKind::Keyword(Keyword::Interface))?;
            let name = self.consume_identifier("interface name")?;
            self.consume(TokenKind::Semicolon)?;
            interfaces.push(InterfaceDef {
                name,
                parent: None,
                attributes,
                methods: Vec::new(),
            });
        }

        self.consume(TokenKind::CloseBrace)?;
        self.eat(&TokenKind::Semicolon)?;
        Ok(Declaration::CoClass(CoClassDef {
            name,
            attributes,
            interfaces,
        }))
    }

    /// Parses `{ declarations }` of a library or module.
    fn parse_block(&mut self) -> Result<Vec<Declaration>, ParseError> {
        self.consume(TokenKind::OpenBrace)?;
        let mut declarations = Vec::new();
        while !self.check(&TokenKind::CloseBrace) {
            self.parse_declaration(true, &mut declarations)?;
        }
        self.consume(TokenKind::CloseBrace)?;
        self.eat(&TokenKind::Semicolon)?;
        Ok(declarations)
    }

    fn parse_library(&mut self, attributes: Vec<Attribute>) -> Result<Declaration, ParseError> {
        self.consume(TokenKind::Keyword(Keyword::Library))?;
        let name = self.consume_identifier("library name")?;
        let declarations = self.parse_block()?;
        Ok(Declaration::Library(LibraryDef {
            name,
            attributes,
            declarations,
        }))
    }

    fn parse_module(&mut self, attributes: Vec<Attribute>) -> Result<Declaration, ParseError> {
        self.consume(TokenKind::Keyword(Keyword::Module))?;
        let name = self.consume_identifier("module name")?;
        let declarations = self.parse_block()?;
        Ok(Declaration::Module(ModuleDef {
            name,
            attributes,
            declarations,
        }))
    }

    /// Parses `importlib("file");` or `importlib "file";`.
    fn parse_importlib(&mut self) -> Result<Declaration, ParseError> {
        self.consume(TokenKind::Keyword(Keyword::ImportLib))?;
        let file = if self.eat(&TokenKind::OpenParen)? {
            let file = self.consume_string("a library file name")?;
            self.consume(TokenKind::CloseParen)?;
            file
        } else {
            self.consume_string("a library file name")?
        };
        self.consume(TokenKind::Semicolon)?;
        Ok(Declaration::ImportLib(file))
    }

    /// Parses `const type name = value;`.
    fn parse_constant(&mut self) -> Result<Declaration, ParseError> {
        self.consume(TokenKind::Keyword(Keyword::Const))?;
        let declarator = self.parse_named_declarator("a constant name")?;
        self.consume(TokenKind::Assign)?;

        let value = match &self.current_token.kind {
            TokenKind::LiteralString(s) => {
                let s = s.clone();
                self.advance()?;
                ConstValue::Str(s)
            }
            _ => ConstValue::Expr(self.parse_const_expr()?),
        };
        self.consume(TokenKind::Semicolon)?;

        let mut type_name = declarator.type_name;
        type_name.push_str(&"*".repeat(declarator.indirection));
        Ok(Declaration::Constant(ModuleConstant {
            name: declarator.name.unwrap_or_default(),
            type_name,
            value,
        }))
    }

    // --- Pass-through Directives ---

    /// Parses `cpp_quote("text")`.
    fn parse_cpp_quote(&mut self) -> Result<Declaration, ParseError> {
        self.consume(TokenKind::Keyword(Keyword::CppQuote))?;
        self.consume(TokenKind::OpenParen)?;
        let text = self.consume_string("quoted text")?;
        self.consume(TokenKind::CloseParen)?;
        self.eat(&TokenKind::Semicolon)?;
        Ok(Declaration::PassThrough {
            kind: PassThroughKind::CppQuote,
            text,
        })
    }

    /// Parses `midl_pragma name(...)`, keeping the token text after the keyword.
    ///
    /// The directive ends with its balanced parenthesized group.
    fn parse_midl_pragma(&mut self) -> Result<Declaration, ParseError> {
        self.consume(TokenKind::Keyword(Keyword::MidlPragma))?;

        let mut parts = vec![self.consume_identifier("a pragma name")?];
        if !self.check(&TokenKind::OpenParen) {
            return Err(self.unexpected("'(' after the pragma name"));
        }

        let mut depth = 0usize;
        loop {
            match self.current_token.kind {
                TokenKind::OpenParen => depth += 1,
                TokenKind::CloseParen => depth -= 1,
                TokenKind::Eof => return Err(self.unexpected("')'")),
                _ => {}
            }
            parts.push(self.current_token.text());
            self.advance()?;
            if depth == 0 {
                break;
            }
        }
        self.eat(&TokenKind::Semicolon)?;

        Ok(Declaration::PassThrough {
            kind: PassThroughKind::MidlPragma,
            text: parts.join(" "),
        })
    }
}

enum InlineBody {
    Enum(Vec<EnumValue>),
    Struct(Vec<StructField>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AttributeKind, ConstValue};

    fn parse(source: &str) -> Result<Vec<Declaration>, ParseError> {
        Parser::new(source.as_bytes())?.parse()
    }

    fn parse_one(source: &str) -> Declaration {
        let mut decls = parse(source).unwrap();
        assert_eq!(decls.len(), 1, "expected one declaration in {decls:?}");
        decls.remove(0)
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("  // nothing here\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_import() {
        let decl = parse_one("import \"a.idl\", \"b.idl\";");
        assert_eq!(
            decl,
            Declaration::Import(vec!["a.idl".to_string(), "b.idl".to_string()])
        );
    }

    #[test]
    fn test_empty_import_is_rejected() {
        let err = parse("import ;").unwrap_err();
        assert!(matches!(err, ParseError::EmptyImport { .. }));
    }

    #[test]
    fn test_parse_interface() {
        let source = "[object, uuid(12345678-1234-1234-1234-123456789abc)] \
                      interface IFoo { HRESULT Bar([in] long x); }";
        let Declaration::Interface(i) = parse_one(source) else {
            panic!("Expected Interface declaration");
        };
        assert_eq!(i.name, "IFoo");
        assert_eq!(i.parent, None);
        assert_eq!(
            i.attributes,
            vec![
                Attribute::new(AttributeKind::Object),
                Attribute::with_value(AttributeKind::Uuid, "12345678-1234-1234-1234-123456789abc"),
            ]
        );
        assert_eq!(i.methods.len(), 1);
        let m = &i.methods[0];
        assert_eq!(m.name, "Bar");
        assert_eq!(m.return_type, "HRESULT");
        assert_eq!(
            m.params,
            vec![Param {
                attributes: vec![Attribute::new(AttributeKind::In)],
                type_name: "long".to_string(),
                indirection: 0,
                name: "x".to_string(),
                array: false,
            }]
        );
    }

    #[test]
    fn test_interface_parent_and_method_order() {
        let source = "interface IChild : IParent {
            HRESULT First(void);
            HRESULT Second([out, retval] BSTR** value, [in] unsigned long count[]);
            [propget] HRESULT Third([out] long* p);
        };";
        let Declaration::Interface(i) = parse_one(source) else {
            panic!("Expected Interface declaration");
        };
        assert_eq!(i.parent.as_deref(), Some("IParent"));
        let names: Vec<_> = i.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);

        assert!(i.methods[0].params.is_empty());

        let second = &i.methods[1].params;
        assert_eq!(second[0].type_name, "BSTR");
        assert_eq!(second[0].indirection, 2);
        assert_eq!(second[1].type_name, "unsigned long");
        assert_eq!(second[1].name, "count");
        assert!(second[1].array);

        assert_eq!(
            i.methods[2].attributes,
            vec![Attribute::new(AttributeKind::PropGet)]
        );
    }

    #[test]
    fn test_attribute_arguments() {
        let source = "[uuid(abc), version(1.0), lcid(0), helpstring(\"Help text\"), \
                      pointer_default(unique)] library Lib { };";
        let Declaration::Library(l) = parse_one(source) else {
            panic!("Expected Library declaration");
        };
        let values: Vec<_> = l
            .attributes
            .iter()
            .map(|a| a.value.clone().unwrap())
            .collect();
        assert_eq!(values, vec!["abc", "1.0", "0", "Help text", "unique"]);
    }

    #[test]
    fn test_empty_attribute_list() {
        let Declaration::Interface(i) = parse_one("[] interface IEmpty { }") else {
            panic!("Expected Interface declaration");
        };
        assert!(i.attributes.is_empty());
        assert!(i.methods.is_empty());
    }

    #[test]
    fn test_missing_close_bracket() {
        let err = parse("[object interface IFoo { }").unwrap_err();
        match err {
            ParseError::Syntax { expected, found, pos } => {
                assert_eq!(expected, "']'");
                assert_eq!(found, "'interface'");
                assert_eq!(pos.column, 9);
            }
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_attribute_requires_keyword() {
        let err = parse("[hidden] interface IFoo { }").unwrap_err();
        assert!(err.to_string().contains("expected an attribute"));
    }

    #[test]
    fn test_parse_typedef() {
        let decl = parse_one("typedef long MyLong;");
        assert_eq!(
            decl,
            Declaration::Typedef(TypedefDef {
                name: "MyLong".to_string(),
                type_name: "long".to_string(),
                indirection: 0,
                attributes: vec![],
            })
        );
    }

    #[test]
    fn test_typedef_with_pointers_and_extra_names() {
        let decls = parse("typedef [unique] IFoo** LPFOO, *PLPFOO;").unwrap();
        assert_eq!(decls.len(), 2);
        let Declaration::Typedef(first) = &decls[0] else {
            panic!("Expected Typedef declaration");
        };
        assert_eq!(first.name, "LPFOO");
        assert_eq!(first.type_name, "IFoo");
        assert_eq!(first.indirection, 2);
        assert_eq!(first.attributes, vec![Attribute::new(AttributeKind::Unique)]);
        let Declaration::Typedef(second) = &decls[1] else {
            panic!("Expected Typedef declaration");
        };
        assert_eq!(second.name, "PLPFOO");
        assert_eq!(second.type_name, "IFoo");
        assert_eq!(second.indirection, 1);
    }

    #[test]
    fn test_inline_typedef_enum() {
        let source = "typedef [v1_enum] enum tagMode { MODE_A = 1, MODE_B } Mode;";
        let Declaration::Enum(e) = parse_one(source) else {
            panic!("Expected Enum declaration");
        };
        assert_eq!(e.name, "Mode");
        assert_eq!(e.attributes, vec![Attribute::new(AttributeKind::V1Enum)]);
        assert_eq!(e.values.len(), 2);
    }

    #[test]
    fn test_parse_enum() {
        let Declaration::Enum(e) = parse_one("enum Color { RED, GREEN, BLUE };") else {
            panic!("Expected Enum declaration");
        };
        assert_eq!(e.name, "Color");
        let names: Vec<_> = e.values.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["RED", "GREEN", "BLUE"]);
        assert!(e.values.iter().all(|v| v.value.is_none()));
    }

    #[test]
    fn test_enum_bit_or_values() {
        let source = "enum Flags { F_A = 0x1, F_B = 0x2, F_AB = F_A | F_B, };";
        let Declaration::Enum(e) = parse_one(source) else {
            panic!("Expected Enum declaration");
        };
        assert_eq!(
            e.values[2].value,
            Some(ConstExpr {
                operands: vec!["F_A".to_string(), "F_B".to_string()]
            })
        );
    }

    #[test]
    fn test_parse_struct() {
        let source = "struct Point { long x; [size_is(n)] long* values; unsigned short flags[]; };";
        let Declaration::Struct(s) = parse_one(source) else {
            panic!("Expected Struct declaration");
        };
        assert_eq!(s.name, "Point");
        let names: Vec<_> = s.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "values", "flags"]);
        assert_eq!(s.fields[1].indirection, 1);
        assert_eq!(
            s.fields[1].attributes,
            vec![Attribute::with_value(AttributeKind::SizeIs, "n")]
        );
        assert_eq!(s.fields[2].type_name, "unsigned short");
        assert!(s.fields[2].array);
    }

    #[test]
    fn test_struct_and_enum_semicolon_is_optional() {
        let decls = parse("struct S { long a; }\nenum E { A }\ntypedef long L;").unwrap();
        let kinds: Vec<_> = decls.iter().map(|d| d.kind_name()).collect();
        assert_eq!(kinds, vec!["struct", "enum", "typedef"]);

        let decls = parse("struct S { long a; };\nenum E { A };").unwrap();
        assert_eq!(decls.len(), 2);
    }

    #[test]
    fn test_parse_library_nested_order() {
        let source = "
            [uuid(1), version(1.0)]
            library Lib {
                importlib(\"stdole2.tlb\");
                struct S { long a; };
                enum E { X };
                interface I { HRESULT M(); }
                [dllname(\"x.dll\")]
                module Consts {
                    const long MAX = 10;
                    const LPCWSTR NAME = \"name\";
                };
                [uuid(2)] coclass C { [default] interface I; };
            };";
        let Declaration::Library(l) = parse_one(source) else {
            panic!("Expected Library declaration");
        };
        let kinds: Vec<_> = l.declarations.iter().map(|d| d.kind_name()).collect();
        assert_eq!(
            kinds,
            vec!["importlib", "struct", "enum", "interface", "module", "coclass"]
        );

        let Declaration::Module(m) = &l.declarations[4] else {
            panic!("Expected Module declaration");
        };
        assert_eq!(
            m.declarations[0],
            Declaration::Constant(ModuleConstant {
                name: "MAX".to_string(),
                type_name: "long".to_string(),
                value: ConstValue::Expr(ConstExpr::single("10")),
            })
        );
        assert_eq!(
            m.declarations[1],
            Declaration::Constant(ModuleConstant {
                name: "NAME".to_string(),
                type_name: "LPCWSTR".to_string(),
                value: ConstValue::Str("name".to_string()),
            })
        );

        let Declaration::CoClass(c) = &l.declarations[5] else {
            panic!("Expected CoClass declaration");
        };
        assert_eq!(c.interfaces[0].name, "I");
        assert_eq!(
            c.interfaces[0].attributes,
            vec![Attribute::new(AttributeKind::Default)]
        );
    }

    #[test]
    fn test_const_rejected_at_top_level() {
        let err = parse("const long X = 1;").unwrap_err();
        assert!(err.to_string().contains("expected a declaration"));
    }

    #[test]
    fn test_pass_through_directives() {
        let decls = parse(
            "cpp_quote(\"#define FOO 1\")\nmidl_pragma warning( disable: 2362 )\ntypedef long L;",
        )
        .unwrap();
        assert_eq!(
            decls[0],
            Declaration::PassThrough {
                kind: PassThroughKind::CppQuote,
                text: "#define FOO 1".to_string(),
            }
        );
        assert_eq!(
            decls[1],
            Declaration::PassThrough {
                kind: PassThroughKind::MidlPragma,
                text: "warning ( disable : 2362 )".to_string(),
            }
        );
        assert_eq!(decls[2].kind_name(), "typedef");
    }

    #[test]
    fn test_param_attribute_rejected_before_declaration() {
        let err = parse("[object, in] interface IFoo { }").unwrap_err();
        let ParseError::Syntax { expected, found, pos } = err else {
            panic!("Expected Syntax error, got {err:?}");
        };
        assert_eq!(expected, "an interface or type attribute");
        assert_eq!(found, "'in'");
        assert_eq!(pos.column, 10);

        // Still fine on parameters and typedefs.
        assert!(parse("interface IFoo { HRESULT M([in, unique] long *p); }").is_ok());
        assert!(parse("typedef [unique] long *PLONG;").is_ok());
    }

    #[test]
    fn test_pragma_stops_after_its_group() {
        let decls = parse("midl_pragma warning(disable: 2111)\ntypedef long L;").unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(
            decls[0],
            Declaration::PassThrough {
                kind: PassThroughKind::MidlPragma,
                text: "warning ( disable : 2111 )".to_string(),
            }
        );
        assert_eq!(decls[1].kind_name(), "typedef");
    }

    #[test]
    fn test_pragma_without_group_is_rejected() {
        let err = parse("midl_pragma warning\ntypedef long L;").unwrap_err();
        let ParseError::Syntax { expected, found, pos } = err else {
            panic!("Expected Syntax error, got {err:?}");
        };
        assert_eq!(expected, "'(' after the pragma name");
        assert_eq!(found, "'typedef'");
        assert_eq!(pos.line, 2);

        let err = parse("midl_pragma warning(disable: 2111").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_lex_error_aborts_parse() {
        let err = parse("typedef long A; @").unwrap_err();
        assert!(matches!(err, ParseError::Lex(_)));
    }

    #[test]
    fn test_unexpected_token_at_top_level() {
        let err = parse("HRESULT Foo();").unwrap_err();
        match err {
            ParseError::Syntax { found, pos, .. } => {
                assert_eq!(found, "identifier 'HRESULT'");
                assert_eq!((pos.line, pos.column), (1, 1));
            }
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }
}
