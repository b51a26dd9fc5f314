use std::{
    fmt::{self, Display},
    io::{self, BufRead},
};

use log::trace;

use crate::{
    ast::AttributeKind,
    error::{LexError, Position},
};

/// Declaration keywords of the MIDL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Import,
    Interface,
    CppQuote,
    MidlPragma,
    Enum,
    CoClass,
    Typedef,
    Library,
    ImportLib,
    Module,
    Const,
    Long,
    Struct,
}

impl Keyword {
    /// The keyword as spelled in IDL source.
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Import => "import",
            Keyword::Interface => "interface",
            Keyword::CppQuote => "cpp_quote",
            Keyword::MidlPragma => "midl_pragma",
            Keyword::Enum => "enum",
            Keyword::CoClass => "coclass",
            Keyword::Typedef => "typedef",
            Keyword::Library => "library",
            Keyword::ImportLib => "importlib",
            Keyword::Module => "module",
            Keyword::Const => "const",
            Keyword::Long => "long",
            Keyword::Struct => "struct",
        }
    }
}

// The token classes of the MIDL dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    // Declaration keywords
    Keyword(Keyword),
    // Interface, type and parameter attribute keywords
    Attribute(AttributeKind),
    // Delimiters and Operators
    OpenParen,    // (
    CloseParen,   // )
    OpenBracket,  // [
    CloseBracket, // ]
    OpenBrace,    // {
    CloseBrace,   // }
    Comma,        // ,
    Colon,        // :
    Semicolon,    // ;
    Dash,         // -
    Star,         // *
    Assign,       // =
    Pipe,         // |
    /// Type, declaration or attribute argument name. Also covers dotted and
    /// dashed runs such as `1.0` or a bare UUID.
    Identifier(String),
    /// Decimal or `0x` hexadecimal literal, kept as written.
    LiteralNumber(String),
    /// Double quoted string literal without the quotes.
    LiteralString(String),
    /// End of input. Never produced for real source text.
    Eof,
}

impl TokenKind {
    /// Source spelling of the token.
    pub fn text(&self) -> String {
        match self {
            TokenKind::Keyword(k) => k.as_str().to_string(),
            TokenKind::Attribute(a) => a.as_str().to_string(),
            TokenKind::OpenParen => "(".to_string(),
            TokenKind::CloseParen => ")".to_string(),
            TokenKind::OpenBracket => "[".to_string(),
            TokenKind::CloseBracket => "]".to_string(),
            TokenKind::OpenBrace => "{".to_string(),
            TokenKind::CloseBrace => "}".to_string(),
            TokenKind::Comma => ",".to_string(),
            TokenKind::Colon => ":".to_string(),
            TokenKind::Semicolon => ";".to_string(),
            TokenKind::Dash => "-".to_string(),
            TokenKind::Star => "*".to_string(),
            TokenKind::Assign => "=".to_string(),
            TokenKind::Pipe => "|".to_string(),
            TokenKind::Identifier(s) | TokenKind::LiteralNumber(s) => s.clone(),
            TokenKind::LiteralString(s) => format!("\"{s}\""),
            TokenKind::Eof => String::new(),
        }
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(s) => write!(f, "identifier '{s}'"),
            TokenKind::LiteralNumber(s) => write!(f, "number {s}"),
            TokenKind::LiteralString(s) => write!(f, "string \"{s}\""),
            TokenKind::Eof => write!(f, "end of input"),
            other => write!(f, "'{}'", other.text()),
        }
    }
}

// A full token, including its kind and where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn text(&self) -> String {
        self.kind.text()
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.kind, self.position)
    }
}

/// Read position inside the input. Each scanning step hands back a new
/// cursor instead of mutating one in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    offset: usize,
    line: usize,
    column: usize,
}

impl Cursor {
    const START: Cursor = Cursor {
        offset: 0,
        line: 1,
        column: 1,
    };

    /// The cursor after consuming `c`.
    fn step(self, c: char) -> Cursor {
        if c == '\n' {
            Cursor {
                offset: self.offset + 1,
                line: self.line + 1,
                column: 1,
            }
        } else {
            Cursor {
                offset: self.offset + 1,
                column: self.column + 1,
                ..self
            }
        }
    }

    fn position(self) -> Position {
        Position::new(self.offset, self.line, self.column)
    }
}

/// Characters that may start or continue a literal run.
fn is_literal_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || c == '.'
}

/// Characters that keep a run eligible for keyword lookup.
fn is_keyword_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn punctuation(c: char) -> Option<TokenKind> {
    let kind = match c {
        '(' => TokenKind::OpenParen,
        ')' => TokenKind::CloseParen,
        '[' => TokenKind::OpenBracket,
        ']' => TokenKind::CloseBracket,
        '{' => TokenKind::OpenBrace,
        '}' => TokenKind::CloseBrace,
        ',' => TokenKind::Comma,
        ':' => TokenKind::Colon,
        ';' => TokenKind::Semicolon,
        '*' => TokenKind::Star,
        '=' => TokenKind::Assign,
        '|' => TokenKind::Pipe,
        _ => return None,
    };
    Some(kind)
}

/// Looks a finished run up in the reserved word table.
fn lookup_keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "import" => TokenKind::Keyword(Keyword::Import),
        "interface" => TokenKind::Keyword(Keyword::Interface),
        "cpp_quote" => TokenKind::Keyword(Keyword::CppQuote),
        "midl_pragma" => TokenKind::Keyword(Keyword::MidlPragma),
        "enum" => TokenKind::Keyword(Keyword::Enum),
        "coclass" => TokenKind::Keyword(Keyword::CoClass),
        "typedef" => TokenKind::Keyword(Keyword::Typedef),
        "library" => TokenKind::Keyword(Keyword::Library),
        "importlib" => TokenKind::Keyword(Keyword::ImportLib),
        "module" => TokenKind::Keyword(Keyword::Module),
        "const" => TokenKind::Keyword(Keyword::Const),
        "long" => TokenKind::Keyword(Keyword::Long),
        "struct" => TokenKind::Keyword(Keyword::Struct),
        _ => return AttributeKind::from_keyword(word).map(TokenKind::Attribute),
    };
    Some(kind)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Run {
    Number { hex: bool },
    Word { dotted: bool },
}

/// Turns a buffered byte stream into MIDL tokens, one at a time.
///
/// Outside string literals input bytes are read as Latin-1 characters, which
/// keeps every byte addressable by the literal-run rules. String literal
/// contents are decoded as UTF-8, falling back to lossy decoding for invalid
/// sequences. End of input is a normal
/// terminal state; only genuine failures are reported through
/// [`Lexer::last_error`].
pub struct Lexer<R> {
    reader: R,
    cursor: Cursor,
    current: Token,
    error: Option<LexError>,
    finished: bool,
}

impl<R: BufRead> Lexer<R> {
    /// Creates a new Lexer over a buffered reader.
    pub fn new(reader: R) -> Self {
        Lexer {
            reader,
            cursor: Cursor::START,
            current: Token {
                kind: TokenKind::Eof,
                position: Cursor::START.position(),
            },
            error: None,
            finished: false,
        }
    }

    /// Attempts to produce the next token. Returns `false` once the input is
    /// exhausted or a scan error occurred; [`Lexer::last_error`] tells the two apart.
    pub fn advance(&mut self) -> bool {
        if self.finished {
            return false;
        }
        match self.scan_token() {
            Ok(Some(token)) => {
                trace!("{token}");
                self.current = token;
                true
            }
            Ok(None) => {
                self.finished = true;
                self.current = Token {
                    kind: TokenKind::Eof,
                    position: self.cursor.position(),
                };
                false
            }
            Err(e) => {
                self.finished = true;
                self.error = Some(e);
                false
            }
        }
    }

    /// The most recently produced token, or `Eof` once the input is exhausted.
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// The error that ended the scan, if it did not end at end of input.
    pub fn last_error(&self) -> Option<&LexError> {
        self.error.as_ref()
    }

    /// Hands the terminal error out by value.
    pub fn take_error(&mut self) -> Option<LexError> {
        self.error.take()
    }

    /// Peeks at the next character without consuming it.
    fn peek(&mut self) -> io::Result<Option<char>> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().map(|&b| b as char)),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Consumes the peeked character `c` found at `at`.
    fn bump(&mut self, at: Cursor, c: char) -> Cursor {
        self.reader.consume(1);
        at.step(c)
    }

    /// Skips all whitespace characters.
    fn skip_whitespace(&mut self, mut at: Cursor) -> Result<Cursor, LexError> {
        while let Some(c) = self.peek()? {
            if !matches!(c, ' ' | '\t' | '\r' | '\n') {
                break;
            }
            at = self.bump(at, c);
        }
        Ok(at)
    }

    /// Skips to just past the next newline, or to end of input.
    fn skip_line(&mut self, mut at: Cursor) -> Result<Cursor, LexError> {
        while let Some(c) = self.peek()? {
            at = self.bump(at, c);
            if c == '\n' {
                break;
            }
        }
        Ok(at)
    }

    /// Skips a `//` comment. A lone `/` is an error.
    fn skip_comment(&mut self, at: Cursor) -> Result<Cursor, LexError> {
        let after_slash = self.bump(at, '/');
        match self.peek()? {
            Some('/') => self.skip_line(after_slash),
            _ => Err(LexError::MalformedComment { pos: at.position() }),
        }
    }

    /// Skips whitespace, comments and preprocessor lines. Returns the cursor
    /// and the first significant character, if any.
    fn skip_trivia(&mut self, mut at: Cursor) -> Result<(Cursor, Option<char>), LexError> {
        loop {
            at = self.skip_whitespace(at)?;
            match self.peek()? {
                Some('/') => at = self.skip_comment(at)?,
                Some('#') => at = self.skip_line(at)?,
                other => return Ok((at, other)),
            }
        }
    }

    /// Reads an identifier, keyword or number run starting with `first`.
    fn take_literal(&mut self, at: Cursor, first: char) -> Result<(TokenKind, Cursor), LexError> {
        let mut at = self.bump(at, first);
        let mut text = String::from(first);
        let mut run = if first.is_ascii_digit() {
            Run::Number { hex: false }
        } else {
            Run::Word {
                dotted: !is_keyword_char(first),
            }
        };

        while let Some(c) = self.peek()? {
            run = match run {
                Run::Number { hex } if c.is_ascii_digit() || (hex && c.is_ascii_hexdigit()) => run,
                Run::Number { .. } if text == "0" && (c == 'x' || c == 'X') => {
                    Run::Number { hex: true }
                }
                Run::Number { .. } if is_literal_char(c) => Run::Word {
                    dotted: !is_keyword_char(c),
                },
                Run::Word { .. } if is_keyword_char(c) => run,
                Run::Word { .. } if is_literal_char(c) => Run::Word { dotted: true },
                _ => break,
            };
            text.push(c);
            at = self.bump(at, c);
        }

        let kind = match run {
            Run::Number { .. } => TokenKind::LiteralNumber(text),
            Run::Word { .. } if text == "-" => TokenKind::Dash,
            Run::Word { dotted: false } => {
                lookup_keyword(&text).unwrap_or(TokenKind::Identifier(text))
            }
            Run::Word { dotted: true } => TokenKind::Identifier(text),
        };
        Ok((kind, at))
    }

    /// Reads a string literal. No escape sequences are recognised.
    fn take_string(&mut self, start: Cursor) -> Result<(TokenKind, Cursor), LexError> {
        let mut at = self.bump(start, '"');
        let mut bytes = Vec::new();
        while let Some(c) = self.peek()? {
            at = self.bump(at, c);
            if c == '"' {
                let value = String::from_utf8(bytes)
                    .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
                return Ok((TokenKind::LiteralString(value), at));
            }
            // `peek` maps each byte to the char of the same value.
            bytes.push(c as u8);
        }
        Err(LexError::UnterminatedString {
            pos: start.position(),
        })
    }

    fn scan_token(&mut self) -> Result<Option<Token>, LexError> {
        let (start, next) = self.skip_trivia(self.cursor)?;
        self.cursor = start;

        let Some(c) = next else {
            return Ok(None);
        };

        let (kind, end) = if is_literal_char(c) {
            self.take_literal(start, c)?
        } else if c == '"' {
            self.take_string(start)?
        } else if let Some(kind) = punctuation(c) {
            (kind, self.bump(start, c))
        } else {
            return Err(LexError::UnexpectedChar {
                ch: c,
                pos: start.position(),
            });
        };

        self.cursor = end;
        Ok(Some(Token {
            kind,
            position: start.position(),
        }))
    }
}

impl<'a> From<&'a str> for Lexer<&'a [u8]> {
    fn from(source: &'a str) -> Self {
        Lexer::new(source.as_bytes())
    }
}

/// Yields tokens until end of input. A scan error is yielded once, after
/// which the iterator is exhausted.
impl<R: BufRead> Iterator for Lexer<R> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.advance() {
            Some(Ok(self.current.clone()))
        } else {
            self.take_error().map(Err)
        }
    }
}
