use std::fmt::Write;

use log::debug;

use crate::{
    ast::{
        Attribute, AttributeKind, ConstValue, Declaration, EnumDef, InterfaceDef, MethodDef,
        ModuleConstant, PassThroughKind, ResolvedValue, StructDef, TypedefDef, attribute_value,
        find_interface, parse_integer,
    },
    generators::{CodeGenerator, CompileError, Diagnostic, GeneratedSource},
};

/// Configuration settings specific to Rust code generation
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Name of the module that wraps every generated item.
    pub package_name: String,
    /// Path of the crate or module providing platform types such as
    /// `HRESULT`, `GUID` and `IUnknownVtbl`.
    pub types_path: String,
    /// Number of spaces to use for each indentation level.
    pub indent_spaces: u8,
    /// Whether to start the file with a "generated" banner.
    pub header: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            package_name: "idl".to_string(),
            types_path: "wintypes".to_string(),
            indent_spaces: 4,
            header: true,
        }
    }
}

/// The unified method list of an interface, parents first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable<'a> {
    /// The nearest ancestor not declared in the input. Its vtable is
    /// embedded ahead of every slot listed in `methods`.
    pub base: Option<&'a str>,
    /// Slots in dispatch order.
    pub methods: Vec<&'a MethodDef>,
}

pub struct RustGenerator {
    /// The configuration settings for the generated Rust code.
    config: GeneratorConfig,
    /// Buffer the file is composed in.
    out: String,
    /// The current indentation level.
    current_indent_level: u8,
    diagnostics: Vec<Diagnostic>,
}

impl Default for RustGenerator {
    fn default() -> Self {
        RustGenerator::new(None)
    }
}

impl RustGenerator {
    /// Creates a new `RustGenerator` instance.
    ///
    /// # Arguments
    ///
    /// * `config` - Optional configuration; uses default if None is provided.
    pub fn new(config: Option<GeneratorConfig>) -> Self {
        RustGenerator {
            config: config.unwrap_or_default(),
            out: String::new(),
            current_indent_level: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Resolves the dispatch order of `interface`: the slots of every ancestor
    /// declared in `declarations`, outermost first, then its own methods.
    pub fn dispatch_table<'a>(
        declarations: &'a [Declaration],
        interface: &'a InterfaceDef,
    ) -> DispatchTable<'a> {
        let mut chain = vec![interface];
        let mut base = None;

        let mut current = interface;
        while let Some(parent) = current.parent.as_deref() {
            match find_interface(declarations, parent) {
                Some(found) if !chain.iter().any(|i| i.name == found.name) => {
                    chain.push(found);
                    current = found;
                }
                Some(_) => break,
                None => {
                    base = Some(parent);
                    break;
                }
            }
        }

        DispatchTable {
            base,
            methods: chain
                .into_iter()
                .rev()
                .flat_map(|i| &i.methods)
                .collect(),
        }
    }

    /// Helper function to write a line with the appropriate indentation.
    fn write_line(&mut self, content: &str) -> Result<(), CompileError> {
        let width = self.current_indent_level as usize * self.config.indent_spaces as usize;
        let indent = " ".repeat(width);
        writeln!(&mut self.out, "{indent}{content}")?;
        Ok(())
    }

    fn blank_line(&mut self) {
        self.out.push('\n');
    }

    /// Increases the current indentation level.
    pub fn increase_indent(&mut self) {
        self.current_indent_level += 1;
    }

    /// Decreases the current indentation level, preventing it from going below zero.
    pub fn decrease_indent(&mut self) {
        if self.current_indent_level > 0 {
            self.current_indent_level -= 1;
        }
    }

    /// Emits `helpstring` text as a doc comment.
    fn write_docs(&mut self, attributes: &[Attribute]) -> Result<(), CompileError> {
        if let Some(help) = attribute_value(attributes, AttributeKind::HelpString) {
            for line in help.lines() {
                self.write_line(&format!("/// {line}"))?;
            }
        }
        Ok(())
    }

    fn generate_declarations(
        &mut self,
        root: &[Declaration],
        declarations: &[Declaration],
    ) -> Result<(), CompileError> {
        for decl in declarations {
            match decl {
                Declaration::Import(files) => debug!("dropping import of {}", files.join(", ")),
                Declaration::ImportLib(file) => debug!("dropping importlib of {file}"),
                Declaration::Struct(s) => self.generate_struct(s)?,
                Declaration::Enum(e) => self.generate_enum(e)?,
                Declaration::Typedef(t) => self.generate_typedef(t)?,
                Declaration::Interface(i) => self.generate_interface(root, i)?,
                Declaration::Library(l) => {
                    self.generate_block(root, &l.name, &l.attributes, &l.declarations)?
                }
                Declaration::Module(m) => {
                    self.generate_block(root, &m.name, &m.attributes, &m.declarations)?
                }
                Declaration::Constant(c) => self.generate_constant(c)?,
                Declaration::PassThrough { kind, text } => self.generate_pass_through(*kind, text)?,
                Declaration::CoClass(_) => {
                    let diagnostic = Diagnostic::unsupported(
                        decl,
                        "component classes have no Rust emission rule",
                    );
                    self.diagnostics.push(diagnostic);
                    continue;
                }
            }
            if let Some(name) = decl.name() {
                debug!("emitted {} {name}", decl.kind_name());
            }
        }
        Ok(())
    }

    fn generate_struct(&mut self, s: &StructDef) -> Result<(), CompileError> {
        self.blank_line();
        self.write_docs(&s.attributes)?;
        self.write_line("#[repr(C)]")?;
        self.write_line(&format!("pub struct {} {{", rust_ident(&s.name)))?;
        self.increase_indent();
        for field in &s.fields {
            let ty = if field.array {
                format!("[{}; 0]", rust_type(&field.type_name, field.indirection))
            } else {
                rust_type(&field.type_name, field.indirection)
            };
            self.write_line(&format!("pub {}: {ty},", rust_ident(&field.name)))?;
        }
        self.decrease_indent();
        self.write_line("}")
    }

    fn generate_enum(&mut self, e: &EnumDef) -> Result<(), CompileError> {
        let type_name = rust_ident(&e.name);
        self.blank_line();
        self.write_docs(&e.attributes)?;
        self.write_line(&format!("pub type {type_name} = i32;"))?;

        // Members left out of the output; later references to them are dropped too.
        let mut skipped: Vec<&str> = Vec::new();
        for (value, (name, resolved)) in e.values.iter().zip(e.resolve_values()) {
            let rendered = match (&value.value, resolved) {
                (_, ResolvedValue::Known(v)) if !fits_in_32_bits(v) => None,
                // Explicit values keep their written form.
                (Some(expr), _) => expr
                    .operands
                    .iter()
                    .map(|op| {
                        if skipped.contains(&op.as_str()) {
                            None
                        } else {
                            enum_operand(op)
                        }
                    })
                    .collect::<Option<Vec<_>>>()
                    .map(|ops| ops.join(" | ")),
                (None, ResolvedValue::Known(v)) => Some(i32_literal(v)),
                (None, ResolvedValue::Offset { base, .. }) if skipped.contains(&base.as_str()) => {
                    None
                }
                (None, ResolvedValue::Offset { base, offset }) => {
                    Some(format!("{} + {offset}", rust_ident(&base)))
                }
                (None, ResolvedValue::Verbatim(expr)) => Some(expr),
            };

            match rendered {
                Some(rendered) => self.write_line(&format!(
                    "pub const {}: {type_name} = {rendered};",
                    rust_ident(name)
                ))?,
                None => {
                    skipped.push(name);
                    self.diagnostics.push(Diagnostic::new(
                        "enum",
                        Some(e.name.clone()),
                        format!("value of '{name}' does not fit in 32 bits"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn generate_typedef(&mut self, t: &TypedefDef) -> Result<(), CompileError> {
        if t.indirection == 0 && t.name == t.type_name {
            debug!("skipping self alias {}", t.name);
            return Ok(());
        }
        self.blank_line();
        self.write_docs(&t.attributes)?;
        self.write_line(&format!(
            "pub type {} = {};",
            rust_ident(&t.name),
            rust_type(&t.type_name, t.indirection)
        ))
    }

    fn generate_interface(
        &mut self,
        root: &[Declaration],
        i: &InterfaceDef,
    ) -> Result<(), CompileError> {
        let table = Self::dispatch_table(root, i);
        let vtbl = format!("{}Vtbl", i.name);

        self.blank_line();
        self.write_docs(&i.attributes)?;
        if let Some(uuid) = attribute_value(&i.attributes, AttributeKind::Uuid) {
            self.write_line(&format!("/// IID: {uuid}"))?;
        }
        self.write_line("#[repr(C)]")?;
        self.write_line(&format!("pub struct {} {{", rust_ident(&i.name)))?;
        self.increase_indent();
        self.write_line(&format!("pub vtbl: *const {vtbl},"))?;
        self.decrease_indent();
        self.write_line("}")?;

        self.blank_line();
        self.write_line("#[repr(C)]")?;
        self.write_line(&format!("pub struct {vtbl} {{"))?;
        self.increase_indent();
        if let Some(base) = table.base {
            self.write_line(&format!("pub base: {base}Vtbl,"))?;
        }
        for method in &table.methods {
            let slot = method_slot(&i.name, method);
            self.write_line(&format!("pub {}: {slot},", rust_ident(&method.name)))?;
        }
        self.decrease_indent();
        self.write_line("}")
    }

    fn generate_block(
        &mut self,
        root: &[Declaration],
        name: &str,
        attributes: &[Attribute],
        declarations: &[Declaration],
    ) -> Result<(), CompileError> {
        self.blank_line();
        self.write_docs(attributes)?;
        self.write_line(&format!("pub mod {} {{", rust_ident(name)))?;
        self.increase_indent();
        self.write_line("use super::*;")?;
        self.generate_declarations(root, declarations)?;
        self.decrease_indent();
        self.write_line("}")
    }

    fn generate_constant(&mut self, c: &ModuleConstant) -> Result<(), CompileError> {
        self.blank_line();
        let line = match &c.value {
            ConstValue::Str(s) => format!("pub const {}: &str = {s:?};", rust_ident(&c.name)),
            ConstValue::Expr(expr) => {
                let (base, indirection) = split_pointer_suffix(&c.type_name);
                let value = expr
                    .operands
                    .iter()
                    .map(|op| const_operand(op))
                    .collect::<Vec<_>>()
                    .join(" | ");
                format!(
                    "pub const {}: {} = {value};",
                    rust_ident(&c.name),
                    rust_type(base, indirection)
                )
            }
        };
        self.write_line(&line)
    }

    /// Pass-through directives are kept as line comments.
    fn generate_pass_through(&mut self, kind: PassThroughKind, text: &str) -> Result<(), CompileError> {
        let directive = match kind {
            PassThroughKind::CppQuote => "cpp_quote",
            PassThroughKind::MidlPragma => "midl_pragma",
        };
        self.blank_line();
        for line in text.lines() {
            self.write_line(&format!("// {directive}: {line}"))?;
        }
        Ok(())
    }
}

impl CodeGenerator for RustGenerator {
    fn generate(&mut self, declarations: &[Declaration]) -> Result<GeneratedSource, CompileError> {
        self.out.clear();
        self.diagnostics.clear();
        self.current_indent_level = 0;

        if declarations.is_empty() {
            return Ok(GeneratedSource::default());
        }

        if self.config.header {
            self.write_line("// Generated from MIDL by comidl. Do not edit.")?;
            self.blank_line();
        }
        let package = rust_ident(&self.config.package_name);
        self.write_line(&format!("pub mod {package} {{"))?;
        self.increase_indent();
        self.write_line(
            "#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals, dead_code, unused_imports)]",
        )?;
        self.blank_line();
        self.write_line("use core::ffi::c_void;")?;
        let types_path = self.config.types_path.clone();
        self.write_line(&format!("use {types_path}::*;"))?;

        self.generate_declarations(declarations, declarations)?;

        self.decrease_indent();
        self.write_line("}")?;

        Ok(GeneratedSource {
            source: std::mem::take(&mut self.out),
            diagnostics: std::mem::take(&mut self.diagnostics),
        })
    }
}

/// Renders one vtable slot as an `extern "system"` function pointer type.
fn method_slot(interface: &str, method: &MethodDef) -> String {
    let mut params = vec![format!("this: *mut {}", rust_ident(interface))];
    for param in &method.params {
        let indirection = param.indirection + usize::from(param.array);
        params.push(format!(
            "{}: {}",
            rust_ident(&param.name),
            rust_type(&param.type_name, indirection)
        ));
    }

    let (ret, indirection) = split_pointer_suffix(&method.return_type);
    let ret = if indirection == 0 && ret == "void" {
        String::new()
    } else {
        format!(" -> {}", rust_type(ret, indirection))
    };

    format!("unsafe extern \"system\" fn({}){ret}", params.join(", "))
}

/// Splits `BSTR**` into `("BSTR", 2)`.
fn split_pointer_suffix(type_name: &str) -> (&str, usize) {
    let base = type_name.trim_end_matches('*');
    (base, type_name.len() - base.len())
}

/// Maps an IDL type and pointer depth to a Rust type. Names that are not IDL
/// base types are left for the external type library to resolve.
pub fn rust_type(type_name: &str, indirection: usize) -> String {
    let words: Vec<&str> = type_name.split_whitespace().collect();
    let is_const = words.contains(&"const");
    let base = words
        .iter()
        .copied()
        .filter(|w| *w != "const")
        .collect::<Vec<_>>()
        .join(" ");

    let mut ty = match base.as_str() {
        "long" | "int" | "long int" | "signed" | "signed long" | "signed int" | "__int32" => {
            "i32".to_string()
        }
        "unsigned" | "unsigned long" | "unsigned int" | "unsigned long int" | "unsigned __int32" => {
            "u32".to_string()
        }
        "short" | "short int" | "signed short" => "i16".to_string(),
        "unsigned short" | "unsigned short int" | "wchar_t" => "u16".to_string(),
        "char" | "signed char" | "small" => "i8".to_string(),
        "unsigned char" | "unsigned small" | "byte" | "boolean" => "u8".to_string(),
        "hyper" | "long long" | "__int64" => "i64".to_string(),
        "unsigned hyper" | "unsigned long long" | "unsigned __int64" => "u64".to_string(),
        "float" => "f32".to_string(),
        "double" => "f64".to_string(),
        "void" => "c_void".to_string(),
        other => rust_ident(other),
    };

    for level in 0..indirection {
        ty = if level == 0 && is_const {
            format!("*const {ty}")
        } else {
            format!("*mut {ty}")
        };
    }
    ty
}

fn fits_in_32_bits(value: i64) -> bool {
    (i64::from(i32::MIN)..=i64::from(u32::MAX)).contains(&value)
}

/// Writes `value` as an `i32` expression. Values above `i32::MAX` are
/// taken as unsigned bit patterns.
fn i32_literal(value: i64) -> String {
    if value > i64::from(i32::MAX) {
        format!("({value}u32 as i32)")
    } else {
        value.to_string()
    }
}

/// Renders an enum operand as a Rust `i32` expression, or `None` when the
/// literal does not fit in 32 bits.
fn enum_operand(operand: &str) -> Option<String> {
    let Some(value) = parse_integer(operand) else {
        return Some(rust_ident(operand));
    };
    let literal = operand.trim_end_matches(['l', 'L', 'u', 'U']);
    let is_hex = literal.starts_with("0x") || literal.starts_with("0X");

    if literal.starts_with('-') {
        i32::try_from(value).ok().map(|_| literal.to_string())
    } else if is_hex && value < 0 {
        // Hex bit patterns above i32::MAX.
        Some(format!("({literal}u32 as i32)"))
    } else if value > i64::from(i32::MAX) && value <= i64::from(u32::MAX) {
        Some(format!("({literal}u32 as i32)"))
    } else if i32::try_from(value).is_ok() {
        Some(literal.to_string())
    } else {
        None
    }
}

/// Renders a constant operand. Literals take the declared type of the constant.
fn const_operand(operand: &str) -> String {
    match parse_integer(operand) {
        Some(_) => operand.trim_end_matches(['l', 'L', 'u', 'U']).to_string(),
        None => rust_ident(operand),
    }
}

const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

/// Escapes names that collide with Rust keywords.
pub fn rust_ident(name: &str) -> String {
    match name {
        // These cannot be raw identifiers.
        "self" | "Self" | "super" | "crate" => format!("{name}_"),
        _ if RUST_KEYWORDS.contains(&name) => format!("r#{name}"),
        _ => name.to_string(),
    }
}
