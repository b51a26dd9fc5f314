use std::fmt;

/// Represents the attribute keywords that may appear inside `[ ... ]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    /// `object`: the interface is a COM object interface.
    Object,
    /// `uuid(...)`: the interface or class identifier.
    Uuid,
    /// `version(major.minor)`.
    Version,
    /// `pointer_default(kind)`.
    PointerDefault,
    /// `oleautomation`.
    OleAutomation,
    /// `lcid(n)`: locale identifier of a library.
    Lcid,
    /// `dllname("file")`: the DLL exporting a module's entry points.
    DllName,
    /// `helpstring("text")`.
    HelpString,
    /// `default`: the default interface of a coclass.
    Default,
    /// `local`.
    Local,
    /// `string`: a pointer to a NUL-terminated string.
    String,
    /// `retval`: the parameter receives the method's logical return value.
    Retval,
    /// `size_is(expr)`.
    SizeIs,
    /// `propget`.
    PropGet,
    /// `propput`.
    PropPut,
    /// `noncreatable`.
    NonCreatable,
    /// `v1_enum`: the enum is transmitted as 32 bits.
    V1Enum,
    /// `in`: parameter attribute.
    In,
    /// `out`: parameter attribute.
    Out,
    /// `annotation("...")`: parameter attribute.
    Annotation,
    /// `max_is(expr)`: parameter attribute.
    MaxIs,
    /// `unique`: parameter attribute.
    Unique,
    /// `iid_is(expr)`: parameter attribute.
    IidIs,
}

impl AttributeKind {
    /// Matches an attribute keyword as written in IDL source.
    pub fn from_keyword(word: &str) -> Option<Self> {
        let kind = match word {
            "object" => AttributeKind::Object,
            "uuid" => AttributeKind::Uuid,
            "version" => AttributeKind::Version,
            "pointer_default" => AttributeKind::PointerDefault,
            "oleautomation" => AttributeKind::OleAutomation,
            "lcid" => AttributeKind::Lcid,
            "dllname" => AttributeKind::DllName,
            "helpstring" => AttributeKind::HelpString,
            "default" => AttributeKind::Default,
            "local" => AttributeKind::Local,
            "string" => AttributeKind::String,
            "retval" => AttributeKind::Retval,
            "size_is" => AttributeKind::SizeIs,
            "propget" => AttributeKind::PropGet,
            "propput" => AttributeKind::PropPut,
            "noncreatable" => AttributeKind::NonCreatable,
            "v1_enum" => AttributeKind::V1Enum,
            "in" => AttributeKind::In,
            "out" => AttributeKind::Out,
            "annotation" => AttributeKind::Annotation,
            "max_is" => AttributeKind::MaxIs,
            "unique" => AttributeKind::Unique,
            "iid_is" => AttributeKind::IidIs,
            _ => return None,
        };
        Some(kind)
    }

    /// The keyword as written in IDL source.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeKind::Object => "object",
            AttributeKind::Uuid => "uuid",
            AttributeKind::Version => "version",
            AttributeKind::PointerDefault => "pointer_default",
            AttributeKind::OleAutomation => "oleautomation",
            AttributeKind::Lcid => "lcid",
            AttributeKind::DllName => "dllname",
            AttributeKind::HelpString => "helpstring",
            AttributeKind::Default => "default",
            AttributeKind::Local => "local",
            AttributeKind::String => "string",
            AttributeKind::Retval => "retval",
            AttributeKind::SizeIs => "size_is",
            AttributeKind::PropGet => "propget",
            AttributeKind::PropPut => "propput",
            AttributeKind::NonCreatable => "noncreatable",
            AttributeKind::V1Enum => "v1_enum",
            AttributeKind::In => "in",
            AttributeKind::Out => "out",
            AttributeKind::Annotation => "annotation",
            AttributeKind::MaxIs => "max_is",
            AttributeKind::Unique => "unique",
            AttributeKind::IidIs => "iid_is",
        }
    }

    /// Whether the keyword belongs to the parameter attribute class.
    pub fn is_param_attribute(&self) -> bool {
        matches!(
            self,
            AttributeKind::In
                | AttributeKind::Out
                | AttributeKind::Annotation
                | AttributeKind::MaxIs
                | AttributeKind::Unique
                | AttributeKind::IidIs
        )
    }
}

/// Represents one entry of an attribute list: `name` or `name(value)`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Attribute {
    /// The attribute keyword.
    pub kind: AttributeKind,
    /// The single argument given in parentheses, if any.
    pub value: Option<String>,
}

impl Attribute {
    pub fn new(kind: AttributeKind) -> Self {
        Attribute { kind, value: None }
    }

    pub fn with_value(kind: AttributeKind, value: impl Into<String>) -> Self {
        Attribute {
            kind,
            value: Some(value.into()),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}({v})", self.kind.as_str()),
            None => f.write_str(self.kind.as_str()),
        }
    }
}

/// Finds the value of the first attribute of `kind` in `attributes`.
pub fn attribute_value(attributes: &[Attribute], kind: AttributeKind) -> Option<&str> {
    attributes
        .iter()
        .find(|a| a.kind == kind)
        .and_then(|a| a.value.as_deref())
}

// --- Interfaces ---

/// Represents a method parameter.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Param {
    /// Parameter attributes such as `in`, `out` or `size_is(n)`.
    pub attributes: Vec<Attribute>,
    /// The base type name, e.g. `long` or `unsigned long` or `BSTR`.
    pub type_name: String,
    /// Number of `*` following the type.
    pub indirection: usize,
    /// The parameter name.
    pub name: String,
    /// Set by a trailing `[]`.
    pub array: bool,
}

/// Represents a method of an interface.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MethodDef {
    /// The name of the method.
    pub name: String,
    /// The declared return type, usually `HRESULT`.
    pub return_type: String,
    /// Parameters in declaration order.
    pub params: Vec<Param>,
    /// Attributes such as `propget` placed before the method.
    pub attributes: Vec<Attribute>,
}

/// Represents an interface definition.
///
/// The order of `methods` is the order of the native dispatch table and
/// must never be changed.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct InterfaceDef {
    /// The name of the interface.
    pub name: String,
    /// The single parent interface, if any.
    pub parent: Option<String>,
    /// Attributes from the list preceding the `interface` keyword.
    pub attributes: Vec<Attribute>,
    /// Methods in declaration order.
    pub methods: Vec<MethodDef>,
}

// --- Enum Definition ---

/// An explicit constant expression: operands combined with bitwise or.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ConstExpr {
    /// Literal numbers or names, in source order. Never empty.
    pub operands: Vec<String>,
}

impl ConstExpr {
    pub fn single(operand: impl Into<String>) -> Self {
        ConstExpr {
            operands: vec![operand.into()],
        }
    }
}

impl fmt::Display for ConstExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.operands.join(" | "))
    }
}

/// Represents a value within an enum.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct EnumValue {
    /// The name of the value.
    pub name: String,
    /// The optional explicit value.
    pub value: Option<ConstExpr>,
}

/// Represents an enum definition.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct EnumDef {
    /// The name of the enum.
    pub name: String,
    /// Attributes such as `v1_enum`.
    pub attributes: Vec<Attribute>,
    /// The list of values in the enum.
    pub values: Vec<EnumValue>,
}

/// The value an enum constant ends up with.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ResolvedValue {
    /// Fully evaluated.
    Known(i64),
    /// An explicit expression that refers to names outside the enum.
    Verbatim(String),
    /// An implicit value following a verbatim one: `base + offset`.
    Offset { base: String, offset: i64 },
}

impl EnumDef {
    /// Computes the value of every constant, in order.
    ///
    /// Implicit values are the previous value plus one, or zero for the first.
    /// When the addition would overflow, the value becomes an offset from the
    /// previous name.
    /// Explicit expressions are evaluated when every operand is a literal or an
    /// earlier value of this enum.
    pub fn resolve_values(&self) -> Vec<(&str, ResolvedValue)> {
        let mut resolved: Vec<(&str, ResolvedValue)> = Vec::with_capacity(self.values.len());

        for value in &self.values {
            let next = match &value.value {
                Some(expr) => evaluate(expr, &resolved)
                    .map(ResolvedValue::Known)
                    .unwrap_or_else(|| ResolvedValue::Verbatim(expr.to_string())),
                None => match resolved.last() {
                    None => ResolvedValue::Known(0),
                    Some((prev, ResolvedValue::Known(v))) => match v.checked_add(1) {
                        Some(next) => ResolvedValue::Known(next),
                        None => ResolvedValue::Offset {
                            base: prev.to_string(),
                            offset: 1,
                        },
                    },
                    Some((prev, ResolvedValue::Verbatim(_))) => ResolvedValue::Offset {
                        base: prev.to_string(),
                        offset: 1,
                    },
                    Some((prev, ResolvedValue::Offset { base, offset })) => {
                        match offset.checked_add(1) {
                            Some(next) => ResolvedValue::Offset {
                                base: base.clone(),
                                offset: next,
                            },
                            None => ResolvedValue::Offset {
                                base: prev.to_string(),
                                offset: 1,
                            },
                        }
                    }
                },
            };
            resolved.push((value.name.as_str(), next));
        }

        resolved
    }
}

/// Parses a decimal or hexadecimal integer literal, allowing a leading `-`
/// and trailing `L`/`U` suffixes.
pub fn parse_integer(literal: &str) -> Option<i64> {
    let trimmed = literal.trim_end_matches(['l', 'L', 'u', 'U']);
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        // Hex constants like 0x80000000 are bit patterns, not signed values.
        u32::from_str_radix(hex, 16)
            .map(|v| v as i32 as i64)
            .or_else(|_| i64::from_str_radix(hex, 16))
            .ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn evaluate(expr: &ConstExpr, earlier: &[(&str, ResolvedValue)]) -> Option<i64> {
    expr.operands.iter().try_fold(0i64, |acc, operand| {
        let v = parse_integer(operand).or_else(|| {
            earlier.iter().rev().find_map(|(name, value)| match value {
                ResolvedValue::Known(v) if *name == operand.as_str() => Some(*v),
                _ => None,
            })
        })?;
        Some(acc | v)
    })
}

// --- Struct Definition ---

/// Represents a field within a struct.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StructField {
    /// The type of the field.
    pub type_name: String,
    /// Number of `*` following the type.
    pub indirection: usize,
    /// The name of the field.
    pub name: String,
    /// Set by a trailing `[]`.
    pub array: bool,
    /// Field attributes such as `size_is(n)`.
    pub attributes: Vec<Attribute>,
}

/// Represents a struct definition. Field order is the storage layout.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StructDef {
    /// The name of the struct.
    pub name: String,
    /// Attributes preceding the struct.
    pub attributes: Vec<Attribute>,
    /// The fields contained in the struct.
    pub fields: Vec<StructField>,
}

/// Represents `typedef [attrs] type name;`.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TypedefDef {
    /// The alias being introduced.
    pub name: String,
    /// The aliased type name.
    pub type_name: String,
    /// Number of `*` following the type.
    pub indirection: usize,
    /// Attributes between `typedef` and the type.
    pub attributes: Vec<Attribute>,
}

/// Represents a component class and the interfaces it implements.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CoClassDef {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Interface references in declaration order. They carry no methods.
    pub interfaces: Vec<InterfaceDef>,
}

/// Represents a `library` block.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct LibraryDef {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Nested declarations in source order.
    pub declarations: Vec<Declaration>,
}

/// Represents a `module` block.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ModuleDef {
    pub name: String,
    pub attributes: Vec<Attribute>,
    /// Nested declarations in source order.
    pub declarations: Vec<Declaration>,
}

/// The value of a `const` declaration.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ConstValue {
    Str(String),
    Expr(ConstExpr),
}

/// Represents `const type name = value;` inside a library or module.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ModuleConstant {
    pub name: String,
    pub type_name: String,
    pub value: ConstValue,
}

/// Which directive produced a pass-through declaration.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PassThroughKind {
    CppQuote,
    MidlPragma,
}

// --- Top-Level Definitions ---

/// Represents a declaration, at top level or nested in a library or module.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Declaration {
    /// `import "a.idl", ...;` with at least one file.
    Import(Vec<String>),
    Interface(InterfaceDef),
    Enum(EnumDef),
    Struct(StructDef),
    Typedef(TypedefDef),
    CoClass(CoClassDef),
    Library(LibraryDef),
    Module(ModuleDef),
    /// `importlib("file");`
    ImportLib(String),
    Constant(ModuleConstant),
    /// Directive text carried through uninterpreted.
    PassThrough { kind: PassThroughKind, text: String },
}

impl Declaration {
    /// Returns the declared name, if the declaration has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Declaration::Interface(i) => Some(&i.name),
            Declaration::Enum(e) => Some(&e.name),
            Declaration::Struct(s) => Some(&s.name),
            Declaration::Typedef(t) => Some(&t.name),
            Declaration::CoClass(c) => Some(&c.name),
            Declaration::Library(l) => Some(&l.name),
            Declaration::Module(m) => Some(&m.name),
            Declaration::Constant(c) => Some(&c.name),
            Declaration::Import(_) | Declaration::ImportLib(_) | Declaration::PassThrough { .. } => {
                None
            }
        }
    }

    /// Short human readable name of the declaration kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Declaration::Import(_) => "import",
            Declaration::Interface(_) => "interface",
            Declaration::Enum(_) => "enum",
            Declaration::Struct(_) => "struct",
            Declaration::Typedef(_) => "typedef",
            Declaration::CoClass(_) => "coclass",
            Declaration::Library(_) => "library",
            Declaration::Module(_) => "module",
            Declaration::ImportLib(_) => "importlib",
            Declaration::Constant(_) => "const",
            Declaration::PassThrough {
                kind: PassThroughKind::CppQuote,
                ..
            } => "cpp_quote",
            Declaration::PassThrough {
                kind: PassThroughKind::MidlPragma,
                ..
            } => "midl_pragma",
        }
    }
}

/// Searches `declarations`, including nested libraries and modules, for the
/// interface named `name`.
pub fn find_interface<'a>(declarations: &'a [Declaration], name: &str) -> Option<&'a InterfaceDef> {
    declarations.iter().find_map(|decl| match decl {
        Declaration::Interface(i) if i.name == name => Some(i),
        Declaration::Library(l) => find_interface(&l.declarations, name),
        Declaration::Module(m) => find_interface(&m.declarations, name),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enum_def(values: &[(&str, Option<&[&str]>)]) -> EnumDef {
        EnumDef {
            name: "E".to_string(),
            attributes: vec![],
            values: values
                .iter()
                .map(|(name, value)| EnumValue {
                    name: name.to_string(),
                    value: value.map(|ops| ConstExpr {
                        operands: ops.iter().map(|s| s.to_string()).collect(),
                    }),
                })
                .collect(),
        }
    }

    #[test]
    fn test_attribute_keyword_table() {
        assert_eq!(AttributeKind::from_keyword("iid_is"), Some(AttributeKind::IidIs));
        assert_eq!(AttributeKind::from_keyword("interface"), None);
        assert_eq!(AttributeKind::PointerDefault.as_str(), "pointer_default");
        assert!(AttributeKind::Unique.is_param_attribute());
        assert!(!AttributeKind::Retval.is_param_attribute());
    }

    #[test]
    fn test_attribute_display() {
        assert_eq!(Attribute::new(AttributeKind::Object).to_string(), "object");
        assert_eq!(
            Attribute::with_value(AttributeKind::SizeIs, "cb").to_string(),
            "size_is(cb)"
        );
    }

    #[test]
    fn test_implicit_values_count_from_zero() {
        let e = enum_def(&[("RED", None), ("GREEN", None), ("BLUE", None)]);
        let values: Vec<_> = e.resolve_values();
        assert_eq!(
            values,
            vec![
                ("RED", ResolvedValue::Known(0)),
                ("GREEN", ResolvedValue::Known(1)),
                ("BLUE", ResolvedValue::Known(2)),
            ]
        );
    }

    #[test]
    fn test_implicit_value_follows_explicit() {
        let e = enum_def(&[("A", None), ("B", Some(&["5"][..])), ("C", None)]);
        let values = e.resolve_values();
        assert_eq!(values[0].1, ResolvedValue::Known(0));
        assert_eq!(values[1].1, ResolvedValue::Known(5));
        assert_eq!(values[2].1, ResolvedValue::Known(6));
    }

    #[test]
    fn test_bit_or_of_earlier_values() {
        let e = enum_def(&[
            ("READ", Some(&["0x1"][..])),
            ("WRITE", Some(&["0x2"][..])),
            ("BOTH", Some(&["READ", "WRITE"][..])),
            ("NEXT", None),
        ]);
        let values = e.resolve_values();
        assert_eq!(values[2].1, ResolvedValue::Known(3));
        assert_eq!(values[3].1, ResolvedValue::Known(4));
    }

    #[test]
    fn test_unknown_operand_stays_verbatim() {
        let e = enum_def(&[("A", Some(&["OTHER_FLAG", "1"][..])), ("B", None), ("C", None)]);
        let values = e.resolve_values();
        assert_eq!(values[0].1, ResolvedValue::Verbatim("OTHER_FLAG | 1".to_string()));
        assert_eq!(
            values[1].1,
            ResolvedValue::Offset {
                base: "A".to_string(),
                offset: 1
            }
        );
        assert_eq!(
            values[2].1,
            ResolvedValue::Offset {
                base: "A".to_string(),
                offset: 2
            }
        );
    }

    #[test]
    fn test_implicit_value_after_maximum_does_not_overflow() {
        let e = enum_def(&[("A", Some(&["9223372036854775807"][..])), ("B", None)]);
        let values = e.resolve_values();
        assert_eq!(values[0].1, ResolvedValue::Known(i64::MAX));
        assert_eq!(
            values[1].1,
            ResolvedValue::Offset {
                base: "A".to_string(),
                offset: 1
            }
        );
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("-1"), Some(-1));
        assert_eq!(parse_integer("0x1F"), Some(31));
        assert_eq!(parse_integer("0x80000000"), Some(i32::MIN as i64));
        assert_eq!(parse_integer("10L"), Some(10));
        assert_eq!(parse_integer("NAME"), None);
    }

    #[test]
    fn test_find_interface_in_library() {
        let inner = InterfaceDef {
            name: "IInner".to_string(),
            parent: None,
            attributes: vec![],
            methods: vec![],
        };
        let decls = vec![Declaration::Library(LibraryDef {
            name: "Lib".to_string(),
            attributes: vec![],
            declarations: vec![Declaration::Interface(inner.clone())],
        })];
        assert_eq!(find_interface(&decls, "IInner"), Some(&inner));
        assert_eq!(find_interface(&decls, "IMissing"), None);
    }

    #[test]
    fn test_declaration_helpers() {
        let decl = Declaration::Import(vec!["a.idl".to_string()]);
        assert_eq!(decl.name(), None);
        assert_eq!(decl.kind_name(), "import");

        let decl = Declaration::Typedef(TypedefDef {
            name: "MyLong".to_string(),
            type_name: "long".to_string(),
            indirection: 0,
            attributes: vec![],
        });
        assert_eq!(decl.name(), Some("MyLong"));
        assert_eq!(decl.kind_name(), "typedef");
    }
}
