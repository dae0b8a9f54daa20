//! The type universe: a lightweight Go type checker over the loaded packages.
//!
//! Packages inside the module are fully resolved. Packages outside it are
//! never parsed; the named types they export are represented as external
//! named types whose underlying type comes from a table of well-known types.

pub mod comments;
pub mod constant;
pub mod enums;
pub mod graph;
mod resolve;
mod universe;
#[cfg(test)]
pub(crate) mod testing;

pub use constant::ConstValue;
pub use enums::EnumMember;
pub use graph::{CallGraph, ObjKey, ReturnSite};
pub use comments::CommentMap;
pub use universe::{write_signature, write_type, FileRef, Object, ObjectKind, Package, Universe};

use crate::diagnostic::Span;
use crate::frontend::go::ast::{Block, ChanDir};

/// Index of a named type in the universe arena.
pub type NamedId = usize;

/// Go basic types. `Byte` and `Rune` are kept apart from their aliases so they
/// print the way they were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    Byte,
    Rune,
    UnsafePointer,
    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "bool" => Self::Bool,
            "int" => Self::Int,
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint" => Self::Uint,
            "uint8" => Self::Uint8,
            "uint16" => Self::Uint16,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "uintptr" => Self::Uintptr,
            "float32" => Self::Float32,
            "float64" => Self::Float64,
            "complex64" => Self::Complex64,
            "complex128" => Self::Complex128,
            "string" => Self::String,
            "byte" => Self::Byte,
            "rune" => Self::Rune,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Uintptr => "uintptr",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
            Self::String => "string",
            Self::Byte => "byte",
            Self::Rune => "rune",
            Self::UnsafePointer => "unsafe.Pointer",
            Self::UntypedBool => "untyped bool",
            Self::UntypedInt => "untyped int",
            Self::UntypedRune => "untyped rune",
            Self::UntypedFloat => "untyped float",
            Self::UntypedString => "untyped string",
            Self::UntypedNil => "untyped nil",
        }
    }

    /// The kind a value of this kind has once it is given a default type.
    pub fn default_kind(self) -> Self {
        match self {
            Self::UntypedBool => Self::Bool,
            Self::UntypedInt => Self::Int,
            Self::UntypedRune => Self::Rune,
            Self::UntypedFloat => Self::Float64,
            Self::UntypedString => Self::String,
            Self::Byte => Self::Uint8,
            Self::Rune => Self::Int32,
            other => other,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self.default_kind(),
            Self::Int | Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self.default_kind(),
            Self::Uint | Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64 | Self::Uintptr
        )
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_float(self) -> bool {
        matches!(self.default_kind(), Self::Float32 | Self::Float64)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    pub fn is_string(self) -> bool {
        matches!(self, Self::String | Self::UntypedString)
    }

    pub fn is_bool(self) -> bool {
        matches!(self, Self::Bool | Self::UntypedBool)
    }

    pub fn is_untyped(self) -> bool {
        matches!(
            self,
            Self::UntypedBool
                | Self::UntypedInt
                | Self::UntypedRune
                | Self::UntypedFloat
                | Self::UntypedString
                | Self::UntypedNil
        )
    }

    /// Bit size used by strconv helpers.
    pub fn bit_size(self) -> u32 {
        match self.default_kind() {
            Self::Int8 | Self::Uint8 => 8,
            Self::Int16 | Self::Uint16 => 16,
            Self::Int32 | Self::Uint32 | Self::Float32 => 32,
            _ => 64,
        }
    }
}

/// A resolved Go type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Basic(BasicKind),
    Named(NamedId),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array(i64, Box<Type>),
    Map(Box<Type>, Box<Type>),
    Chan(ChanDir, Box<Type>),
    Signature(Box<Signature>),
    Struct(StructType),
    Interface(InterfaceType),
    /// A type that could not be resolved; only present after errors.
    Invalid,
}

impl Type {
    pub fn pointer(elem: Type) -> Self {
        Type::Pointer(Box::new(elem))
    }

    pub fn slice(elem: Type) -> Self {
        Type::Slice(Box::new(elem))
    }

    /// Strips one level of pointer indirection.
    pub fn deref(&self) -> &Type {
        match self {
            Type::Pointer(elem) => elem,
            other => other,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn as_named(&self) -> Option<NamedId> {
        match self {
            Type::Named(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_basic(&self) -> Option<BasicKind> {
        match self {
            Type::Basic(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// A parameter, result or struct field.
#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub name: String,
    pub ty: Type,
    pub embedded: bool,
    /// Struct tag, undecoded.
    pub tag: Option<String>,
    pub doc: Vec<String>,
    pub comment: Vec<String>,
    pub span: Span,
}

impl Var {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            embedded: false,
            tag: None,
            doc: Vec::new(),
            comment: Vec::new(),
            span: Span::unknown(),
        }
    }

    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(char::is_uppercase)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub params: Vec<Var>,
    pub results: Vec<Var>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructType {
    pub fields: Vec<Var>,
}

/// An interface with its complete method set, sorted by name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterfaceType {
    pub methods: Vec<Method>,
    pub embedded: Vec<Type>,
}

impl InterfaceType {
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// A method of a named type or an interface.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub sig: Signature,
    pub pointer_recv: bool,
    pub doc: Vec<String>,
    /// Body of a declared method; `None` for interface methods and externals.
    pub body: Option<Block>,
    pub span: Span,
}

impl Method {
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(char::is_uppercase)
    }
}

/// A defined type.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedType {
    pub name: String,
    /// Import path of the declaring package; empty for predeclared types.
    pub pkg_path: String,
    pub pkg_name: String,
    pub underlying: Type,
    pub methods: Vec<Method>,
    pub doc: Vec<String>,
    pub span: Span,
    /// Declared outside the loaded module.
    pub external: bool,
}

impl NamedType {
    pub fn is_exported(&self) -> bool {
        self.name.chars().next().is_some_and(char::is_uppercase)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// `pkgpath.Name`, or just `Name` for predeclared types.
    pub fn qualified_name(&self) -> String {
        if self.pkg_path.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.pkg_path, self.name)
        }
    }
}
