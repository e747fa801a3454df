// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The name tree produced by the demangler and its rendering to a C++-style
//! string.

use std::fmt;

/// A node of the demangled name tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A plain name fragment.
    Identifier(String),
    /// An operator name (`operator+`, a destructor closure, ...).
    Operator(Operator),
    /// A conversion operator, `operator <type>`.
    Conversion(Box<Node>),
    /// A template instantiation, `name<args>`.
    Template {
        name: Box<Node>,
        arguments: Vec<Node>,
    },
    /// A `::`-joined qualified name.
    Qualified(QualifiedName),
    /// A fundamental type.
    Primitive(Primitive),
    /// A pointer, reference, or rvalue reference.
    Pointer {
        pointee: Box<Node>,
        affinity: Affinity,
        qualifiers: Qualifiers,
    },
    /// An array with explicit dimensions.
    Array {
        element: Box<Node>,
        dimensions: Vec<u64>,
    },
    /// A class, struct, union, or enum name.
    Tag { tag: Tag, name: QualifiedName },
    /// A bare function type (function pointers, template arguments).
    FunctionType(FunctionType),
    /// A function symbol with its signature.
    Function(FunctionSymbol),
    /// A variable symbol with its type.
    Variable(VariableSymbol),
    /// An integral non-type template argument.
    Literal(i64),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Identifier(name) => f.write_str(name),
            Node::Operator(op) => f.write_str(op.name()),
            Node::Conversion(target) => write!(f, "operator {}", target),
            Node::Template { name, arguments } => {
                write!(f, "{}<", name)?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(">")
            }
            Node::Qualified(name) => write!(f, "{}", name),
            Node::Primitive(prim) => f.write_str(prim.name()),
            Node::Pointer {
                pointee,
                affinity,
                qualifiers,
            } => {
                write!(f, "{}", pointee)?;
                if !qualifiers.is_empty() {
                    write!(f, " {}", qualifiers)?;
                }
                write!(f, " {}", affinity.token())
            }
            Node::Array {
                element,
                dimensions,
            } => {
                write!(f, "{}", element)?;
                for dim in dimensions {
                    write!(f, "[{}]", dim)?;
                }
                Ok(())
            }
            Node::Tag { tag, name } => write!(f, "{} {}", tag.name(), name),
            Node::FunctionType(func) => write!(f, "{}", func),
            Node::Function(func) => write!(f, "{}", func),
            Node::Variable(var) => write!(f, "{}", var),
            Node::Literal(value) => write!(f, "{}", value),
        }
    }
}

/// A fully qualified C++ name, outermost scope first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualifiedName {
    pub components: Vec<Node>,
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str("::")?;
            }
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

/// Operator kinds, covering both the plain `?x` grammar and the extended
/// `?_x` / `?_Rx` grammar.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operator {
    New,
    Delete,
    Assign,
    RightShift,
    LeftShift,
    LogicalNot,
    Equal,
    NotEqual,
    Subscript,
    Arrow,
    Dereference,
    Increment,
    Decrement,
    Minus,
    Plus,
    AddressOf,
    ArrowDeref,
    Divide,
    Modulo,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Comma,
    Call,
    Complement,
    Xor,
    BitwiseOr,
    LogicalAnd,
    LogicalOr,
    MultiplyAssign,
    PlusAssign,
    MinusAssign,
    DivideAssign,
    ModuloAssign,
    RightShiftAssign,
    LeftShiftAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    NewArray,
    DeleteArray,
    VFTable,
    VBTable,
    VCall,
    Typeof,
    LocalStaticGuard,
    VBaseDtor,
    VectorDeletingDtor,
    DefaultCtorClosure,
    ScalarDeletingDtor,
    VectorCtorIterator,
    VectorDtorIterator,
    VectorVBaseCtorIterator,
    VirtualDisplacementMap,
    EHVectorCtorIterator,
    EHVectorDtorIterator,
    EHVectorVBaseCtorIterator,
    CopyCtorClosure,
    LocalVFTable,
    LocalVFTableCtorClosure,
    RttiTypeDescriptor,
    RttiBaseClassDescriptor,
    RttiBaseClassArray,
    RttiClassHierarchyDescriptor,
    RttiCompleteObjectLocator,
}

impl Operator {
    pub fn name(self) -> &'static str {
        match self {
            Operator::New => "operator new",
            Operator::Delete => "operator delete",
            Operator::Assign => "operator=",
            Operator::RightShift => "operator>>",
            Operator::LeftShift => "operator<<",
            Operator::LogicalNot => "operator!",
            Operator::Equal => "operator==",
            Operator::NotEqual => "operator!=",
            Operator::Subscript => "operator[]",
            Operator::Arrow => "operator->",
            Operator::Dereference => "operator*",
            Operator::Increment => "operator++",
            Operator::Decrement => "operator--",
            Operator::Minus => "operator-",
            Operator::Plus => "operator+",
            Operator::AddressOf => "operator&",
            Operator::ArrowDeref => "operator->*",
            Operator::Divide => "operator/",
            Operator::Modulo => "operator%",
            Operator::Less => "operator<",
            Operator::LessEqual => "operator<=",
            Operator::Greater => "operator>",
            Operator::GreaterEqual => "operator>=",
            Operator::Comma => "operator,",
            Operator::Call => "operator()",
            Operator::Complement => "operator~",
            Operator::Xor => "operator^",
            Operator::BitwiseOr => "operator|",
            Operator::LogicalAnd => "operator&&",
            Operator::LogicalOr => "operator||",
            Operator::MultiplyAssign => "operator*=",
            Operator::PlusAssign => "operator+=",
            Operator::MinusAssign => "operator-=",
            Operator::DivideAssign => "operator/=",
            Operator::ModuloAssign => "operator%=",
            Operator::RightShiftAssign => "operator>>=",
            Operator::LeftShiftAssign => "operator<<=",
            Operator::AndAssign => "operator&=",
            Operator::OrAssign => "operator|=",
            Operator::XorAssign => "operator^=",
            Operator::NewArray => "operator new[]",
            Operator::DeleteArray => "operator delete[]",
            Operator::VFTable => "`vftable'",
            Operator::VBTable => "`vbtable'",
            Operator::VCall => "`vcall'",
            Operator::Typeof => "`typeof'",
            Operator::LocalStaticGuard => "`local static guard'",
            Operator::VBaseDtor => "`vbase destructor'",
            Operator::VectorDeletingDtor => "`vector deleting destructor'",
            Operator::DefaultCtorClosure => "`default constructor closure'",
            Operator::ScalarDeletingDtor => "`scalar deleting destructor'",
            Operator::VectorCtorIterator => "`vector constructor iterator'",
            Operator::VectorDtorIterator => "`vector destructor iterator'",
            Operator::VectorVBaseCtorIterator => "`vector vbase constructor iterator'",
            Operator::VirtualDisplacementMap => "`virtual displacement map'",
            Operator::EHVectorCtorIterator => "`eh vector constructor iterator'",
            Operator::EHVectorDtorIterator => "`eh vector destructor iterator'",
            Operator::EHVectorVBaseCtorIterator => "`eh vector vbase constructor iterator'",
            Operator::CopyCtorClosure => "`copy constructor closure'",
            Operator::LocalVFTable => "`local vftable'",
            Operator::LocalVFTableCtorClosure => "`local vftable constructor closure'",
            Operator::RttiTypeDescriptor => "`RTTI Type Descriptor'",
            Operator::RttiBaseClassDescriptor => "`RTTI Base Class Descriptor'",
            Operator::RttiBaseClassArray => "`RTTI Base Class Array'",
            Operator::RttiClassHierarchyDescriptor => "`RTTI Class Hierarchy Descriptor'",
            Operator::RttiCompleteObjectLocator => "`RTTI Complete Object Locator'",
        }
    }
}

/// Fundamental type names.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Primitive {
    Void,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    Int64,
    UnsignedInt64,
    Float,
    Double,
    LongDouble,
    WChar,
    Char8,
    Char16,
    Char32,
    Nullptr,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Void => "void",
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::SignedChar => "signed char",
            Primitive::UnsignedChar => "unsigned char",
            Primitive::Short => "short",
            Primitive::UnsignedShort => "unsigned short",
            Primitive::Int => "int",
            Primitive::UnsignedInt => "unsigned int",
            Primitive::Long => "long",
            Primitive::UnsignedLong => "unsigned long",
            Primitive::Int64 => "__int64",
            Primitive::UnsignedInt64 => "unsigned __int64",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::LongDouble => "long double",
            Primitive::WChar => "wchar_t",
            Primitive::Char8 => "char8_t",
            Primitive::Char16 => "char16_t",
            Primitive::Char32 => "char32_t",
            Primitive::Nullptr => "std::nullptr_t",
        }
    }
}

/// Distinguishes pointers from the two reference flavors.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Affinity {
    Pointer,
    Reference,
    RValueReference,
}

impl Affinity {
    fn token(self) -> &'static str {
        match self {
            Affinity::Pointer => "*",
            Affinity::Reference => "&",
            Affinity::RValueReference => "&&",
        }
    }
}

/// CV qualifiers.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_unaligned: bool,
    pub is_restrict: bool,
}

impl Qualifiers {
    pub fn is_empty(self) -> bool {
        !self.is_const && !self.is_volatile && !self.is_unaligned && !self.is_restrict
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let mut emit = |f: &mut fmt::Formatter<'_>, token: &str| -> fmt::Result {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            f.write_str(token)
        };

        if self.is_const {
            emit(f, "const")?;
        }
        if self.is_volatile {
            emit(f, "volatile")?;
        }
        if self.is_unaligned {
            emit(f, "__unaligned")?;
        }
        if self.is_restrict {
            emit(f, "__restrict")?;
        }
        Ok(())
    }
}

/// The tag of a named user type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tag {
    Union,
    Struct,
    Class,
    Enum,
}

impl Tag {
    fn name(self) -> &'static str {
        match self {
            Tag::Union => "union",
            Tag::Struct => "struct",
            Tag::Class => "class",
            Tag::Enum => "enum",
        }
    }
}

/// Calling conventions encoded after a function's name block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CallingConvention {
    Cdecl,
    Pascal,
    Thiscall,
    Stdcall,
    Fastcall,
    Clrcall,
    Eabi,
    Vectorcall,
    Swift,
    SwiftAsync,
}

impl CallingConvention {
    pub fn name(self) -> &'static str {
        match self {
            CallingConvention::Cdecl => "__cdecl",
            CallingConvention::Pascal => "__pascal",
            CallingConvention::Thiscall => "__thiscall",
            CallingConvention::Stdcall => "__stdcall",
            CallingConvention::Fastcall => "__fastcall",
            CallingConvention::Clrcall => "__clrcall",
            CallingConvention::Eabi => "__eabi",
            CallingConvention::Vectorcall => "__vectorcall",
            CallingConvention::Swift => "__swiftcall",
            CallingConvention::SwiftAsync => "__swiftasynccall",
        }
    }
}

/// Member accessibility derived from the encoding letter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessSpecifier {
    None,
    Private,
    Protected,
    Public,
}

impl AccessSpecifier {
    fn prefix(self) -> &'static str {
        match self {
            AccessSpecifier::None => "",
            AccessSpecifier::Private => "private: ",
            AccessSpecifier::Protected => "protected: ",
            AccessSpecifier::Public => "public: ",
        }
    }
}

/// A bare function type: calling convention, return type, and parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionType {
    pub calling_convention: Option<CallingConvention>,
    pub return_type: Option<Box<Node>>,
    pub parameters: Vec<Node>,
    pub qualifiers: Qualifiers,
    pub variadic: bool,
}

impl FunctionType {
    fn write_parameters(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", parameter)?;
        }
        if self.variadic {
            if !self.parameters.is_empty() {
                f.write_str(", ")?;
            }
            f.write_str("...")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref ret) = self.return_type {
            write!(f, "{} ", ret)?;
        }
        if let Some(cc) = self.calling_convention {
            write!(f, "{} ", cc.name())?;
        }
        self.write_parameters(f)?;
        if !self.qualifiers.is_empty() {
            write!(f, " {}", self.qualifiers)?;
        }
        Ok(())
    }
}

/// A demangled function symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSymbol {
    pub name: QualifiedName,
    pub signature: Option<FunctionType>,
    pub access: AccessSpecifier,
    pub is_static: bool,
    pub is_virtual: bool,
}

impl fmt::Display for FunctionSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.access.prefix())?;
        if self.is_static {
            f.write_str("static ")?;
        }
        if self.is_virtual {
            f.write_str("virtual ")?;
        }

        if let Some(ref signature) = self.signature {
            if let Some(ref ret) = signature.return_type {
                write!(f, "{} ", ret)?;
            }
            if let Some(cc) = signature.calling_convention {
                write!(f, "{} ", cc.name())?;
            }
        }

        write!(f, "{}", self.name)?;

        if let Some(ref signature) = self.signature {
            signature.write_parameters(f)?;
            if !signature.qualifiers.is_empty() {
                write!(f, " {}", signature.qualifiers)?;
            }
        }

        Ok(())
    }
}

/// A demangled variable symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSymbol {
    pub name: QualifiedName,
    pub var_type: Option<Box<Node>>,
    pub access: AccessSpecifier,
    pub is_static: bool,
}

impl fmt::Display for VariableSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.access.prefix())?;
        if self.is_static {
            f.write_str("static ")?;
        }
        if let Some(ref var_type) = self.var_type {
            write!(f, "{} ", var_type)?;
        }
        write!(f, "{}", self.name)
    }
}
