// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A demangler for MSVC decorated names.
//!
//! Decorated names are parsed by recursive descent into a [`Node`] tree and
//! flattened to a C++-style string. The grammar uses two ten-slot
//! back-reference rings, one for name fragments and one for types; a digit
//! in either position refers back to an earlier entry. Entering a template
//! argument list (`?$...@`) opens a fresh name-fragment scope and restores
//! the outer one on exit.
//!
//! Callers that want a best-effort string should use [`demangle_lossy`],
//! which returns the input unchanged when parsing fails. Undecorated names
//! (no leading `?`) pass through as-is, except that a single leading `_` is
//! stripped per the C decoration convention.

use std::error;
use std::fmt;

mod nodes;

pub use self::nodes::*;

/// An error produced while demangling a decorated name.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DemangleError {
    /// The input was empty.
    EmptyInput,
    /// The input is not a well-formed decorated name.
    InvalidMangled,
    /// The input ended in the middle of a production.
    UnexpectedEnd,
    /// A digit referred to an unpopulated back-reference slot.
    InvalidBackref,
    /// An operator selector byte is not part of the grammar.
    UnknownOperator,
    /// A type selector byte is not part of the grammar.
    UnknownType,
}

impl fmt::Display for DemangleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            DemangleError::EmptyInput => write!(f, "empty input"),
            DemangleError::InvalidMangled => write!(f, "invalid mangled name"),
            DemangleError::UnexpectedEnd => write!(f, "unexpected end of input"),
            DemangleError::InvalidBackref => write!(f, "invalid back-reference"),
            DemangleError::UnknownOperator => write!(f, "unknown operator"),
            DemangleError::UnknownType => write!(f, "unknown type"),
        }
    }
}

impl error::Error for DemangleError {}

type DemangleResult<T> = Result<T, DemangleError>;

/// Demangles an MSVC decorated name to readable form.
///
/// Undecorated input is passed through, stripping a single leading `_`.
pub fn demangle(decorated: &str) -> DemangleResult<String> {
    if decorated.is_empty() {
        return Err(DemangleError::EmptyInput);
    }

    if !decorated.starts_with('?') {
        let stripped = decorated.strip_prefix('_').unwrap_or(decorated);
        return Ok(stripped.to_string());
    }

    let node = parse(decorated)?;
    Ok(node.to_string())
}

/// Demangles, falling back to the original string when parsing fails.
pub fn demangle_lossy(decorated: &str) -> String {
    demangle(decorated).unwrap_or_else(|_| decorated.to_string())
}

/// Parses a decorated name into its [`Node`] tree.
pub fn parse(decorated: &str) -> DemangleResult<Node> {
    if decorated.is_empty() {
        return Err(DemangleError::EmptyInput);
    }
    if !decorated.starts_with('?') {
        return Ok(Node::Identifier(decorated.to_string()));
    }

    Demangler::new(decorated).parse()
}

/// Returns true if the name looks like an MSVC decorated name.
pub fn is_mangled(name: &str) -> bool {
    name.starts_with('?') || name.starts_with("@?")
}

const BACKREF_SLOTS: usize = 10;

struct Demangler<'d> {
    input: &'d [u8],
    pos: usize,

    name_backrefs: Vec<String>,
    type_backrefs: Vec<Node>,

    saved_name_backrefs: Vec<Vec<String>>,
}

impl<'d> Demangler<'d> {
    fn new(input: &'d str) -> Self {
        Demangler {
            input: input.as_bytes(),
            pos: 0,
            name_backrefs: Vec::new(),
            type_backrefs: Vec::new(),
            saved_name_backrefs: Vec::new(),
        }
    }

    fn parse(&mut self) -> DemangleResult<Node> {
        // leading '?'
        if self.peek() == Some(b'?') {
            self.pos += 1;
        }

        // a second '?' selects the extended grammar, unless it opens a
        // template fragment
        if self.peek() == Some(b'?') && self.input.get(self.pos + 1) != Some(&b'$') {
            return self.parse_special_intrinsic();
        }

        let name = self.parse_qualified_name()?;
        self.parse_encoding(name)
    }

    // ---- special names -------------------------------------------------

    fn parse_special_intrinsic(&mut self) -> DemangleResult<Node> {
        self.pos += 1; // second '?'

        match self.peek().ok_or(DemangleError::UnexpectedEnd)? {
            b'0' => {
                self.pos += 1;
                self.parse_ctor_dtor(false)
            }
            b'1' => {
                self.pos += 1;
                self.parse_ctor_dtor(true)
            }
            b'_' => {
                self.pos += 1;
                self.parse_extended_special()
            }
            _ => {
                let operator = self.parse_operator_name()?;
                let mut name = self.parse_qualified_name()?;
                name.components.push(operator);
                self.parse_encoding(name)
            }
        }
    }

    fn parse_ctor_dtor(&mut self, destructor: bool) -> DemangleResult<Node> {
        let mut name = self.parse_qualified_name()?;

        let class_name = match name.components.last() {
            Some(component) => component.to_string(),
            None => return Err(DemangleError::InvalidMangled),
        };

        let leaf = if destructor {
            Node::Identifier(format!("~{}", class_name))
        } else {
            Node::Identifier(class_name)
        };
        name.components.push(leaf);

        self.parse_encoding(name)
    }

    fn parse_extended_special(&mut self) -> DemangleResult<Node> {
        let c = self.consume().ok_or(DemangleError::UnexpectedEnd)?;

        let operator = match c {
            b'7' => Operator::VFTable,
            b'8' => Operator::VBTable,
            b'9' => Operator::VCall,
            b'A' => Operator::Typeof,
            b'B' => Operator::LocalStaticGuard,
            b'D' => Operator::VBaseDtor,
            b'E' => Operator::VectorDeletingDtor,
            b'F' => Operator::DefaultCtorClosure,
            b'G' => Operator::ScalarDeletingDtor,
            b'H' => Operator::VectorCtorIterator,
            b'I' => Operator::VectorDtorIterator,
            b'J' => Operator::VectorVBaseCtorIterator,
            b'K' => Operator::VirtualDisplacementMap,
            b'L' => Operator::EHVectorCtorIterator,
            b'M' => Operator::EHVectorDtorIterator,
            b'N' => Operator::EHVectorVBaseCtorIterator,
            b'O' => Operator::CopyCtorClosure,
            b'R' => return self.parse_rtti(),
            b'S' => Operator::LocalVFTable,
            b'T' => Operator::LocalVFTableCtorClosure,
            _ => {
                self.pos -= 1;
                return Err(DemangleError::UnknownOperator);
            }
        };

        let mut name = self.parse_qualified_name()?;
        name.components.push(Node::Operator(operator));
        Ok(Node::Qualified(name))
    }

    fn parse_rtti(&mut self) -> DemangleResult<Node> {
        let operator = match self.consume().ok_or(DemangleError::UnexpectedEnd)? {
            b'0' => Operator::RttiTypeDescriptor,
            b'1' => Operator::RttiBaseClassDescriptor,
            b'2' => Operator::RttiBaseClassArray,
            b'3' => Operator::RttiClassHierarchyDescriptor,
            b'4' => Operator::RttiCompleteObjectLocator,
            _ => {
                self.pos -= 1;
                return Err(DemangleError::UnknownOperator);
            }
        };

        let mut name = self.parse_qualified_name()?;
        name.components.push(Node::Operator(operator));
        Ok(Node::Qualified(name))
    }

    fn parse_operator_name(&mut self) -> DemangleResult<Node> {
        let c = self.consume().ok_or(DemangleError::UnexpectedEnd)?;

        let operator = match c {
            b'2' => Operator::New,
            b'3' => Operator::Delete,
            b'4' => Operator::Assign,
            b'5' => Operator::RightShift,
            b'6' => Operator::LeftShift,
            b'7' => Operator::LogicalNot,
            b'8' => Operator::Equal,
            b'9' => Operator::NotEqual,
            b'A' => Operator::Subscript,
            b'B' => {
                // conversion operator; the target type follows
                let target = self.parse_type()?;
                return Ok(Node::Conversion(Box::new(target)));
            }
            b'C' => Operator::Arrow,
            b'D' => Operator::Dereference,
            b'E' => Operator::Increment,
            b'F' => Operator::Decrement,
            b'G' => Operator::Minus,
            b'H' => Operator::Plus,
            b'I' => Operator::AddressOf,
            b'J' => Operator::ArrowDeref,
            b'K' => Operator::Divide,
            b'L' => Operator::Modulo,
            b'M' => Operator::Less,
            b'N' => Operator::LessEqual,
            b'O' => Operator::Greater,
            b'P' => Operator::GreaterEqual,
            b'Q' => Operator::Comma,
            b'R' => Operator::Call,
            b'S' => Operator::Complement,
            b'T' => Operator::Xor,
            b'U' => Operator::BitwiseOr,
            b'V' => Operator::LogicalAnd,
            b'W' => Operator::LogicalOr,
            b'X' => Operator::MultiplyAssign,
            b'Y' => Operator::PlusAssign,
            b'Z' => Operator::MinusAssign,
            b'_' => return self.parse_extended_operator(),
            _ => {
                self.pos -= 1;
                return Err(DemangleError::UnknownOperator);
            }
        };

        Ok(Node::Operator(operator))
    }

    fn parse_extended_operator(&mut self) -> DemangleResult<Node> {
        let operator = match self.consume().ok_or(DemangleError::UnexpectedEnd)? {
            b'0' => Operator::DivideAssign,
            b'1' => Operator::ModuloAssign,
            b'2' => Operator::RightShiftAssign,
            b'3' => Operator::LeftShiftAssign,
            b'4' => Operator::AndAssign,
            b'5' => Operator::OrAssign,
            b'6' => Operator::XorAssign,
            b'U' => Operator::NewArray,
            b'V' => Operator::DeleteArray,
            _ => {
                self.pos -= 1;
                return Err(DemangleError::UnknownOperator);
            }
        };

        Ok(Node::Operator(operator))
    }

    // ---- qualified names -----------------------------------------------

    fn parse_qualified_name(&mut self) -> DemangleResult<QualifiedName> {
        let mut components = Vec::new();

        loop {
            match self.peek() {
                None => break,
                Some(b'@') => {
                    // terminates the qualified name
                    self.pos += 1;
                    break;
                }
                Some(_) => components.push(self.parse_name_fragment()?),
            }
        }

        // innermost fragment comes first in the encoding; reverse into
        // natural C++ order
        components.reverse();

        Ok(QualifiedName { components })
    }

    fn parse_name_fragment(&mut self) -> DemangleResult<Node> {
        let c = self.peek().ok_or(DemangleError::UnexpectedEnd)?;

        if c.is_ascii_digit() {
            self.pos += 1;
            let index = (c - b'0') as usize;
            let name = self
                .name_backrefs
                .get(index)
                .ok_or(DemangleError::InvalidBackref)?;
            return Ok(Node::Identifier(name.clone()));
        }

        if c == b'?' {
            if self.input.get(self.pos + 1) == Some(&b'$') {
                return self.parse_template_instantiation();
            }
            self.pos += 1;
            return self.parse_operator_name();
        }

        self.parse_simple_name()
    }

    /// A plain fragment: bytes up to the `@` terminator, which is consumed.
    fn parse_simple_name(&mut self) -> DemangleResult<Node> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'@' {
                break;
            }
            self.pos += 1;
        }

        if self.pos == start {
            return Err(DemangleError::InvalidMangled);
        }

        let name = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| DemangleError::InvalidMangled)?
            .to_string();

        if self.peek() == Some(b'@') {
            self.pos += 1;
        }

        self.memorize_name(&name);
        Ok(Node::Identifier(name))
    }

    fn parse_template_instantiation(&mut self) -> DemangleResult<Node> {
        self.pos += 2; // "?$"

        // template arguments get a fresh name-backref scope
        self.push_backref_scope();
        let result = self.parse_template_inner();
        self.pop_backref_scope();
        result
    }

    fn parse_template_inner(&mut self) -> DemangleResult<Node> {
        let name = self.parse_simple_name()?;

        let mut arguments = Vec::new();
        while let Some(c) = self.peek() {
            if c == b'@' {
                break;
            }
            match self.parse_template_arg() {
                Ok(argument) => arguments.push(argument),
                Err(_) => break,
            }
        }

        // the argument list's own terminator
        if self.peek() == Some(b'@') {
            self.pos += 1;
        }

        Ok(Node::Template {
            name: Box::new(name),
            arguments,
        })
    }

    fn parse_template_arg(&mut self) -> DemangleResult<Node> {
        if self.peek() == Some(b'$') {
            self.pos += 1;
            return self.parse_template_nontype_arg();
        }
        self.parse_type()
    }

    fn parse_template_nontype_arg(&mut self) -> DemangleResult<Node> {
        let c = self.consume().ok_or(DemangleError::UnexpectedEnd)?;

        match c {
            b'0' => {
                let value = self.parse_number()?;
                Ok(Node::Literal(value))
            }
            // address-of and other exotic non-type arguments, left opaque
            b'1' | b'2' | b'D' | b'E' | b'F' | b'G' | b'H' | b'I' | b'Q' | b'S' => {
                Ok(Node::Identifier(String::from("?")))
            }
            _ => {
                self.pos -= 1;
                self.parse_type()
            }
        }
    }

    // ---- encodings -----------------------------------------------------

    fn parse_encoding(&mut self, name: QualifiedName) -> DemangleResult<Node> {
        match self.peek() {
            Some(c) if c.is_ascii_uppercase() => self.parse_function_encoding(name),
            Some(c) if c.is_ascii_digit() => self.parse_variable_encoding(name),
            _ => Ok(Node::Qualified(name)),
        }
    }

    fn parse_function_encoding(&mut self, name: QualifiedName) -> DemangleResult<Node> {
        let c = self.consume().ok_or(DemangleError::UnexpectedEnd)?;

        let mut access = AccessSpecifier::None;
        let mut is_static = false;
        let mut is_virtual = false;
        let mut is_member = false;

        match c {
            b'A' | b'B' => {
                access = AccessSpecifier::Private;
                is_member = true;
            }
            b'C' | b'D' => {
                access = AccessSpecifier::Private;
                is_static = true;
            }
            b'E' | b'F' => {
                access = AccessSpecifier::Private;
                is_virtual = true;
                is_member = true;
            }
            b'G' | b'H' => {
                // private thunk
                access = AccessSpecifier::Private;
                is_member = true;
            }
            b'I' | b'J' => {
                access = AccessSpecifier::Protected;
                is_member = true;
            }
            b'K' | b'L' => {
                access = AccessSpecifier::Protected;
                is_static = true;
            }
            b'M' | b'N' => {
                access = AccessSpecifier::Protected;
                is_virtual = true;
                is_member = true;
            }
            b'O' | b'P' => {
                access = AccessSpecifier::Protected;
                is_member = true;
            }
            b'Q' | b'R' => {
                access = AccessSpecifier::Public;
                is_member = true;
            }
            b'S' | b'T' => {
                access = AccessSpecifier::Public;
                is_static = true;
            }
            b'U' | b'V' => {
                access = AccessSpecifier::Public;
                is_virtual = true;
                is_member = true;
            }
            b'W' | b'X' => {
                access = AccessSpecifier::Public;
                is_member = true;
            }
            b'Y' | b'Z' => {
                // global function
            }
            _ => {
                self.pos -= 1;
                return Err(DemangleError::UnknownOperator);
            }
        }

        // non-static member functions carry a `this` qualifier: an optional
        // pointer-width marker, then a CV letter
        if is_member {
            if self.peek() == Some(b'E') {
                self.pos += 1;
            }
            self.parse_qualifiers();
        }

        let signature = self.parse_function_type().ok();

        Ok(Node::Function(FunctionSymbol {
            name,
            signature,
            access,
            is_static,
            is_virtual,
        }))
    }

    fn parse_variable_encoding(&mut self, name: QualifiedName) -> DemangleResult<Node> {
        let c = self.consume().ok_or(DemangleError::UnexpectedEnd)?;

        let mut access = AccessSpecifier::None;
        let mut is_static = false;

        match c {
            b'0' => {
                access = AccessSpecifier::Private;
                is_static = true;
            }
            b'1' => {
                access = AccessSpecifier::Protected;
                is_static = true;
            }
            b'2' => {
                access = AccessSpecifier::Public;
                is_static = true;
            }
            b'3' => {} // global
            b'4' => {} // function-local static
            _ => {
                self.pos -= 1;
            }
        }

        let var_type = self.parse_type().ok().map(Box::new);

        Ok(Node::Variable(VariableSymbol {
            name,
            var_type,
            access,
            is_static,
        }))
    }

    fn parse_function_type(&mut self) -> DemangleResult<FunctionType> {
        let calling_convention = self.parse_calling_convention();

        // '@' in place of a return type marks ctors and dtors
        let return_type = if self.peek() == Some(b'@') {
            self.pos += 1;
            None
        } else {
            self.parse_type().ok().map(Box::new)
        };

        let (parameters, variadic) = self.parse_parameters();

        Ok(FunctionType {
            calling_convention: Some(calling_convention),
            return_type,
            parameters,
            qualifiers: Qualifiers::default(),
            variadic,
        })
    }

    fn parse_calling_convention(&mut self) -> CallingConvention {
        let cc = match self.peek() {
            Some(b'A') | Some(b'B') => CallingConvention::Cdecl,
            Some(b'C') | Some(b'D') => CallingConvention::Pascal,
            Some(b'E') | Some(b'F') => CallingConvention::Thiscall,
            Some(b'G') | Some(b'H') => CallingConvention::Stdcall,
            Some(b'I') | Some(b'J') => CallingConvention::Fastcall,
            Some(b'M') | Some(b'N') => CallingConvention::Clrcall,
            Some(b'O') | Some(b'P') => CallingConvention::Eabi,
            Some(b'Q') => CallingConvention::Vectorcall,
            Some(b'S') => CallingConvention::Swift,
            Some(b'W') => CallingConvention::SwiftAsync,
            _ => return CallingConvention::Cdecl,
        };
        self.pos += 1;
        cc
    }

    fn parse_parameters(&mut self) -> (Vec<Node>, bool) {
        // a lone 'X' is an empty parameter list
        if self.peek() == Some(b'X') {
            self.pos += 1;
            return (Vec::new(), false);
        }

        let mut parameters = Vec::new();
        let mut variadic = false;

        while let Some(c) = self.peek() {
            if c == b'@' {
                self.pos += 1;
                break;
            }
            if c == b'Z' {
                self.pos += 1;
                variadic = true;
                break;
            }
            match self.parse_type() {
                Ok(parameter) => parameters.push(parameter),
                Err(_) => break,
            }
        }

        (parameters, variadic)
    }

    // ---- types ---------------------------------------------------------

    fn parse_type(&mut self) -> DemangleResult<Node> {
        let c = self.peek().ok_or(DemangleError::UnexpectedEnd)?;

        if c.is_ascii_digit() {
            self.pos += 1;
            let index = (c - b'0') as usize;
            return self
                .type_backrefs
                .get(index)
                .cloned()
                .ok_or(DemangleError::InvalidBackref);
        }

        let node = match c {
            b'X' => {
                self.pos += 1;
                Node::Primitive(Primitive::Void)
            }
            b'C' => {
                self.pos += 1;
                Node::Primitive(Primitive::SignedChar)
            }
            b'D' => {
                self.pos += 1;
                Node::Primitive(Primitive::Char)
            }
            b'E' => {
                self.pos += 1;
                Node::Primitive(Primitive::UnsignedChar)
            }
            b'F' => {
                self.pos += 1;
                Node::Primitive(Primitive::Short)
            }
            b'G' => {
                self.pos += 1;
                Node::Primitive(Primitive::UnsignedShort)
            }
            b'H' => {
                self.pos += 1;
                Node::Primitive(Primitive::Int)
            }
            b'I' => {
                self.pos += 1;
                Node::Primitive(Primitive::UnsignedInt)
            }
            b'J' => {
                self.pos += 1;
                Node::Primitive(Primitive::Long)
            }
            b'K' => {
                self.pos += 1;
                Node::Primitive(Primitive::UnsignedLong)
            }
            b'M' => {
                self.pos += 1;
                Node::Primitive(Primitive::Float)
            }
            b'N' => {
                self.pos += 1;
                Node::Primitive(Primitive::Double)
            }
            b'O' => {
                self.pos += 1;
                Node::Primitive(Primitive::LongDouble)
            }
            b'_' => {
                self.pos += 1;
                self.parse_extended_type()?
            }
            b'P' => {
                self.pos += 1;
                self.parse_pointer(Affinity::Pointer, Qualifiers::default())?
            }
            b'Q' => {
                self.pos += 1;
                self.parse_pointer(
                    Affinity::Pointer,
                    Qualifiers {
                        is_const: true,
                        ..Qualifiers::default()
                    },
                )?
            }
            b'R' => {
                self.pos += 1;
                self.parse_pointer(
                    Affinity::Pointer,
                    Qualifiers {
                        is_volatile: true,
                        ..Qualifiers::default()
                    },
                )?
            }
            b'S' => {
                self.pos += 1;
                self.parse_pointer(
                    Affinity::Pointer,
                    Qualifiers {
                        is_const: true,
                        is_volatile: true,
                        ..Qualifiers::default()
                    },
                )?
            }
            b'A' => {
                self.pos += 1;
                self.parse_pointer(Affinity::Reference, Qualifiers::default())?
            }
            b'B' => {
                self.pos += 1;
                self.parse_pointer(
                    Affinity::Reference,
                    Qualifiers {
                        is_volatile: true,
                        ..Qualifiers::default()
                    },
                )?
            }
            b'$' => {
                self.pos += 1;
                self.parse_dollar_type()?
            }
            b'T' => {
                self.pos += 1;
                self.parse_tag_type(Tag::Union)?
            }
            b'U' => {
                self.pos += 1;
                self.parse_tag_type(Tag::Struct)?
            }
            b'V' => {
                self.pos += 1;
                self.parse_tag_type(Tag::Class)?
            }
            b'W' => {
                self.pos += 1;
                self.parse_enum_type()?
            }
            b'Y' => {
                self.pos += 1;
                self.parse_array_type()?
            }
            _ => return Err(DemangleError::UnknownType),
        };

        if !matches!(node, Node::Primitive(_)) {
            self.memorize_type(&node);
        }

        Ok(node)
    }

    fn parse_extended_type(&mut self) -> DemangleResult<Node> {
        let primitive = match self.consume().ok_or(DemangleError::UnexpectedEnd)? {
            b'N' => Primitive::Bool,
            b'J' => Primitive::Int64,
            b'K' => Primitive::UnsignedInt64,
            b'W' => Primitive::WChar,
            b'Q' => Primitive::Char8,
            b'S' => Primitive::Char16,
            b'U' => Primitive::Char32,
            _ => {
                self.pos -= 1;
                return Err(DemangleError::UnknownType);
            }
        };

        Ok(Node::Primitive(primitive))
    }

    fn parse_pointer(
        &mut self,
        affinity: Affinity,
        preset: Qualifiers,
    ) -> DemangleResult<Node> {
        // pointer-width marker on 64-bit encodings
        if self.peek() == Some(b'E') {
            self.pos += 1;
        }

        let mut qualifiers = self.parse_qualifiers();
        qualifiers.is_const |= preset.is_const;
        qualifiers.is_volatile |= preset.is_volatile;

        let pointee = self.parse_type()?;

        Ok(Node::Pointer {
            pointee: Box::new(pointee),
            affinity,
            qualifiers,
        })
    }

    fn parse_dollar_type(&mut self) -> DemangleResult<Node> {
        match self.consume().ok_or(DemangleError::UnexpectedEnd)? {
            b'$' => match self.consume().ok_or(DemangleError::UnexpectedEnd)? {
                // rvalue reference
                b'Q' => self.parse_pointer(Affinity::RValueReference, Qualifiers::default()),
                // volatile rvalue reference
                b'R' => self.parse_pointer(
                    Affinity::RValueReference,
                    Qualifiers {
                        is_volatile: true,
                        ..Qualifiers::default()
                    },
                ),
                // bare function type
                b'A' => Ok(Node::FunctionType(self.parse_function_type()?)),
                // qualified type wrapper
                b'C' => {
                    let qualifiers = self.parse_qualifiers();
                    let inner = self.parse_type()?;
                    if qualifiers.is_empty() {
                        Ok(inner)
                    } else {
                        Ok(Node::Pointer {
                            pointee: Box::new(inner),
                            affinity: Affinity::Reference,
                            qualifiers,
                        })
                    }
                }
                _ => {
                    self.pos -= 1;
                    Err(DemangleError::UnknownType)
                }
            },
            b'A' => Ok(Node::FunctionType(self.parse_function_type()?)),
            b'Q' => self.parse_pointer(Affinity::RValueReference, Qualifiers::default()),
            _ => {
                self.pos -= 1;
                Err(DemangleError::UnknownType)
            }
        }
    }

    fn parse_qualifiers(&mut self) -> Qualifiers {
        let mut qualifiers = Qualifiers::default();

        match self.peek() {
            Some(b'A') => {
                self.pos += 1;
            }
            Some(b'B') => {
                self.pos += 1;
                qualifiers.is_const = true;
            }
            Some(b'C') => {
                self.pos += 1;
                qualifiers.is_volatile = true;
            }
            Some(b'D') => {
                self.pos += 1;
                qualifiers.is_const = true;
                qualifiers.is_volatile = true;
            }
            _ => {}
        }

        qualifiers
    }

    fn parse_tag_type(&mut self, tag: Tag) -> DemangleResult<Node> {
        let name = self.parse_qualified_name()?;
        Ok(Node::Tag { tag, name })
    }

    fn parse_enum_type(&mut self) -> DemangleResult<Node> {
        // the underlying-type digit ('4' for int) is not rendered
        self.consume().ok_or(DemangleError::UnexpectedEnd)?;
        self.parse_tag_type(Tag::Enum)
    }

    fn parse_array_type(&mut self) -> DemangleResult<Node> {
        let rank = self.parse_number()?;
        if rank < 0 || rank > 32 {
            return Err(DemangleError::InvalidMangled);
        }

        let mut dimensions = Vec::with_capacity(rank as usize);
        for _ in 0..rank {
            dimensions.push(self.parse_number()? as u64);
        }

        let element = self.parse_type()?;

        Ok(Node::Array {
            element: Box::new(element),
            dimensions,
        })
    }

    /// Numbers: `0` is zero, `1`-`9` are themselves, `A`-`P` accumulate hex
    /// digits until an `@` terminator. A leading `?` negates.
    fn parse_number(&mut self) -> DemangleResult<i64> {
        let negative = if self.peek() == Some(b'?') {
            self.pos += 1;
            true
        } else {
            false
        };

        let c = self.peek().ok_or(DemangleError::UnexpectedEnd)?;

        if c.is_ascii_digit() {
            self.pos += 1;
            let value = i64::from(c - b'0');
            return Ok(if negative { -value } else { value });
        }

        let mut value: i64 = 0;
        let mut digits = 0;
        while let Some(c) = self.peek() {
            if c == b'@' {
                self.pos += 1;
                break;
            }
            if !(b'A'..=b'P').contains(&c) {
                break;
            }
            self.pos += 1;
            value = value.wrapping_mul(16).wrapping_add(i64::from(c - b'A'));
            digits += 1;
        }

        if digits == 0 {
            return Err(DemangleError::InvalidMangled);
        }

        Ok(if negative { -value } else { value })
    }

    // ---- helpers -------------------------------------------------------

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn consume(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn memorize_name(&mut self, name: &str) {
        if self.name_backrefs.len() < BACKREF_SLOTS
            && !self.name_backrefs.iter().any(|n| n == name)
        {
            self.name_backrefs.push(name.to_string());
        }
    }

    fn memorize_type(&mut self, node: &Node) {
        if self.type_backrefs.len() < BACKREF_SLOTS {
            self.type_backrefs.push(node.clone());
        }
    }

    fn push_backref_scope(&mut self) {
        let outer = std::mem::take(&mut self.name_backrefs);
        self.saved_name_backrefs.push(outer);
    }

    fn pop_backref_scope(&mut self) {
        if let Some(outer) = self.saved_name_backrefs.pop() {
            self.name_backrefs = outer;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undecorated_passthrough() {
        assert_eq!(demangle("g").unwrap(), "g");
        assert_eq!(demangle("_main").unwrap(), "main");
        assert_eq!(demangle("printf").unwrap(), "printf");
        // only a single underscore is stripped
        assert_eq!(demangle("__chkstk").unwrap(), "_chkstk");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(demangle(""), Err(DemangleError::EmptyInput));
    }

    #[test]
    fn test_global_function() {
        assert_eq!(demangle("?f@@YAHH@Z").unwrap(), "int __cdecl f(int)");
    }

    #[test]
    fn test_global_function_void() {
        assert_eq!(demangle("?run@@YAXXZ").unwrap(), "void __cdecl run()");
    }

    #[test]
    fn test_namespaced_function() {
        assert_eq!(
            demangle("?f@ns@@YAHH@Z").unwrap(),
            "int __cdecl ns::f(int)"
        );
    }

    #[test]
    fn test_member_function() {
        assert_eq!(
            demangle("?f_public@Baz@@QEAAHH@Z").unwrap(),
            "public: int __cdecl Baz::f_public(int)"
        );
    }

    #[test]
    fn test_static_member_function() {
        assert_eq!(
            demangle("?static_f_public@Baz@@SAXXZ").unwrap(),
            "public: static void __cdecl Baz::static_f_public()"
        );
    }

    #[test]
    fn test_virtual_member_function() {
        assert_eq!(
            demangle("?vf@Base@@UEAAHXZ").unwrap(),
            "public: virtual int __cdecl Base::vf()"
        );
    }

    #[test]
    fn test_thiscall_member() {
        assert_eq!(
            demangle("?f@Baz@@QAEHH@Z").unwrap(),
            "public: int __thiscall Baz::f(int)"
        );
    }

    #[test]
    fn test_constructor() {
        assert_eq!(
            demangle("??0Point@@QEAA@XZ").unwrap(),
            "public: __cdecl Point::Point()"
        );
    }

    #[test]
    fn test_destructor() {
        assert_eq!(
            demangle("??1Point@@QEAA@XZ").unwrap(),
            "public: __cdecl Point::~Point()"
        );
    }

    #[test]
    fn test_operator() {
        assert_eq!(
            demangle("??HFoo@@YAHHH@Z").unwrap(),
            "int __cdecl Foo::operator+(int, int)"
        );
    }

    #[test]
    fn test_pointer_parameters() {
        assert_eq!(
            demangle("?g@@YAXPEAH@Z").unwrap(),
            "void __cdecl g(int *)"
        );
    }

    #[test]
    fn test_class_parameter() {
        assert_eq!(
            demangle("?take@@YAXVWidget@@@Z").unwrap(),
            "void __cdecl take(class Widget)"
        );
    }

    #[test]
    fn test_variadic() {
        assert_eq!(
            demangle("?log@@YAXPEBDZZ").unwrap(),
            "void __cdecl log(char const *, ...)"
        );
    }

    #[test]
    fn test_global_variable() {
        assert_eq!(demangle("?counter@@3HA").unwrap(), "int counter");
    }

    #[test]
    fn test_static_member_variable() {
        assert_eq!(
            demangle("?instances@Widget@@2HA").unwrap(),
            "public: static int Widget::instances"
        );
    }

    #[test]
    fn test_extended_primitives() {
        assert_eq!(demangle("?b@@3_NA").unwrap(), "bool b");
        assert_eq!(demangle("?w@@3_WA").unwrap(), "wchar_t w");
        assert_eq!(demangle("?q@@3_JA").unwrap(), "__int64 q");
    }

    #[test]
    fn test_template_function() {
        assert_eq!(
            demangle("??$max@H@std@@YAHHH@Z").unwrap(),
            "int __cdecl std::max<int>(int, int)"
        );
    }

    #[test]
    fn test_template_with_literal_arg() {
        assert_eq!(
            demangle("??$get@$00@@YAHXZ").unwrap(),
            "int __cdecl get<0>()"
        );
    }

    #[test]
    fn test_vftable() {
        assert_eq!(demangle("??_7Base@@6B@").unwrap(), "Base::`vftable'");
    }

    #[test]
    fn test_rtti_descriptor() {
        let out = demangle("??_R0?AVBase@@@8").unwrap();
        assert!(out.ends_with("`RTTI Type Descriptor'"), "got {:?}", out);
    }

    #[test]
    fn test_type_backref() {
        // second parameter reuses the first via type backref 0
        assert_eq!(
            demangle("?pair@@YAXUP@@0@Z").unwrap(),
            "void __cdecl pair(struct P, struct P)"
        );
    }

    #[test]
    fn test_name_backref() {
        // "0" names the fragment memorized for "Foo"
        assert_eq!(
            demangle("?f@Foo@@YAXV1@@Z").unwrap(),
            "void __cdecl Foo::f(class Foo)"
        );
    }

    #[test]
    fn test_deterministic() {
        let inputs = [
            "?f@@YAHH@Z",
            "??0Point@@QEAA@XZ",
            "??$max@H@std@@YAHHH@Z",
            "?take@@YAXVWidget@@@Z",
        ];
        for input in inputs {
            assert_eq!(demangle(input).unwrap(), demangle(input).unwrap());
        }
    }

    #[test]
    fn test_lossy_falls_back_to_input() {
        // truncated: the qualified name never terminates
        assert_eq!(demangle_lossy("?oops"), "oops");
        let garbled = "??_Znot_a_thing";
        assert_eq!(demangle_lossy(garbled), garbled);
    }

    #[test]
    fn test_is_mangled() {
        assert!(is_mangled("?f@@YAHH@Z"));
        assert!(is_mangled("@?f@@YAHH@Z"));
        assert!(!is_mangled("_main"));
    }
}
