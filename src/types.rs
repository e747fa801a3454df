// Copyright 2025 pdbscope Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The type table: decoded, owned type values and the member-search
//! machinery built on top of the TPI stream.

use std::collections::{HashMap, HashSet, VecDeque};

use log::debug;

use crate::common::*;
use crate::pdb::PDB;
use crate::source::Source;
use crate::tpi::{self, simple_type_info, ClassKind, TypeData, TypeInformation};

/// The category of a [`Type`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Primitive,
    Pointer,
    Array,
    Function,
    MemberFunction,
    Class,
    Struct,
    Interface,
    Union,
    Enum,
    Bitfield,
    Modifier,
    Generic,
}

/// A decoded type.
///
/// `Type` values are owned and cheaply cloneable; cross-references to other
/// types are carried as numeric [`TypeIndex`]es and resolved lazily through
/// the table, so the cyclic type graph never turns into cyclic ownership.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Primitive(PrimitiveType),
    Pointer(PointerType),
    Array(ArrayType),
    Function(FunctionType),
    MemberFunction(MemberFunctionType),
    Class(ClassType),
    Union(UnionType),
    Enum(EnumType),
    Bitfield(BitfieldType),
    Modifier(ModifierType),
    /// A record kind with no richer decoding.
    Generic(GenericType),
}

impl Type {
    /// The type's index in the table.
    pub fn index(&self) -> TypeIndex {
        match self {
            Type::Primitive(t) => t.index,
            Type::Pointer(t) => t.index,
            Type::Array(t) => t.index,
            Type::Function(t) => t.index,
            Type::MemberFunction(t) => t.index,
            Type::Class(t) => t.index,
            Type::Union(t) => t.index,
            Type::Enum(t) => t.index,
            Type::Bitfield(t) => t.index,
            Type::Modifier(t) => t.index,
            Type::Generic(t) => t.index,
        }
    }

    /// The type's category.
    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Primitive(_) => TypeKind::Primitive,
            Type::Pointer(_) => TypeKind::Pointer,
            Type::Array(_) => TypeKind::Array,
            Type::Function(_) => TypeKind::Function,
            Type::MemberFunction(_) => TypeKind::MemberFunction,
            Type::Class(t) => match t.kind {
                ClassKind::Class => TypeKind::Class,
                ClassKind::Struct => TypeKind::Struct,
                ClassKind::Interface => TypeKind::Interface,
            },
            Type::Union(_) => TypeKind::Union,
            Type::Enum(_) => TypeKind::Enum,
            Type::Bitfield(_) => TypeKind::Bitfield,
            Type::Modifier(_) => TypeKind::Modifier,
            Type::Generic(_) => TypeKind::Generic,
        }
    }

    /// The type's name, or `""` for unnamed kinds.
    pub fn name(&self) -> &str {
        match self {
            Type::Primitive(t) => t.name,
            Type::Array(t) => &t.name,
            Type::Class(t) => &t.name,
            Type::Union(t) => &t.name,
            Type::Enum(t) => &t.name,
            _ => "",
        }
    }

    /// The type's size in bytes, or 0 when unknown.
    pub fn size(&self) -> u64 {
        match self {
            Type::Primitive(t) => t.size,
            Type::Pointer(t) => t.size,
            Type::Array(t) => t.size,
            Type::Class(t) => t.size,
            Type::Union(t) => t.size,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveType {
    pub index: TypeIndex,
    pub name: &'static str,
    pub size: u64,
    pub is_pointer: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerType {
    pub index: TypeIndex,
    pub referent: TypeIndex,
    pub size: u64,
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_reference: bool,
    pub is_rvalue_reference: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayType {
    pub index: TypeIndex,
    pub element_type: TypeIndex,
    pub indexing_type: TypeIndex,
    pub size: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub index: TypeIndex,
    pub return_type: TypeIndex,
    pub argument_list: TypeIndex,
    pub calling_convention: &'static str,
    pub parameter_count: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberFunctionType {
    pub index: TypeIndex,
    pub return_type: TypeIndex,
    pub class_type: TypeIndex,
    pub this_pointer_type: TypeIndex,
    pub argument_list: TypeIndex,
    pub calling_convention: &'static str,
    pub parameter_count: u16,
    pub this_adjustment: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassType {
    pub index: TypeIndex,
    pub kind: ClassKind,
    pub name: String,
    pub unique_name: String,
    pub size: u64,
    pub member_count: u16,
    pub field_list: TypeIndex,
    pub derived_from: TypeIndex,
    pub vtable_shape: TypeIndex,
    pub forward_reference: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionType {
    pub index: TypeIndex,
    pub name: String,
    pub unique_name: String,
    pub size: u64,
    pub member_count: u16,
    pub field_list: TypeIndex,
    pub forward_reference: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub index: TypeIndex,
    pub name: String,
    pub unique_name: String,
    pub underlying_type: TypeIndex,
    pub field_list: TypeIndex,
    pub count: u16,
    pub forward_reference: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BitfieldType {
    pub index: TypeIndex,
    pub underlying_type: TypeIndex,
    pub length: u8,
    pub position: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifierType {
    pub index: TypeIndex,
    pub underlying_type: TypeIndex,
    pub constant: bool,
    pub volatile: bool,
    pub unaligned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericType {
    pub index: TypeIndex,
    pub raw_kind: u16,
}

/// A class, struct, or union member.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub type_index: TypeIndex,
    /// Byte offset within the owner; 0 for static members.
    pub offset: u64,
    pub access: tpi::Access,
    pub owner_type: TypeIndex,
    pub owner_name: String,
    pub is_static: bool,
}

/// Lookup structures for member search, built in one pass over the stream.
#[derive(Debug, Default)]
pub(crate) struct MemberIndex {
    by_name: HashMap<String, Vec<Member>>,
    by_qualified_name: HashMap<String, Vec<Member>>,
    /// direct base-class names per class name
    inheritance: HashMap<String, Vec<String>>,
}

/// Provides queries over the types of a PDB.
///
/// Obtained from [`PDB::types`]. Decoded types are cached per index;
/// name and member indices are built lazily on first use.
#[derive(Debug)]
pub struct TypeTable<'p, S> {
    pdb: &'p PDB<S>,
}

impl<'p, S: Source> TypeTable<'p, S> {
    pub(crate) fn new(pdb: &'p PDB<S>) -> Self {
        TypeTable { pdb }
    }

    fn tpi(&self) -> Result<&'p TypeInformation> {
        self.pdb.type_information()
    }

    /// The first user-defined type index.
    pub fn index_begin(&self) -> Result<TypeIndex> {
        Ok(self.tpi()?.index_begin())
    }

    /// One past the last type index.
    pub fn index_end(&self) -> Result<TypeIndex> {
        Ok(self.tpi()?.index_end())
    }

    /// The number of user-defined types.
    pub fn count(&self) -> Result<usize> {
        Ok(self.tpi()?.len())
    }

    /// Returns the type at `index`, decoding and caching it on first
    /// access. Simple indices synthesize a [`PrimitiveType`].
    pub fn by_index(&self, index: TypeIndex) -> Result<Type> {
        if let Some(cached) = self.pdb.type_cache.read().expect("type cache").get(&index.0) {
            return Ok(cached.clone());
        }

        let decoded = if index.is_simple() {
            let info = simple_type_info(index).ok_or(Error::TypeNotFound(index.0))?;
            Type::Primitive(PrimitiveType {
                index,
                name: info.name,
                size: info.size,
                is_pointer: info.is_pointer,
            })
        } else {
            let tpi = self.tpi()?;
            let (kind, payload) = tpi.get_raw(index)?;
            decode_type(index, kind, payload)
        };

        self.pdb
            .type_cache
            .write()
            .expect("type cache")
            .insert(index.0, decoded.clone());
        Ok(decoded)
    }

    /// Returns an iterator over every user-defined type. Records that fail
    /// to decode are skipped.
    pub fn all(&self) -> Result<TypeRangeIter<'p, '_, S>> {
        let tpi = self.tpi()?;
        Ok(TypeRangeIter {
            table: self,
            next: tpi.index_begin().0,
            end: tpi.index_end().0,
        })
    }

    /// Returns every type whose name equals `name`, building the name index
    /// on first call.
    pub fn by_name(&self, name: &str) -> Result<Vec<Type>> {
        let index = self
            .pdb
            .type_name_index
            .get_or_init(|| self.build_name_index())
            .as_ref()
            .map_err(Error::clone)?;

        let mut matches = Vec::new();
        if let Some(indices) = index.get(name) {
            for &ti in indices {
                if let Ok(ty) = self.by_index(ti) {
                    matches.push(ty);
                }
            }
        }
        Ok(matches)
    }

    fn build_name_index(&self) -> Result<HashMap<String, Vec<TypeIndex>>> {
        let tpi = self.tpi()?;
        let mut index: HashMap<String, Vec<TypeIndex>> = HashMap::new();

        for ti in tpi.index_begin().0..tpi.index_end().0 {
            let ti = TypeIndex(ti);
            let (kind, payload) = match tpi.get_raw(ti) {
                Ok(raw) => raw,
                Err(_) => continue,
            };
            let mut buf = ParseBuffer::from(payload);
            if let Ok(data) = crate::tpi::parse_type_payload(kind, &mut buf) {
                if let Some(name) = data.name() {
                    if !name.is_empty() {
                        index
                            .entry(name.to_string().into_owned())
                            .or_default()
                            .push(ti);
                    }
                }
            }
        }

        debug!("built type name index: {} distinct names", index.len());
        Ok(index)
    }

    /// Returns the ordered member list of a class, struct, or union,
    /// including static members.
    pub fn get_members(&self, index: TypeIndex) -> Result<Vec<Member>> {
        let tpi = self.tpi()?;
        let (kind, payload) = tpi.get_raw(index)?;
        let mut buf = ParseBuffer::from(payload);
        let data = crate::tpi::parse_type_payload(kind, &mut buf)?;

        let (owner_name, field_list) = match data {
            TypeData::Class {
                name, field_list, ..
            } => (name.to_string().into_owned(), field_list),
            TypeData::Union {
                name, field_list, ..
            } => (name.to_string().into_owned(), field_list),
            _ => return Err(Error::TypeNotFound(index.0)),
        };

        if field_list == TypeIndex(0) {
            return Ok(Vec::new());
        }

        let mut members = Vec::new();
        self.walk_field_list(field_list, &mut |field| {
            match *field {
                TypeData::Member {
                    attributes,
                    field_type,
                    offset,
                    name,
                } => members.push(Member {
                    name: name.to_string().into_owned(),
                    type_index: field_type,
                    offset,
                    access: attributes.access(),
                    owner_type: index,
                    owner_name: owner_name.clone(),
                    is_static: false,
                }),
                TypeData::StaticMember {
                    attributes,
                    field_type,
                    name,
                } => members.push(Member {
                    name: name.to_string().into_owned(),
                    type_index: field_type,
                    offset: 0,
                    access: attributes.access(),
                    owner_type: index,
                    owner_name: owner_name.clone(),
                    is_static: true,
                }),
                _ => {}
            }
        })?;

        Ok(members)
    }

    /// Searches members by name across all classes, structs, and unions.
    ///
    /// A plain `"field"` pattern matches members of that name anywhere. A
    /// qualified `"Class::field"` pattern searches the named class and,
    /// through its base classes, inherited members; results are
    /// deduplicated by `(owner, member)`.
    pub fn find_members(&self, pattern: &str) -> Result<MemberMatches<'p>> {
        let index = self.member_index()?;

        let matches = match pattern.find("::") {
            Some(split) if split > 0 => {
                let class_name = &pattern[..split];
                let member_name = &pattern[split + 2..];

                let chain = inheritance_chain(&index.inheritance, class_name);
                let mut seen = HashSet::new();
                let mut hits = Vec::new();
                for class in &chain {
                    let qualified = format!("{}::{}", class, member_name);
                    if let Some(members) = index.by_qualified_name.get(&qualified) {
                        for member in members {
                            if seen.insert((member.owner_name.clone(), member.name.clone())) {
                                hits.push(member);
                            }
                        }
                    }
                }
                hits
            }
            _ => match index.by_name.get(pattern) {
                Some(members) => members.iter().collect(),
                None => Vec::new(),
            },
        };

        Ok(MemberMatches {
            members: matches.into_iter(),
        })
    }

    fn member_index(&self) -> Result<&'p MemberIndex> {
        self.pdb
            .member_index
            .get_or_init(|| self.build_member_index())
            .as_ref()
            .map_err(Error::clone)
    }

    /// One pass over the user-type range: capture every class and union
    /// with a real field list plus an index-to-name map, then decode the
    /// pending field lists into the lookup tables.
    fn build_member_index(&self) -> Result<MemberIndex> {
        let tpi = self.tpi()?;

        struct PendingClass {
            name: String,
            field_list: TypeIndex,
            type_index: TypeIndex,
        }

        let mut type_names: HashMap<TypeIndex, String> = HashMap::new();
        let mut pending: Vec<PendingClass> = Vec::new();

        for ti in tpi.index_begin().0..tpi.index_end().0 {
            let ti = TypeIndex(ti);
            let (kind, payload) = match tpi.get_raw(ti) {
                Ok(raw) => raw,
                Err(_) => continue,
            };

            let mut buf = ParseBuffer::from(payload);
            let data = match crate::tpi::parse_type_payload(kind, &mut buf) {
                Ok(data) => data,
                Err(_) => continue,
            };

            match data {
                TypeData::Class {
                    name,
                    field_list,
                    properties,
                    ..
                }
                | TypeData::Union {
                    name,
                    field_list,
                    properties,
                    ..
                } => {
                    let owner = name.to_string().into_owned();
                    type_names.insert(ti, owner.clone());
                    if !properties.forward_reference() && field_list != TypeIndex(0) {
                        pending.push(PendingClass {
                            name: owner,
                            field_list,
                            type_index: ti,
                        });
                    }
                }
                _ => {}
            }
        }

        let mut index = MemberIndex::default();

        for class in &pending {
            let result = self.walk_field_list(class.field_list, &mut |field| match *field {
                TypeData::Member {
                    attributes,
                    field_type,
                    offset,
                    name,
                } => {
                    let member = Member {
                        name: name.to_string().into_owned(),
                        type_index: field_type,
                        offset,
                        access: attributes.access(),
                        owner_type: class.type_index,
                        owner_name: class.name.clone(),
                        is_static: false,
                    };
                    insert_member(&mut index, member);
                }
                TypeData::StaticMember {
                    attributes,
                    field_type,
                    name,
                } => {
                    let member = Member {
                        name: name.to_string().into_owned(),
                        type_index: field_type,
                        offset: 0,
                        access: attributes.access(),
                        owner_type: class.type_index,
                        owner_name: class.name.clone(),
                        is_static: true,
                    };
                    insert_member(&mut index, member);
                }
                TypeData::BaseClass { base_class, .. } => {
                    if let Some(base_name) = type_names.get(&base_class) {
                        index
                            .inheritance
                            .entry(class.name.clone())
                            .or_default()
                            .push(base_name.clone());
                    }
                }
                TypeData::VirtualBaseClass { base_class, .. } => {
                    if let Some(base_name) = type_names.get(&base_class) {
                        index
                            .inheritance
                            .entry(class.name.clone())
                            .or_default()
                            .push(base_name.clone());
                    }
                }
                _ => {}
            });

            // a single undecodable field list does not poison the index
            if result.is_err() {
                continue;
            }
        }

        debug!(
            "built member index: {} member names, {} classes with bases",
            index.by_name.len(),
            index.inheritance.len()
        );
        Ok(index)
    }

    /// Decodes a field list, following `LF_INDEX` continuations, invoking
    /// `visit` on every field.
    fn walk_field_list(
        &self,
        field_list: TypeIndex,
        visit: &mut dyn FnMut(&TypeData<'_>),
    ) -> Result<()> {
        let tpi = self.tpi()?;
        let mut next = Some(field_list);

        while let Some(current) = next {
            let (kind, payload) = tpi.get_raw(current)?;
            if kind != crate::tpi::constants::LF_FIELDLIST {
                return Err(Error::InvalidRecord);
            }

            let mut buf = ParseBuffer::from(payload);
            match crate::tpi::parse_type_payload(kind, &mut buf)? {
                TypeData::FieldList {
                    fields,
                    continuation,
                } => {
                    for field in &fields {
                        visit(field);
                    }
                    next = continuation;
                }
                _ => return Err(Error::InvalidRecord),
            }
        }

        Ok(())
    }
}

/// Iterator over all user-defined types; see [`TypeTable::all`].
#[derive(Debug)]
pub struct TypeRangeIter<'p, 't, S> {
    table: &'t TypeTable<'p, S>,
    next: u32,
    end: u32,
}

impl<S: Source> Iterator for TypeRangeIter<'_, '_, S> {
    type Item = Type;

    fn next(&mut self) -> Option<Type> {
        while self.next < self.end {
            let ti = TypeIndex(self.next);
            self.next += 1;
            if let Ok(ty) = self.table.by_index(ti) {
                return Some(ty);
            }
        }
        None
    }
}

/// Iterator over member search results; see [`TypeTable::find_members`].
#[derive(Debug)]
pub struct MemberMatches<'p> {
    members: std::vec::IntoIter<&'p Member>,
}

impl<'p> Iterator for MemberMatches<'p> {
    type Item = &'p Member;

    fn next(&mut self) -> Option<&'p Member> {
        self.members.next()
    }
}

fn insert_member(index: &mut MemberIndex, member: Member) {
    let qualified = format!("{}::{}", member.owner_name, member.name);
    index
        .by_name
        .entry(member.name.clone())
        .or_default()
        .push(member.clone());
    index.by_qualified_name.entry(qualified).or_default().push(member);
}

/// The class and all its ancestors, breadth first, starting set `{name}`.
fn inheritance_chain(inheritance: &HashMap<String, Vec<String>>, name: &str) -> Vec<String> {
    let mut chain = vec![name.to_string()];
    let mut visited: HashSet<String> = chain.iter().cloned().collect();
    let mut queue: VecDeque<String> = chain.iter().cloned().collect();

    while let Some(current) = queue.pop_front() {
        if let Some(bases) = inheritance.get(&current) {
            for base in bases {
                if visited.insert(base.clone()) {
                    chain.push(base.clone());
                    queue.push_back(base.clone());
                }
            }
        }
    }

    chain
}

pub(crate) fn decode_type(index: TypeIndex, kind: u16, payload: &[u8]) -> Type {
    let mut buf = ParseBuffer::from(payload);
    let data = match crate::tpi::parse_type_payload(kind, &mut buf) {
        Ok(data) => data,
        Err(_) => return Type::Generic(GenericType { index, raw_kind: kind }),
    };

    match data {
        TypeData::Modifier {
            underlying_type,
            constant,
            volatile,
            unaligned,
        } => Type::Modifier(ModifierType {
            index,
            underlying_type,
            constant,
            volatile,
            unaligned,
        }),

        TypeData::Pointer {
            underlying_type,
            attributes,
            ..
        } => Type::Pointer(PointerType {
            index,
            referent: underlying_type,
            size: u64::from(attributes.size()),
            is_const: attributes.is_const(),
            is_volatile: attributes.is_volatile(),
            is_reference: attributes.is_reference(),
            is_rvalue_reference: attributes.is_rvalue_reference(),
        }),

        TypeData::Array {
            element_type,
            indexing_type,
            size,
            name,
        } => Type::Array(ArrayType {
            index,
            element_type,
            indexing_type,
            size,
            name: name.to_string().into_owned(),
        }),

        TypeData::Procedure {
            return_type,
            attributes,
            parameter_count,
            argument_list,
        } => Type::Function(FunctionType {
            index,
            return_type,
            argument_list,
            calling_convention: tpi::calling_convention_name(attributes.calling_convention()),
            parameter_count,
        }),

        TypeData::MemberFunction {
            return_type,
            class_type,
            this_pointer_type,
            attributes,
            parameter_count,
            argument_list,
            this_adjustment,
        } => Type::MemberFunction(MemberFunctionType {
            index,
            return_type,
            class_type,
            this_pointer_type,
            argument_list,
            calling_convention: tpi::calling_convention_name(attributes.calling_convention()),
            parameter_count,
            this_adjustment,
        }),

        TypeData::Class {
            kind,
            count,
            properties,
            field_list,
            derived_from,
            vtable_shape,
            size,
            name,
            unique_name,
        } => Type::Class(ClassType {
            index,
            kind,
            name: name.to_string().into_owned(),
            unique_name: unique_name.to_string().into_owned(),
            size,
            member_count: count,
            field_list,
            derived_from,
            vtable_shape,
            forward_reference: properties.forward_reference(),
        }),

        TypeData::Union {
            count,
            properties,
            field_list,
            size,
            name,
            unique_name,
        } => Type::Union(UnionType {
            index,
            name: name.to_string().into_owned(),
            unique_name: unique_name.to_string().into_owned(),
            size,
            member_count: count,
            field_list,
            forward_reference: properties.forward_reference(),
        }),

        TypeData::Enumeration {
            count,
            properties,
            underlying_type,
            field_list,
            name,
            unique_name,
        } => Type::Enum(EnumType {
            index,
            name: name.to_string().into_owned(),
            unique_name: unique_name.to_string().into_owned(),
            underlying_type,
            field_list,
            count,
            forward_reference: properties.forward_reference(),
        }),

        TypeData::Bitfield {
            underlying_type,
            length,
            position,
        } => Type::Bitfield(BitfieldType {
            index,
            underlying_type,
            length,
            position,
        }),

        _ => Type::Generic(GenericType { index, raw_kind: kind }),
    }
}
