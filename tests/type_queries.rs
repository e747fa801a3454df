mod common;

use common::{
    base_class_field, field_list_payload, frame_record, member_field, structure_payload,
    tpi_stream, MsfBuilder, LF_FIELDLIST, LF_STRUCTURE,
};
use pdbscope::{Error, Type, TypeIndex, TypeKind, PDB};

const T_INT: u32 = 0x74;

/// Builds a PDB whose TPI holds:
///   0x1000 struct Point { int x; int y; }  (field list 0x1001)
///   0x1002 struct Base { int m; }          (field list 0x1003)
///   0x1004 struct Derived : Base { int d; } (field list 0x1005)
fn fixture() -> Vec<u8> {
    let records = vec![
        frame_record(
            LF_STRUCTURE,
            &structure_payload(2, 0, 0x1001, 8, "Point"),
        ),
        frame_record(
            LF_FIELDLIST,
            &field_list_payload(&[
                member_field(T_INT, 0, "x"),
                member_field(T_INT, 4, "y"),
            ]),
        ),
        frame_record(LF_STRUCTURE, &structure_payload(1, 0, 0x1003, 4, "Base")),
        frame_record(
            LF_FIELDLIST,
            &field_list_payload(&[member_field(T_INT, 0, "m")]),
        ),
        frame_record(
            LF_STRUCTURE,
            &structure_payload(2, 0, 0x1005, 8, "Derived"),
        ),
        frame_record(
            LF_FIELDLIST,
            &field_list_payload(&[
                base_class_field(0x1002, 0),
                member_field(T_INT, 4, "d"),
            ]),
        ),
    ];

    MsfBuilder::new(4096)
        .stream(Some(Vec::new())) // 0: old directory
        .stream(Some(common::pdb_info_stream())) // 1: PDB info
        .stream(Some(tpi_stream(&records))) // 2: TPI
        .stream(Some(Vec::new())) // 3: DBI (absent)
        .stream(Some(Vec::new())) // 4: IPI
        .build()
}

#[test]
fn by_index_decodes_structures() {
    let pdb = PDB::open(fixture()).expect("open");
    let types = pdb.types();

    let point = types.by_index(TypeIndex(0x1000)).expect("Point");
    assert_eq!(point.kind(), TypeKind::Struct);
    assert_eq!(point.name(), "Point");
    assert_eq!(point.size(), 8);

    match point {
        Type::Class(ref class) => {
            assert_eq!(class.field_list, TypeIndex(0x1001));
            assert_eq!(class.member_count, 2);
            assert!(!class.forward_reference);
            // has_unique_name unset: blank unique name
            assert!(class.unique_name.is_empty());
        }
        ref other => panic!("expected a class type, got {:?}", other),
    }

    // decoding is cached; a second lookup observes the same value
    let again = types.by_index(TypeIndex(0x1000)).expect("Point");
    assert_eq!(again, point);
}

#[test]
fn by_index_synthesizes_primitives() {
    let pdb = PDB::open(fixture()).expect("open");
    let types = pdb.types();

    // int: 4 bytes, no indirection
    let int = types.by_index(TypeIndex(0x0074)).expect("int");
    assert_eq!(int.kind(), TypeKind::Primitive);
    assert_eq!(int.name(), "int");
    assert_eq!(int.size(), 4);
    match int {
        Type::Primitive(ref primitive) => assert!(!primitive.is_pointer),
        ref other => panic!("expected a primitive, got {:?}", other),
    }

    // near64 pointer to int: 8 bytes, pointer
    let int_ptr = types.by_index(TypeIndex(0x0674)).expect("int*");
    assert_eq!(int_ptr.size(), 8);
    match int_ptr {
        Type::Primitive(ref primitive) => assert!(primitive.is_pointer),
        ref other => panic!("expected a primitive, got {:?}", other),
    }
}

#[test]
fn by_index_rejects_missing_types() {
    let pdb = PDB::open(fixture()).expect("open");
    let types = pdb.types();

    match types.by_index(TypeIndex(0x1006)) {
        Err(Error::TypeNotFound(0x1006)) => (),
        other => panic!("expected TypeNotFound, got {:?}", other),
    }
}

#[test]
fn get_members_lists_fields_in_order() {
    let pdb = PDB::open(fixture()).expect("open");
    let types = pdb.types();

    let members = types.get_members(TypeIndex(0x1000)).expect("members");
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].name, "x");
    assert_eq!(members[0].offset, 0);
    assert_eq!(members[1].name, "y");
    assert_eq!(members[1].offset, 4);
    assert_eq!(members[1].owner_name, "Point");
    assert!(!members[1].is_static);
}

#[test]
fn find_members_qualified() {
    let pdb = PDB::open(fixture()).expect("open");
    let types = pdb.types();

    let hits: Vec<_> = types.find_members("Point::y").expect("search").collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].name, "y");
    assert_eq!(hits[0].offset, 4);
    assert_eq!(hits[0].owner_name, "Point");

    assert!(types
        .find_members("Point::nope")
        .expect("search")
        .next()
        .is_none());
}

#[test]
fn find_members_simple_name() {
    let pdb = PDB::open(fixture()).expect("open");
    let types = pdb.types();

    let hits: Vec<_> = types.find_members("y").expect("search").collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].owner_name, "Point");
}

#[test]
fn find_members_traverses_inheritance() {
    let pdb = PDB::open(fixture()).expect("open");
    let types = pdb.types();

    // m is inherited from Base: the search follows the base-class edge and
    // reports the member under its defining class
    let hits: Vec<_> = types.find_members("Derived::m").expect("search").collect();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].owner_name, "Base");
    assert_eq!(hits[0].offset, 0);

    // the same physical member is reachable directly
    let direct: Vec<_> = types.find_members("Base::m").expect("search").collect();
    assert_eq!(direct.len(), 1);
    assert_eq!(direct[0].owner_name, "Base");
    assert_eq!(direct[0].offset, hits[0].offset);

    // Derived's own member is found under Derived
    let own: Vec<_> = types.find_members("Derived::d").expect("search").collect();
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].owner_name, "Derived");
    assert_eq!(own[0].offset, 4);
}

#[test]
fn by_name_finds_structures() {
    let pdb = PDB::open(fixture()).expect("open");
    let types = pdb.types();

    let matches = types.by_name("Point").expect("by_name");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].index(), TypeIndex(0x1000));

    assert!(types.by_name("Missing").expect("by_name").is_empty());
}

#[test]
fn all_iterates_every_record() {
    let pdb = PDB::open(fixture()).expect("open");
    let types = pdb.types();

    assert_eq!(types.count().expect("count"), 6);
    let all: Vec<_> = types.all().expect("all").collect();
    assert_eq!(all.len(), 6);
    assert_eq!(all[0].name(), "Point");
}

#[test]
fn type_queries_survive_dbi_failure() {
    // the DBI stream is empty in this fixture; type queries are isolated
    let pdb = PDB::open(fixture()).expect("open");
    assert!(pdb.debug_information().is_err());
    assert!(pdb.types().by_index(TypeIndex(0x1000)).is_ok());
}
