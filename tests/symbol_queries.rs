mod common;

use common::{dbi_stream, pdb_info_stream, psi_stream, pub32_record, section_header_stream, MsfBuilder};
use pdbscope::{SymbolKind, PDB};

/// Builds a PDB whose symbol-record stream holds three publics:
/// `_main` at 1:0x100, `?f@@YAHH@Z` at 1:0x200, and `g` at 1:0x300.
fn fixture() -> Vec<u8> {
    let records = [
        pub32_record("_main", 1, 0x100),
        pub32_record("?f@@YAHH@Z", 1, 0x200),
        pub32_record("g", 1, 0x300),
    ];

    let mut sym_stream = Vec::new();
    let mut offsets = Vec::new();
    for record in &records {
        offsets.push(sym_stream.len() as u32);
        sym_stream.extend_from_slice(record);
    }

    MsfBuilder::new(4096)
        .stream(Some(Vec::new())) // 0: old directory
        .stream(Some(pdb_info_stream())) // 1: PDB info
        .stream(Some(Vec::new())) // 2: TPI
        .stream(Some(dbi_stream(5, 6, Some(7)))) // 3: DBI
        .stream(Some(Vec::new())) // 4: IPI
        .stream(Some(sym_stream)) // 5: symbol records
        .stream(Some(psi_stream(&offsets))) // 6: PSI
        .stream(Some(section_header_stream(0x1000, 0x4000))) // 7: sections
        .build()
}

#[test]
fn public_iteration_streams_in_order() {
    let pdb = PDB::open(fixture()).expect("open");
    let symbols = pdb.symbols();

    let names: Vec<String> = symbols
        .public()
        .expect("public")
        .map(|sym| sym.name().to_string())
        .collect();
    assert_eq!(names, vec!["_main", "?f@@YAHH@Z", "g"]);

    assert_eq!(symbols.public_count().expect("count"), 3);

    let cached = symbols.public_cached().expect("cached");
    assert_eq!(cached.len(), 3);
    assert_eq!(cached[2].name(), "g");
    assert_eq!(cached[2].kind(), SymbolKind::Public);
    assert_eq!(cached[2].section(), 1);
    assert_eq!(cached[2].offset(), 0x300);
}

#[test]
fn early_termination_is_cheap() {
    let pdb = PDB::open(fixture()).expect("open");
    let symbols = pdb.symbols();

    // the consumer may stop whenever it likes
    let first = symbols.public().expect("public").next().expect("first");
    assert_eq!(first.name(), "_main");
}

#[test]
fn find_by_address_returns_containing_symbol() {
    let pdb = PDB::open(fixture()).expect("open");
    let symbols = pdb.symbols();

    // inside f's extent: the containing symbol, not an exact hit
    let hit = symbols
        .find_by_address(1, 0x250)
        .expect("lookup")
        .expect("hit");
    assert_eq!(hit.symbol.name(), "?f@@YAHH@Z");
    assert!(!hit.exact);

    let hit = symbols
        .find_by_address(1, 0x200)
        .expect("lookup")
        .expect("hit");
    assert_eq!(hit.symbol.name(), "?f@@YAHH@Z");
    assert!(hit.exact);

    // before the first symbol, and in a section with no symbols
    assert!(symbols.find_by_address(1, 0x50).expect("lookup").is_none());
    assert!(symbols.find_by_address(2, 0x100).expect("lookup").is_none());
}

#[test]
fn find_by_name_and_demangle() {
    let pdb = PDB::open(fixture()).expect("open");
    let symbols = pdb.symbols();

    let g = symbols
        .find_by_name("g")
        .expect("lookup")
        .expect("symbol g");
    assert_eq!(g.demangled_name(), "g");

    let f = symbols
        .find_by_name("?f@@YAHH@Z")
        .expect("lookup")
        .expect("symbol f");
    assert_eq!(f.demangled_name(), "int __cdecl f(int)");
    // demangling is computed once and stable
    assert_eq!(f.demangled_name(), "int __cdecl f(int)");

    let main = symbols
        .find_by_name("_main")
        .expect("lookup")
        .expect("symbol main");
    assert_eq!(main.demangled_name(), "main");

    assert!(symbols.find_by_name("nope").expect("lookup").is_none());
}

#[test]
fn by_name_yields_every_match() {
    let pdb = PDB::open(fixture()).expect("open");
    let symbols = pdb.symbols();

    let matches: Vec<_> = symbols.by_name("g").expect("by_name").collect();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].offset(), 0x300);

    let matches: Vec<_> = symbols.by_name("absent").expect("by_name").collect();
    assert!(matches.is_empty());
}

#[test]
fn all_yields_publics_first() {
    let pdb = PDB::open(fixture()).expect("open");
    let symbols = pdb.symbols();

    // no modules in this fixture, so all() is exactly the publics
    let all: Vec<_> = symbols.all().expect("all").collect();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].name(), "_main");
}

#[test]
fn sections_translate_offsets() {
    let pdb = PDB::open(fixture()).expect("open");
    let sections = pdb.sections().expect("sections");

    assert_eq!(sections.len(), 1);
    assert_eq!(sections.all()[0].name(), ".text");
    assert_eq!(sections.to_rva(1, 0x200), 0x1200);
    assert_eq!(sections.to_rva(2, 0x200), 0);
    assert_eq!(sections.find_section(0x1200), (1, 0x200));
    assert_eq!(sections.find_section(0x9000), (0, 0));
}

#[test]
fn machine_type_from_dbi() {
    let pdb = PDB::open(fixture()).expect("open");
    let dbi = pdb.debug_information().expect("dbi");
    assert_eq!(dbi.machine_type(), pdbscope::MachineType::Amd64);
    assert!(!dbi.header().is_stripped());
}
