mod common;

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::MsfBuilder;
use pdbscope::{Error, Source, PDB};

/// Counts reads so tests can assert how much I/O an operation performed.
#[derive(Debug)]
struct CountingSource {
    data: Vec<u8>,
    reads: AtomicUsize,
}

impl CountingSource {
    fn new(data: Vec<u8>) -> Self {
        CountingSource {
            data,
            reads: AtomicUsize::new(0),
        }
    }
}

impl Source for CountingSource {
    fn size(&self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.data.read_at(buf, offset)
    }
}

impl Source for &CountingSource {
    fn size(&self) -> io::Result<u64> {
        (**self).size()
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

#[test]
fn open_rejects_bad_magic_without_further_io() {
    let mut data = MsfBuilder::new(4096)
        .stream(Some(vec![0u8; 16]))
        .build();
    data[..8].copy_from_slice(b"NOTAPDB\0");

    let source = CountingSource::new(data);
    match PDB::open(&source) {
        Err(Error::InvalidMagic) => (),
        other => panic!("expected InvalidMagic, got {:?}", other.map(|_| ())),
    }

    // only the superblock read happened
    assert_eq!(source.reads.load(Ordering::SeqCst), 1);
}

#[test]
fn open_rejects_truncated_file() {
    let mut data = MsfBuilder::new(4096).stream(Some(vec![1u8; 10])).build();
    // chop a block off the end; the superblock still declares it
    data.truncate(data.len() - 4096);

    match PDB::open(data) {
        Err(Error::Truncated) => (),
        other => panic!("expected Truncated, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn directory_reports_sizes_and_nil_streams() {
    // four streams: sizes 28, 10, 0, nil
    let data = MsfBuilder::new(4096)
        .stream(Some((0..28).collect()))
        .stream(Some(vec![7u8; 10]))
        .stream(Some(Vec::new()))
        .stream(None)
        .build();

    let pdb = PDB::open(data).expect("open");
    assert_eq!(pdb.block_size(), 4096);
    assert_eq!(pdb.num_streams().expect("num_streams"), 4);
    assert_eq!(pdb.stream_size(0).expect("size"), 28);
    assert_eq!(pdb.stream_size(1).expect("size"), 10);
    assert_eq!(pdb.stream_size(2).expect("size"), 0);
    assert_eq!(pdb.stream_size(3).expect("size"), 0);
    assert!(pdb.stream_exists(0).expect("exists"));
    assert!(!pdb.stream_exists(2).expect("exists"));
    assert!(!pdb.stream_exists(3).expect("exists"));
    assert!(!pdb.stream_exists(4).expect("exists"));

    let contents = pdb.raw_stream(0).expect("stream").bytes().expect("bytes");
    assert_eq!(contents, (0..28).collect::<Vec<u8>>());

    match pdb.raw_stream(3) {
        Err(Error::StreamNotFound(3)) => (),
        other => panic!("expected StreamNotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn multi_block_streams_splice_correctly() {
    // a stream longer than one 512-byte block
    let payload: Vec<u8> = (0..1500u32).map(|i| (i % 251) as u8).collect();
    let data = MsfBuilder::new(512).stream(Some(payload.clone())).build();

    let pdb = PDB::open(data).expect("open");
    let stream = pdb.raw_stream(0).expect("stream");
    assert_eq!(stream.size(), 1500);

    // full sequential read returns exactly the stream
    assert_eq!(stream.bytes().expect("bytes"), payload);

    // random reads across the block boundary
    let mut buf = [0u8; 16];
    let n = stream.read_at(&mut buf, 504).expect("read_at");
    assert_eq!(n, 16);
    assert_eq!(&buf[..], &payload[504..520]);

    // at and past the end
    assert_eq!(stream.read_at(&mut buf, 1500).expect("read_at"), 0);
    assert_eq!(stream.read_at(&mut buf, 1498).expect("read_at"), 2);
}

#[test]
fn directory_follows_multi_block_block_map() {
    // enough empty streams to push the directory past 128 blocks of 512
    // bytes, so the block map itself spans more than one block
    let marker: Vec<u8> = (0..600u32).map(|i| (i * 7 % 256) as u8).collect();

    let mut builder = MsfBuilder::new(512).stream(Some(marker.clone()));
    for _ in 0..20_000 {
        builder = builder.stream(Some(Vec::new()));
    }
    let data = builder.build();

    let pdb = PDB::open(data).expect("open");
    assert_eq!(pdb.num_streams().expect("num_streams"), 20_001);
    assert_eq!(pdb.stream_size(0).expect("size"), 600);
    assert_eq!(pdb.stream_size(20_000).expect("size"), 0);

    // the two-level indirection reassembled the directory correctly
    let contents = pdb.raw_stream(0).expect("stream").bytes().expect("bytes");
    assert_eq!(contents, marker);
}

#[test]
fn raw_stream_access_survives_dbi_failure() {
    // stream 3 (DBI) holds garbage; raw access must still work
    let data = MsfBuilder::new(4096)
        .stream(Some(Vec::new()))
        .stream(Some(common::pdb_info_stream()))
        .stream(Some(Vec::new()))
        .stream(Some(vec![0xaa; 8]))
        .build();

    let pdb = PDB::open(data).expect("open");
    assert!(pdb.debug_information().is_err());

    let raw = pdb.raw_stream(3).expect("stream").bytes().expect("bytes");
    assert_eq!(raw, vec![0xaa; 8]);

    // errors are sticky: the same error comes back on retry
    let first = pdb.debug_information().unwrap_err();
    let second = pdb.debug_information().unwrap_err();
    assert_eq!(first, second);
}

#[test]
fn info_stream_parses() {
    let data = MsfBuilder::new(4096)
        .stream(Some(Vec::new()))
        .stream(Some(common::pdb_info_stream()))
        .build();

    let pdb = PDB::open(data).expect("open");
    let info = pdb.info().expect("info");
    assert_eq!(info.age, 1);
    assert_eq!(info.signature, 0x0123_4567);
}
