// Parsing and extraction against handcrafted archive images.

use crc::crc32;

use vpklib::{CasePolicy, ErrorKind, HashKind, Package};

const DIR_INDEX: u16 = 0x7FFF;
const TERMINATOR: u16 = 0xFFFF;

fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_cstr(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(value.as_bytes());
    buf.push(0);
}

fn push_entry_record(
    buf: &mut Vec<u8>,
    crc: u32,
    small_size: u16,
    chunk_index: u16,
    offset: u32,
    length: u32,
    terminator: u16,
) {
    push_u32(buf, crc);
    push_u16(buf, small_size);
    push_u16(buf, chunk_index);
    push_u32(buf, offset);
    push_u32(buf, length);
    push_u16(buf, terminator);
}

/// One-entry version 1 archive: `hello.txt` embedded with `body`.
fn v1_archive(body: &[u8], terminator: u16) -> Vec<u8> {
    let mut tree = Vec::new();
    push_cstr(&mut tree, "txt");
    push_cstr(&mut tree, " ");
    push_cstr(&mut tree, "hello");
    push_entry_record(
        &mut tree,
        crc32::checksum_ieee(body),
        0,
        DIR_INDEX,
        0,
        body.len() as u32,
        terminator,
    );
    tree.push(0); // name list
    tree.push(0); // directory list
    tree.push(0); // type list

    let mut image = Vec::new();
    push_u32(&mut image, 0x55AA1234);
    push_u32(&mut image, 1);
    push_u32(&mut image, tree.len() as u32);
    image.extend_from_slice(&tree);
    image.extend_from_slice(body);

    image
}

/// Version 2 archive with one preloaded entry and the given extra
/// sections.
fn v2_archive(
    preload: &[u8],
    body: &[u8],
    chunk_hash_section: &[u8],
    signature_section: &[u8],
) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(preload);
    data.extend_from_slice(body);
    let crc = crc32::checksum_ieee(&data);

    let mut tree = Vec::new();
    push_cstr(&mut tree, "dat");
    push_cstr(&mut tree, " ");
    push_cstr(&mut tree, "blob");
    push_entry_record(
        &mut tree,
        crc,
        preload.len() as u16,
        DIR_INDEX,
        0,
        body.len() as u32,
        TERMINATOR,
    );
    tree.extend_from_slice(preload);
    tree.push(0);
    tree.push(0);
    tree.push(0);

    let mut image = Vec::new();
    push_u32(&mut image, 0x55AA1234);
    push_u32(&mut image, 2);
    push_u32(&mut image, tree.len() as u32);
    push_u32(&mut image, body.len() as u32);
    push_u32(&mut image, chunk_hash_section.len() as u32);
    push_u32(&mut image, 0);
    push_u32(&mut image, signature_section.len() as u32);
    image.extend_from_slice(&tree);
    image.extend_from_slice(body);
    image.extend_from_slice(chunk_hash_section);
    image.extend_from_slice(signature_section);

    image
}

fn read_image(image: Vec<u8>) -> vpklib::Result<Package> {
    let mut package = Package::new();
    package.set_file_name("image_dir.vpk");
    package.read_bytes(image)?;
    Ok(package)
}

#[test]
fn rejects_bad_magic() {
    let error = read_image(vec![0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::InvalidMagic(_)));
}

#[test]
fn rejects_respawn_dialect() {
    let mut image = Vec::new();
    push_u32(&mut image, 0x55AA1234);
    push_u32(&mut image, 0x0003_0002);
    push_u32(&mut image, 0);

    let error = read_image(image).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::Unsupported(0x0003_0002)));
}

#[test]
fn rejects_unknown_version() {
    let mut image = Vec::new();
    push_u32(&mut image, 0x55AA1234);
    push_u32(&mut image, 7);
    push_u32(&mut image, 0);

    let error = read_image(image).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::InvalidVersion(7)));
}

#[test]
fn stream_input_requires_a_file_name() {
    let mut package = Package::new();
    let error = package.read_bytes(v1_archive(b"hi", TERMINATOR)).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::InvalidState(_)));
}

#[test]
fn parses_version_1() {
    let mut package = read_image(v1_archive(b"hello world", TERMINATOR)).unwrap();

    assert_eq!(package.version(), 1);
    assert_eq!(package.header_size(), 12);
    assert_eq!(package.file_count(), 1);
    assert!(package.tree_checksum().is_none());

    let entry = package.find_entry("hello.txt").cloned().unwrap();
    assert_eq!(entry.type_name(), "txt");
    assert_eq!(entry.directory(), " ");
    assert_eq!(entry.file_name(), "hello");
    assert!(entry.is_embedded());

    let data = package.read_file("hello.txt", true).unwrap();
    assert_eq!(data, b"hello world");

    let also = package.read_entry(&entry, true).unwrap();
    assert_eq!(also, b"hello world");
}

#[test]
fn enforces_the_entry_terminator() {
    let error = read_image(v1_archive(b"hi", 0xBEEF)).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::InvalidFormat(_)));
}

#[test]
fn preload_is_prepended_to_the_body() {
    let preload: Vec<u8> = (0..56u8).collect();
    let body: Vec<u8> = (0..588u16).map(|i| (i % 251) as u8).collect();

    let mut package = read_image(v2_archive(&preload, &body, &[], &[])).unwrap();

    let entry = package.find_entry("blob.dat").cloned().unwrap();
    assert_eq!(entry.small_data(), &preload[..]);
    assert_eq!(entry.length(), 588);
    assert_eq!(entry.total_length(), 644);

    let data = package.read_file("blob.dat", true).unwrap();
    assert_eq!(data.len(), 644);
    assert_eq!(&data[..56], &preload[..]);
    assert_eq!(&data[56..], &body[..]);
}

#[test]
fn buffer_too_small_is_out_of_range() {
    let mut package = read_image(v1_archive(b"hello world", TERMINATOR)).unwrap();
    let entry = package.find_entry("hello.txt").cloned().unwrap();

    let mut out = [0u8; 4];
    let error = package.read_entry_into(&entry, &mut out, false).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::OutOfRange(_)));
}

#[test]
fn legacy_chunk_hash_records_are_rewritten() {
    let mut section = Vec::new();
    push_u16(&mut section, 0); // legacy 32-bit directory index, low half
    push_u16(&mut section, 0x8000); // high half
    push_u32(&mut section, 0);
    push_u32(&mut section, 4);
    section.extend_from_slice(&[0u8; 16]);

    let package = read_image(v2_archive(&[], b"data", &section, &[])).unwrap();

    let records = package.chunk_hashes();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].chunk_index(), 0x7FFF);
    assert_eq!(records[0].hash_kind(), HashKind::Md5);
}

#[test]
fn unknown_hash_kind_is_rejected() {
    let mut section = Vec::new();
    push_u16(&mut section, 0);
    push_u16(&mut section, 5);
    push_u32(&mut section, 0);
    push_u32(&mut section, 4);
    section.extend_from_slice(&[0u8; 16]);

    let error = read_image(v2_archive(&[], b"data", &section, &[])).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::InvalidFormat(_)));
}

#[test]
fn missing_signature_counts_as_valid() {
    let mut package = read_image(v2_archive(&[], b"data", &[], &[])).unwrap();
    assert!(package.signature().is_none());
    assert!(vpklib::is_signature_valid(&mut package));
}

#[test]
fn garbage_signature_is_invalid() {
    let mut section = Vec::new();
    push_u32(&mut section, 4);
    section.extend_from_slice(b"abcd");
    push_u32(&mut section, 4);
    section.extend_from_slice(b"efgh");

    let mut package = read_image(v2_archive(&[], b"data", &[], &section)).unwrap();
    assert!(package.public_key().is_some());
    assert!(package.signature().is_some());
    assert!(!vpklib::is_signature_valid(&mut package));

    let error = vpklib::verify_signature(&mut package).unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::SignatureInvalid));
}

#[test]
fn find_accepts_every_separator_style() {
    let mut package = Package::new();
    package
        .add_file("addons/chess/chess.vdf", b"chess data".to_vec())
        .unwrap();

    let entry = package.find_entry("addons/chess/chess.vdf").unwrap().clone();
    assert_eq!(entry.directory(), "addons/chess");

    for path in [
        "addons\\chess\\chess.vdf",
        "addons/chess\\chess.vdf",
        "addons/chess/chess.vdf",
        "\\addons/chess/chess.vdf",
        "/addons/chess/chess.vdf",
    ] {
        let found = package.find_entry(path).unwrap();
        assert_eq!(found, &entry, "path: {:?}", path);
    }

    assert!(package.find_entry("addons/hello/chess.vdf").is_none());
    assert!(package.find_entry("").is_none());
}

#[test]
fn blank_parts_for_root_and_missing_extension() {
    let mut package = Package::new();
    package.add_file("", Vec::new()).unwrap();
    package.add_file("hello", b"a".to_vec()).unwrap();
    package.add_file("hello.txt", b"b".to_vec()).unwrap();
    package.add_file("folder/hello", b"c".to_vec()).unwrap();

    let entry = package.find_entry("hello").unwrap();
    assert_eq!(entry.type_name(), " ");
    assert_eq!(entry.directory(), " ");
    assert_eq!(entry.file_name(), "hello");

    let entry = package.find_entry("hello.txt").unwrap();
    assert_eq!(entry.type_name(), "txt");
    assert_eq!(entry.directory(), " ");

    let entry = package.find_entry("folder/hello").unwrap();
    assert_eq!(entry.type_name(), " ");
    assert_eq!(entry.directory(), "folder");
    assert_eq!(entry.full_path(), "folder/hello");
}

#[test]
fn optimized_lookup_honors_the_case_policy() {
    let mut package = Package::new();
    package
        .optimize_for_binary_search(CasePolicy::OrdinalIgnoreCase)
        .unwrap();
    package
        .add_file("Addons/Chess/Chess.VDF", b"x".to_vec())
        .unwrap();

    assert!(package.find_entry("addons/chess/chess.vdf").is_some());
    assert!(package.find_entry("ADDONS\\CHESS\\CHESS.vdf").is_some());

    let mut ordinal = Package::new();
    ordinal
        .optimize_for_binary_search(CasePolicy::Ordinal)
        .unwrap();
    ordinal
        .add_file("Addons/Chess/Chess.VDF", b"x".to_vec())
        .unwrap();

    assert!(ordinal.find_entry("Addons/Chess/Chess.VDF").is_some());
    assert!(ordinal.find_entry("addons/chess/chess.vdf").is_none());
}

#[test]
fn sorted_ingest_from_disk_is_searchable() {
    let mut package = Package::new();
    package
        .optimize_for_binary_search(CasePolicy::OrdinalIgnoreCase)
        .unwrap();
    package.set_file_name("image_dir.vpk");
    package
        .read_bytes(v1_archive(b"hello world", TERMINATOR))
        .unwrap();

    assert!(package.find_entry("hello.txt").is_some());
    assert!(package.find_entry("HELLO.TXT").is_some());
    assert_eq!(package.read_file("Hello.Txt", true).unwrap(), b"hello world");
}

#[test]
fn optimize_after_read_is_rejected() {
    let mut package = read_image(v1_archive(b"hi", TERMINATOR)).unwrap();
    let error = package
        .optimize_for_binary_search(CasePolicy::Ordinal)
        .unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::InvalidState(_)));
}

#[test]
fn removing_an_entry_drops_its_extension_list() {
    let mut package = read_image(v1_archive(b"hi", TERMINATOR)).unwrap();

    let removed = package.remove_file("hello.txt").unwrap();
    assert!(removed.is_some());
    assert!(package.find_entry("hello.txt").is_none());
    assert!(package.is_empty());
    assert_eq!(package.extensions().count(), 0);
}
