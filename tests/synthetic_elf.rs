//! End-to-end behavior against a hand-assembled ELF image.
//!
//! The fixture is a minimal but well-formed ELF64 executable carrying a
//! build-id note, a read-only data section with an embedded version tag,
//! a Go 1.18 line table, and a moduledata record — enough to drive every
//! derivation of `GoFile` without shipping compiled binaries.

mod common;

use common::{build_pclntab, put_word, write_fixture, TempPath};
use gobex::{Arch, ByteOrder, Error, GoFile, TableVersion};

const TEXT_ADDR: u64 = 0x40_1000;
const TEXT_SIZE: u64 = 0x200;
const RODATA_ADDR: u64 = 0x48_0000;
const PCLNTAB_ADDR: u64 = 0x50_0000;
const NOPTRDATA_ADDR: u64 = 0x53_8000;
const DATA_ADDR: u64 = 0x53_8020;
const DATA_LEN: u64 = 0xe2c4;
const GOFUNC: u64 = 0x4b_0000;

const BUILD_ID: &str =
    "DrtsigZmOidE-wfbFVNF/io-X8KB-ByimyyODdYUe/Z7tIlu8GbOwt0Jup-Hji/fofocVx5sk8UpaKMTx0a";

// Moduledata in the Go 1.18 shape, first word pointing at the table.
fn build_moduledata(pclntab_len: u64) -> Vec<u8> {
    let mut buf = vec![0u8; 50 * 8];
    put_word(&mut buf, 0, PCLNTAB_ADDR); // pcHeader
    put_word(&mut buf, 13 * 8, PCLNTAB_ADDR); // pclntable ptr
    put_word(&mut buf, 14 * 8, pclntab_len);
    put_word(&mut buf, 16 * 8, PCLNTAB_ADDR + 0x100); // ftab
    put_word(&mut buf, 17 * 8, 2);
    put_word(&mut buf, 22 * 8, TEXT_ADDR);
    put_word(&mut buf, 23 * 8, TEXT_ADDR + TEXT_SIZE);
    put_word(&mut buf, 24 * 8, NOPTRDATA_ADDR);
    put_word(&mut buf, 25 * 8, NOPTRDATA_ADDR + 0x20);
    put_word(&mut buf, 26 * 8, DATA_ADDR);
    put_word(&mut buf, 27 * 8, DATA_ADDR + DATA_LEN);
    put_word(&mut buf, 28 * 8, 0x55_0000); // bss
    put_word(&mut buf, 29 * 8, 0x56_0000);
    put_word(&mut buf, 30 * 8, 0x56_0000); // noptrbss
    put_word(&mut buf, 31 * 8, 0x57_0000);
    put_word(&mut buf, 35 * 8, 0x4a_0000); // types
    put_word(&mut buf, 36 * 8, 0x4a_8000);
    put_word(&mut buf, 38 * 8, GOFUNC); // gofunc
    put_word(&mut buf, 42 * 8, RODATA_ADDR); // typelinks
    put_word(&mut buf, 43 * 8, 2);
    put_word(&mut buf, 45 * 8, 0x4a_2000); // itablinks
    put_word(&mut buf, 46 * 8, 0);
    buf
}

fn build_note() -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&4u32.to_le_bytes());
    buf.extend_from_slice(&(BUILD_ID.len() as u32).to_le_bytes());
    buf.extend_from_slice(&4u32.to_le_bytes());
    buf.extend_from_slice(b"Go\x00\x00");
    buf.extend_from_slice(BUILD_ID.as_bytes());
    buf
}

struct SectionSpec {
    name: &'static str,
    sh_type: u32,
    addr: u64,
    data: Vec<u8>,
}

fn assemble_elf(sections: Vec<SectionSpec>) -> Vec<u8> {
    const EHSIZE: usize = 64;
    const SHENTSIZE: usize = 64;
    const SHT_STRTAB: u32 = 3;

    // String table for section names.
    let mut shstrtab = vec![0u8];
    let mut name_offs = Vec::new();
    for s in &sections {
        name_offs.push(shstrtab.len() as u32);
        shstrtab.extend_from_slice(s.name.as_bytes());
        shstrtab.push(0);
    }
    let shstr_name_off = shstrtab.len() as u32;
    shstrtab.extend_from_slice(b".shstrtab\0");

    // Content layout: header, section bodies, shstrtab, headers.
    let mut out = vec![0u8; EHSIZE];
    let mut offsets = Vec::new();
    for s in &sections {
        offsets.push(out.len() as u64);
        out.extend_from_slice(&s.data);
    }
    let shstr_off = out.len() as u64;
    out.extend_from_slice(&shstrtab);
    while out.len() % 8 != 0 {
        out.push(0);
    }
    let shoff = out.len() as u64;

    let shnum = sections.len() + 2; // NULL + sections + shstrtab
    let shdr = |name: u32, sh_type: u32, addr: u64, off: u64, size: u64| {
        let mut h = vec![0u8; SHENTSIZE];
        h[0..4].copy_from_slice(&name.to_le_bytes());
        h[4..8].copy_from_slice(&sh_type.to_le_bytes());
        h[16..24].copy_from_slice(&addr.to_le_bytes());
        h[24..32].copy_from_slice(&off.to_le_bytes());
        h[32..40].copy_from_slice(&size.to_le_bytes());
        h
    };

    let mut headers = shdr(0, 0, 0, 0, 0); // SHT_NULL
    for (i, s) in sections.iter().enumerate() {
        headers.extend(shdr(
            name_offs[i],
            s.sh_type,
            s.addr,
            offsets[i],
            s.data.len() as u64,
        ));
    }
    headers.extend(shdr(
        shstr_name_off,
        SHT_STRTAB,
        0,
        shstr_off,
        shstrtab.len() as u64,
    ));
    out.extend_from_slice(&headers);

    // ELF header.
    out[0..4].copy_from_slice(b"\x7fELF");
    out[4] = 2; // ELFCLASS64
    out[5] = 1; // little endian
    out[6] = 1;
    out[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    out[18..20].copy_from_slice(&62u16.to_le_bytes()); // EM_X86_64
    out[40..48].copy_from_slice(&shoff.to_le_bytes());
    out[58..60].copy_from_slice(&(SHENTSIZE as u16).to_le_bytes());
    out[60..62].copy_from_slice(&(shnum as u16).to_le_bytes());
    out[62..64].copy_from_slice(&((shnum - 1) as u16).to_le_bytes());
    out
}

fn fixture() -> Vec<u8> {
    const SHT_PROGBITS: u32 = 1;
    const SHT_NOTE: u32 = 7;

    let pclntab = build_pclntab(TEXT_ADDR, 0xffff_fff0);
    let moduledata = build_moduledata(pclntab.len() as u64);

    let mut rodata = vec![0u8; 0x40];
    // Typelink offsets land at the start of .rodata.
    rodata[0..4].copy_from_slice(&0x10u32.to_le_bytes());
    rodata[4..8].copy_from_slice(&0x20u32.to_le_bytes());
    rodata.extend_from_slice(b"padding go1.18.1 more padding");
    rodata.resize(0x100, 0);

    assemble_elf(vec![
        SectionSpec {
            name: ".note.go.buildid",
            sh_type: SHT_NOTE,
            addr: 0x40_0f00,
            data: build_note(),
        },
        SectionSpec {
            name: ".text",
            sh_type: SHT_PROGBITS,
            addr: TEXT_ADDR,
            data: vec![0xcc; TEXT_SIZE as usize],
        },
        SectionSpec {
            name: ".rodata",
            sh_type: SHT_PROGBITS,
            addr: RODATA_ADDR,
            data: rodata,
        },
        SectionSpec {
            name: ".gopclntab",
            sh_type: SHT_PROGBITS,
            addr: PCLNTAB_ADDR,
            data: pclntab,
        },
        SectionSpec {
            name: ".noptrdata",
            sh_type: SHT_PROGBITS,
            addr: NOPTRDATA_ADDR,
            data: moduledata,
        },
    ])
}

fn open_fixture() -> (GoFile, TempPath) {
    let path = write_fixture("elf", &fixture());
    let f = GoFile::open(&path.0).expect("open fixture");
    (f, path)
}

#[test]
fn open_reports_file_info_and_build_id() {
    let (f, _g) = open_fixture();
    let info = f.file_info();
    assert_eq!(info.arch, Arch::Amd64);
    assert_eq!(info.os, "linux");
    assert_eq!(info.byte_order, ByteOrder::Little);
    assert_eq!(info.word_size, 8);
    assert_eq!(f.build_id(), BUILD_ID);
}

#[test]
fn pclntab_is_located_and_decoded() {
    let (f, _g) = open_fixture();
    let tab = f.pclntab().unwrap();
    assert_eq!(tab.addr, PCLNTAB_ADDR);
    assert_eq!(tab.version(), TableVersion::V118);
    // The text base comes from the moduledata scan; no symbols here.
    assert_eq!(tab.text_start, TEXT_ADDR);
    assert_eq!(&tab.data()[..4], &[0xf0, 0xff, 0xff, 0xff]);

    let funcs = tab.funcs().unwrap();
    assert_eq!(funcs.len(), 2);
    assert_eq!(funcs[0].name, "main.main");
    assert_eq!(funcs[0].entry, TEXT_ADDR);
    assert_eq!(funcs[1].name, "runtime.schedinit");
    assert_eq!(funcs[1].end, TEXT_ADDR + 0x100);
}

#[test]
fn version_is_discovered_from_rodata_scan() {
    let (f, _g) = open_fixture();
    let v = f.compiler_version().unwrap();
    assert_eq!(v.name, "go1.18.1");
    assert!(!v.sha.is_empty());
}

#[test]
fn moduledata_matches_the_planted_record() {
    let (f, _g) = open_fixture();
    let md = f.moduledata().unwrap();
    assert_eq!(md.address, NOPTRDATA_ADDR);
    assert_eq!(md.text.address, TEXT_ADDR);
    assert_eq!(md.text.length, TEXT_SIZE);
    assert_eq!(md.data.address, DATA_ADDR);
    assert_eq!(md.data.length, DATA_LEN);
    assert_eq!(md.pclntab.address, PCLNTAB_ADDR);
    assert!(md.pclntab.length > 0);
    assert_eq!(md.gofunc, GOFUNC);

    // Section handles resolve through the container reader.
    let tab_bytes = md.pclntab.data(f.container()).unwrap();
    assert_eq!(&tab_bytes[..4], &[0xf0, 0xff, 0xff, 0xff]);
    assert_eq!(tab_bytes.len(), f.pclntab().unwrap().data().len());

    assert_eq!(md.typelink_data(f.container()).unwrap(), vec![0x10, 0x20]);
}

#[test]
fn moduledata_honors_a_version_override() {
    let (f, _g) = open_fixture();
    f.set_go_version("go1.18.1").unwrap();
    let md = f.moduledata().unwrap();
    assert_eq!(md.gofunc, GOFUNC);
    assert_eq!(
        f.set_go_version("go9.9.9").unwrap_err(),
        Error::InvalidGoVersion
    );
}

#[test]
fn packages_are_classified() {
    let (f, _g) = open_fixture();
    let catalog = f.packages().unwrap();
    assert_eq!(catalog.packages.len(), 1);
    assert_eq!(catalog.packages[0].name, "main");
    assert_eq!(catalog.packages[0].filepath, "/go/src/app");
    assert_eq!(catalog.std.len(), 1);
    assert_eq!(catalog.std[0].name, "runtime");
    assert!(catalog.vendors.is_empty());

    let main_fn = &catalog.packages[0].functions[0];
    assert_eq!(main_fn.name, "main");
    assert_eq!(main_fn.filename, "main.go");
    assert_eq!(main_fn.src_line_start, 5);
    assert_eq!(main_fn.src_line_end, 7);
}

#[test]
fn source_info_walks_the_line_table() {
    let (f, _g) = open_fixture();
    let catalog = f.packages().unwrap();
    let main_fn = &catalog.packages[0].functions[0];
    let (file, start, end) = f.source_info(main_fn).unwrap();
    assert_eq!(file, "/go/src/app/main.go");
    assert!(start <= end);
    assert_eq!((start, end), (5, 7));
}

#[test]
fn bytes_are_bounds_checked() {
    let (f, _g) = open_fixture();
    let code = f.bytes(TEXT_ADDR, 16).unwrap();
    assert_eq!(code, vec![0xcc; 16]);

    assert_eq!(
        f.bytes(TEXT_ADDR, TEXT_SIZE + 1).unwrap_err(),
        Error::NotEnoughBytesRead
    );
    assert_eq!(
        f.bytes(0xdead_0000, 4).unwrap_err(),
        Error::SectionDoesNotExist
    );
}

#[test]
fn optional_data_reports_gaps_as_errors_not_panics() {
    let (f, _g) = open_fixture();
    assert_eq!(f.build_info().unwrap_err(), Error::NoBuildInfo);
    assert_eq!(f.goroot().unwrap_err(), Error::NoGoRootFound);
}

#[test]
fn non_executables_are_rejected() {
    let garbage = write_fixture("garbage", b"not an executable at all");
    assert_eq!(
        GoFile::open(&garbage.0).unwrap_err(),
        Error::UnsupportedFile
    );

    let tiny = write_fixture("tiny", b"\x7fE");
    assert_eq!(
        GoFile::open(&tiny.0).unwrap_err(),
        Error::NotEnoughBytesRead
    );
}
