//! Container formats.
//!
//! A uniform view over the three executable containers the Go toolchain
//! produces: ELF, PE, and Mach-O. Each reader parses the raw headers over
//! the memory-mapped file at open time and answers section, symbol, and
//! metadata queries from offsets recorded then; no I/O happens after open.

pub mod elf;
pub mod macho;
pub mod pe;

use std::collections::HashMap;

use crate::error::{Error, Result};

pub use elf::ElfFile;
pub use macho::MachoFile;
pub use pe::PeFile;

/// Architecture the binary was compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Arch {
    I386,
    Amd64,
    Arm,
    Arm64,
    Mips,
}

impl Arch {
    /// Tag used in reported file information.
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::I386 => "i386",
            Arch::Amd64 => "amd64",
            Arch::Arm => "arm",
            Arch::Arm64 => "arm64",
            Arch::Mips => "mips",
        }
    }

    /// True for the x86 family, the only targets the disassembly
    /// heuristics understand.
    pub fn is_x86(&self) -> bool {
        matches!(self, Arch::I386 | Arch::Amd64)
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Byte order of the file's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub fn read_u16(&self, data: &[u8], off: usize) -> Result<u16> {
        let b = data
            .get(off..off + 2)
            .ok_or(Error::NotEnoughBytesRead)?;
        Ok(match self {
            ByteOrder::Little => u16::from_le_bytes([b[0], b[1]]),
            ByteOrder::Big => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    pub fn read_u32(&self, data: &[u8], off: usize) -> Result<u32> {
        let b = data
            .get(off..off + 4)
            .ok_or(Error::NotEnoughBytesRead)?;
        let b: [u8; 4] = b.try_into().unwrap();
        Ok(match self {
            ByteOrder::Little => u32::from_le_bytes(b),
            ByteOrder::Big => u32::from_be_bytes(b),
        })
    }

    pub fn read_u64(&self, data: &[u8], off: usize) -> Result<u64> {
        let b = data
            .get(off..off + 8)
            .ok_or(Error::NotEnoughBytesRead)?;
        let b: [u8; 8] = b.try_into().unwrap();
        Ok(match self {
            ByteOrder::Little => u64::from_le_bytes(b),
            ByteOrder::Big => u64::from_be_bytes(b),
        })
    }

    /// Read one word-sized unsigned integer, widened to 64 bits.
    pub fn read_word(&self, data: &[u8], off: usize, word_size: usize) -> Result<u64> {
        if word_size == 4 {
            self.read_u32(data, off).map(u64::from)
        } else {
            self.read_u64(data, off)
        }
    }

    /// Encode a `u32` in this byte order, e.g. to build a search needle.
    pub fn u32_bytes(&self, v: u32) -> [u8; 4] {
        match self {
            ByteOrder::Little => v.to_le_bytes(),
            ByteOrder::Big => v.to_be_bytes(),
        }
    }
}

/// Facts about the file discovered at open time.
///
/// Immutable after open; the compiler version lives on the file object,
/// not here, because it is discovered (or overridden) later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Architecture the binary is compiled for.
    pub arch: Arch,
    /// Operating system the binary targets.
    pub os: &'static str,
    /// Byte order of the file's fields.
    pub byte_order: ByteOrder,
    /// Natural integer size in bytes (4 or 8).
    pub word_size: usize,
}

/// A primitive representation of a symbol.
///
/// Size is authoritative for ELF. For PE and Mach-O it is inferred from
/// the gap to the next symbol by address; the last symbol gets zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub value: u64,
    pub size: u64,
}

/// Build a name → symbol map, inferring sizes from address deltas.
///
/// Used by the PE and Mach-O readers, whose symbol records carry no size.
pub(crate) fn map_with_inferred_sizes(mut syms: Vec<Symbol>) -> HashMap<String, Symbol> {
    syms.sort_by_key(|s| s.value);
    let addrs: Vec<u64> = syms.iter().map(|s| s.value).collect();
    let mut table = HashMap::with_capacity(syms.len());
    for (i, mut sym) in syms.into_iter().enumerate() {
        // Skip duplicates at the same address when sizing; the next
        // strictly greater address bounds this symbol.
        sym.size = addrs[i + 1..]
            .iter()
            .find(|&&a| a > sym.value)
            .map(|a| a - sym.value)
            .unwrap_or(0);
        table.insert(sym.name.clone(), sym);
    }
    table
}

/// The concrete container behind a file object.
///
/// A closed set of three readers; static dispatch through the enum rather
/// than a trait object.
pub enum Container {
    Elf(ElfFile),
    Pe(PeFile),
    MachO(MachoFile),
}

impl Container {
    /// Look up a symbol by name.
    pub fn symbol(&self, name: &str) -> Result<Symbol> {
        let table = self.symbol_table()?;
        table
            .get(name)
            .cloned()
            .ok_or_else(|| Error::SymbolNotFound(name.to_string()))
    }

    /// The eagerly built, memoized name → symbol map.
    pub fn symbol_table(&self) -> Result<&HashMap<String, Symbol>> {
        match self {
            Container::Elf(f) => f.symbol_table(),
            Container::Pe(f) => f.symbol_table(),
            Container::MachO(f) => f.symbol_table(),
        }
    }

    /// Whether the file carries a symbol table at all.
    pub fn has_symbol_table(&self) -> bool {
        match self {
            Container::Elf(f) => f.has_symbol_table(),
            Container::Pe(f) => f.has_symbol_table(),
            Container::MachO(f) => f.has_symbol_table(),
        }
    }

    /// Read-only data section bytes (.rodata / __rodata / .rdata).
    pub fn rdata(&self) -> Result<&[u8]> {
        let name = match self {
            Container::Elf(_) => ".rodata",
            Container::Pe(_) => ".rdata",
            Container::MachO(_) => "__rodata",
        };
        self.section_by_name(name).map(|(_, d)| d)
    }

    /// Code section base address and bytes (.text / __text).
    pub fn code_section(&self) -> Result<(u64, &[u8])> {
        let name = match self {
            Container::Elf(_) | Container::Pe(_) => ".text",
            Container::MachO(_) => "__text",
        };
        self.section_by_name(name)
    }

    /// The section containing the given virtual address. Sections without
    /// file bytes (BSS and friends) are skipped.
    pub fn section_at_address(&self, va: u64) -> Result<(u64, &[u8])> {
        match self {
            Container::Elf(f) => f.section_at_address(va),
            Container::Pe(f) => f.section_at_address(va),
            Container::MachO(f) => f.section_at_address(va),
        }
    }

    /// A named section's base address and bytes.
    pub fn section_by_name(&self, name: &str) -> Result<(u64, &[u8])> {
        match self {
            Container::Elf(f) => f.section_by_name(name),
            Container::Pe(f) => f.section_by_name(name),
            Container::MachO(f) => f.section_by_name(name),
        }
    }

    /// Facts discovered at open.
    pub fn file_info(&self) -> &FileInfo {
        match self {
            Container::Elf(f) => f.file_info(),
            Container::Pe(f) => f.file_info(),
            Container::MachO(f) => f.file_info(),
        }
    }

    /// Locate the PCLN table: virtual address and raw bytes.
    pub fn pclntab_data(&self) -> Result<(u64, &[u8])> {
        crate::pclntab::locate(self)
    }

    /// Name of the section scanned for the moduledata record.
    pub fn moduledata_section(&self) -> &'static str {
        match self {
            Container::Elf(_) => ".noptrdata",
            Container::Pe(_) => ".data",
            Container::MachO(_) => "__noptrdata",
        }
    }

    /// The Go build id, or an empty string when the file has none.
    pub fn build_id(&self) -> Result<String> {
        match self {
            Container::Elf(f) => f.build_id(),
            Container::Pe(f) => {
                let (_, code) = f.section_by_name(".text")?;
                crate::buildid::parse_raw(code)
            }
            Container::MachO(f) => {
                let (_, code) = f.section_by_name("__text")?;
                crate::buildid::parse_raw(code)
            }
        }
    }

    /// Fetch a DWARF debug section by its core name (e.g. `"info"`),
    /// inflating compressed variants. `None` when the file has no such
    /// section.
    pub fn debug_section(&self, core: &str) -> Option<Vec<u8>> {
        match self {
            Container::Elf(f) => f.debug_section(core),
            Container::Pe(f) => f.debug_section(core),
            Container::MachO(f) => f.debug_section(core),
        }
    }

    /// Chained-fixup rebases for Mach-O arm64 images; empty elsewhere.
    pub fn rebases(&self) -> &[macho::Rebase] {
        match self {
            Container::MachO(f) => f.rebases(),
            _ => &[],
        }
    }

    /// Preferred image base (used to materialize chained-fixup targets).
    pub fn image_base(&self) -> u64 {
        match self {
            Container::Elf(_) => 0,
            Container::Pe(f) => f.image_base(),
            Container::MachO(f) => f.image_base(),
        }
    }
}

/// Decompress a `ZLIB`-prefixed debug section payload: the ASCII tag,
/// a big-endian u64 uncompressed length, then the deflate stream.
pub(crate) fn inflate_zdebug(data: &[u8]) -> Option<Vec<u8>> {
    use std::io::Read;

    if data.len() < 12 || &data[..4] != b"ZLIB" {
        return None;
    }
    let expected = u64::from_be_bytes(data[4..12].try_into().unwrap()) as usize;
    let mut out = Vec::with_capacity(expected);
    let mut decoder = flate2::read::ZlibDecoder::new(&data[12..]);
    decoder.read_to_end(&mut out).ok()?;
    Some(out)
}
