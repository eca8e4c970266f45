//! PE reader.
//!
//! DOS/COFF/optional header parsing, the section table, and the COFF
//! symbol table. All virtual addresses handed to callers are runtime
//! addresses, i.e. image base plus section RVA; raw RVAs never escape
//! this module.

use std::collections::HashMap;

use memmap2::Mmap;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::{Error, Result};
use crate::formats::{map_with_inferred_sizes, Arch, ByteOrder, FileInfo, Symbol};

const IMAGE_FILE_MACHINE_I386: u16 = 0x14c;
const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
const IMAGE_FILE_MACHINE_ARM64: u16 = 0xaa64;

const PE32_MAGIC: u16 = 0x10b;
const PE32PLUS_MAGIC: u16 = 0x20b;

#[derive(Debug, Clone)]
struct Section {
    name: String,
    virtual_address: u64,
    virtual_size: u64,
    raw_offset: u64,
    raw_size: u64,
}

/// An opened PE executable.
pub struct PeFile {
    data: Mmap,
    info: FileInfo,
    image_base: u64,
    sections: Vec<Section>,
    symtab_offset: usize,
    symtab_count: usize,
    symbols: OnceCell<Result<HashMap<String, Symbol>>>,
}

impl PeFile {
    /// Parse the mapped file.
    ///
    /// PE parsing is the one place where malformed input has historically
    /// produced panics deep in offset arithmetic; the caller wraps this in
    /// a recover boundary and reports `UnsupportedFile`.
    pub fn parse(data: Mmap) -> Result<Self> {
        let order = ByteOrder::Little;
        if data.len() < 0x40 || &data[..2] != b"MZ" {
            return Err(Error::UnsupportedFile);
        }
        let pe_off = order.read_u32(&data, 0x3c)? as usize;
        if data.get(pe_off..pe_off + 4) != Some(&b"PE\0\0"[..]) {
            return Err(Error::UnsupportedFile);
        }

        let coff = pe_off + 4;
        let machine = order.read_u16(&data, coff)?;
        let arch = match machine {
            IMAGE_FILE_MACHINE_I386 => Arch::I386,
            IMAGE_FILE_MACHINE_AMD64 => Arch::Amd64,
            IMAGE_FILE_MACHINE_ARM64 => Arch::Arm64,
            _ => return Err(Error::UnsupportedFile),
        };
        let nsections = order.read_u16(&data, coff + 2)? as usize;
        let symtab_offset = order.read_u32(&data, coff + 8)? as usize;
        let symtab_count = order.read_u32(&data, coff + 12)? as usize;
        let opt_size = order.read_u16(&data, coff + 16)? as usize;

        let opt = coff + 20;
        let opt_magic = order.read_u16(&data, opt)?;
        let (image_base, word_size) = match opt_magic {
            PE32_MAGIC => (order.read_u32(&data, opt + 28)? as u64, 4),
            PE32PLUS_MAGIC => (order.read_u64(&data, opt + 24)?, 8),
            _ => return Err(Error::UnsupportedFile),
        };

        let info = FileInfo {
            arch,
            os: "windows",
            byte_order: order,
            word_size,
        };

        let mut sections = Vec::with_capacity(nsections);
        let sec_base = opt + opt_size;
        for i in 0..nsections {
            let off = sec_base + i * 40;
            let name_bytes = data
                .get(off..off + 8)
                .ok_or(Error::NotEnoughBytesRead)?;
            let len = name_bytes.iter().position(|&b| b == 0).unwrap_or(8);
            let name = String::from_utf8_lossy(&name_bytes[..len]).into_owned();
            sections.push(Section {
                name,
                virtual_size: order.read_u32(&data, off + 8)? as u64,
                virtual_address: order.read_u32(&data, off + 12)? as u64,
                raw_size: order.read_u32(&data, off + 16)? as u64,
                raw_offset: order.read_u32(&data, off + 20)? as u64,
            });
        }

        Ok(Self {
            data,
            info,
            image_base,
            sections,
            symtab_offset,
            symtab_count,
            symbols: OnceCell::new(),
        })
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.info
    }

    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    fn section_data(&self, s: &Section) -> Result<&[u8]> {
        let data = self
            .data
            .get(s.raw_offset as usize..(s.raw_offset + s.raw_size) as usize)
            .ok_or(Error::NotEnoughBytesRead)?;
        // On-disk sections are padded up to the file alignment; hand out
        // at most the virtual size.
        if s.virtual_size > 0 && s.virtual_size < s.raw_size {
            Ok(&data[..s.virtual_size as usize])
        } else {
            Ok(data)
        }
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_by_name(&self, name: &str) -> Result<(u64, &[u8])> {
        let s = self.section(name).ok_or(Error::SectionDoesNotExist)?;
        Ok((self.image_base + s.virtual_address, self.section_data(s)?))
    }

    pub fn section_at_address(&self, va: u64) -> Result<(u64, &[u8])> {
        for s in &self.sections {
            if s.raw_offset == 0 {
                continue;
            }
            let base = self.image_base + s.virtual_address;
            let size = s.virtual_size.max(s.raw_size);
            if base <= va && va < base + size {
                return Ok((base, self.section_data(s)?));
            }
        }
        Err(Error::SectionDoesNotExist)
    }

    pub fn has_symbol_table(&self) -> bool {
        self.symtab_offset != 0 && self.symtab_count != 0
    }

    /// The name → symbol map built from the COFF symbol table, with sizes
    /// inferred from address deltas.
    pub fn symbol_table(&self) -> Result<&HashMap<String, Symbol>> {
        self.symbols
            .get_or_init(|| self.build_symbol_table())
            .as_ref()
            .map_err(Error::clone)
    }

    fn build_symbol_table(&self) -> Result<HashMap<String, Symbol>> {
        if !self.has_symbol_table() {
            return Ok(HashMap::new());
        }
        let order = self.info.byte_order;
        let strtab_off = self.symtab_offset + self.symtab_count * 18;
        let strtab = self.data.get(strtab_off..).unwrap_or(&[]);

        let mut syms = Vec::new();
        let mut i = 0usize;
        while i < self.symtab_count {
            let off = self.symtab_offset + i * 18;
            let rec = self
                .data
                .get(off..off + 18)
                .ok_or(Error::NotEnoughBytesRead)?;
            let value = order.read_u32(rec, 8)? as u64;
            let sect_num = order.read_u16(rec, 12)? as i16;
            let aux = rec[17] as usize;

            let name = if rec[..4] == [0, 0, 0, 0] {
                let str_off = order.read_u32(rec, 4)? as usize;
                read_strtab(strtab, str_off)
            } else {
                let len = rec[..8].iter().position(|&b| b == 0).unwrap_or(8);
                String::from_utf8_lossy(&rec[..len]).into_owned()
            };

            // Undefined, absolute, and debug symbols (section numbers
            // 0, -1, -2) keep their raw value; everything else gets a
            // runtime address.
            let value = if sect_num > 0 {
                match self.sections.get(sect_num as usize - 1) {
                    Some(s) => self.image_base + s.virtual_address + value,
                    None => value,
                }
            } else {
                value
            };

            if !name.is_empty() {
                syms.push(Symbol { name, value, size: 0 });
            }
            i += 1 + aux;
        }

        let table = map_with_inferred_sizes(syms);
        debug!(symbols = table.len(), "built pe symbol table");
        Ok(table)
    }

    /// DWARF section bytes by core name. Go's Windows linker emits plain
    /// `.debug_*` sections.
    pub fn debug_section(&self, core: &str) -> Option<Vec<u8>> {
        if let Ok((_, data)) = self.section_by_name(&format!(".debug_{core}")) {
            return Some(data.to_vec());
        }
        None
    }
}

// The COFF string table starts with its own 4-byte length; offsets are
// relative to the table start.
fn read_strtab(strtab: &[u8], off: usize) -> String {
    let Some(tail) = strtab.get(off..) else {
        return String::new();
    };
    let len = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    String::from_utf8_lossy(&tail[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strtab_lookup() {
        let mut tab = vec![0u8; 4];
        tab.extend_from_slice(b"runtime.text\0");
        assert_eq!(read_strtab(&tab, 4), "runtime.text");
        assert_eq!(read_strtab(&tab, 100), "");
    }
}
