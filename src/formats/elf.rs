//! ELF reader.
//!
//! Raw field-by-field parsing of the ELF header, section table, and symbol
//! table; no external parser. Go's linker on Linux writes the build id into
//! a `.note.go.buildid` note section and the line table into `.gopclntab`
//! (or `.data.rel.ro*` under PIE/external linking).

use std::collections::HashMap;

use memmap2::Mmap;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::buildid;
use crate::error::{Error, Result};
use crate::formats::{inflate_zdebug, Arch, ByteOrder, FileInfo, Symbol};

const ELFCLASS32: u8 = 1;
const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;
const ELFDATA2MSB: u8 = 2;

const EM_386: u16 = 3;
const EM_MIPS: u16 = 8;
const EM_ARM: u16 = 40;
const EM_X86_64: u16 = 62;
const EM_AARCH64: u16 = 183;

const SHT_NOBITS: u32 = 8;
const SHT_SYMTAB: u32 = 2;

#[derive(Debug, Clone)]
struct Section {
    name: String,
    sh_type: u32,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
}

/// An opened ELF executable.
pub struct ElfFile {
    data: Mmap,
    info: FileInfo,
    sections: Vec<Section>,
    symbols: OnceCell<Result<HashMap<String, Symbol>>>,
}

impl ElfFile {
    /// Parse the mapped file. Fails on anything that is not a well-formed
    /// ELF executable for a supported architecture.
    pub fn parse(data: Mmap) -> Result<Self> {
        if data.len() < 0x40 || &data[..4] != b"\x7fELF" {
            return Err(Error::UnsupportedFile);
        }

        let is64 = match data[4] {
            ELFCLASS32 => false,
            ELFCLASS64 => true,
            _ => return Err(Error::UnsupportedFile),
        };
        let order = match data[5] {
            ELFDATA2LSB => ByteOrder::Little,
            ELFDATA2MSB => ByteOrder::Big,
            _ => return Err(Error::UnsupportedFile),
        };

        let machine = order.read_u16(&data, 18)?;
        let arch = match machine {
            EM_386 => Arch::I386,
            EM_X86_64 => Arch::Amd64,
            EM_ARM => Arch::Arm,
            EM_AARCH64 => Arch::Arm64,
            EM_MIPS => Arch::Mips,
            _ => return Err(Error::UnsupportedFile),
        };

        let info = FileInfo {
            arch,
            os: "linux",
            byte_order: order,
            word_size: if is64 { 8 } else { 4 },
        };

        let (shoff, shentsize, shnum, shstrndx) = if is64 {
            (
                order.read_u64(&data, 40)? as usize,
                order.read_u16(&data, 58)? as usize,
                order.read_u16(&data, 60)? as usize,
                order.read_u16(&data, 62)? as usize,
            )
        } else {
            (
                order.read_u32(&data, 32)? as usize,
                order.read_u16(&data, 46)? as usize,
                order.read_u16(&data, 48)? as usize,
                order.read_u16(&data, 50)? as usize,
            )
        };

        if shentsize == 0 || shnum == 0 {
            return Err(Error::UnsupportedFile);
        }
        if shoff
            .checked_add(shentsize * shnum)
            .map(|end| end > data.len())
            .unwrap_or(true)
        {
            return Err(Error::NotEnoughBytesRead);
        }

        let mut raw = Vec::with_capacity(shnum);
        for i in 0..shnum {
            let off = shoff + i * shentsize;
            let (name_off, sh_type, addr, offset, size, link) = if is64 {
                (
                    order.read_u32(&data, off)?,
                    order.read_u32(&data, off + 4)?,
                    order.read_u64(&data, off + 16)?,
                    order.read_u64(&data, off + 24)?,
                    order.read_u64(&data, off + 32)?,
                    order.read_u32(&data, off + 40)?,
                )
            } else {
                (
                    order.read_u32(&data, off)?,
                    order.read_u32(&data, off + 4)?,
                    order.read_u32(&data, off + 12)? as u64,
                    order.read_u32(&data, off + 16)? as u64,
                    order.read_u32(&data, off + 20)? as u64,
                    order.read_u32(&data, off + 24)?,
                )
            };
            raw.push((name_off, sh_type, addr, offset, size, link));
        }

        // Section names live in the shstrtab section.
        let strtab = raw.get(shstrndx).copied().ok_or(Error::UnsupportedFile)?;
        let str_data = data
            .get(strtab.3 as usize..(strtab.3 + strtab.4) as usize)
            .ok_or(Error::NotEnoughBytesRead)?;

        let sections = raw
            .iter()
            .map(|&(name_off, sh_type, addr, offset, size, link)| Section {
                name: read_cstr(str_data, name_off as usize),
                sh_type,
                addr,
                offset,
                size,
                link,
            })
            .collect();

        Ok(Self {
            data,
            info,
            sections,
            symbols: OnceCell::new(),
        })
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.info
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    fn section_data(&self, s: &Section) -> Result<&[u8]> {
        if s.sh_type == SHT_NOBITS {
            return Err(Error::SectionDoesNotExist);
        }
        self.data
            .get(s.offset as usize..(s.offset + s.size) as usize)
            .ok_or(Error::NotEnoughBytesRead)
    }

    pub fn section_by_name(&self, name: &str) -> Result<(u64, &[u8])> {
        let s = self.section(name).ok_or(Error::SectionDoesNotExist)?;
        Ok((s.addr, self.section_data(s)?))
    }

    pub fn section_at_address(&self, va: u64) -> Result<(u64, &[u8])> {
        for s in &self.sections {
            // Memory-only sections have no file bytes to hand out.
            if s.sh_type == SHT_NOBITS || s.offset == 0 {
                continue;
            }
            if s.addr <= va && va < s.addr + s.size {
                return Ok((s.addr, self.section_data(s)?));
            }
        }
        Err(Error::SectionDoesNotExist)
    }

    pub fn has_symbol_table(&self) -> bool {
        self.sections.iter().any(|s| s.sh_type == SHT_SYMTAB)
    }

    /// The name → symbol map. Built once; ELF symbol sizes are taken
    /// straight from the records.
    pub fn symbol_table(&self) -> Result<&HashMap<String, Symbol>> {
        self.symbols
            .get_or_init(|| self.build_symbol_table())
            .as_ref()
            .map_err(Error::clone)
    }

    fn build_symbol_table(&self) -> Result<HashMap<String, Symbol>> {
        let symtab = match self.sections.iter().find(|s| s.sh_type == SHT_SYMTAB) {
            Some(s) => s,
            None => return Ok(HashMap::new()),
        };
        let strtab = self
            .sections
            .get(symtab.link as usize)
            .ok_or(Error::SectionDoesNotExist)?;
        let sym_data = self.section_data(symtab)?;
        let str_data = self.section_data(strtab)?;

        let order = self.info.byte_order;
        let entsize = if self.info.word_size == 8 { 24 } else { 16 };
        let count = sym_data.len() / entsize;
        let mut table = HashMap::with_capacity(count);

        for i in 0..count {
            let off = i * entsize;
            let (name_off, value, size) = if self.info.word_size == 8 {
                (
                    order.read_u32(sym_data, off)?,
                    order.read_u64(sym_data, off + 8)?,
                    order.read_u64(sym_data, off + 16)?,
                )
            } else {
                (
                    order.read_u32(sym_data, off)?,
                    order.read_u32(sym_data, off + 4)? as u64,
                    order.read_u32(sym_data, off + 8)? as u64,
                )
            };
            let name = read_cstr(str_data, name_off as usize);
            if name.is_empty() {
                continue;
            }
            table.insert(name.clone(), Symbol { name, value, size });
        }

        debug!(symbols = table.len(), "built elf symbol table");
        Ok(table)
    }

    /// The Go build id from `.note.go.buildid`; empty when the note
    /// section is absent.
    pub fn build_id(&self) -> Result<String> {
        match self.section_by_name(".note.go.buildid") {
            Ok((_, data)) => buildid::parse_elf_note(data, self.info.byte_order),
            Err(Error::SectionDoesNotExist) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    /// DWARF section bytes by core name, handling `.zdebug_*` compression.
    pub fn debug_section(&self, core: &str) -> Option<Vec<u8>> {
        if let Ok((_, data)) = self.section_by_name(&format!(".debug_{core}")) {
            return Some(data.to_vec());
        }
        if let Ok((_, data)) = self.section_by_name(&format!(".zdebug_{core}")) {
            return inflate_zdebug(data);
        }
        None
    }
}

fn read_cstr(data: &[u8], off: usize) -> String {
    let Some(tail) = data.get(off..) else {
        return String::new();
    };
    let len = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    String::from_utf8_lossy(&tail[..len]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cstr_reads_stop_at_nul() {
        let data = b"\0.text\0.rodata\0";
        assert_eq!(read_cstr(data, 1), ".text");
        assert_eq!(read_cstr(data, 7), ".rodata");
        assert_eq!(read_cstr(data, 0), "");
        assert_eq!(read_cstr(data, 99), "");
    }
}
