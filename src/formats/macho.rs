//! Mach-O reader.
//!
//! Header and load-command parsing, segments and sections, the nlist
//! symbol table, and the dyld chained-fixups rebase walker needed to
//! resolve pointers in arm64 images that no longer carry classic
//! relocation info.

use std::collections::HashMap;

use memmap2::Mmap;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::error::{Error, Result};
use crate::formats::{inflate_zdebug, map_with_inferred_sizes, Arch, ByteOrder, FileInfo, Symbol};

const MH_MAGIC: u32 = 0xfeed_face;
const MH_MAGIC_64: u32 = 0xfeed_facf;
const MH_CIGAM: u32 = 0xcefa_edfe;
const MH_CIGAM_64: u32 = 0xcffa_edfe;

const CPU_TYPE_X86: u32 = 7;
const CPU_TYPE_X86_64: u32 = 0x0100_0007;
const CPU_TYPE_ARM64: u32 = 0x0100_000c;

const LC_SEGMENT: u32 = 0x1;
const LC_SYMTAB: u32 = 0x2;
const LC_SEGMENT_64: u32 = 0x19;
const LC_DYLD_CHAINED_FIXUPS: u32 = 0x8000_0034;

const STAB_TYPE_MASK: u8 = 0xe0;

const DYLD_CHAINED_PTR_64: u16 = 2;
const DYLD_CHAINED_PTR_64_OFFSET: u16 = 6;

#[derive(Debug, Clone)]
struct Segment {
    vmaddr: u64,
    vmsize: u64,
    fileoff: u64,
}

#[derive(Debug, Clone)]
struct Section {
    name: String,
    addr: u64,
    size: u64,
    offset: u64,
}

/// A pointer slot rewritten by dyld at load time: the slot's virtual
/// address and the virtual address it will hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rebase {
    pub address: u64,
    pub target: u64,
}

/// An opened Mach-O executable.
pub struct MachoFile {
    data: Mmap,
    info: FileInfo,
    segments: Vec<Segment>,
    sections: Vec<Section>,
    symtab: Option<(usize, usize, usize)>, // symoff, nsyms, stroff
    fixups: Option<(usize, usize)>,        // dataoff, datasize
    image_base: u64,
    symbols: OnceCell<Result<HashMap<String, Symbol>>>,
    rebases: OnceCell<Vec<Rebase>>,
}

impl MachoFile {
    /// Parse the mapped file. Only 386, amd64, and arm64 images are
    /// accepted.
    pub fn parse(data: Mmap) -> Result<Self> {
        if data.len() < 32 {
            return Err(Error::UnsupportedFile);
        }
        // A little-endian read of the magic yields MH_MAGIC* for
        // little-endian files and the byte-swapped MH_CIGAM* values for
        // big-endian ones.
        let raw_magic = u32::from_le_bytes(data[..4].try_into().unwrap());
        let (order, is64) = match raw_magic {
            MH_MAGIC => (ByteOrder::Little, false),
            MH_MAGIC_64 => (ByteOrder::Little, true),
            MH_CIGAM => (ByteOrder::Big, false),
            MH_CIGAM_64 => (ByteOrder::Big, true),
            _ => return Err(Error::UnsupportedFile),
        };

        let cputype = order.read_u32(&data, 4)?;
        let (arch, word_size) = match cputype {
            CPU_TYPE_X86 => (Arch::I386, 4),
            CPU_TYPE_X86_64 => (Arch::Amd64, 8),
            CPU_TYPE_ARM64 => (Arch::Arm64, 8),
            _ => return Err(Error::UnsupportedFile),
        };

        let info = FileInfo {
            arch,
            os: "macOS",
            byte_order: order,
            word_size,
        };

        let ncmds = order.read_u32(&data, 16)? as usize;
        let mut off = if is64 { 32 } else { 28 };

        let mut segments = Vec::new();
        let mut sections = Vec::new();
        let mut symtab = None;
        let mut fixups = None;
        let mut image_base = 0u64;

        for _ in 0..ncmds {
            let cmd = order.read_u32(&data, off)?;
            let cmdsize = order.read_u32(&data, off + 4)? as usize;
            if cmdsize < 8 {
                return Err(Error::UnsupportedFile);
            }
            match cmd {
                LC_SEGMENT_64 | LC_SEGMENT if (cmd == LC_SEGMENT_64) == is64 => {
                    let segname = read_fixed_str(&data, off + 8, 16)?;
                    let (vmaddr, vmsize, fileoff, nsects, sect_base, sect_size) = if is64 {
                        (
                            order.read_u64(&data, off + 24)?,
                            order.read_u64(&data, off + 32)?,
                            order.read_u64(&data, off + 40)?,
                            order.read_u32(&data, off + 64)? as usize,
                            off + 72,
                            80,
                        )
                    } else {
                        (
                            order.read_u32(&data, off + 24)? as u64,
                            order.read_u32(&data, off + 28)? as u64,
                            order.read_u32(&data, off + 32)? as u64,
                            order.read_u32(&data, off + 48)? as usize,
                            off + 56,
                            68,
                        )
                    };
                    if segname == "__TEXT" {
                        image_base = vmaddr;
                    }
                    segments.push(Segment { vmaddr, vmsize, fileoff });
                    for i in 0..nsects {
                        let s = sect_base + i * sect_size;
                        let name = read_fixed_str(&data, s, 16)?;
                        let (addr, size, offset) = if is64 {
                            (
                                order.read_u64(&data, s + 32)?,
                                order.read_u64(&data, s + 40)?,
                                order.read_u32(&data, s + 48)? as u64,
                            )
                        } else {
                            (
                                order.read_u32(&data, s + 32)? as u64,
                                order.read_u32(&data, s + 36)? as u64,
                                order.read_u32(&data, s + 40)? as u64,
                            )
                        };
                        sections.push(Section { name, addr, size, offset });
                    }
                }
                LC_SYMTAB => {
                    symtab = Some((
                        order.read_u32(&data, off + 8)? as usize,
                        order.read_u32(&data, off + 12)? as usize,
                        order.read_u32(&data, off + 16)? as usize,
                    ));
                }
                LC_DYLD_CHAINED_FIXUPS => {
                    fixups = Some((
                        order.read_u32(&data, off + 8)? as usize,
                        order.read_u32(&data, off + 12)? as usize,
                    ));
                }
                _ => {}
            }
            off += cmdsize;
        }

        Ok(Self {
            data,
            info,
            segments,
            sections,
            symtab,
            fixups,
            image_base,
            symbols: OnceCell::new(),
            rebases: OnceCell::new(),
        })
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.info
    }

    pub fn image_base(&self) -> u64 {
        self.image_base
    }

    fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    fn section_data(&self, s: &Section) -> Result<&[u8]> {
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
            // Zero file offset means the section only exists in memory.
            if s.offset == 0 {
                continue;
            }
            if s.addr <= va && va < s.addr + s.size {
                return Ok((s.addr, self.section_data(s)?));
            }
        }
        Err(Error::SectionDoesNotExist)
    }

    pub fn has_symbol_table(&self) -> bool {
        matches!(self.symtab, Some((_, n, _)) if n > 0)
    }

    /// The name → symbol map. STAB debug entries and sectionless symbols
    /// are dropped; sizes come from the delta to the next address.
    pub fn symbol_table(&self) -> Result<&HashMap<String, Symbol>> {
        self.symbols
            .get_or_init(|| self.build_symbol_table())
            .as_ref()
            .map_err(Error::clone)
    }

    fn build_symbol_table(&self) -> Result<HashMap<String, Symbol>> {
        let Some((symoff, nsyms, stroff)) = self.symtab else {
            return Ok(HashMap::new());
        };
        let order = self.info.byte_order;
        let entsize = if self.info.word_size == 8 { 16 } else { 12 };
        let strtab = self.data.get(stroff..).unwrap_or(&[]);

        let mut syms = Vec::new();
        for i in 0..nsyms {
            let off = symoff + i * entsize;
            let rec = self
                .data
                .get(off..off + entsize)
                .ok_or(Error::NotEnoughBytesRead)?;
            let n_strx = order.read_u32(rec, 0)? as usize;
            let n_type = rec[4];
            let n_sect = rec[5];
            if n_type & STAB_TYPE_MASK != 0 || n_sect == 0 {
                continue;
            }
            let value = if self.info.word_size == 8 {
                order.read_u64(rec, 8)?
            } else {
                order.read_u32(rec, 8)? as u64
            };
            let name = read_nul_str(strtab, n_strx);
            if name.is_empty() {
                continue;
            }
            syms.push(Symbol { name, value, size: 0 });
        }

        let table = map_with_inferred_sizes(syms);
        debug!(symbols = table.len(), "built mach-o symbol table");
        Ok(table)
    }

    /// DWARF section bytes by core name; `__zdebug_*` payloads are
    /// inflated.
    pub fn debug_section(&self, core: &str) -> Option<Vec<u8>> {
        if let Ok((_, data)) = self.section_by_name(&format!("__debug_{core}")) {
            return Some(data.to_vec());
        }
        if let Ok((_, data)) = self.section_by_name(&format!("__zdebug_{core}")) {
            return inflate_zdebug(data);
        }
        None
    }

    /// All rebase entries from the chained-fixup metadata. Empty when the
    /// image has none (pre-chained-fixup links, or non-arm64).
    pub fn rebases(&self) -> &[Rebase] {
        self.rebases
            .get_or_init(|| self.walk_chained_fixups().unwrap_or_default())
    }

    fn file_offset_for_vmaddr(&self, va: u64) -> Option<u64> {
        self.segments
            .iter()
            .find(|s| s.vmaddr <= va && va < s.vmaddr + s.vmsize)
            .map(|s| s.fileoff + (va - s.vmaddr))
    }

    fn walk_chained_fixups(&self) -> Option<Vec<Rebase>> {
        let (dataoff, datasize) = self.fixups?;
        let blob = self.data.get(dataoff..dataoff + datasize)?;
        let order = ByteOrder::Little;

        let starts_offset = order.read_u32(blob, 4).ok()? as usize;
        let starts = blob.get(starts_offset..)?;
        let seg_count = order.read_u32(starts, 0).ok()? as usize;

        let mut out = Vec::new();
        for seg in 0..seg_count {
            let info_off = order.read_u32(starts, 4 + seg * 4).ok()? as usize;
            if info_off == 0 {
                continue;
            }
            let seg_info = starts.get(info_off..)?;
            let page_size = order.read_u16(seg_info, 4).ok()? as u64;
            let pointer_format = order.read_u16(seg_info, 6).ok()?;
            let segment_offset = order.read_u64(seg_info, 8).ok()?;
            let page_count = order.read_u16(seg_info, 20).ok()? as usize;

            if pointer_format != DYLD_CHAINED_PTR_64
                && pointer_format != DYLD_CHAINED_PTR_64_OFFSET
            {
                continue;
            }

            for page in 0..page_count {
                let start = order.read_u16(seg_info, 22 + page * 2).ok()?;
                if start == 0xffff {
                    continue;
                }
                let mut va =
                    self.image_base + segment_offset + page as u64 * page_size + start as u64;
                loop {
                    let file_off = self.file_offset_for_vmaddr(va)? as usize;
                    let raw = order.read_u64(&self.data, file_off).ok()?;
                    let bind = raw >> 63 != 0;
                    let next = (raw >> 51) & 0xfff;
                    if !bind {
                        let target = raw & 0xf_ffff_ffff;
                        let high8 = (raw >> 36) & 0xff;
                        let unpacked = target | (high8 << 56);
                        let target = if pointer_format == DYLD_CHAINED_PTR_64_OFFSET {
                            self.image_base + unpacked
                        } else {
                            unpacked
                        };
                        out.push(Rebase { address: va, target });
                    }
                    if next == 0 {
                        break;
                    }
                    va += next * 4;
                }
            }
        }
        debug!(rebases = out.len(), "walked chained fixups");
        Some(out)
    }
}

fn read_fixed_str(data: &[u8], off: usize, len: usize) -> Result<String> {
    let raw = data.get(off..off + len).ok_or(Error::NotEnoughBytesRead)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

fn read_nul_str(data: &[u8], off: usize) -> String {
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
    fn fixed_strings_trim_padding() {
        let mut buf = vec![0u8; 32];
        buf[..6].copy_from_slice(b"__TEXT");
        assert_eq!(read_fixed_str(&buf, 0, 16).unwrap(), "__TEXT");
        assert!(read_fixed_str(&buf, 24, 16).is_err());
    }

    #[test]
    fn chained_ptr_unpacking() {
        // dyld_chained_ptr_64_rebase: target 36 bits, high8 8, next 12,
        // bind 1. A raw value with bind set must be skipped; this checks
        // the field arithmetic used by the walker.
        let raw: u64 = (1 << 63) | (3 << 51) | 0x1234;
        assert_eq!(raw >> 63, 1);
        assert_eq!((raw >> 51) & 0xfff, 3);
        assert_eq!(raw & 0xf_ffff_ffff, 0x1234);
    }
}
