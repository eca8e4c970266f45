//! Locating and decoding the runtime's moduledata record.
//!
//! The record is found either through the `runtime.firstmoduledata`
//! symbol or by scanning the data section for the PCLNTAB address, which
//! is its first pointer field in every layout. Whichever versioned shape
//! decodes it, the result is normalized into one fixed record.

pub mod layouts;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::file::GoFile;
use crate::formats::{Container, FileInfo};
use crate::scan::find;

use layouts::{Layout, RawModuledata};

/// An address range recorded in the moduledata.
///
/// `length` counts bytes for byte-range sections (text, data, types,
/// pclntab) and elements for the table sections (typelink, itablink,
/// functab).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuledataSection {
    pub address: u64,
    pub length: u64,
}

impl ModuledataSection {
    /// The file bytes backing `[address, address+length)`.
    ///
    /// Only meaningful for byte-range sections; the moduledata holds a
    /// lookup relation to the container, which owns the bytes.
    pub fn data<'a>(&self, c: &'a Container) -> Result<&'a [u8]> {
        let (base, data) = c.section_at_address(self.address)?;
        let start = (self.address - base) as usize;
        let end = start + self.length as usize;
        data.get(start..end).ok_or(Error::NotEnoughBytesRead)
    }
}

/// The normalized moduledata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moduledata {
    /// Virtual address the record was decoded from.
    pub address: u64,
    pub text: ModuledataSection,
    pub noptrdata: ModuledataSection,
    pub data: ModuledataSection,
    pub bss: ModuledataSection,
    pub noptrbss: ModuledataSection,
    pub types: ModuledataSection,
    pub typelink: ModuledataSection,
    pub itablink: ModuledataSection,
    pub functab: ModuledataSection,
    pub pclntab: ModuledataSection,
    /// Value of `go:func.*`; zero on layouts predating the field.
    pub gofunc: u64,
}

impl Moduledata {
    /// Bytes of the types blob.
    pub fn types_data<'a>(&self, c: &'a Container) -> Result<&'a [u8]> {
        self.types.data(c)
    }

    /// Bytes of the text range.
    pub fn text_data<'a>(&self, c: &'a Container) -> Result<&'a [u8]> {
        self.text.data(c)
    }

    /// The typelink table: `typelink.length` 32-bit offsets into the
    /// types blob.
    pub fn typelink_data(&self, c: &Container) -> Result<Vec<i32>> {
        let order = c.file_info().byte_order;
        let (base, data) = c.section_at_address(self.typelink.address)?;
        let start = (self.typelink.address - base) as usize;
        let mut out = Vec::with_capacity(self.typelink.length as usize);
        for i in 0..self.typelink.length as usize {
            out.push(order.read_u32(data, start + 4 * i)? as i32);
        }
        Ok(out)
    }
}

impl RawModuledata {
    /// Copy the fields of interest into the uniform record.
    pub fn normalize(&self, address: u64) -> Moduledata {
        let span = |start: u64, end: u64| ModuledataSection {
            address: start,
            length: end.saturating_sub(start),
        };
        let table = |addr: u64, len: u64| ModuledataSection {
            address: addr,
            length: len,
        };
        Moduledata {
            address,
            text: span(self.text, self.etext),
            noptrdata: span(self.noptrdata, self.enoptrdata),
            data: span(self.data, self.edata),
            bss: span(self.bss, self.ebss),
            noptrbss: span(self.noptrbss, self.enoptrbss),
            types: span(self.types, self.etypes),
            typelink: table(self.typelinks, self.typelinks_len),
            itablink: table(self.itablinks, self.itablinks_len),
            functab: table(self.functab, self.functab_len),
            pclntab: table(self.pclntab, self.pclntab_len),
            gofunc: self.gofunc,
        }
    }
}

// A decoded record is believed when its text range is ordered and sits
// inside the code section.
fn validate(raw: &RawModuledata, code_start: u64, code_end: u64) -> bool {
    raw.text <= raw.etext && raw.text >= code_start && raw.etext <= code_end && raw.text < code_end
}

/// Locate and decode the moduledata record.
pub(crate) fn find_moduledata(f: &GoFile) -> Result<Moduledata> {
    let c = f.container();
    let info = c.file_info().clone();
    let (tab_addr, _) = c.pclntab_data()?;
    let (code_start, code) = c.code_section()?;
    let code_end = code_start + code.len() as u64;
    let minor = f.version_minor();

    // Symbol fast path, when the table survived stripping.
    if let Ok(sym) = c.symbol("runtime.firstmoduledata") {
        if let Ok((base, data)) = c.section_at_address(sym.value) {
            let rec = &data[(sym.value - base) as usize..];
            if let Some(md) =
                decode_candidate(rec, sym.value, minor, &info, code_start, code_end)
            {
                debug!(addr = md.address, "moduledata via symbol");
                return Ok(md);
            }
        }
    }

    // Scan the moduledata-bearing section for the PCLNTAB address, the
    // record's first pointer field.
    let (base, sec) = c.section_by_name(c.moduledata_section())?;
    let needle = (tab_addr as u32).to_le_bytes();
    let mut from = 0usize;
    while let Some(off) = find(&sec[from..], &needle) {
        let md_off = from + off;
        if let Some(md) = decode_candidate(
            &sec[md_off..],
            base + md_off as u64,
            minor,
            &info,
            code_start,
            code_end,
        ) {
            debug!(addr = md.address, "moduledata via scan");
            return Ok(md);
        }
        // False hit; step past it by one byte and keep looking.
        from = md_off + 1;
    }

    Err(Error::InvalidModuledata)
}

// Try the layout for the known minor, or every layout newest-first when
// the version is not known.
fn decode_candidate(
    rec: &[u8],
    address: u64,
    minor: Option<u16>,
    info: &FileInfo,
    code_start: u64,
    code_end: u64,
) -> Option<Moduledata> {
    let layouts = match minor {
        Some(m) => vec![Layout::for_version(m, info.word_size)],
        None => Layout::catalog(info.word_size),
    };
    for layout in layouts {
        let Ok(raw) = layout.read(rec, info.byte_order) else {
            continue;
        };
        if validate(&raw, code_start, code_end) {
            return Some(raw.normalize(address));
        }
    }
    None
}

// Word index of text within the current moduledata layouts, used by the
// runtime-text scan and the chained-fixups walk.
const TEXT_WORD_MODERN: u64 = 22;
const TEXT_WORD_LEGACY: u64 = 12;

/// Resolve the `runtime.text` base the line table's pc offsets hang off.
///
/// Order: the symbol itself; a scan of the moduledata section for a
/// word-sized occurrence of the PCLNTAB address, probing the text/etext
/// pair at the modern then the legacy offsets; the chained-fixups walk
/// for arm64 Mach-O images. Falls back to the code section start, which
/// is correct for internally linked binaries.
pub(crate) fn resolve_text_start(c: &Container, tab_addr: u64) -> Result<u64> {
    if let Ok(sym) = c.symbol("runtime.text") {
        return Ok(sym.value);
    }

    let info = c.file_info();
    let (code_start, code) = c.code_section()?;
    let code_end = code_start + code.len() as u64;

    if let Ok((base, sec)) = c.section_by_name(c.moduledata_section()) {
        let needle: Vec<u8> = if info.word_size == 4 {
            info.byte_order.u32_bytes(tab_addr as u32).to_vec()
        } else {
            match info.byte_order {
                crate::formats::ByteOrder::Little => tab_addr.to_le_bytes().to_vec(),
                crate::formats::ByteOrder::Big => tab_addr.to_be_bytes().to_vec(),
            }
        };
        let mut from = 0usize;
        while let Some(off) = find(&sec[from..], &needle) {
            let md_off = from + off;
            for text_word in [TEXT_WORD_MODERN, TEXT_WORD_LEGACY] {
                let ti = md_off + (text_word as usize) * info.word_size;
                let Ok(text) = info.byte_order.read_word(sec, ti, info.word_size) else {
                    continue;
                };
                let Ok(etext) =
                    info.byte_order.read_word(sec, ti + info.word_size, info.word_size)
                else {
                    continue;
                };
                if text >= code_start && text < code_end && etext > code_start && etext <= code_end
                {
                    debug!(text, "runtime.text via moduledata scan");
                    return Ok(text);
                }
            }
            from = md_off + 1;
        }
    }

    // arm64 Mach-O with chained fixups: pointer fields are rebase
    // targets, not raw values, so the scan above cannot match. Find the
    // rebase that plants the PCLNTAB address (its slot is the start of
    // the moduledata), then the rebase for the text field of that record.
    let rebases = c.rebases();
    if !rebases.is_empty() {
        if let Some(md) = rebases.iter().find(|r| r.target == tab_addr) {
            let text_slot = md.address + TEXT_WORD_MODERN * 8;
            if let Some(text) = rebases.iter().find(|r| r.address == text_slot) {
                debug!(text = text.target, "runtime.text via chained fixups");
                return Ok(text.target);
            }
        }
    }

    warn!("runtime.text not resolvable, assuming code section start");
    Ok(code_start)
}
