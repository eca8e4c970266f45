//! PCLNTAB location and decoding.
//!
//! The line table has worn four header magics across compiler releases
//! (1.2–1.15, 1.16–1.17, 1.18–1.19, 1.20+). Location is per container:
//! dedicated sections where the linker emits them, a last-occurrence
//! magic scan with backoff where it doesn't, and an optional
//! `runtime.pclntab`/`runtime.epclntab` symbol fast path everywhere.
//!
//! The decoder reimplements the Go 1.2 symbol-table layout and its three
//! successors: a function index over the functab, name splitting, and
//! pc→file:line resolution through the varint delta tables.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::formats::{ByteOrder, Container};
use crate::scan::rfind;

/// Wire format of the table, keyed by the header magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
pub enum TableVersion {
    /// `fb ff ff ff`, Go 1.2 – 1.15.
    V12,
    /// `fa ff ff ff`, Go 1.16 – 1.17.
    V116,
    /// `f0 ff ff ff`, Go 1.18 – 1.19.
    V118,
    /// `f1 ff ff ff`, Go 1.20+.
    V120,
}

// Newest first: the scan prefers the most recent format when a section
// happens to contain stale magic bytes.
const MAGICS: [(u32, TableVersion); 4] = [
    (0xffff_fff1, TableVersion::V120),
    (0xffff_fff0, TableVersion::V118),
    (0xffff_fffa, TableVersion::V116),
    (0xffff_fffb, TableVersion::V12),
];

fn magic_version(magic: u32) -> Option<TableVersion> {
    MAGICS.iter().find(|(m, _)| *m == magic).map(|&(_, v)| v)
}

/// Check the fixed header fields at the start of a candidate table:
/// reserved bytes zero, a plausible pc quantum, a plausible pointer size.
pub fn valid_pclntab_header(buf: &[u8]) -> bool {
    buf.len() >= 16
        && buf[4] == 0
        && buf[5] == 0
        && matches!(buf[6], 1 | 2 | 4)
        && matches!(buf[7], 4 | 8)
}

fn valid_table(buf: &[u8], order: ByteOrder) -> bool {
    order
        .read_u32(buf, 0)
        .ok()
        .and_then(magic_version)
        .is_some()
        && valid_pclntab_header(buf)
}

/// Locate the PCLN table in the container: virtual address and bytes.
pub(crate) fn locate(c: &Container) -> Result<(u64, &[u8])> {
    if let Some(found) = locate_by_symbols(c) {
        debug!(va = found.0, "pclntab via runtime.pclntab symbols");
        return Ok(found);
    }

    match c {
        Container::Elf(_) => locate_elf(c),
        Container::Pe(_) => locate_pe(c),
        Container::MachO(_) => c.section_by_name("__gopclntab").map_err(|e| match e {
            Error::SectionDoesNotExist => Error::NoPCLNTab,
            other => other,
        }),
    }
}

// Strictly optional fast path: both bracket symbols present, agreeing on
// a section, and the bytes between them carrying a valid header.
fn locate_by_symbols(c: &Container) -> Option<(u64, &[u8])> {
    let start = c.symbol("runtime.pclntab").ok()?;
    let end = c.symbol("runtime.epclntab").ok()?;
    if end.value <= start.value {
        return None;
    }
    let (base, data) = c.section_at_address(start.value).ok()?;
    let (end_base, _) = c.section_at_address(end.value.saturating_sub(1)).ok()?;
    if base != end_base {
        return None;
    }
    let lo = (start.value - base) as usize;
    let hi = (end.value - base) as usize;
    let tab = data.get(lo..hi)?;
    valid_table(tab, c.file_info().byte_order).then_some((start.value, tab))
}

fn locate_elf(c: &Container) -> Result<(u64, &[u8])> {
    for name in [".gopclntab", ".data.rel.ro.gopclntab"] {
        match c.section_by_name(name) {
            Ok(found) => return Ok(found),
            Err(Error::SectionDoesNotExist) => continue,
            Err(e) => return Err(e),
        }
    }
    // External linker: the table is folded into .data.rel.ro.
    let (base, data) = match c.section_by_name(".data.rel.ro") {
        Ok(s) => s,
        Err(Error::SectionDoesNotExist) => return Err(Error::NoPCLNTab),
        Err(e) => return Err(e),
    };
    let off = search_section(data, c.file_info().byte_order).ok_or(Error::NoPCLNTab)?;
    Ok((base + off as u64, &data[off..]))
}

fn locate_pe(c: &Container) -> Result<(u64, &[u8])> {
    for name in [".rdata", ".text"] {
        let (base, data) = match c.section_by_name(name) {
            Ok(s) => s,
            Err(Error::SectionDoesNotExist) => continue,
            Err(e) => return Err(e),
        };
        if let Some(off) = search_section(data, c.file_info().byte_order) {
            return Ok((base + off as u64, &data[off..]));
        }
    }
    Err(Error::NoPCLNTab)
}

// Last-occurrence scan with backoff: for each magic (newest format
// first), take the final hit whose header validates; a hit with a bad
// header retreats to the previous occurrence of the same magic.
fn search_section(data: &[u8], order: ByteOrder) -> Option<usize> {
    for (magic, _) in MAGICS {
        let needle = order.u32_bytes(magic);
        let mut window = data.len();
        while let Some(off) = rfind(&data[..window], &needle) {
            if valid_pclntab_header(&data[off..]) {
                return Some(off);
            }
            window = off;
        }
    }
    None
}

/// A function recorded in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFunc {
    /// Entry program counter.
    pub entry: u64,
    /// First program counter past the function.
    pub end: u64,
    /// Full symbol name, e.g. `crypto/tls.(*Conn).Read`.
    pub name: String,
}

impl TableFunc {
    // Strip a generic instantiation suffix: "f[go.shape.int]" → "f".
    fn name_without_inst(&self) -> String {
        let Some(start) = self.name.find('[') else {
            return self.name.clone();
        };
        let Some(end) = self.name.rfind(']') else {
            return self.name.clone();
        };
        format!("{}{}", &self.name[..start], &self.name[end + 1..])
    }

    /// Package part of the symbol name; empty for compiler-generated
    /// symbols such as `go.buildid` and `type..eq` wrappers.
    pub fn package_name(&self) -> String {
        let name = self.name_without_inst();
        if name.starts_with("go.") || name.starts_with("type.") {
            return String::new();
        }
        let pathend = name.rfind('/').map(|i| i + 1).unwrap_or(0);
        match name[pathend..].find('.') {
            Some(i) => name[..pathend + i].to_string(),
            None => String::new(),
        }
    }

    /// Receiver part of a method symbol; empty for plain functions.
    pub fn receiver_name(&self) -> String {
        let name = self.name_without_inst();
        let pathend = name.rfind('/').map(|i| i + 1).unwrap_or(0);
        let tail = &name[pathend..];
        let (Some(l), Some(r)) = (tail.find('.'), tail.rfind('.')) else {
            return String::new();
        };
        if l == r {
            return String::new();
        }
        tail[l + 1..r].to_string()
    }

    /// Symbol name without package and receiver qualifiers.
    pub fn base_name(&self) -> String {
        match self.name.rfind('.') {
            Some(i) => self.name[i + 1..].to_string(),
            None => self.name.clone(),
        }
    }
}

/// A decoded PCLN table.
///
/// Owns a copy of the table bytes plus the virtual address it was found
/// at and the resolved `runtime.text` base used to materialize the
/// pc offsets stored by 1.18+ linkers.
pub struct LineTable {
    data: Vec<u8>,
    /// Virtual address of the table.
    pub addr: u64,
    /// Resolved `runtime.text`.
    pub text_start: u64,
    version: TableVersion,
    order: ByteOrder,
    quantum: u64,
    ptr_size: usize,
    nfunctab: u32,
    nfiletab: u32,
    funcname_off: usize,
    cutab_off: usize,
    filetab_off: usize,
    pctab_off: usize,
    funcdata_off: usize,
    functab_off: usize,
    functab_field_size: usize,
}

impl LineTable {
    /// Decode the table header. `addr` is the table's virtual address and
    /// `text_start` the resolved `runtime.text`.
    pub fn parse(data: Vec<u8>, addr: u64, text_start: u64, order: ByteOrder) -> Result<Self> {
        if !valid_pclntab_header(&data) {
            return Err(Error::NoPCLNTab);
        }
        let magic = order.read_u32(&data, 0)?;
        let version = magic_version(magic).ok_or(Error::NoPCLNTab)?;
        let quantum = data[6] as u64;
        let ptr_size = data[7] as usize;

        let word = |i: usize| order.read_word(&data, 8 + i * ptr_size, ptr_size);

        let mut table = LineTable {
            data: Vec::new(),
            addr,
            text_start,
            version,
            order,
            quantum,
            ptr_size,
            nfunctab: 0,
            nfiletab: 0,
            funcname_off: 0,
            cutab_off: 0,
            filetab_off: 0,
            pctab_off: 0,
            funcdata_off: 0,
            functab_off: 0,
            functab_field_size: ptr_size,
        };

        match version {
            TableVersion::V12 => {
                table.nfunctab = word(0)? as u32;
                table.functab_off = 8 + ptr_size;
                // The rest of the Go 1.2 layout hangs off the functab:
                // offsets into the table itself.
                let functab_end =
                    table.functab_off + (2 * table.nfunctab as usize + 1) * ptr_size;
                let filetab_off = order.read_u32(&data, functab_end)? as usize;
                table.filetab_off = filetab_off;
                table.nfiletab = order.read_u32(&data, filetab_off)?;
            }
            TableVersion::V116 => {
                table.nfunctab = word(0)? as u32;
                table.nfiletab = word(1)? as u32;
                table.funcname_off = word(2)? as usize;
                table.cutab_off = word(3)? as usize;
                table.filetab_off = word(4)? as usize;
                table.pctab_off = word(5)? as usize;
                table.funcdata_off = word(6)? as usize;
                table.functab_off = word(6)? as usize;
            }
            TableVersion::V118 | TableVersion::V120 => {
                table.nfunctab = word(0)? as u32;
                table.nfiletab = word(1)? as u32;
                // word(2) is the table's own textStart; the caller's
                // resolved runtime.text is authoritative for relocated
                // images, so it is ignored here.
                table.funcname_off = word(3)? as usize;
                table.cutab_off = word(4)? as usize;
                table.filetab_off = word(5)? as usize;
                table.pctab_off = word(6)? as usize;
                table.funcdata_off = word(7)? as usize;
                table.functab_off = word(7)? as usize;
                table.functab_field_size = 4;
            }
        }

        table.data = data;
        debug!(
            nfunc = table.nfunctab,
            version = ?table.version,
            "decoded pclntab header"
        );
        Ok(table)
    }

    /// The wire format found in the header.
    pub fn version(&self) -> TableVersion {
        self.version
    }

    /// Raw table bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of functions recorded.
    pub fn num_funcs(&self) -> u32 {
        self.nfunctab
    }

    // One functab slot: pc or offset field at `index`.
    fn functab_field(&self, index: usize) -> Result<u64> {
        let off = self.functab_off + index * self.functab_field_size;
        if self.functab_field_size == 4 {
            Ok(self.order.read_u32(&self.data, off)? as u64)
        } else {
            self.order.read_word(&self.data, off, self.ptr_size)
        }
    }

    fn functab_pc(&self, index: usize) -> Result<u64> {
        let raw = self.functab_field(index)?;
        if self.version >= TableVersion::V118 {
            Ok(self.text_start + raw)
        } else {
            Ok(raw)
        }
    }

    // Offset of the _func record for function `i`, relative to the table.
    fn func_record(&self, i: usize) -> Result<usize> {
        let funcoff = self.functab_field(2 * i + 1)?;
        Ok(self.funcdata_off + funcoff as usize)
    }

    // Fixed-width u32 field `n` of a _func record, past the entry field.
    fn func_field(&self, rec: usize, n: usize) -> Result<u32> {
        let entry_size = if self.version >= TableVersion::V118 {
            4
        } else {
            self.ptr_size
        };
        self.order.read_u32(&self.data, rec + entry_size + n * 4)
    }

    /// Decode the function index.
    pub fn funcs(&self) -> Result<Vec<TableFunc>> {
        let n = self.nfunctab as usize;
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let entry = self.functab_pc(2 * i)?;
            let end = self.functab_pc(2 * (i + 1))?;
            let rec = self.func_record(i)?;
            let nameoff = self.func_field(rec, 0)?;
            out.push(TableFunc {
                entry,
                end,
                name: self.func_name(nameoff),
            });
        }
        Ok(out)
    }

    fn func_name(&self, nameoff: u32) -> String {
        let off = self.funcname_off + nameoff as usize;
        cstring(&self.data, off)
    }

    // Index of the function containing pc, by binary search over the
    // functab entry pcs.
    fn func_index(&self, pc: u64) -> Option<usize> {
        let n = self.nfunctab as usize;
        if n == 0 || pc < self.functab_pc(0).ok()? || pc >= self.functab_pc(2 * n).ok()? {
            return None;
        }
        let (mut lo, mut hi) = (0usize, n);
        while lo + 1 < hi {
            let mid = (lo + hi) / 2;
            if self.functab_pc(2 * mid).ok()? <= pc {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Some(lo)
    }

    /// Source file and line for a program counter, when the pc falls
    /// inside a recorded function and the delta tables cover it.
    pub fn pc_to_line(&self, pc: u64) -> Option<(String, i32)> {
        let i = self.func_index(pc)?;
        let rec = self.func_record(i).ok()?;
        let entry = self.functab_pc(2 * i).ok()?;

        // _func: nameoff(0) args(1) deferreturn/frame(2) pcsp(3)
        // pcfile(4) pcln(5) npcdata(6) cuOffset(7)
        let pcfile = self.func_field(rec, 4).ok()?;
        let pcln = self.func_field(rec, 5).ok()?;

        let fileno = self.pcvalue(pcfile, entry, pc)?;
        let line = self.pcvalue(pcln, entry, pc)?;
        let file = self.file_name(rec, fileno)?;
        Some((file, line))
    }

    // Walk a pc-value delta table: (zigzag value delta, pc delta) pairs
    // from (-1, entry) until the pc range covering target is reached.
    fn pcvalue(&self, off: u32, entry: u64, target: u64) -> Option<i32> {
        let mut pos = self.pctab_off + off as usize;
        let mut val: i64 = -1;
        let mut pc = entry;
        let mut first = true;
        loop {
            let (uvdelta, n) = uvarint(self.data.get(pos..)?)?;
            if uvdelta == 0 && !first {
                return None;
            }
            pos += n;
            // Zigzag decode.
            let vdelta = ((uvdelta >> 1) as i64) ^ -((uvdelta & 1) as i64);
            val += vdelta;

            let (pcdelta, n) = uvarint(self.data.get(pos..)?)?;
            pos += n;
            pc += pcdelta * self.quantum;

            if target < pc {
                return Some(val as i32);
            }
            first = false;
        }
    }

    fn file_name(&self, rec: usize, fileno: i32) -> Option<String> {
        if fileno < 0 {
            return None;
        }
        match self.version {
            TableVersion::V12 => {
                // 1-based index into the file offset table.
                if fileno == 0 || fileno as u32 > self.nfiletab {
                    return None;
                }
                let off = self
                    .order
                    .read_u32(&self.data, self.filetab_off + 4 * fileno as usize)
                    .ok()?;
                Some(cstring(&self.data, off as usize))
            }
            _ => {
                // Index into the compilation unit's slice of cutab,
                // yielding an offset into the file name blob.
                let cu = self.func_field(rec, 7).ok()?;
                let idx = self.cutab_off + 4 * (cu as usize + fileno as usize);
                let off = self.order.read_u32(&self.data, idx).ok()?;
                if off == u32::MAX {
                    return None;
                }
                Some(cstring(&self.data, self.filetab_off + off as usize))
            }
        }
    }
}

fn cstring(data: &[u8], off: usize) -> String {
    let Some(tail) = data.get(off..) else {
        return String::new();
    };
    let len = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    String::from_utf8_lossy(&tail[..len]).into_owned()
}

fn uvarint(data: &[u8]) -> Option<(u64, usize)> {
    let mut x = 0u64;
    let mut shift = 0u32;
    for (i, &b) in data.iter().enumerate() {
        if shift >= 64 {
            return None;
        }
        if b < 0x80 {
            return Some((x | (b as u64) << shift, i + 1));
        }
        x |= ((b & 0x7f) as u64) << shift;
        shift += 7;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_validation() {
        let mut buf = [0u8; 16];
        buf[..8].copy_from_slice(&[0xfa, 0xff, 0xff, 0xff, 0x00, 0x00, 0x02, 0x08]);
        assert!(valid_pclntab_header(&buf));
        assert!(valid_table(&buf, ByteOrder::Little));

        let mut bad_ptr = buf;
        bad_ptr[7] = 0x03;
        assert!(!valid_pclntab_header(&bad_ptr));

        let mut bad_pad = buf;
        bad_pad[4] = 0x01;
        assert!(!valid_pclntab_header(&bad_pad));

        assert!(!valid_pclntab_header(&buf[..8]));
    }

    #[test]
    fn magic_table_is_complete() {
        assert_eq!(magic_version(0xffff_fffb), Some(TableVersion::V12));
        assert_eq!(magic_version(0xffff_fffa), Some(TableVersion::V116));
        assert_eq!(magic_version(0xffff_fff0), Some(TableVersion::V118));
        assert_eq!(magic_version(0xffff_fff1), Some(TableVersion::V120));
        assert_eq!(magic_version(0xdeadbeef), None);
    }

    #[test]
    fn scan_takes_last_valid_occurrence() {
        let order = ByteOrder::Little;
        let mut data = vec![0u8; 64];
        // A stale magic with a corrupt header early in the section...
        data[4..8].copy_from_slice(&order.u32_bytes(0xffff_fffb));
        data[8] = 0xff;
        // ...and a valid one later.
        data[32..36].copy_from_slice(&order.u32_bytes(0xffff_fffb));
        data[38] = 1; // quantum
        data[39] = 8; // pointer size
        assert_eq!(search_section(&data, order), Some(32));
    }

    #[test]
    fn scan_backs_off_from_bad_trailing_hit() {
        let order = ByteOrder::Little;
        let mut data = vec![0u8; 80];
        // Valid early hit.
        data[8..12].copy_from_slice(&order.u32_bytes(0xffff_fffb));
        data[14] = 2;
        data[15] = 4;
        // Later hit with a corrupt header must be skipped.
        data[60..64].copy_from_slice(&order.u32_bytes(0xffff_fffb));
        data[66] = 9;
        assert_eq!(search_section(&data, order), Some(8));
    }

    #[test]
    fn name_splitting() {
        let f = |name: &str| TableFunc {
            entry: 0,
            end: 0,
            name: name.to_string(),
        };

        let plain = f("runtime.schedinit");
        assert_eq!(plain.package_name(), "runtime");
        assert_eq!(plain.receiver_name(), "");
        assert_eq!(plain.base_name(), "schedinit");

        let method = f("crypto/tls.(*Conn).Read");
        assert_eq!(method.package_name(), "crypto/tls");
        assert_eq!(method.receiver_name(), "(*Conn)");
        assert_eq!(method.base_name(), "Read");

        let main_fn = f("main.main");
        assert_eq!(main_fn.package_name(), "main");
        assert_eq!(main_fn.base_name(), "main");

        let generated = f("go.buildid");
        assert_eq!(generated.package_name(), "");

        let generic = f("main.Map[go.shape.int]");
        assert_eq!(generic.package_name(), "main");
        assert_eq!(generic.receiver_name(), "");
    }

    // Assemble a miniature Go 1.18 table with two functions and pc-value
    // tables covering file and line resolution.
    fn build_v118_table() -> (Vec<u8>, u64) {
        let text_start: u64 = 0x40_1000;
        let order = ByteOrder::Little;
        let ptr = 8usize;
        let word_at = |buf: &mut Vec<u8>, off: usize, v: u64| {
            buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
        };

        let header_words = 8;
        let mut buf = vec![0u8; 8 + header_words * ptr];
        buf[0..4].copy_from_slice(&order.u32_bytes(0xffff_fff0));
        buf[6] = 1; // quantum
        buf[7] = 8; // pointer size

        // funcnametab
        let funcname_off = buf.len();
        let name1_off = 0u32;
        buf.extend_from_slice(b"main.main\0");
        let name2_off = (buf.len() - funcname_off) as u32;
        buf.extend_from_slice(b"main.helper\0");

        // cutab: one CU, two file slots
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
        let cutab_off = buf.len();
        buf.extend_from_slice(&0u32.to_le_bytes()); // file 0 at blob offset 0
        buf.extend_from_slice(&u32::MAX.to_le_bytes());

        // filetab blob
        let filetab_off = buf.len();
        buf.extend_from_slice(b"/src/app/main.go\0");

        // pctab: table at offset 1 (offset 0 is reserved padding)
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
        let pctab_off = buf.len();
        buf.push(0);
        let pc_table = buf.len() - pctab_off;
        // value delta +6 (zigzag 12) over 0x40 pcs, then +2 over 0x40.
        buf.push(12);
        buf.push(0x40);
        buf.push(4);
        buf.push(0x40);
        buf.push(0);
        // pcfile table: file index 0 for the whole 0x100 range
        // (zigzag(+1) = 2, then pc delta 0x100 as a two-byte varint).
        let pc_file = buf.len() - pctab_off;
        buf.push(2);
        buf.push(0x80);
        buf.push(0x02);
        buf.push(0);

        // functab: (entryoff, funcoff) * 2 + sentinel
        while buf.len() % 4 != 0 {
            buf.push(0);
        }
        let functab_off = buf.len();
        let func1_rec;
        let func2_rec;
        buf.extend_from_slice(&[0u8; 4 * 5]);

        // _func records
        func1_rec = buf.len() - functab_off;
        let mut rec1 = vec![0u8; 4 + 8 * 4];
        rec1[0..4].copy_from_slice(&0u32.to_le_bytes()); // entryoff
        rec1[4..8].copy_from_slice(&name1_off.to_le_bytes());
        rec1[4 + 4 * 4..4 + 4 * 4 + 4].copy_from_slice(&(pc_file as u32).to_le_bytes());
        rec1[4 + 5 * 4..4 + 5 * 4 + 4].copy_from_slice(&(pc_table as u32).to_le_bytes());
        rec1[4 + 7 * 4..4 + 7 * 4 + 4].copy_from_slice(&0u32.to_le_bytes()); // cuOffset
        buf.extend_from_slice(&rec1);

        func2_rec = buf.len() - functab_off;
        let mut rec2 = vec![0u8; 4 + 8 * 4];
        rec2[0..4].copy_from_slice(&0x80u32.to_le_bytes());
        rec2[4..8].copy_from_slice(&name2_off.to_le_bytes());
        rec2[4 + 4 * 4..4 + 4 * 4 + 4].copy_from_slice(&(pc_file as u32).to_le_bytes());
        rec2[4 + 5 * 4..4 + 5 * 4 + 4].copy_from_slice(&(pc_table as u32).to_le_bytes());
        buf.extend_from_slice(&rec2);

        // Fill in the functab slots now that record offsets are known.
        let slots: [u32; 5] = [
            0,
            func1_rec as u32,
            0x80,
            func2_rec as u32,
            0x100, // end sentinel
        ];
        for (i, v) in slots.iter().enumerate() {
            buf[functab_off + 4 * i..functab_off + 4 * i + 4].copy_from_slice(&v.to_le_bytes());
        }

        // Header words.
        word_at(&mut buf, 8, 2); // nfunctab
        word_at(&mut buf, 8 + ptr, 1); // nfiletab
        word_at(&mut buf, 8 + 2 * ptr, text_start);
        word_at(&mut buf, 8 + 3 * ptr, funcname_off as u64);
        word_at(&mut buf, 8 + 4 * ptr, cutab_off as u64);
        word_at(&mut buf, 8 + 5 * ptr, filetab_off as u64);
        word_at(&mut buf, 8 + 6 * ptr, pctab_off as u64);
        word_at(&mut buf, 8 + 7 * ptr, functab_off as u64);

        (buf, text_start)
    }

    #[test]
    fn v118_function_index() {
        let (buf, text_start) = build_v118_table();
        let table =
            LineTable::parse(buf, 0x50_0000, text_start, ByteOrder::Little).unwrap();
        assert_eq!(table.version(), TableVersion::V118);

        let funcs = table.funcs().unwrap();
        assert_eq!(funcs.len(), 2);
        assert_eq!(funcs[0].name, "main.main");
        assert_eq!(funcs[0].entry, text_start);
        assert_eq!(funcs[0].end, text_start + 0x80);
        assert_eq!(funcs[1].name, "main.helper");
        assert_eq!(funcs[1].entry, text_start + 0x80);
        assert_eq!(funcs[1].end, text_start + 0x100);
        assert_eq!(funcs[0].package_name(), "main");
    }

    #[test]
    fn v118_pc_to_line() {
        let (buf, text_start) = build_v118_table();
        let table =
            LineTable::parse(buf, 0x50_0000, text_start, ByteOrder::Little).unwrap();

        let (file, line) = table.pc_to_line(text_start).unwrap();
        assert_eq!(file, "/src/app/main.go");
        assert_eq!(line, 5);

        let (_, line2) = table.pc_to_line(text_start + 0x40).unwrap();
        assert_eq!(line2, 7);

        assert!(table.pc_to_line(0x10).is_none());
        assert!(table.pc_to_line(text_start + 0x100).is_none());
    }
}
