//! Versioned moduledata layouts.
//!
//! The runtime's moduledata record gained, lost, and shuffled fields in
//! nearly every minor release since 1.5. This module is the catalog of
//! the field placements the locator needs: one shape per layout family,
//! selected by (minor version, word size), with every offset expressed
//! in words from the start of the record.
//!
//! Field positions follow the runtime's symtab definitions:
//!
//! | shape | minors    | text | types | typelinks | itablinks | gofunc |
//! |-------|-----------|------|-------|-----------|-----------|--------|
//! | V5    | 1.5–1.6   | 12   | —     | 25        | —         | —      |
//! | V7    | 1.7       | 12   | 25    | 27        | 30        | —      |
//! | V8    | 1.8–1.15  | 12   | 25    | 30        | 33        | —      |
//! | V16   | 1.16–1.17 | 22   | 35    | 40        | 43        | —      |
//! | V18   | 1.18–1.19 | 22   | 35    | 42        | 45        | 38     |
//! | V20   | 1.20+     | 22   | 37    | 44        | 47        | 40     |

use crate::error::{Error, Result};
use crate::formats::ByteOrder;

/// Layout family of a moduledata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    V5,
    V7,
    V8,
    V16,
    V18,
    V20,
}

/// Word indices of the fields the normalizer copies out.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub kind: LayoutKind,
    /// Word size in bytes of the file this layout reads.
    pub word_size: usize,
    pub pclntab: usize,
    pub pclntab_len: usize,
    pub functab: usize,
    pub functab_len: usize,
    pub text: usize,
    pub etext: usize,
    pub noptrdata: usize,
    pub enoptrdata: usize,
    pub data: usize,
    pub edata: usize,
    pub bss: usize,
    pub ebss: usize,
    pub noptrbss: usize,
    pub enoptrbss: usize,
    pub types: Option<usize>,
    pub etypes: Option<usize>,
    pub typelinks: usize,
    pub typelinks_len: usize,
    pub itablinks: Option<usize>,
    pub itablinks_len: Option<usize>,
    pub gofunc: Option<usize>,
}

impl Layout {
    fn new(kind: LayoutKind, word_size: usize) -> Self {
        // The pre-1.16 shapes share their prefix: pclntable slice at 0,
        // ftab at 3, text/etext at 12/13, the data/bss pairs at 14..21.
        let legacy = Layout {
            kind,
            word_size,
            pclntab: 0,
            pclntab_len: 1,
            functab: 3,
            functab_len: 4,
            text: 12,
            etext: 13,
            noptrdata: 14,
            enoptrdata: 15,
            data: 16,
            edata: 17,
            bss: 18,
            ebss: 19,
            noptrbss: 20,
            enoptrbss: 21,
            types: None,
            etypes: None,
            typelinks: 25,
            typelinks_len: 26,
            itablinks: None,
            itablinks_len: None,
            gofunc: None,
        };
        // 1.16 pushed the header tables (pcHeader, funcnametab, cutab,
        // filetab, pctab) in front, shifting everything by ten words.
        let modern = Layout {
            pclntab: 13,
            pclntab_len: 14,
            functab: 16,
            functab_len: 17,
            text: 22,
            etext: 23,
            noptrdata: 24,
            enoptrdata: 25,
            data: 26,
            edata: 27,
            bss: 28,
            ebss: 29,
            noptrbss: 30,
            enoptrbss: 31,
            ..legacy
        };

        match kind {
            LayoutKind::V5 => legacy,
            LayoutKind::V7 => Layout {
                types: Some(25),
                etypes: Some(26),
                typelinks: 27,
                typelinks_len: 28,
                itablinks: Some(30),
                itablinks_len: Some(31),
                ..legacy
            },
            LayoutKind::V8 => Layout {
                types: Some(25),
                etypes: Some(26),
                typelinks: 30,
                typelinks_len: 31,
                itablinks: Some(33),
                itablinks_len: Some(34),
                ..legacy
            },
            LayoutKind::V16 => Layout {
                types: Some(35),
                etypes: Some(36),
                typelinks: 40,
                typelinks_len: 41,
                itablinks: Some(43),
                itablinks_len: Some(44),
                ..modern
            },
            LayoutKind::V18 => Layout {
                types: Some(35),
                etypes: Some(36),
                gofunc: Some(38),
                typelinks: 42,
                typelinks_len: 43,
                itablinks: Some(45),
                itablinks_len: Some(46),
                ..modern
            },
            LayoutKind::V20 => Layout {
                types: Some(37),
                etypes: Some(38),
                gofunc: Some(40),
                typelinks: 44,
                typelinks_len: 45,
                itablinks: Some(47),
                itablinks_len: Some(48),
                ..modern
            },
        }
    }

    /// The layout used by a given minor release and word size.
    pub fn for_version(minor: u16, word_size: usize) -> Layout {
        let kind = match minor {
            0..=6 => LayoutKind::V5,
            7 => LayoutKind::V7,
            8..=15 => LayoutKind::V8,
            16 | 17 => LayoutKind::V16,
            18 | 19 => LayoutKind::V18,
            _ => LayoutKind::V20,
        };
        Layout::new(kind, word_size)
    }

    /// Every known layout, newest first, for brute-force matching when
    /// the compiler version is unknown.
    pub fn catalog(word_size: usize) -> Vec<Layout> {
        [
            LayoutKind::V20,
            LayoutKind::V18,
            LayoutKind::V16,
            LayoutKind::V8,
            LayoutKind::V7,
            LayoutKind::V5,
        ]
        .into_iter()
        .map(|k| Layout::new(k, word_size))
        .collect()
    }

    /// Bytes a record of this layout occupies through its last field of
    /// interest.
    pub fn min_size(&self) -> usize {
        let last = [
            Some(self.enoptrbss),
            self.etypes,
            Some(self.typelinks_len),
            self.itablinks_len,
            self.gofunc,
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(self.enoptrbss);
        (last + 1) * self.word_size
    }

    fn word(&self, data: &[u8], index: usize, order: ByteOrder) -> Result<u64> {
        order.read_word(data, index * self.word_size, self.word_size)
    }

    /// Decode the raw record starting at `data`.
    pub fn read(&self, data: &[u8], order: ByteOrder) -> Result<RawModuledata> {
        if data.len() < self.min_size() {
            return Err(Error::InsufficientDataForModuledata);
        }
        let opt = |idx: Option<usize>| -> Result<u64> {
            idx.map(|i| self.word(data, i, order)).transpose().map(|v| v.unwrap_or(0))
        };
        Ok(RawModuledata {
            kind: self.kind,
            pclntab: self.word(data, self.pclntab, order)?,
            pclntab_len: self.word(data, self.pclntab_len, order)?,
            functab: self.word(data, self.functab, order)?,
            functab_len: self.word(data, self.functab_len, order)?,
            text: self.word(data, self.text, order)?,
            etext: self.word(data, self.etext, order)?,
            noptrdata: self.word(data, self.noptrdata, order)?,
            enoptrdata: self.word(data, self.enoptrdata, order)?,
            data: self.word(data, self.data, order)?,
            edata: self.word(data, self.edata, order)?,
            bss: self.word(data, self.bss, order)?,
            ebss: self.word(data, self.ebss, order)?,
            noptrbss: self.word(data, self.noptrbss, order)?,
            enoptrbss: self.word(data, self.enoptrbss, order)?,
            types: opt(self.types)?,
            etypes: opt(self.etypes)?,
            typelinks: self.word(data, self.typelinks, order)?,
            typelinks_len: self.word(data, self.typelinks_len, order)?,
            itablinks: opt(self.itablinks)?,
            itablinks_len: opt(self.itablinks_len)?,
            gofunc: opt(self.gofunc)?,
        })
    }
}

/// A decoded-but-unvalidated moduledata record in one of the versioned
/// shapes.
#[derive(Debug, Clone, Copy)]
pub struct RawModuledata {
    pub kind: LayoutKind,
    pub pclntab: u64,
    pub pclntab_len: u64,
    pub functab: u64,
    pub functab_len: u64,
    pub text: u64,
    pub etext: u64,
    pub noptrdata: u64,
    pub enoptrdata: u64,
    pub data: u64,
    pub edata: u64,
    pub bss: u64,
    pub ebss: u64,
    pub noptrbss: u64,
    pub enoptrbss: u64,
    pub types: u64,
    pub etypes: u64,
    pub typelinks: u64,
    pub typelinks_len: u64,
    pub itablinks: u64,
    pub itablinks_len: u64,
    pub gofunc: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_maps_minor_to_shape() {
        assert_eq!(Layout::for_version(5, 8).kind, LayoutKind::V5);
        assert_eq!(Layout::for_version(6, 8).kind, LayoutKind::V5);
        assert_eq!(Layout::for_version(7, 8).kind, LayoutKind::V7);
        assert_eq!(Layout::for_version(8, 8).kind, LayoutKind::V8);
        assert_eq!(Layout::for_version(15, 4).kind, LayoutKind::V8);
        assert_eq!(Layout::for_version(16, 8).kind, LayoutKind::V16);
        assert_eq!(Layout::for_version(17, 8).kind, LayoutKind::V16);
        assert_eq!(Layout::for_version(18, 8).kind, LayoutKind::V18);
        assert_eq!(Layout::for_version(19, 8).kind, LayoutKind::V18);
        assert_eq!(Layout::for_version(20, 8).kind, LayoutKind::V20);
        assert_eq!(Layout::for_version(22, 8).kind, LayoutKind::V20);
    }

    #[test]
    fn catalog_is_newest_first_and_complete() {
        let cat = Layout::catalog(8);
        assert_eq!(cat.len(), 6);
        assert_eq!(cat[0].kind, LayoutKind::V20);
        assert_eq!(cat[5].kind, LayoutKind::V5);
    }

    #[test]
    fn field_offsets_per_shape() {
        let v16 = Layout::for_version(16, 8);
        assert_eq!((v16.text, v16.etext), (22, 23));
        assert_eq!(v16.types, Some(35));
        assert_eq!(v16.typelinks, 40);
        assert_eq!(v16.pclntab, 13);

        let v8 = Layout::for_version(12, 8);
        assert_eq!((v8.text, v8.etext), (12, 13));
        assert_eq!(v8.typelinks, 30);
        assert_eq!(v8.pclntab, 0);

        let v20 = Layout::for_version(21, 8);
        assert_eq!(v20.gofunc, Some(40));
        assert_eq!(v20.typelinks, 44);
    }

    #[test]
    fn decode_reads_indexed_words() {
        let layout = Layout::for_version(16, 8);
        let mut buf = vec![0u8; layout.min_size()];
        let put = |buf: &mut Vec<u8>, idx: usize, v: u64| {
            buf[idx * 8..idx * 8 + 8].copy_from_slice(&v.to_le_bytes());
        };
        put(&mut buf, 13, 0x1000); // pclntab
        put(&mut buf, 22, 0x40_1000); // text
        put(&mut buf, 23, 0x49_9277); // etext
        put(&mut buf, 35, 0x4a_0000); // types
        put(&mut buf, 40, 0x4b_0000); // typelinks
        put(&mut buf, 41, 42); // typelink count

        let raw = layout.read(&buf, ByteOrder::Little).unwrap();
        assert_eq!(raw.pclntab, 0x1000);
        assert_eq!(raw.text, 0x40_1000);
        assert_eq!(raw.etext, 0x49_9277);
        assert_eq!(raw.types, 0x4a_0000);
        assert_eq!(raw.typelinks_len, 42);
        assert_eq!(raw.gofunc, 0);

        assert_eq!(
            layout.read(&buf[..32], ByteOrder::Little).unwrap_err(),
            Error::InsufficientDataForModuledata
        );
    }
}
