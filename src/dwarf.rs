//! DWARF probe.
//!
//! Debug info, when present, pins down two strings the stripped-binary
//! heuristics otherwise have to hunt for: `runtime.buildVersion` and
//! `runtime.defaultGOROOT`. Only compilation units whose language is Go
//! are considered; the variable's `DW_OP_addr` location is dereferenced
//! as a Go string header.

use std::borrow::Cow;

use gimli::{AttributeValue, EndianSlice, RunTimeEndian};
use tracing::debug;

use crate::file::GoFile;
use crate::formats::ByteOrder;

const DW_OP_ADDR: u8 = 0x03;

/// The compiler version recorded in `runtime.buildVersion`, if debug
/// info is present and carries it.
pub(crate) fn build_version(f: &GoFile) -> Option<String> {
    named_go_string(f, "runtime.buildVersion")
}

/// The `runtime.defaultGOROOT` path, if debug info carries it.
pub(crate) fn default_goroot(f: &GoFile) -> Option<String> {
    named_go_string(f, "runtime.defaultGOROOT")
}

fn named_go_string(f: &GoFile, target: &str) -> Option<String> {
    let c = f.container();
    let info = c.file_info();
    let endian = match info.byte_order {
        ByteOrder::Little => RunTimeEndian::Little,
        ByteOrder::Big => RunTimeEndian::Big,
    };

    // Pull each debug section out of the container; missing ones load as
    // empty, which gimli tolerates everywhere that matters here.
    let sections = gimli::Dwarf::<Cow<'_, [u8]>>::load(
        |id| -> std::result::Result<Cow<'_, [u8]>, gimli::Error> {
            let core = id.name().trim_start_matches('.').trim_start_matches("debug_");
            Ok(c.debug_section(core)
                .map(Cow::Owned)
                .unwrap_or(Cow::Borrowed(&[])))
        },
    )
    .ok()?;
    let dwarf = sections.borrow(|section| EndianSlice::new(section, endian));

    let mut units = dwarf.units();
    while let Ok(Some(header)) = units.next() {
        let Ok(unit) = dwarf.unit(header) else {
            continue;
        };
        let mut entries = unit.entries();
        let Ok(Some((_, root))) = entries.next_dfs() else {
            continue;
        };
        match root.attr_value(gimli::DW_AT_language) {
            Ok(Some(AttributeValue::Language(lang))) if lang == gimli::DW_LANG_Go => {}
            _ => continue,
        }

        while let Ok(Some((_, entry))) = entries.next_dfs() {
            let Ok(Some(name_attr)) = entry.attr_value(gimli::DW_AT_name) else {
                continue;
            };
            let Ok(name) = dwarf.attr_string(&unit, name_attr) else {
                continue;
            };
            if name.slice() != target.as_bytes() {
                continue;
            }

            let Ok(Some(AttributeValue::Exprloc(expr))) =
                entry.attr_value(gimli::DW_AT_location)
            else {
                continue;
            };
            let loc = expr.0.slice();
            if loc.first() != Some(&DW_OP_ADDR) {
                continue;
            }
            let addr = if info.word_size == 4 {
                info.byte_order.read_u32(loc, 1).ok()? as u64
            } else {
                info.byte_order.read_u64(loc, 1).ok()?
            };
            debug!(target, addr, "dwarf variable resolved");
            return f.read_go_string(addr);
        }
    }
    None
}
