//! Go build id extraction.
//!
//! The linker records its build id in two shapes: an ELF note section
//! (`.note.go.buildid`), and a literal marker planted in the code section
//! for formats without Go-specific notes (PE, Mach-O).

use crate::error::{Error, Result};
use crate::formats::ByteOrder;
use crate::scan::find;

const GO_NOTE_NAME: &[u8] = b"Go\x00\x00";
const GO_NOTE_TAG: u32 = 4;

const RAW_START: &[u8] = b"\xff Go build ID: \"";
const RAW_END: &[u8] = b"\"\n \xff";

/// Parse the build id out of a `.note.go.buildid` section: a 12-byte
/// note header (name length, id length, tag) in the file's byte order,
/// the 4-byte name `"Go\0\0"`, then the id itself.
pub fn parse_elf_note(data: &[u8], order: ByteOrder) -> Result<String> {
    let name_len = order.read_u32(data, 0)?;
    let id_len = order.read_u32(data, 4)?;
    let tag = order.read_u32(data, 8)?;

    if tag != GO_NOTE_TAG {
        return Err(Error::MalformedBuildId);
    }
    let name = data
        .get(12..12 + name_len as usize)
        .ok_or(Error::NotEnoughBytesRead)?;
    if name != GO_NOTE_NAME {
        return Err(Error::MalformedBuildId);
    }
    let id = data
        .get(16..16 + id_len as usize)
        .ok_or(Error::NotEnoughBytesRead)?;
    Ok(String::from_utf8_lossy(id).into_owned())
}

/// Scan a code section for the raw build id marker. A missing start
/// marker is not an error (the binary simply has no id); a start without
/// a terminator is.
pub fn parse_raw(data: &[u8]) -> Result<String> {
    let Some(start) = find(data, RAW_START) else {
        return Ok(String::new());
    };
    let id_off = start + RAW_START.len();
    let end = find(&data[id_off..], RAW_END).ok_or(Error::MalformedBuildId)?;
    Ok(String::from_utf8_lossy(&data[id_off..id_off + end]).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str =
        "DrtsigZmOidE-wfbFVNF/io-X8KB-ByimyyODdYUe/Z7tIlu8GbOwt0Jup-Hji/fofocVx5sk8UpaKMTx0a";

    fn note_bytes(id: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(&(id.len() as u32).to_le_bytes());
        buf.extend_from_slice(&4u32.to_le_bytes());
        buf.extend_from_slice(GO_NOTE_NAME);
        buf.extend_from_slice(id.as_bytes());
        buf
    }

    #[test]
    fn elf_note_round_trip() {
        let buf = note_bytes(ID);
        assert_eq!(parse_elf_note(&buf, ByteOrder::Little).unwrap(), ID);
    }

    #[test]
    fn elf_note_rejects_wrong_tag() {
        let mut buf = note_bytes(ID);
        buf[8] = 7;
        assert_eq!(
            parse_elf_note(&buf, ByteOrder::Little).unwrap_err(),
            Error::MalformedBuildId
        );
    }

    #[test]
    fn elf_note_rejects_wrong_name() {
        let mut buf = note_bytes(ID);
        buf[12] = b'X';
        assert_eq!(
            parse_elf_note(&buf, ByteOrder::Little).unwrap_err(),
            Error::MalformedBuildId
        );
    }

    #[test]
    fn raw_marker_round_trip() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"\x90\x90");
        buf.extend_from_slice(RAW_START);
        buf.extend_from_slice(ID.as_bytes());
        buf.extend_from_slice(RAW_END);
        buf.extend_from_slice(&[0xcc, 0xcc, 0xcc, 0xcc]);
        assert_eq!(parse_raw(&buf).unwrap(), ID);
    }

    #[test]
    fn raw_marker_missing_is_empty() {
        assert_eq!(parse_raw(b"no marker here").unwrap(), "");
    }

    #[test]
    fn raw_marker_without_end_is_malformed() {
        let mut buf = Vec::new();
        buf.extend_from_slice(RAW_START);
        buf.extend_from_slice(b"truncated");
        assert_eq!(parse_raw(&buf).unwrap_err(), Error::MalformedBuildId);
    }
}
