//! Build information embedded by `go build` (Go 1.13+).
//!
//! A 32-byte header in `.go.buildinfo` / `__go_buildinfo` / `.data` holds
//! the compiler version string and the module-info blob. Through Go 1.17
//! the header carries two word-sized pointers to Go string headers; from
//! 1.18 the strings follow the header inline, length-prefixed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::file::GoFile;
use crate::goversion::{resolve_go_version, GoVersion};
use crate::scan::find;

const BUILD_INFO_MAGIC: &[u8] = b"\xff Go buildinf:";
const BUILD_INFO_HEADER_SIZE: usize = 0x20;
// The order matters: the .data fallback can false-match, so the
// dedicated sections are consulted first.
const BUILD_INFO_SECTIONS: [&str; 3] = [".go.buildinfo", "__go_buildinfo", ".data"];

const FLAG_INLINE_STRINGS: u8 = 0x2;

// 16-byte markers wrapping the modinfo payload.
const INFO_START: &[u8] =
    b"\x30\x77\xaf\x0c\x92\x74\x08\x02\x41\xe1\xc1\x07\xe6\xd6\x18\xe6";
const INFO_END: &[u8] =
    b"\xf9\x32\x43\x31\x86\x18\x20\x72\x00\x82\x42\x10\x41\x16\xd8\xf2";

/// Module metadata of the binary's main module and dependencies,
/// reconstructed from the modinfo blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Toolchain version recorded in the blob, when present.
    pub go_version: String,
    /// Import path of the main package.
    pub path: String,
    /// The main module.
    pub main: Option<Module>,
    /// Direct and indirect module dependencies.
    pub deps: Vec<Module>,
    /// Build settings (`-ldflags`, VCS revision, etc.), Go 1.18+.
    pub settings: Vec<BuildSetting>,
}

/// A single module reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub path: String,
    pub version: String,
    pub sum: String,
    /// Replacement module when a `replace` directive was in effect.
    pub replace: Option<Box<Module>>,
}

/// A `key=value` build setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSetting {
    pub key: String,
    pub value: String,
}

/// Build information extracted from the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Compiler release, when the recorded string matches a known one.
    pub compiler: Option<GoVersion>,
    /// Module information; `None` when the binary was built outside
    /// module mode or the blob is unparsable.
    pub mod_info: Option<ModuleInfo>,
}

/// Extract the build information record. `NoBuildInfo` when the magic is
/// absent from every candidate section.
pub(crate) fn extract_build_info(f: &GoFile) -> Result<BuildInfo> {
    let (version, modinfo) = read_strings(f)?;
    debug!(version = %version, modinfo_len = modinfo.len(), "buildinfo strings");

    Ok(BuildInfo {
        compiler: resolve_go_version(&version),
        mod_info: parse_mod_info(&String::from_utf8_lossy(trim_sentinels(&modinfo))),
    })
}

/// Just the compiler version string, for the version discoverer.
pub(crate) fn read_version_string(f: &GoFile) -> Result<String> {
    read_strings(f).map(|(v, _)| v)
}

// Locate the header and pull out the two strings in whichever encoding
// the header announces.
fn read_strings(f: &GoFile) -> Result<(String, Vec<u8>)> {
    let data = locate(f)?;
    if data.len() < BUILD_INFO_HEADER_SIZE {
        return Err(Error::NoBuildInfo);
    }

    if data[15] & FLAG_INLINE_STRINGS != 0 {
        // Go 1.18+: both strings follow the header, uvarint-prefixed.
        let (version, rest) =
            read_inline_string(&data[BUILD_INFO_HEADER_SIZE..]).ok_or(Error::NoBuildInfo)?;
        let (modinfo, _) = read_inline_string(rest).ok_or(Error::NoBuildInfo)?;
        return Ok((
            String::from_utf8_lossy(version).into_owned(),
            modinfo.to_vec(),
        ));
    }

    let info = f.container().file_info();
    let order = info.byte_order;
    let word = info.word_size;

    let ptr1 = order.read_word(data, 0x10, word)?;
    let ptr2 = order.read_word(data, 0x10 + word, word)?;

    let version = bytes_from_ptr(f, ptr1);
    let modinfo = bytes_from_ptr(f, ptr2);
    Ok((String::from_utf8_lossy(&version).into_owned(), modinfo))
}

// Find the 14-byte magic in one of the candidate sections and return the
// section tail starting at it.
fn locate(f: &GoFile) -> Result<&[u8]> {
    for name in BUILD_INFO_SECTIONS {
        let (_, data) = match f.container().section_by_name(name) {
            Ok(s) => s,
            Err(Error::SectionDoesNotExist) => continue,
            Err(e) => return Err(e),
        };
        if let Some(off) = find(data, BUILD_INFO_MAGIC) {
            return Ok(&data[off..]);
        }
    }
    Err(Error::NoBuildInfo)
}

// Dereference a Go string header at `ptr`. Null and poisoned pointers,
// and pointers into sections with no file bytes (BSS), read as empty.
fn bytes_from_ptr(f: &GoFile, ptr: u64) -> Vec<u8> {
    let word = f.container().file_info().word_size;
    if ptr == 0 || ptr == u64::MAX || (word == 4 && ptr == u32::MAX as u64) {
        return Vec::new();
    }
    f.read_go_string_bytes(ptr).unwrap_or_default()
}

fn read_inline_string(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let (len, n) = read_uvarint(data)?;
    let end = n.checked_add(len as usize)?;
    let bytes = data.get(n..end)?;
    Some((bytes, &data[end..]))
}

fn read_uvarint(data: &[u8]) -> Option<(u64, usize)> {
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

// Strip the sentinel markers when both are present; older writers and
// hand-fed blobs arrive bare.
fn trim_sentinels(data: &[u8]) -> &[u8] {
    if data.len() >= 32 && data.starts_with(INFO_START) && data.ends_with(INFO_END) {
        &data[16..data.len() - 16]
    } else {
        data
    }
}

/// Parse a modinfo blob: tab-separated `go`/`path`/`mod`/`dep`/`=>`/
/// `build` lines. `None` for an empty or unrecognizable blob.
pub fn parse_mod_info(data: &str) -> Option<ModuleInfo> {
    if data.is_empty() {
        return None;
    }
    let mut info = ModuleInfo::default();
    let mut saw_line = false;

    for line in data.lines() {
        let mut cols = line.split('\t');
        match cols.next() {
            Some("go") => {
                info.go_version = cols.next().unwrap_or("").to_string();
                saw_line = true;
            }
            Some("path") => {
                info.path = cols.next().unwrap_or("").to_string();
                saw_line = true;
            }
            Some("mod") => {
                info.main = parse_module(&mut cols);
                saw_line = true;
            }
            Some("dep") => {
                if let Some(m) = parse_module(&mut cols) {
                    info.deps.push(m);
                }
                saw_line = true;
            }
            Some("=>") => {
                // Replacement for the most recent dep line.
                if let (Some(last), Some(m)) = (info.deps.last_mut(), parse_module(&mut cols)) {
                    last.replace = Some(Box::new(m));
                }
            }
            Some("build") => {
                if let Some(rest) = cols.next() {
                    if let Some((key, value)) = rest.split_once('=') {
                        info.settings.push(BuildSetting {
                            key: key.to_string(),
                            value: unquote(value),
                        });
                        saw_line = true;
                    }
                }
            }
            _ => {}
        }
    }

    saw_line.then_some(info)
}

fn parse_module<'a>(cols: &mut impl Iterator<Item = &'a str>) -> Option<Module> {
    let path = cols.next()?.to_string();
    Some(Module {
        path,
        version: cols.next().unwrap_or("").to_string(),
        sum: cols.next().unwrap_or("").to_string(),
        replace: None,
    })
}

// Build-setting values with spaces are quoted; plain values pass through.
fn unquote(v: &str) -> String {
    if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
        v[1..v.len() - 1].replace("\\\"", "\"").replace("\\\\", "\\")
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uvarint_decoding() {
        assert_eq!(read_uvarint(&[0x05]).unwrap(), (5, 1));
        assert_eq!(read_uvarint(&[0x80, 0x01]).unwrap(), (128, 2));
        assert_eq!(read_uvarint(&[]), None);
    }

    #[test]
    fn inline_strings_chain() {
        let mut buf = vec![0x05u8];
        buf.extend_from_slice(b"go1.2");
        buf.push(0x03);
        buf.extend_from_slice(b"abc");
        let (first, rest) = read_inline_string(&buf).unwrap();
        assert_eq!(first, b"go1.2");
        let (second, rest) = read_inline_string(rest).unwrap();
        assert_eq!(second, b"abc");
        assert!(rest.is_empty());
    }

    #[test]
    fn mod_info_blob() {
        let blob = "path\texample.com/cmd/tool\n\
                    mod\texample.com/cmd\tv1.2.3\th1:abcd\n\
                    dep\tgithub.com/pkg/errors\tv0.9.1\th1:efgh\n\
                    =>\texample.com/fork/errors\tv0.9.2\th1:ijkl\n\
                    build\tCGO_ENABLED=0\n\
                    build\t-ldflags=\"-s -w\"\n";
        let info = parse_mod_info(blob).unwrap();
        assert_eq!(info.path, "example.com/cmd/tool");
        assert_eq!(info.main.as_ref().unwrap().path, "example.com/cmd");
        assert_eq!(info.deps.len(), 1);
        let dep = &info.deps[0];
        assert_eq!(dep.path, "github.com/pkg/errors");
        assert_eq!(dep.version, "v0.9.1");
        let replace = dep.replace.as_ref().unwrap();
        assert_eq!(replace.path, "example.com/fork/errors");
        assert_eq!(info.settings.len(), 2);
        assert_eq!(info.settings[0].key, "CGO_ENABLED");
        assert_eq!(info.settings[0].value, "0");
        assert_eq!(info.settings[1].value, "-s -w");
    }

    #[test]
    fn empty_blob_is_none() {
        assert!(parse_mod_info("").is_none());
        assert!(parse_mod_info("unrelated text").is_none());
    }

    #[test]
    fn sentinel_trimming() {
        let inner = b"path\texample.com/x\n";
        let mut wrapped = Vec::new();
        wrapped.extend_from_slice(INFO_START);
        wrapped.extend_from_slice(inner);
        wrapped.extend_from_slice(INFO_END);
        assert_eq!(trim_sentinels(&wrapped), inner);
        assert_eq!(trim_sentinels(inner), inner.as_slice());
    }
}
