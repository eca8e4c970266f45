//! Compiler version handling: the release table, the tag comparator, and
//! the four discovery strategies.

mod table;

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::file::GoFile;
use crate::scan::find;

pub use table::known_tags;

/// A released Go compiler version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoVersion {
    /// String representation of the version, e.g. `go1.16.5`.
    pub name: String,
    /// Digest of the release commit.
    pub sha: String,
    /// Timestamp of the release commit.
    pub timestamp: String,
}

impl GoVersion {
    /// A descriptor for a version string not present in the release
    /// table; only the name is known.
    pub fn unknown(name: impl Into<String>) -> Self {
        GoVersion {
            name: name.into(),
            sha: String::new(),
            timestamp: String::new(),
        }
    }

    /// Minor version number of the `goMAJ.MIN...` tag, e.g. 16 for
    /// `go1.16.5`. `go1` reports 0.
    pub fn minor(&self) -> u16 {
        let Some(rest) = self.name.split('.').nth(1) else {
            return 0;
        };
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().unwrap_or(0)
    }
}

/// Look up the descriptor for a version tag. `None` when the tag is not a
/// known release.
pub fn resolve_go_version(tag: &str) -> Option<GoVersion> {
    table::GOVERSIONS.get(tag).cloned()
}

/// Total order over version tags of the form `goMAJ.MIN[.PATCH|betaN|rcN]`:
/// majors first, then minors, and within one major.minor
/// `betaN < rcN < release < patchN`. A bare `go1` sorts before any
/// `go1.x`.
///
/// Panics on tags the library could never produce itself (not starting
/// with `go`, non-numeric components); callers pass table tags or strings
/// already shaped by the discovery strategies.
pub fn go_version_compare(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let aa: Vec<&str> = a.split('.').collect();
    let ab: Vec<&str> = b.split('.').collect();

    let amaj = major_of(aa[0]);
    let bmaj = major_of(ab[0]);
    if amaj != bmaj {
        return amaj.cmp(&bmaj);
    }

    // Same major; a bare "goN" is older than any "goN.x".
    if aa.len() == 1 {
        return Ordering::Less;
    }
    if ab.len() == 1 {
        return Ordering::Greater;
    }

    let (amin, abeta, arc) = minor_of(aa[1]);
    let (bmin, bbeta, brc) = minor_of(ab[1]);
    if amin != bmin {
        return amin.cmp(&bmin);
    }

    // A tag with a patch component is newer than the bare release.
    if aa.len() != ab.len() {
        return aa.len().cmp(&ab.len());
    }
    if aa.len() == 3 {
        let apatch = int_of(aa[2]);
        let bpatch = int_of(ab[2]);
        return if apatch > bpatch {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }

    // Same major.minor; beta sorts below rc sorts below the release
    // (which carries neither marker).
    if abeta != bbeta {
        return match (abeta, bbeta) {
            (0, _) => Ordering::Greater,
            (_, 0) => Ordering::Less,
            _ => abeta.cmp(&bbeta),
        };
    }
    if arc != brc {
        return match (arc, brc) {
            (0, _) => Ordering::Greater,
            (_, 0) => Ordering::Less,
            _ => arc.cmp(&brc),
        };
    }
    Ordering::Less
}

fn major_of(s: &str) -> i64 {
    let Some(num) = s.strip_prefix("go") else {
        panic!("not a go version string: {s}");
    };
    int_of(num)
}

fn int_of(s: &str) -> i64 {
    s.parse()
        .unwrap_or_else(|_| panic!("not a go version component: {s}"))
}

// Splits a minor component like "16beta1" into (16, beta, rc).
fn minor_of(s: &str) -> (i64, i64, i64) {
    if let Some(idx) = s.find("beta") {
        (int_of(&s[..idx]), int_of(&s[idx + 4..]), 0)
    } else if let Some(idx) = s.find("rc") {
        (int_of(&s[..idx]), 0, int_of(&s[idx + 2..]))
    } else {
        (int_of(s), 0, 0)
    }
}

static VERSION_MATCHER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"go[\d+\.]*(beta|rc)?[\d*]").unwrap());

/// First substring that looks like an embedded version tag.
pub(crate) fn match_go_version_string(data: &[u8]) -> Option<String> {
    VERSION_MATCHER
        .find(data)
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

/// Run the discovery strategies in order: buildinfo blob, read-only-data
/// string scan, `runtime.schedinit` disassembly (x86 only), DWARF.
pub(crate) fn find_go_compiler_version(f: &GoFile) -> Result<GoVersion> {
    // The buildinfo header carries the exact version string on 1.13+.
    // A hit from the .data fallback can be coincidental, so only accept
    // something that actually spells a version.
    if let Ok(raw) = crate::buildinfo::read_version_string(f) {
        if raw.starts_with("go") {
            debug!(version = %raw, "version from buildinfo");
            return Ok(resolve_go_version(&raw).unwrap_or_else(|| GoVersion::unknown(raw)));
        }
    }

    if let Some(ver) = try_from_string_scan(f)? {
        debug!(version = %ver.name, "version from string scan");
        return Ok(ver);
    }

    if let Some(ver) = try_from_schedinit(f) {
        debug!(version = %ver.name, "version from schedinit");
        return Ok(ver);
    }

    if let Some(raw) = crate::dwarf::build_version(f) {
        debug!(version = %raw, "version from dwarf");
        return Ok(resolve_go_version(&raw).unwrap_or_else(|| GoVersion::unknown(raw)));
    }

    Err(Error::NoGoVersionFound)
}

// Scan read-only data (or code, when the file has no read-only section)
// for an embedded version tag. Binaries older than 1.4 embed no tag, so
// hits that resolve below go1.4beta1 are coincidental byte runs; skip
// past them and keep looking.
fn try_from_string_scan(f: &GoFile) -> Result<Option<GoVersion>> {
    let mut data = match f.container().rdata() {
        Ok(d) => d,
        Err(Error::SectionDoesNotExist) => f.container().code_section()?.1,
        Err(e) => return Err(e),
    };

    loop {
        let Some(version) = match_go_version_string(data) else {
            return Ok(None);
        };
        match resolve_go_version(&version) {
            Some(ver) if go_version_compare(&ver.name, "go1.4beta1") != Ordering::Less => {
                return Ok(Some(ver));
            }
            _ => {
                let Some(off) = find(data, version.as_bytes()) else {
                    return Ok(None);
                };
                data = &data[off + 2..];
            }
        }
    }
}

// The only reference to the version string in a stripped pre-1.13 binary
// is loaded inside runtime.schedinit. Decode that function and chase
// every lea until one points at a Go string header spelling "go1.".
fn try_from_schedinit(f: &GoFile) -> Option<GoVersion> {
    if !f.container().file_info().arch.is_x86() {
        return None;
    }

    let catalog = f.packages().ok()?;
    let fcn = catalog.find_std_function("runtime", "schedinit")?.clone();
    let buf = f.bytes(fcn.offset, fcn.end - fcn.offset).ok()?;

    let info = f.container().file_info().clone();
    for load in crate::disasm::lea_targets(&buf, fcn.offset, &info) {
        let Some(s) = f.read_go_string(load) else {
            continue;
        };
        if !s.starts_with("go1.") {
            continue;
        }
        return Some(resolve_go_version(&s).unwrap_or_else(|| GoVersion::unknown(s)));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_known_and_unknown_tags() {
        for tag in ["go1", "go1.0.1", "go1.10.5", "go1.10beta2", "go1.4"] {
            let v = resolve_go_version(tag).unwrap();
            assert_eq!(v.name, tag);
        }
        assert!(resolve_go_version("go1234").is_none());
        assert!(resolve_go_version("go1.").is_none());
    }

    #[test]
    fn comparator_cases() {
        let cases = [
            ("go2.0.0", "go1.0.0", Ordering::Greater),
            ("go1.0.0", "go2.0.0", Ordering::Less),
            ("go1.7.1", "go1.7.1", Ordering::Equal),
            ("go1.7.1", "go1.7.2", Ordering::Less),
            ("go1.7.2", "go1.7.1", Ordering::Greater),
            ("go1.8.1", "go1.7.2", Ordering::Greater),
            ("go1.7.1", "go1.8.2", Ordering::Less),
            ("go1.7.1", "go1.7", Ordering::Greater),
            ("go1.7", "go1.7.2", Ordering::Less),
            ("go1.7beta1", "go1.7beta2", Ordering::Less),
            ("go1.7beta2", "go1.7beta1", Ordering::Greater),
            ("go1.7", "go1.7beta1", Ordering::Greater),
            ("go1.7rc1", "go1.7beta1", Ordering::Greater),
            ("go1.7beta2", "go1.7rc1", Ordering::Less),
            ("go1.7rc2", "go1.7rc1", Ordering::Greater),
            ("go1.7rc1", "go1.7rc2", Ordering::Less),
            ("go1.7", "go1.7rc2", Ordering::Greater),
            ("go1.7rc1", "go1.7", Ordering::Less),
            ("go1", "go1.4beta1", Ordering::Less),
            ("go1.4beta1", "go1", Ordering::Greater),
        ];
        for (a, b, want) in cases {
            assert_eq!(go_version_compare(a, b), want, "compare({a}, {b})");
        }
    }

    #[test]
    fn comparator_is_antisymmetric_over_the_table() {
        let tags: Vec<&str> = known_tags().collect();
        for &a in tags.iter().step_by(7) {
            for &b in tags.iter().step_by(11) {
                assert_eq!(
                    go_version_compare(a, b),
                    go_version_compare(b, a).reverse(),
                    "compare({a}, {b})"
                );
            }
        }
    }

    #[test]
    #[should_panic(expected = "not a go version")]
    fn comparator_panics_on_garbage() {
        go_version_compare("1.7", "go1.7");
    }

    #[test]
    fn matcher_finds_embedded_tag() {
        assert_eq!(
            match_go_version_string(b"prefixXYZgo1.16beta1SUFFIX").unwrap(),
            "go1.16beta1"
        );
        assert_eq!(
            match_go_version_string(b"...go1.21.0...").unwrap(),
            "go1.21.0"
        );
        assert!(match_go_version_string(b"no version here").is_none());
    }

    #[test]
    fn matcher_covers_every_table_tag() {
        for tag in known_tags() {
            let mut data = tag.as_bytes().to_vec();
            data.extend_from_slice(b"teststringPadding");
            let got = match_go_version_string(&data).unwrap();
            assert_eq!(got, tag, "matching {tag}");
        }
    }

    #[test]
    fn minor_extraction() {
        assert_eq!(GoVersion::unknown("go1.16.5").minor(), 16);
        assert_eq!(GoVersion::unknown("go1.7beta1").minor(), 7);
        assert_eq!(GoVersion::unknown("go1").minor(), 0);
    }
}
