//! GOROOT recovery.
//!
//! The path the binary was compiled against is recoverable from DWARF
//! (`runtime.defaultGOROOT`) or, on x86, from the body of
//! `runtime.GOROOT`: a string-header load into the accumulator on 1.10+,
//! and the older lea/store/store/add/ret epilogue before that.

use tracing::debug;

use crate::disasm;
use crate::error::{Error, Result};
use crate::file::GoFile;

pub(crate) fn find_goroot(f: &GoFile) -> Result<String> {
    if let Some(path) = crate::dwarf::default_goroot(f) {
        debug!(%path, "goroot from dwarf");
        return Ok(path);
    }
    if f.container().file_info().arch.is_x86() {
        if let Some(path) = try_from_goroot_fn(f) {
            debug!(%path, "goroot from runtime.GOROOT");
            return Ok(path);
        }
    }
    Err(Error::NoGoRootFound)
}

fn try_from_goroot_fn(f: &GoFile) -> Option<String> {
    let catalog = f.packages().ok()?;
    let fcn = catalog.find_std_function("runtime", "GOROOT")?.clone();
    let buf = f.bytes(fcn.offset, fcn.end - fcn.offset).ok()?;
    let info = f.container().file_info().clone();

    // Go 1.10+ returns the path as a string header loaded into eax/rax.
    for target in disasm::mov_acc_loads(&buf, fcn.offset, &info) {
        if let Some(s) = f.read_go_string(target) {
            if !s.is_empty() {
                return Some(s);
            }
        }
    }

    // 1.5 – 1.9 return it on the stack: the data pointer from a lea, the
    // length as an immediate store.
    for (addr, len) in disasm::stack_string_returns(&buf, fcn.offset, &info) {
        let Ok(bytes) = f.bytes(addr, len) else {
            continue;
        };
        if let Ok(s) = std::str::from_utf8(&bytes) {
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
    }
    None
}
