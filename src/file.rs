//! The top-level file object.
//!
//! `GoFile` owns the container reader and memoizes every expensive
//! derivation behind a do-once slot that caches the value or the error.
//! All file content is mapped at open time; everything after that is
//! computation over the mapped bytes.

use std::fs::File;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, RwLock};

use memmap2::Mmap;
use once_cell::sync::OnceCell;
use tracing::debug;

use crate::buildinfo::{self, BuildInfo};
use crate::error::{Error, Result};
use crate::formats::{Container, ElfFile, FileInfo, MachoFile, PeFile, Symbol};
use crate::goversion::{self, resolve_go_version, GoVersion};
use crate::moduledata::{self, Moduledata};
use crate::packages::{self, Function, PackageCatalog};
use crate::pclntab::LineTable;

const ELF_MAGIC: &[u8] = b"\x7fELF";
const PE_MAGIC: &[u8] = b"MZ";
const MACHO_MAGICS: [[u8; 4]; 4] = [
    [0xfe, 0xed, 0xfa, 0xce],
    [0xfe, 0xed, 0xfa, 0xcf],
    [0xce, 0xfa, 0xed, 0xfe],
    [0xcf, 0xfa, 0xed, 0xfe],
];

/// An opened Go binary.
pub struct GoFile {
    build_id: String,
    container: Container,
    // Effective compiler version: discovered once, or overridden.
    version: RwLock<Option<GoVersion>>,
    discovered: OnceCell<Result<GoVersion>>,
    pclntab: OnceCell<Result<Arc<LineTable>>>,
    moduledata: OnceCell<Result<Moduledata>>,
    buildinfo: OnceCell<Result<BuildInfo>>,
    packages: OnceCell<Result<Arc<PackageCatalog>>>,
    goroot: OnceCell<Result<String>>,
}

impl std::fmt::Debug for GoFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoFile")
            .field("build_id", &self.build_id)
            .finish_non_exhaustive()
    }
}

impl GoFile {
    /// Open a Go binary by path. Fails on I/O errors and on files that
    /// are not ELF, PE, or Mach-O executables.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<GoFile> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() < 4 {
            return Err(Error::NotEnoughBytesRead);
        }

        let container = if mmap[..4] == *ELF_MAGIC {
            Container::Elf(ElfFile::parse(mmap)?)
        } else if mmap[..2] == *PE_MAGIC {
            // Malformed PE input has historically meant panics deep in
            // offset arithmetic; keep them inside the open call.
            let parsed = catch_unwind(AssertUnwindSafe(|| PeFile::parse(mmap)))
                .unwrap_or(Err(Error::UnsupportedFile))?;
            Container::Pe(parsed)
        } else if MACHO_MAGICS.iter().any(|m| mmap[..4] == *m) {
            Container::MachO(MachoFile::parse(mmap)?)
        } else {
            return Err(Error::UnsupportedFile);
        };

        // A stripped or tampered id is a gap, not a failure.
        let build_id = container.build_id().unwrap_or_default();
        debug!(
            arch = %container.file_info().arch,
            os = container.file_info().os,
            build_id = %build_id,
            "opened go binary"
        );

        Ok(GoFile {
            build_id,
            container,
            version: RwLock::new(None),
            discovered: OnceCell::new(),
            pclntab: OnceCell::new(),
            moduledata: OnceCell::new(),
            buildinfo: OnceCell::new(),
            packages: OnceCell::new(),
            goroot: OnceCell::new(),
        })
    }

    /// Facts about the file discovered at open time.
    pub fn file_info(&self) -> &FileInfo {
        self.container.file_info()
    }

    /// The Go build id, empty when the binary carries none.
    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    /// The underlying container reader. Moduledata section handles
    /// resolve their bytes through it.
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Look up a symbol in the container's symbol table.
    pub fn symbol(&self, name: &str) -> Result<Symbol> {
        self.container.symbol(name)
    }

    /// The compiler version, discovered via buildinfo, string scan,
    /// `runtime.schedinit` disassembly, or DWARF, in that order.
    pub fn compiler_version(&self) -> Result<GoVersion> {
        if let Some(v) = self.version.read().expect("version lock").clone() {
            return Ok(v);
        }
        let found = self
            .discovered
            .get_or_init(|| goversion::find_go_compiler_version(self))
            .clone()?;
        let mut slot = self.version.write().expect("version lock");
        if slot.is_none() {
            *slot = Some(found.clone());
        }
        Ok(slot.clone().unwrap_or(found))
    }

    /// Force the assumed compiler version. The tag must be a known
    /// release (e.g. `go1.12`, `go1.7.2`); unknown tags are rejected
    /// with `InvalidGoVersion`.
    pub fn set_go_version(&self, tag: &str) -> Result<()> {
        let v = resolve_go_version(tag).ok_or(Error::InvalidGoVersion)?;
        *self.version.write().expect("version lock") = Some(v);
        Ok(())
    }

    // Minor version for layout selection; None when discovery fails,
    // which sends the moduledata decoder into brute-force enumeration.
    pub(crate) fn version_minor(&self) -> Option<u16> {
        self.compiler_version().ok().map(|v| v.minor())
    }

    /// The decoded PCLN table.
    pub fn pclntab(&self) -> Result<Arc<LineTable>> {
        self.pclntab
            .get_or_init(|| {
                let (addr, data) = self.container.pclntab_data()?;
                let text = moduledata::resolve_text_start(&self.container, addr)?;
                let info = self.container.file_info();
                let tab = LineTable::parse(data.to_vec(), addr, text, info.byte_order)?;
                Ok(Arc::new(tab))
            })
            .clone()
    }

    /// The normalized moduledata record.
    pub fn moduledata(&self) -> Result<Moduledata> {
        self.moduledata
            .get_or_init(|| moduledata::find_moduledata(self))
            .clone()
    }

    /// Build information (Go 1.13+). `NoBuildInfo` when absent.
    pub fn build_info(&self) -> Result<BuildInfo> {
        self.buildinfo
            .get_or_init(|| buildinfo::extract_build_info(self))
            .clone()
    }

    /// The package catalog, partitioned by class.
    pub fn packages(&self) -> Result<Arc<PackageCatalog>> {
        self.packages
            .get_or_init(|| {
                let tab = self.pclntab()?;
                let mod_info = self
                    .build_info()
                    .ok()
                    .and_then(|bi| bi.mod_info);
                packages::enumerate_packages(&tab, mod_info.as_ref()).map(Arc::new)
            })
            .clone()
    }

    /// The GOROOT the binary was compiled with.
    pub fn goroot(&self) -> Result<String> {
        self.goroot
            .get_or_init(|| crate::goroot::find_goroot(self))
            .clone()
    }

    /// Copy `length` bytes at virtual address `address`. The whole range
    /// must fall inside one section's file bytes.
    pub fn bytes(&self, address: u64, length: u64) -> Result<Vec<u8>> {
        let (base, data) = self.container.section_at_address(address)?;
        let start = (address - base) as usize;
        let end = start
            .checked_add(length as usize)
            .ok_or(Error::NotEnoughBytesRead)?;
        data.get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or(Error::NotEnoughBytesRead)
    }

    // Dereference a Go string header (data pointer, length) at `addr`.
    pub(crate) fn read_go_string_bytes(&self, addr: u64) -> Option<Vec<u8>> {
        let info = self.container.file_info();
        let word = info.word_size;
        let header = self.bytes(addr, 2 * word as u64).ok()?;
        let ptr = info.byte_order.read_word(&header, 0, word).ok()?;
        let len = info.byte_order.read_word(&header, word, word).ok()?;
        if ptr == 0 || len == 0 {
            return None;
        }
        self.bytes(ptr, len).ok()
    }

    pub(crate) fn read_go_string(&self, addr: u64) -> Option<String> {
        let bytes = self.read_go_string_bytes(addr)?;
        String::from_utf8(bytes).ok()
    }

    /// Source extent of a function: file name, first line, last line.
    pub fn source_info(&self, fcn: &Function) -> Result<(String, i32, i32)> {
        let tab = self.pclntab()?;
        Ok(packages::find_source_lines(fcn.offset, fcn.end, &tab))
    }

    /// Release the file. Dropping the handle has the same effect; this
    /// just makes the release explicit at call sites that want it.
    pub fn close(self) {}
}
