//! gobex inspects executables produced by the Go toolchain and
//! reconstructs what the compiler embedded in them: the compiler
//! version, the build id, build and module metadata, the PCLNTAB line
//! table, the `moduledata` runtime record, and the package/function
//! catalog.
//!
//! ELF, PE, and Mach-O containers are supported, for Go 1.5 through
//! 1.21+ on 32- and 64-bit x86 and arm64.
//!
//! ```no_run
//! use gobex::GoFile;
//!
//! # fn main() -> gobex::Result<()> {
//! let f = GoFile::open("/usr/local/bin/some-go-binary")?;
//! println!("built with {}", f.compiler_version()?.name);
//! for pkg in &f.packages()?.packages {
//!     println!("{} ({} functions)", pkg.name, pkg.functions.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod buildid;
pub mod buildinfo;
mod disasm;
mod dwarf;
pub mod error;
pub mod file;
pub mod formats;
mod goroot;
pub mod goversion;
pub mod logging;
pub mod moduledata;
pub mod packages;
pub mod pclntab;
mod scan;
pub mod stdpkgs;

pub use buildinfo::{BuildInfo, BuildSetting, Module, ModuleInfo};
pub use error::{Error, Result};
pub use file::GoFile;
pub use formats::{Arch, ByteOrder, Container, FileInfo, Symbol};
pub use goversion::{go_version_compare, resolve_go_version, GoVersion};
pub use moduledata::{Moduledata, ModuledataSection};
pub use packages::{
    FileEntry, Function, Method, Package, PackageCatalog, PackageClass, SourceFile,
};
pub use pclntab::{LineTable, TableFunc, TableVersion};
