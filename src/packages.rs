//! Package catalog reconstruction.
//!
//! Every function in the line table is attributed to a package, packages
//! are aggregated with their functions, methods, and source files, and a
//! classifier splits the result into standard-library, vendored,
//! main-project, compiler-generated, and unknown groups. The classifier
//! is seeded from the module path when buildinfo is present, else from
//! the main package's directory.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buildinfo::ModuleInfo;
use crate::error::Result;
use crate::pclntab::{LineTable, TableFunc};
use crate::stdpkgs::is_standard_library;

/// A function recovered from the line table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Function name, without package and receiver qualifiers.
    pub name: String,
    /// Starting virtual address.
    pub offset: u64,
    /// First address past the function.
    pub end: u64,
    /// Name of the package the function belongs to.
    #[serde(rename = "packageName")]
    pub package_name: String,
    /// Base name of the source file.
    pub filename: String,
    /// First source line of the definition.
    pub src_line_start: i32,
    /// Last source line of the definition.
    pub src_line_end: i32,
    /// Number of source lines the definition spans.
    pub src_line_length: i32,
}

/// A method: a function plus its receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    /// Receiver name, e.g. `(*Conn)`.
    pub receiver: String,
    #[serde(flatten)]
    pub function: Function,
}

/// A package aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package name as recorded in symbol names.
    pub name: String,
    /// Directory of the package's source files.
    pub filepath: String,
    pub functions: Vec<Function>,
    pub methods: Vec<Method>,
}

impl Package {
    /// Group the package's functions and methods by source file.
    pub fn source_files(&self) -> Vec<SourceFile> {
        let mut by_file: BTreeMap<&str, Vec<FileEntry>> = BTreeMap::new();
        for f in &self.functions {
            by_file.entry(&f.filename).or_default().push(FileEntry {
                name: f.name.clone(),
                start: f.src_line_start,
                end: f.src_line_end,
            });
        }
        for m in &self.methods {
            by_file
                .entry(&m.function.filename)
                .or_default()
                .push(FileEntry {
                    name: format!("{}{}", m.receiver, m.function.name),
                    start: m.function.src_line_start,
                    end: m.function.src_line_end,
                });
        }
        by_file
            .into_iter()
            .map(|(name, mut entries)| {
                entries.sort_by_key(|e| e.start);
                SourceFile {
                    name: name.to_string(),
                    entries,
                }
            })
            .collect()
    }
}

/// An entry (function or method) in a source file listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub start: i32,
    pub end: i32,
}

/// A source file with its entries, ordered by starting line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub entries: Vec<FileEntry>,
}

impl std::fmt::Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "File: {}", self.name)?;
        for e in &self.entries {
            writeln!(
                f,
                "\t{} Lines: {} to {} ({})",
                e.name,
                e.start,
                e.end,
                e.end - e.start
            )?;
        }
        Ok(())
    }
}

/// Classification of a reconstructed package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageClass {
    Unknown,
    Std,
    Main,
    Vendor,
    Generated,
}

/// The package catalog, partitioned by class.
#[derive(Debug, Clone, Default)]
pub struct PackageCatalog {
    /// Packages belonging to the main project.
    pub packages: Vec<Package>,
    /// Standard-library packages.
    pub std: Vec<Package>,
    /// Third-party packages.
    pub vendors: Vec<Package>,
    /// Compiler-generated pseudo packages.
    pub generated: Vec<Package>,
    /// Packages the classifier could not place.
    pub unknown: Vec<Package>,
}

impl PackageCatalog {
    /// Find a standard-library function by package and base name.
    pub(crate) fn find_std_function(&self, pkg: &str, name: &str) -> Option<&Function> {
        self.std
            .iter()
            .find(|p| p.name == pkg)?
            .functions
            .iter()
            .find(|f| f.name == name)
    }
}

// Directory part of a forward-slash path; symbol-table paths use '/'
// regardless of the build host.
pub(crate) fn path_dir(s: &str) -> String {
    match s.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => s[..i].to_string(),
        None => s.to_string(),
    }
}

pub(crate) fn path_base(s: &str) -> String {
    match s.rfind('/') {
        Some(i) => s[i + 1..].to_string(),
        None => s.to_string(),
    }
}

/// Walk a function's pc range in 4-byte strides and report its source
/// extent. PCs attributed to other files are inlined calls and are
/// skipped; lines before the start belong to inlinees defined earlier.
pub(crate) fn find_source_lines(entry: u64, end: u64, tab: &LineTable) -> (String, i32, i32) {
    let Some((file, src_start)) = tab.pc_to_line(entry) else {
        return (String::new(), 0, 0);
    };
    let mut src_end = src_start;

    let mut pc = entry;
    while pc <= end {
        if let Some((f, l)) = tab.pc_to_line(pc) {
            if f == file && l >= src_start && l > src_end {
                src_end = l;
            }
        }
        pc += 4;
    }
    (file, src_start, src_end)
}

/// Build the catalog from the decoded line table.
pub(crate) fn enumerate_packages(
    tab: &LineTable,
    mod_info: Option<&ModuleInfo>,
) -> Result<PackageCatalog> {
    let funcs = tab.funcs()?;

    // The source-extent walk dominates the cost; fan it out.
    struct Item {
        pkg: String,
        file: String,
        receiver: String,
        function: Function,
    }
    let items: Vec<Item> = funcs
        .par_iter()
        .map(|f: &TableFunc| {
            let (file, start, end) = find_source_lines(f.entry, f.end, tab);
            Item {
                pkg: f.package_name(),
                file: file.clone(),
                receiver: f.receiver_name(),
                function: Function {
                    name: f.base_name(),
                    offset: f.entry,
                    end: f.end,
                    package_name: f.package_name(),
                    filename: path_base(&file),
                    src_line_start: start,
                    src_line_end: end,
                    src_line_length: end - start,
                },
            }
        })
        .collect();

    let mut packages: BTreeMap<String, Package> = BTreeMap::new();
    for item in items {
        let pkg = packages.entry(item.pkg.clone()).or_insert_with(|| Package {
            name: item.pkg.clone(),
            filepath: path_dir(&item.file),
            ..Package::default()
        });
        if item.receiver.is_empty() {
            pkg.functions.push(item.function);
        } else {
            pkg.methods.push(Method {
                receiver: item.receiver,
                function: item.function,
            });
        }
    }

    // Seed the classifier: module path when buildinfo supplied one, the
    // main package's directory otherwise.
    let classifier: Box<dyn Fn(&Package) -> PackageClass> = match mod_info {
        Some(mi) if !mi.path.is_empty() || mi.main.is_some() => {
            let c = ModulePackageClassifier::new(mi);
            Box::new(move |p| c.classify(p))
        }
        _ => {
            let main_path = packages
                .get("main")
                .map(|p| p.filepath.clone())
                .unwrap_or_default();
            let c = PathPackageClassifier::new(main_path);
            Box::new(move |p| c.classify(p))
        }
    };

    let mut catalog = PackageCatalog::default();
    for (_, pkg) in packages {
        match classifier(&pkg) {
            PackageClass::Std => catalog.std.push(pkg),
            PackageClass::Vendor => catalog.vendors.push(pkg),
            PackageClass::Main => catalog.packages.push(pkg),
            PackageClass::Generated => catalog.generated.push(pkg),
            PackageClass::Unknown => catalog.unknown.push(pkg),
        }
    }
    debug!(
        main = catalog.packages.len(),
        std = catalog.std.len(),
        vendor = catalog.vendors.len(),
        "classified packages"
    );
    Ok(catalog)
}

// Method-value wrappers, type-equality functions, and other symbols the
// compiler materializes show up as pseudo packages.
fn is_generated_name(name: &str) -> bool {
    name == "type"
        || name.starts_with("type..")
        || name.contains(".(")
        || (name.starts_with("go.") && name.len() > 3)
}

fn looks_like_goroot(filepath: &str) -> bool {
    filepath.to_lowercase().contains("/go/src")
}

/// Classifier seeded from the main package's directory; used when the
/// binary carries no module information (GOPATH-era builds).
pub struct PathPackageClassifier {
    main_folders: Vec<String>,
}

impl PathPackageClassifier {
    pub fn new(main_filepath: String) -> Self {
        let mut main_folders = vec![path_dir(&main_filepath)];
        main_folders.push(main_filepath);
        main_folders.retain(|f| !f.is_empty() && f != ".");
        PathPackageClassifier { main_folders }
    }

    pub fn classify(&self, pkg: &Package) -> PackageClass {
        if is_generated_name(&pkg.name) {
            return PackageClass::Generated;
        }
        if is_standard_library(&pkg.name) {
            return PackageClass::Std;
        }
        // Nameless aggregates can still be placed by path.
        if pkg.name.is_empty() {
            return if looks_like_goroot(&pkg.filepath) {
                PackageClass::Std
            } else {
                PackageClass::Unknown
            };
        }
        if pkg.filepath.contains("/vendor/") {
            return PackageClass::Vendor;
        }
        if pkg.name == "main" {
            return PackageClass::Main;
        }
        for folder in &self.main_folders {
            if &pkg.filepath == folder || path_dir(&pkg.filepath) == *folder {
                return PackageClass::Main;
            }
        }
        if looks_like_goroot(&pkg.filepath) {
            return PackageClass::Std;
        }
        PackageClass::Unknown
    }
}

/// Classifier seeded from buildinfo module data (Go 1.13+ module
/// builds).
pub struct ModulePackageClassifier {
    main_path: String,
    dep_paths: Vec<String>,
}

impl ModulePackageClassifier {
    pub fn new(mi: &ModuleInfo) -> Self {
        let main_path = mi
            .main
            .as_ref()
            .map(|m| m.path.clone())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| mi.path.clone());
        ModulePackageClassifier {
            main_path,
            dep_paths: mi.deps.iter().map(|d| d.path.clone()).collect(),
        }
    }

    pub fn classify(&self, pkg: &Package) -> PackageClass {
        if is_generated_name(&pkg.name) {
            return PackageClass::Generated;
        }
        if is_standard_library(&pkg.name) {
            return PackageClass::Std;
        }
        if pkg.name == "main"
            || (!self.main_path.is_empty() && pkg.name.starts_with(&self.main_path))
        {
            return PackageClass::Main;
        }
        if self.dep_paths.iter().any(|d| pkg.name.starts_with(d.as_str())) {
            return PackageClass::Vendor;
        }
        // A dotted first path element is a domain: an import path from
        // outside the module and the standard library.
        match pkg.name.split('/').next() {
            Some(first) if first.contains('.') => PackageClass::Vendor,
            _ => PackageClass::Unknown,
        }
    }
}
