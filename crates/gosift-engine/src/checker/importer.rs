//! Import resolution.
//!
//! The checker sees imported packages only through the [`Importer`] trait.
//! [`FakeCImporter`] answers the cgo pseudo-import `"C"` with an opaque
//! package and delegates everything else; [`SourceImporter`] finds packages
//! under `GOROOT`/`GOPATH` and reads their exported declarations from
//! source.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::{debug, trace};

use crate::build::{select, Platform};
use crate::parser::ast::{Decl, Spec};
use crate::parser::{ast, parse_file, FileSet, ParseOptions, TokenKind};

/// Kind of an exported package member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Const,
    Var,
    Type,
    Func,
}

/// What the checker knows about an imported package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub path: String,
    pub name: String,
    pub members: FxHashMap<String, MemberKind>,
    /// Any selector on a fake package is accepted.
    pub fake: bool,
}

impl Package {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Package {
            path: path.into(),
            name: name.into(),
            members: FxHashMap::default(),
            fake: false,
        }
    }

    /// An opaque stand-in: every member exists.
    pub fn fake(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = default_package_name(&path).to_string();
        Package {
            path,
            name,
            members: FxHashMap::default(),
            fake: true,
        }
    }

    pub fn with_member(mut self, name: impl Into<String>, kind: MemberKind) -> Self {
        self.members.insert(name.into(), kind);
        self
    }
}

/// Last element of an import path, the conventional package name.
pub fn default_package_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("cannot find package \"{path}\" in any of: {}", searched.join(", "))]
    NotFound { path: String, searched: Vec<String> },
    #[error("cannot find package \"{path}\": GOROOT and GOPATH are not set")]
    NoRoots { path: String },
    #[error("cannot find package \"{path}\"")]
    Missing { path: String },
    #[error("no buildable Go source files in {}", dir.display())]
    NoGoFiles { dir: PathBuf },
    #[error("{0}")]
    Invalid(String),
}

/// Resolves import paths to packages.
pub trait Importer: Send + Sync {
    /// Import `path` as seen from a package in `src_dir`.
    fn import(&self, path: &str, src_dir: &Path) -> Result<Arc<Package>, ImportError>;
}

impl<T: Importer + ?Sized> Importer for Arc<T> {
    fn import(&self, path: &str, src_dir: &Path) -> Result<Arc<Package>, ImportError> {
        (**self).import(path, src_dir)
    }
}

impl<T: Importer + ?Sized> Importer for Box<T> {
    fn import(&self, path: &str, src_dir: &Path) -> Result<Arc<Package>, ImportError> {
        (**self).import(path, src_dir)
    }
}

/// Resolves `"C"` to an opaque package and delegates everything else.
#[derive(Debug, Clone)]
pub struct FakeCImporter<I> {
    inner: I,
}

impl<I: Importer> FakeCImporter<I> {
    pub fn new(inner: I) -> Self {
        FakeCImporter { inner }
    }
}

impl<I: Importer> Importer for FakeCImporter<I> {
    fn import(&self, path: &str, src_dir: &Path) -> Result<Arc<Package>, ImportError> {
        if path == "C" {
            trace!("resolved cgo pseudo-import");
            return Ok(Arc::new(Package::fake("C")));
        }
        self.inner.import(path, src_dir)
    }
}

/// A fixed set of packages, for hosts that supply their own.
#[derive(Debug, Clone, Default)]
pub struct MemoryImporter {
    packages: FxHashMap<String, Arc<Package>>,
}

impl MemoryImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: Package) -> Self {
        self.packages.insert(package.path.clone(), Arc::new(package));
        self
    }
}

impl Importer for MemoryImporter {
    fn import(&self, path: &str, _src_dir: &Path) -> Result<Arc<Package>, ImportError> {
        self.packages
            .get(path)
            .cloned()
            .ok_or_else(|| ImportError::Missing { path: path.to_string() })
    }
}

/// Where the source importer looks for packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportRoots {
    pub goroot: Option<PathBuf>,
    pub gopath: Vec<PathBuf>,
}

impl ImportRoots {
    /// Candidate directories for `path`, in search order, with a label for
    /// error messages.
    fn candidates(&self, path: &str, src_dir: &Path) -> Vec<(PathBuf, String)> {
        let mut out = Vec::new();
        if path.starts_with("./") || path.starts_with("../") {
            out.push((src_dir.join(path), "relative".to_string()));
            return out;
        }
        let src_roots: Vec<PathBuf> = self
            .goroot
            .iter()
            .chain(self.gopath.iter())
            .map(|root| root.join("src"))
            .collect();
        // vendor directories between the importing package and its root
        for root in &src_roots {
            if !src_dir.starts_with(root) {
                continue;
            }
            let mut dir = Some(src_dir);
            while let Some(d) = dir {
                if !d.starts_with(root) {
                    break;
                }
                let vendored = d.join("vendor").join(path);
                out.push((vendored.clone(), format!("{} (vendor tree)", vendored.display())));
                dir = d.parent();
            }
        }
        if let Some(goroot) = &self.goroot {
            let dir = goroot.join("src").join(path);
            out.push((dir.clone(), format!("{} (from $GOROOT)", dir.display())));
        }
        for gopath in &self.gopath {
            let dir = gopath.join("src").join(path);
            out.push((dir.clone(), format!("{} (from $GOPATH)", dir.display())));
        }
        out
    }
}

/// Imports packages by reading their source under `GOROOT`/`GOPATH`.
///
/// Results are cached by directory for the lifetime of the importer, which
/// the driver creates per run.
#[derive(Debug)]
pub struct SourceImporter {
    roots: ImportRoots,
    platform: Platform,
    cache: Mutex<FxHashMap<PathBuf, Result<Arc<Package>, ImportError>>>,
}

impl SourceImporter {
    pub fn new(roots: ImportRoots, platform: Platform) -> Self {
        SourceImporter {
            roots,
            platform,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    fn load(&self, path: &str, dir: &Path) -> Result<Arc<Package>, ImportError> {
        let selection = select(dir, false, &self.platform)
            .map_err(|err| ImportError::Invalid(err.to_string()))?;
        let Some(name) = selection.package.clone() else {
            return Err(ImportError::NoGoFiles { dir: dir.to_path_buf() });
        };
        let mut package = Package::new(path, name);
        let fset = FileSet::new();
        for file in &selection.files {
            let bytes = std::fs::read(&file.path)
                .map_err(|err| ImportError::Invalid(format!("{}: {err}", file.path.display())))?;
            let registered = fset.add_file_bytes(file.path.to_string_lossy(), bytes);
            let ast = parse_file(&registered, ParseOptions::default(), None)
                .map_err(|err| ImportError::Invalid(err.to_string()))?;
            collect_exports(&ast, &mut package);
        }
        debug!(path, members = package.members.len(), "imported package from source");
        Ok(Arc::new(package))
    }
}

impl Importer for SourceImporter {
    fn import(&self, path: &str, src_dir: &Path) -> Result<Arc<Package>, ImportError> {
        let candidates = self.roots.candidates(path, src_dir);
        if candidates.is_empty() {
            return Err(ImportError::NoRoots { path: path.to_string() });
        }
        let Some((dir, _)) = candidates.iter().find(|(dir, _)| dir.is_dir()) else {
            return Err(ImportError::NotFound {
                path: path.to_string(),
                searched: candidates.into_iter().map(|(_, label)| label).collect(),
            });
        };
        if let Some(cached) = self.cache.lock().get(dir) {
            return cached.clone();
        }
        let result = self.load(path, dir);
        self.cache.lock().insert(dir.clone(), result.clone());
        result
    }
}

/// Record the exported top-level declarations of `file`.
fn collect_exports(file: &ast::File, package: &mut Package) {
    for decl in &file.decls {
        match decl {
            Decl::Gen(gen) => {
                for spec in &gen.specs {
                    match spec {
                        Spec::Value(value) => {
                            let kind = if gen.keyword == TokenKind::Const {
                                MemberKind::Const
                            } else {
                                MemberKind::Var
                            };
                            for name in value.names.iter().filter(|n| n.is_exported()) {
                                package.members.insert(name.name.clone(), kind);
                            }
                        }
                        Spec::Type(ty) if ty.name.is_exported() => {
                            package.members.insert(ty.name.name.clone(), MemberKind::Type);
                        }
                        _ => {}
                    }
                }
            }
            Decl::Func(func) if func.recv.is_none() && func.name.is_exported() => {
                package.members.insert(func.name.name.clone(), MemberKind::Func);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn platform() -> Platform {
        Platform::new("linux", "amd64").with_cgo(false)
    }

    #[test]
    fn test_fake_c_import() {
        let importer = FakeCImporter::new(MemoryImporter::new());
        let pkg = importer.import("C", Path::new(".")).unwrap();
        assert!(pkg.fake);
        assert_eq!(pkg.name, "C");
        assert!(importer.import("fmt", Path::new(".")).is_err());
    }

    #[test]
    fn test_source_importer_collects_exports() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("src/example.com/greet");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("greet.go"),
            "package greet\n\nconst Version = 1\nvar hidden = 2\ntype Greeter struct{}\n\
             func Hello() string { return \"hi\" }\nfunc (Greeter) Method() {}\n",
        )
        .unwrap();
        fs::write(dir.join("greet_test.go"), "package greet\n\nfunc TestX() {}\n").unwrap();

        let importer = SourceImporter::new(
            ImportRoots {
                goroot: None,
                gopath: vec![root.path().to_path_buf()],
            },
            platform(),
        );
        let pkg = importer.import("example.com/greet", root.path()).unwrap();
        assert_eq!(pkg.name, "greet");
        assert_eq!(pkg.members.get("Version"), Some(&MemberKind::Const));
        assert_eq!(pkg.members.get("Greeter"), Some(&MemberKind::Type));
        assert_eq!(pkg.members.get("Hello"), Some(&MemberKind::Func));
        assert!(!pkg.members.contains_key("hidden"));
        assert!(!pkg.members.contains_key("Method"));
        assert!(!pkg.members.contains_key("TestX"));

        let again = importer.import("example.com/greet", root.path()).unwrap();
        assert!(Arc::ptr_eq(&pkg, &again));
    }

    #[test]
    fn test_source_importer_not_found() {
        let root = TempDir::new().unwrap();
        let importer = SourceImporter::new(
            ImportRoots {
                goroot: Some(root.path().to_path_buf()),
                gopath: Vec::new(),
            },
            platform(),
        );
        let err = importer.import("no/such", root.path()).unwrap_err();
        assert!(err.to_string().starts_with("cannot find package \"no/such\" in any of:"));
    }

    #[test]
    fn test_source_importer_without_roots() {
        let dir = TempDir::new().unwrap();
        let importer = SourceImporter::new(ImportRoots::default(), platform());
        let err = importer.import("errors", dir.path()).unwrap_err();
        assert_eq!(err, ImportError::NoRoots { path: "errors".into() });
        assert_eq!(
            err.to_string(),
            "cannot find package \"errors\": GOROOT and GOPATH are not set"
        );
    }

    #[test]
    fn test_vendor_directory_wins() {
        let root = TempDir::new().unwrap();
        let app = root.path().join("src/app");
        let vendored = app.join("vendor/lib");
        let global = root.path().join("src/lib");
        fs::create_dir_all(&vendored).unwrap();
        fs::create_dir_all(&global).unwrap();
        fs::write(vendored.join("a.go"), "package lib\n\nfunc Vendored() {}\n").unwrap();
        fs::write(global.join("a.go"), "package lib\n\nfunc Global() {}\n").unwrap();
        let importer = SourceImporter::new(
            ImportRoots {
                goroot: None,
                gopath: vec![root.path().to_path_buf()],
            },
            platform(),
        );
        let pkg = importer.import("lib", &app).unwrap();
        assert!(pkg.members.contains_key("Vendored"));
    }
}
