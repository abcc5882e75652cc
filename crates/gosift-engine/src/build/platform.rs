//! Target platform description and the catalogue of known Go OS/arch names.

use once_cell::sync::Lazy;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

/// Newest `go1.N` release tag that is considered satisfied.
pub const LATEST_GO_MINOR: u32 = 22;

/// Every GOOS value the Go tool knows about.
pub static KNOWN_OS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js",
        "linux", "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
    ]
    .into_iter()
    .collect()
});

/// Every GOARCH value the Go tool knows about.
pub static KNOWN_ARCH: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips",
        "mipsle", "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le",
        "riscv", "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
    ]
    .into_iter()
    .collect()
});

/// Operating systems satisfying the `unix` build tag.
pub static UNIX_OS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
        "netbsd", "openbsd", "solaris",
    ]
    .into_iter()
    .collect()
});

/// Architectures with 4-byte words and alignment.
static ARCH_32BIT: &[&str] = &[
    "386",
    "arm",
    "armbe",
    "amd64p32",
    "mips",
    "mipsle",
    "mips64p32",
    "mips64p32le",
    "ppc",
    "riscv",
    "s390",
    "sparc",
];

pub fn is_known_os(name: &str) -> bool {
    KNOWN_OS.contains(name)
}

pub fn is_known_arch(name: &str) -> bool {
    KNOWN_ARCH.contains(name)
}

/// Word size (and maximum alignment) in bytes for `goarch`.
pub fn word_size(goarch: &str) -> u64 {
    if ARCH_32BIT.contains(&goarch) {
        4
    } else {
        8
    }
}

/// The platform a run analyzes for. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Platform {
    pub goos: String,
    pub goarch: String,
    pub word_size: u64,
    pub max_align: u64,
    pub cgo_enabled: bool,
    pub compiler: String,
    pub release_tags: Vec<String>,
    pub build_tags: Vec<String>,
}

impl Platform {
    /// Platform for `goos`/`goarch` with cgo enabled only for native targets.
    pub fn new(goos: impl Into<String>, goarch: impl Into<String>) -> Self {
        let goos = goos.into();
        let goarch = goarch.into();
        let size = word_size(&goarch);
        let cgo_enabled = goos == host_goos() && goarch == host_goarch();
        Platform {
            goos,
            goarch,
            word_size: size,
            max_align: size,
            cgo_enabled,
            compiler: "gc".to_string(),
            release_tags: (1..=LATEST_GO_MINOR).map(|n| format!("go1.{n}")).collect(),
            build_tags: Vec::new(),
        }
    }

    /// The machine we're running on.
    pub fn host() -> Self {
        Platform::new(host_goos(), host_goarch())
    }

    pub fn with_cgo(mut self, enabled: bool) -> Self {
        self.cgo_enabled = enabled;
        self
    }

    pub fn with_build_tags(mut self, tags: Vec<String>) -> Self {
        self.build_tags = tags;
        self
    }

    /// Same platform on a different OS.
    pub fn with_goos(&self, goos: impl Into<String>) -> Self {
        Platform {
            goos: goos.into(),
            ..self.clone()
        }
    }

    /// Whether `tag` is satisfied on this platform.
    pub fn matches_tag(&self, tag: &str) -> bool {
        if tag == "cgo" {
            return self.cgo_enabled;
        }
        if tag == self.goos || tag == self.goarch || tag == self.compiler {
            return true;
        }
        let implied = match self.goos.as_str() {
            "android" => tag == "linux",
            "illumos" => tag == "solaris",
            "ios" => tag == "darwin",
            _ => false,
        };
        if implied {
            return true;
        }
        if tag == "unix" && UNIX_OS.contains(self.goos.as_str()) {
            return true;
        }
        self.build_tags.iter().any(|t| t == tag) || self.release_tags.iter().any(|t| t == tag)
    }
}

/// Rust target OS mapped to its GOOS name.
pub fn host_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "linux" => "linux",
        "windows" => "windows",
        "freebsd" => "freebsd",
        "netbsd" => "netbsd",
        "openbsd" => "openbsd",
        "dragonfly" => "dragonfly",
        "solaris" => "solaris",
        "illumos" => "illumos",
        "android" => "android",
        "ios" => "ios",
        "aix" => "aix",
        other => other,
    }
}

/// Rust target architecture mapped to its GOARCH name.
pub fn host_goarch() -> &'static str {
    let little = cfg!(target_endian = "little");
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "arm" => "arm",
        "powerpc" => "ppc",
        "powerpc64" if little => "ppc64le",
        "powerpc64" => "ppc64",
        "mips" if little => "mipsle",
        "mips" => "mips",
        "mips64" if little => "mips64le",
        "mips64" => "mips64",
        "riscv64" => "riscv64",
        "s390x" => "s390x",
        "sparc64" => "sparc64",
        "loongarch64" => "loong64",
        "wasm32" => "wasm",
        other => other,
    }
}

/// Tags mentioned while evaluating one file's constraints: `true` for a
/// positive mention, `false` for a negated one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagSet(FxHashMap<String, bool>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mention; a positive mention wins over a negated one.
    pub fn record(&mut self, tag: &str, positive: bool) {
        let entry = self.0.entry(tag.to_string()).or_insert(positive);
        *entry |= positive;
    }

    pub fn get(&self, tag: &str) -> Option<bool> {
        self.0.get(tag).copied()
    }

    /// Whether `tag` was mentioned positively.
    pub fn is_positive(&self, tag: &str) -> bool {
        self.get(tag) == Some(true)
    }

    pub fn merge(&mut self, other: &TagSet) {
        for (tag, positive) in &other.0 {
            self.record(tag, *positive);
        }
    }

    /// Mentions sorted by tag.
    pub fn sorted(&self) -> Vec<(&str, bool)> {
        let mut list: Vec<_> = self.0.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        list.sort_unstable();
        list
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_sizes() {
        assert_eq!(Platform::new("linux", "386").word_size, 4);
        assert_eq!(Platform::new("linux", "arm").max_align, 4);
        assert_eq!(Platform::new("linux", "amd64").word_size, 8);
        assert_eq!(Platform::new("darwin", "arm64").word_size, 8);
    }

    #[test]
    fn test_matches_tag() {
        let p = Platform::new("android", "arm64").with_cgo(false);
        assert!(p.matches_tag("android"));
        assert!(p.matches_tag("linux"));
        assert!(p.matches_tag("unix"));
        assert!(p.matches_tag("gc"));
        assert!(p.matches_tag("go1.18"));
        assert!(!p.matches_tag("cgo"));
        assert!(!p.matches_tag("windows"));
        assert!(!Platform::new("windows", "amd64").matches_tag("unix"));
    }

    #[test]
    fn test_user_build_tags() {
        let p = Platform::new("linux", "amd64").with_build_tags(vec!["integration".into()]);
        assert!(p.matches_tag("integration"));
        assert!(!p.matches_tag("ignore"));
    }

    #[test]
    fn test_tag_set_positive_wins() {
        let mut tags = TagSet::new();
        tags.record("linux", false);
        tags.record("linux", true);
        tags.record("linux", false);
        assert_eq!(tags.get("linux"), Some(true));
        assert_eq!(tags.get("darwin"), None);
    }

    #[test]
    fn test_host_names_are_known() {
        let host = Platform::host();
        assert!(!host.goos.is_empty());
        assert!(!host.goarch.is_empty());
    }
}
