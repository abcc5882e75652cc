//! Shared position table.
//!
//! Every file parsed during a run is registered here and receives a disjoint
//! range of [`Pos`] values. Positions from different files are therefore
//! globally comparable, which keeps diagnostic ordering stable no matter
//! which parse task finished first.
//!
//! The table is append-only. Registration takes a short write lock; once a
//! file is registered its region and line table never change, so lookups
//! only need a read lock and never wait on a parse in progress.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;

/// A compact source position. `Pos::NONE` means "no position".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pos(pub(crate) u32);

impl Pos {
    /// The zero position, attached to synthesized nodes.
    pub const NONE: Pos = Pos(0);

    /// Whether this position refers to a real location.
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Raw value (for sorting and tests).
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Position `n` bytes further into the same file.
    pub fn offset_by(self, n: usize) -> Pos {
        if self.is_valid() {
            Pos(self.0 + n as u32)
        } else {
            self
        }
    }
}

/// A resolved, human-readable position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
pub struct Position {
    /// File name as registered.
    pub filename: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based byte column.
    pub column: u32,
    /// 0-based byte offset.
    pub offset: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filename.is_empty() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "{}:{}:{}", self.filename, self.line, self.column)
        }
    }
}

/// One registered file: its name, contents, base position and line starts.
#[derive(Debug)]
pub struct SourceFile {
    name: String,
    base: u32,
    source: Arc<str>,
    lines: Vec<u32>,
    invalid_utf8: Vec<Range<usize>>,
}

impl SourceFile {
    fn new(name: String, base: u32, source: Arc<str>, invalid_utf8: Vec<Range<usize>>) -> Self {
        let mut lines = vec![0u32];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                lines.push(i as u32 + 1);
            }
        }
        SourceFile {
            name,
            base,
            source,
            lines,
            invalid_utf8,
        }
    }

    /// Registered file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File contents.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Byte ranges that held invalid UTF-8 on disk. They read as NUL bytes
    /// in [`source`](Self::source).
    pub fn invalid_utf8(&self) -> &[Range<usize>] {
        &self.invalid_utf8
    }

    /// Shared handle to the contents.
    pub fn source_arc(&self) -> Arc<str> {
        Arc::clone(&self.source)
    }

    /// First position belonging to this file.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.source.len()
    }

    /// Position of the byte at `offset`. Offsets past the end clamp to EOF.
    pub fn pos(&self, offset: usize) -> Pos {
        let offset = offset.min(self.size());
        Pos(self.base + offset as u32)
    }

    /// Byte offset of `pos` within this file.
    pub fn offset(&self, pos: Pos) -> usize {
        (pos.0.saturating_sub(self.base) as usize).min(self.size())
    }

    /// Whether `pos` falls inside this file (EOF position included).
    pub fn contains(&self, pos: Pos) -> bool {
        pos.0 >= self.base && pos.0 <= self.base + self.size() as u32
    }

    /// Resolve `pos` to line and column.
    pub fn position(&self, pos: Pos) -> Position {
        let offset = self.offset(pos);
        let line_idx = match self.lines.binary_search(&(offset as u32)) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let line_start = self.lines[line_idx] as usize;
        Position {
            filename: self.name.clone(),
            line: line_idx as u32 + 1,
            column: (offset - line_start) as u32 + 1,
            offset,
        }
    }

    /// 1-based line number of `pos`.
    pub fn line(&self, pos: Pos) -> u32 {
        self.position(pos).line
    }
}

struct Inner {
    next_base: u32,
    files: Vec<Arc<SourceFile>>,
}

/// Append-only registry of source files for one run.
pub struct FileSet {
    inner: RwLock<Inner>,
}

impl Default for FileSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FileSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSet")
            .field("files", &self.inner.read().files.len())
            .finish()
    }
}

impl FileSet {
    /// Create an empty file set. Bases start at 1 so that 0 stays `Pos::NONE`.
    pub fn new() -> Self {
        FileSet {
            inner: RwLock::new(Inner {
                next_base: 1,
                files: Vec::new(),
            }),
        }
    }

    /// Register a file and return its handle.
    ///
    /// Safe to call from several parse tasks at once.
    pub fn add_file(&self, name: impl Into<String>, source: Arc<str>) -> Arc<SourceFile> {
        self.register(name.into(), source, Vec::new())
    }

    /// Register raw file contents. Invalid UTF-8 is kept in place so the
    /// lexer can report it at its position.
    pub fn add_file_bytes(&self, name: impl Into<String>, bytes: Vec<u8>) -> Arc<SourceFile> {
        let (source, invalid) = decode_source(bytes);
        self.register(name.into(), Arc::from(source), invalid)
    }

    fn register(
        &self,
        name: String,
        source: Arc<str>,
        invalid_utf8: Vec<Range<usize>>,
    ) -> Arc<SourceFile> {
        let mut inner = self.inner.write();
        let base = inner.next_base;
        let file = Arc::new(SourceFile::new(name, base, source, invalid_utf8));
        // One extra slot so the EOF position of a file never aliases the
        // first position of the next one.
        inner.next_base = base + file.size() as u32 + 1;
        inner.files.push(Arc::clone(&file));
        file
    }

    /// The file containing `pos`, if any.
    pub fn file(&self, pos: Pos) -> Option<Arc<SourceFile>> {
        if !pos.is_valid() {
            return None;
        }
        let inner = self.inner.read();
        // Files are pushed in base order, so a binary search by base works
        // even though registration order across tasks is arbitrary.
        let idx = match inner.files.binary_search_by_key(&pos.0, |f| f.base) {
            Ok(i) => i,
            Err(0) => return None,
            Err(i) => i - 1,
        };
        let file = &inner.files[idx];
        file.contains(pos).then(|| Arc::clone(file))
    }

    /// Resolve `pos`; invalid positions resolve to an empty filename at 0:0.
    pub fn position(&self, pos: Pos) -> Position {
        match self.file(pos) {
            Some(file) => file.position(pos),
            None => Position {
                filename: String::new(),
                line: 0,
                column: 0,
                offset: 0,
            },
        }
    }

    /// Snapshot of all registered files in base order.
    pub fn files(&self) -> Vec<Arc<SourceFile>> {
        self.inner.read().files.clone()
    }

    /// Number of registered files.
    pub fn len(&self) -> usize {
        self.inner.read().files.len()
    }

    /// Whether nothing has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode file contents, replacing each invalid UTF-8 sequence with as many
/// NUL bytes so offsets and columns still match the file. Returns the text
/// and the replaced ranges.
pub fn decode_source(bytes: Vec<u8>) -> (String, Vec<Range<usize>>) {
    let mut bytes = match String::from_utf8(bytes) {
        Ok(text) => return (text, Vec::new()),
        Err(err) => err.into_bytes(),
    };
    let mut invalid = Vec::new();
    let mut start = 0;
    loop {
        let err = match std::str::from_utf8(&bytes[start..]) {
            Ok(_) => break,
            Err(err) => err,
        };
        let at = start + err.valid_up_to();
        let end = at + err.error_len().unwrap_or(bytes.len() - at);
        bytes[at..end].fill(0);
        invalid.push(at..end);
        start = end;
    }
    (String::from_utf8_lossy(&bytes).into_owned(), invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_are_disjoint_across_files() {
        let fset = FileSet::new();
        let a = fset.add_file("a.go", Arc::from("package a\n"));
        let b = fset.add_file("b.go", Arc::from("package b\n"));

        assert!(a.pos(a.size()) < b.pos(0));
        assert_eq!(fset.file(b.pos(3)).unwrap().name(), "b.go");
        assert_eq!(fset.file(a.pos(a.size())).unwrap().name(), "a.go");
    }

    #[test]
    fn test_invalid_utf8_keeps_offsets() {
        let fset = FileSet::new();
        let bytes = b"package p\nvar s = \"\xff\xfe\"\nvar t = 1\n".to_vec();
        let f = fset.add_file_bytes("a.go", bytes);
        assert_eq!(f.invalid_utf8(), &[19..20, 20..21]);
        assert_eq!(f.size(), 33);
        assert_eq!(&f.source()[27..30], "t =");
        assert!(fset.add_file_bytes("b.go", b"package p\n".to_vec()).invalid_utf8().is_empty());
    }

    #[test]
    fn test_line_and_column() {
        let fset = FileSet::new();
        let f = fset.add_file("x.go", Arc::from("package x\n\nvar y = 1\n"));
        let pos = f.pos(15);
        let p = fset.position(pos);
        assert_eq!(p.line, 3);
        assert_eq!(p.column, 5);
        assert_eq!(p.to_string(), "x.go:3:5");
    }

    #[test]
    fn test_no_pos_resolves_to_nothing() {
        let fset = FileSet::new();
        fset.add_file("x.go", Arc::from("package x"));
        assert!(fset.file(Pos::NONE).is_none());
        assert_eq!(fset.position(Pos::NONE).line, 0);
    }

    #[test]
    fn test_concurrent_registration() {
        let fset = FileSet::new();
        crossbeam::thread::scope(|s| {
            for i in 0..8 {
                let fset = &fset;
                s.spawn(move |_| {
                    fset.add_file(format!("f{i}.go"), Arc::from("package p\n"));
                });
            }
        })
        .unwrap();

        let files = fset.files();
        assert_eq!(files.len(), 8);
        for pair in files.windows(2) {
            assert!(pair[0].base() + (pair[0].size() as u32) < pair[1].base());
        }
    }
}
