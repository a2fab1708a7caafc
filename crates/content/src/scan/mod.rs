//! Data root classification.
//!
//! The scanner walks the data root one entry per [`FileScanner::step`] and
//! builds an [`ExtensionIndex`]: every regular file lands in exactly one
//! primary-extension bucket, files with a two-dot name additionally land in
//! one (primary, secondary) bucket, and module files are tracked separately.
//! File contents are never read here.

pub mod path;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ScanError;

pub use path::{JSON_EXTENSION, local_path, normalize_extension, split_extensions};

/// A regular file located under the data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Position in scan order.
    pub index: usize,
    /// Absolute (root-joined) path.
    pub path: PathBuf,
    /// Path relative to the data root, `/`-separated.
    pub relative: String,
    /// Final dot-suffix, without the dot. Empty when the name has none.
    pub extension: String,
    /// Dot-suffix of the remaining stem, for `name.secondary.ext` files.
    pub json_extension: Option<String>,
    /// Size in bytes at scan time.
    pub size: u64,
    /// Whether the file was reached through a symbolic link.
    pub symlink: bool,
}

impl FileRecord {
    /// Builds a record for `path`, classifying it by name.
    pub fn new(index: usize, root: &Path, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let relative = local_path(root, &path);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (extension, json_extension) = split_extensions(&file_name);

        Self {
            index,
            extension: extension.to_string(),
            json_extension: json_extension.map(str::to_string),
            relative,
            path,
            size: 0,
            symlink: false,
        }
    }

    /// Key under which objects loaded from this file are stored: the
    /// relative path with its final extension removed.
    pub fn key(&self) -> &str {
        path::strip_extension(&self.relative, &self.extension)
    }
}

/// Files of the data root grouped by extension.
#[derive(Debug, Default, Clone)]
pub struct ExtensionIndex {
    root: PathBuf,
    module_extension: String,
    files: Vec<Arc<FileRecord>>,
    extensions: HashMap<String, Vec<Arc<FileRecord>>>,
    json_extensions: HashMap<String, HashMap<String, Vec<Arc<FileRecord>>>>,
    modules: Vec<Arc<FileRecord>>,
}

impl ExtensionIndex {
    /// Creates an empty index for `root`.
    pub fn new(root: impl Into<PathBuf>, module_extension: &str) -> Self {
        Self {
            root: root.into(),
            module_extension: normalize_extension(module_extension).to_string(),
            ..Self::default()
        }
    }

    /// Adds a record to the full list and to each bucket it belongs to.
    pub fn insert(&mut self, record: FileRecord) -> Arc<FileRecord> {
        let record = Arc::new(record);

        self.files.push(Arc::clone(&record));
        self.extensions
            .entry(record.extension.clone())
            .or_default()
            .push(Arc::clone(&record));

        if let Some(json_extension) = &record.json_extension {
            self.json_extensions
                .entry(record.extension.clone())
                .or_default()
                .entry(json_extension.clone())
                .or_default()
                .push(Arc::clone(&record));
        }

        if !self.module_extension.is_empty() && record.extension == self.module_extension {
            self.modules.push(Arc::clone(&record));
        }

        record
    }

    /// Data root the index was built from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every located file, in scan order.
    pub fn files(&self) -> &[Arc<FileRecord>] {
        &self.files
    }

    /// Files whose primary extension is `extension`, in scan order.
    pub fn bucket(&self, extension: &str) -> &[Arc<FileRecord>] {
        self.extensions
            .get(normalize_extension(extension))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Files named `*.json_extension.extension`, in scan order.
    pub fn json_bucket(&self, extension: &str, json_extension: &str) -> &[Arc<FileRecord>] {
        self.json_extensions
            .get(normalize_extension(extension))
            .and_then(|inner| inner.get(normalize_extension(json_extension)))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Files merged from several primary buckets, in scan order.
    pub fn merged_bucket<'a>(
        &self,
        extensions: impl IntoIterator<Item = &'a str>,
    ) -> Vec<Arc<FileRecord>> {
        let mut seen = Vec::new();
        let mut files: Vec<Arc<FileRecord>> = Vec::new();
        for extension in extensions {
            let extension = normalize_extension(extension);
            if seen.contains(&extension) {
                continue;
            }
            seen.push(extension);
            files.extend(self.bucket(extension).iter().cloned());
        }
        files.sort_by_key(|f| f.index);
        files
    }

    /// Module files, in scan order.
    pub fn modules(&self) -> &[Arc<FileRecord>] {
        &self.modules
    }

    /// Primary extensions present in the index.
    pub fn extensions(&self) -> impl Iterator<Item = &str> + '_ {
        self.extensions.keys().map(String::as_str)
    }

    /// `(primary, secondary)` pairs present in the index.
    pub fn json_extensions(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.json_extensions.iter().flat_map(|(primary, inner)| {
            inner
                .keys()
                .map(move |secondary| (primary.as_str(), secondary.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Options controlling a scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub follow_links: bool,
    pub module_extension: String,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            follow_links: false,
            module_extension: std::env::consts::DLL_EXTENSION.to_string(),
        }
    }
}

/// Outcome of a single scanner step.
#[derive(Debug, Clone)]
pub enum ScanStep {
    /// A regular file was classified.
    Located(Arc<FileRecord>),
    /// A directory, link or unreadable entry was passed over.
    Skipped,
    /// The walk is complete.
    Done,
}

/// Cooperative, resumable walk of the data root.
pub struct FileScanner {
    root: PathBuf,
    walker: Option<walkdir::IntoIter>,
    index: ExtensionIndex,
}

impl FileScanner {
    /// Prepares a scan of `root`, creating the directory when it is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] when the root cannot be created, is not a
    /// directory, or cannot be inspected.
    pub fn new(root: impl Into<PathBuf>, options: &ScanOptions) -> Result<Self, ScanError> {
        let root = root.into();

        match std::fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(ScanError::NotADirectory(root)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Data root {} could not be located, creating a new one",
                    root.display()
                );
                std::fs::create_dir_all(&root).map_err(|source| ScanError::CreateRoot {
                    path: root.clone(),
                    source,
                })?;
            }
            Err(source) => return Err(ScanError::Io { path: root, source }),
        }

        let walker = WalkDir::new(&root)
            .follow_links(options.follow_links)
            .sort_by_file_name()
            .into_iter();

        Ok(Self {
            index: ExtensionIndex::new(&root, &options.module_extension),
            root,
            walker: Some(walker),
        })
    }

    /// Scans `root` to completion.
    pub fn scan(
        root: impl Into<PathBuf>,
        options: &ScanOptions,
    ) -> Result<ExtensionIndex, ScanError> {
        let mut scanner = Self::new(root, options)?;
        while !matches!(scanner.step()?, ScanStep::Done) {}
        Ok(scanner.finish())
    }

    /// Visits the next directory entry.
    ///
    /// # Errors
    ///
    /// Only a failure to read the root itself is returned. Errors on entries
    /// below the root are logged and the entry is skipped.
    pub fn step(&mut self) -> Result<ScanStep, ScanError> {
        let Some(walker) = self.walker.as_mut() else {
            return Ok(ScanStep::Done);
        };

        let entry = match walker.next() {
            None => {
                self.walker = None;
                return Ok(ScanStep::Done);
            }
            Some(Ok(entry)) => entry,
            Some(Err(e)) if e.depth() == 0 => {
                self.walker = None;
                return Err(ScanError::Io {
                    path: self.root.clone(),
                    source: e.into(),
                });
            }
            Some(Err(e)) => {
                warn!("Skipping unreadable entry under {}: {}", self.root.display(), e);
                return Ok(ScanStep::Skipped);
            }
        };

        if !entry.file_type().is_file() {
            return Ok(ScanStep::Skipped);
        }

        let mut record = FileRecord::new(self.index.len(), &self.root, entry.path());
        record.symlink = entry.path_is_symlink();
        record.size = entry.metadata().map(|m| m.len()).unwrap_or(0);

        debug!("Located {}", record.path.display());
        Ok(ScanStep::Located(self.index.insert(record)))
    }

    /// Number of files located so far.
    pub fn located(&self) -> usize {
        self.index.len()
    }

    pub fn is_done(&self) -> bool {
        self.walker.is_none()
    }

    /// Consumes the scanner, returning the index built so far.
    pub fn finish(self) -> ExtensionIndex {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn options() -> ScanOptions {
        ScanOptions {
            follow_links: false,
            module_extension: "so".to_string(),
        }
    }

    #[test]
    fn test_missing_root_is_created_and_empty() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("GameData");

        let index = FileScanner::scan(&root, &options()).unwrap();

        assert!(root.is_dir());
        assert!(index.is_empty());
        assert!(index.modules().is_empty());
    }

    #[test]
    fn test_root_that_is_a_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("not_a_dir");
        fs::write(&root, b"").unwrap();

        let err = FileScanner::new(&root, &options()).err().unwrap();
        assert!(matches!(err, ScanError::NotADirectory(_)));
    }

    #[test]
    fn test_buckets_cover_every_file_once() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in [
            "a.png",
            "b.png",
            "icons/c.jpg",
            "weapons/sword.weapon.json",
            "plain.json",
            "README",
            "mods/extra.so",
        ] {
            touch(root, name);
        }

        let index = FileScanner::scan(root, &options()).unwrap();
        assert_eq!(index.len(), 7);

        let mut union = HashSet::new();
        let mut bucketed = 0;
        for extension in index.extensions() {
            for file in index.bucket(extension) {
                assert!(union.insert(file.path.clone()), "duplicate {:?}", file.path);
                bucketed += 1;
            }
        }
        let all: HashSet<_> = index.files().iter().map(|f| f.path.clone()).collect();
        assert_eq!(union, all);
        assert_eq!(bucketed, index.len());
    }

    #[test]
    fn test_json_style_file_lands_in_secondary_bucket() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "a.weapon.json");
        touch(temp_dir.path(), "a.png");

        let index = FileScanner::scan(temp_dir.path(), &options()).unwrap();

        let json = index.json_bucket(".json", ".weapon");
        assert_eq!(json.len(), 1);
        assert_eq!(json[0].relative, "a.weapon.json");
        assert_eq!(json[0].key(), "a.weapon");

        let png = index.bucket("png");
        assert_eq!(png.len(), 1);
        assert_eq!(png[0].json_extension, None);
        assert_eq!(index.json_extensions().count(), 1);
    }

    #[test]
    fn test_module_files_are_tracked() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "mods/one.so");
        touch(temp_dir.path(), "mods/two.so");
        touch(temp_dir.path(), "texture.png");

        let index = FileScanner::scan(temp_dir.path(), &options()).unwrap();

        let modules: Vec<_> = index.modules().iter().map(|m| m.relative.as_str()).collect();
        assert_eq!(modules, vec!["mods/one.so", "mods/two.so"]);
        assert_eq!(index.bucket("so").len(), 2);
    }

    #[test]
    fn test_scan_order_is_sorted_and_indexed() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["c.txt", "a.txt", "b/z.txt", "b/a.txt"] {
            touch(temp_dir.path(), name);
        }

        let index = FileScanner::scan(temp_dir.path(), &options()).unwrap();

        let order: Vec<_> = index.files().iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(order, vec!["a.txt", "b/a.txt", "b/z.txt", "c.txt"]);
        for (i, file) in index.files().iter().enumerate() {
            assert_eq!(file.index, i);
        }
    }

    #[test]
    fn test_step_yields_one_entry_at_a_time() {
        let temp_dir = TempDir::new().unwrap();
        touch(temp_dir.path(), "one.txt");
        touch(temp_dir.path(), "two.txt");

        let mut scanner = FileScanner::new(temp_dir.path(), &options()).unwrap();
        let mut located = 0;
        loop {
            match scanner.step().unwrap() {
                ScanStep::Located(_) => {
                    located += 1;
                    assert_eq!(scanner.located(), located);
                }
                ScanStep::Skipped => {}
                ScanStep::Done => break,
            }
        }
        assert_eq!(located, 2);
        assert!(scanner.is_done());
        assert!(matches!(scanner.step().unwrap(), ScanStep::Done));
    }

    #[test]
    fn test_merged_bucket_keeps_scan_order() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["a.png", "b.jpg", "c.png"] {
            touch(temp_dir.path(), name);
        }

        let index = FileScanner::scan(temp_dir.path(), &options()).unwrap();
        let merged = index.merged_bucket(["png", ".jpg", "png"]);

        let names: Vec<_> = merged.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.jpg", "c.png"]);
    }
}
