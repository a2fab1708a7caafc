//! Result set for loaders whose files hold arrays of objects.

use std::collections::HashMap;
use std::ops::{Index, Range};

use crate::error::ResultSetError;

/// Objects loaded by a JSON loader.
///
/// One file may hold any number of objects. They are flattened into a single
/// load-ordered sequence, and each path key maps to the contiguous run of
/// objects that came from its file.
#[derive(Debug, Clone)]
pub struct JsonResultSet<T> {
    objects: Box<[T]>,
    files: HashMap<String, Range<usize>>,
}

impl<T> JsonResultSet<T> {
    /// Seals `objects` and their `(path, range)` map.
    ///
    /// # Panics
    ///
    /// Panics unless the ranges tile `objects` exactly: no gaps, no
    /// overlaps, nothing past the end.
    pub(crate) fn new(objects: Vec<T>, files: HashMap<String, Range<usize>>) -> Self {
        let mut ranges: Vec<&Range<usize>> = files.values().collect();
        ranges.sort_by_key(|r| (r.start, r.end));
        let mut end = 0;
        for range in ranges {
            assert!(
                range.start == end && range.start <= range.end,
                "file map must cover each loaded object exactly once"
            );
            end = range.end;
        }
        assert!(
            end == objects.len(),
            "file map must cover each loaded object exactly once"
        );

        let mut files = files;
        files.shrink_to_fit();
        Self {
            objects: objects.into_boxed_slice(),
            files,
        }
    }

    /// Builds a set from `(path, objects)` pairs in load order.
    ///
    /// # Errors
    ///
    /// Returns [`ResultSetError::DuplicatePath`] when a path repeats.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, Vec<T>)>,
    ) -> Result<Self, ResultSetError> {
        let mut objects = Vec::new();
        let mut files = HashMap::new();
        for (path, batch) in entries {
            if files.contains_key(&path) {
                return Err(ResultSetError::DuplicatePath(path));
            }
            let start = objects.len();
            objects.extend(batch);
            files.insert(path, start..objects.len());
        }
        Ok(Self::new(objects, files))
    }

    /// Total number of objects across all files.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of files that contributed to this set.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.objects.get(index)
    }

    /// Objects loaded from `path`, or `None`.
    pub fn get_path(&self, path: &str) -> Option<&[T]> {
        self.files.get(path).map(|r| &self.objects[r.clone()])
    }

    /// Objects loaded from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ResultSetError::KeyNotFound`] when nothing was loaded from
    /// `path`.
    pub fn by_path(&self, path: &str) -> Result<&[T], ResultSetError> {
        self.get_path(path)
            .ok_or_else(|| ResultSetError::KeyNotFound(path.to_string()))
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.files.keys().map(String::as_str)
    }

    pub fn find_index(&self, predicate: impl FnMut(&T) -> bool) -> Option<usize> {
        self.objects.iter().position(predicate)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.objects.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.objects
    }
}

impl<T: PartialEq> JsonResultSet<T> {
    pub fn contains(&self, item: &T) -> bool {
        self.objects.contains(item)
    }

    pub fn position(&self, item: &T) -> Option<usize> {
        self.objects.iter().position(|o| o == item)
    }
}

impl<T> Index<usize> for JsonResultSet<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.objects[index]
    }
}

impl<T> Index<&str> for JsonResultSet<T> {
    type Output = [T];

    fn index(&self, path: &str) -> &[T] {
        match self.get_path(path) {
            Some(objects) => objects,
            None => panic!("{}", ResultSetError::KeyNotFound(path.to_string())),
        }
    }
}

impl<'a, T> IntoIterator for &'a JsonResultSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
