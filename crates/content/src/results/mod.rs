//! Sealed, read-only outputs of completed loader runs.
//!
//! A result set is built once from the working buffers of a loader and then
//! never mutated, so any number of readers can share it without locking.

mod json;

use std::collections::HashMap;
use std::ops::Index;

use crate::error::ResultSetError;

pub use json::JsonResultSet;

/// Objects loaded by a plain loader, one per source file.
///
/// Objects are kept in load order and indexed by the file's path key (its
/// path relative to the data root, final extension removed).
#[derive(Debug, Clone)]
pub struct ResultSet<T> {
    objects: Box<[T]>,
    paths: HashMap<String, usize>,
}

impl<T> ResultSet<T> {
    /// Seals `objects` and their `(path, position)` map.
    ///
    /// Both buffers are moved in and shrunk; the caller keeps no alias to
    /// the sealed data.
    ///
    /// # Panics
    ///
    /// Panics unless every position in `objects` has exactly one path.
    pub(crate) fn new(objects: Vec<T>, paths: HashMap<String, usize>) -> Self {
        let mut covered = vec![false; objects.len()];
        for &i in paths.values() {
            assert!(
                i < objects.len() && !std::mem::replace(&mut covered[i], true),
                "path map must name each loaded object exactly once"
            );
        }
        assert!(
            covered.iter().all(|&c| c),
            "path map must name each loaded object exactly once"
        );

        let mut paths = paths;
        paths.shrink_to_fit();
        Self {
            objects: objects.into_boxed_slice(),
            paths,
        }
    }

    /// Builds a set from `(path, object)` pairs in load order.
    ///
    /// # Errors
    ///
    /// Returns [`ResultSetError::DuplicatePath`] when a path repeats.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, T)>,
    ) -> Result<Self, ResultSetError> {
        let mut objects = Vec::new();
        let mut paths = HashMap::new();
        for (path, object) in entries {
            if paths.contains_key(&path) {
                return Err(ResultSetError::DuplicatePath(path));
            }
            paths.insert(path, objects.len());
            objects.push(object);
        }
        Ok(Self::new(objects, paths))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Object at position `index` in load order.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.objects.get(index)
    }

    /// Object loaded from `path`, or `None`.
    pub fn get_path(&self, path: &str) -> Option<&T> {
        self.paths.get(path).map(|&i| &self.objects[i])
    }

    /// Object loaded from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ResultSetError::KeyNotFound`] when nothing was loaded from
    /// `path`.
    pub fn by_path(&self, path: &str) -> Result<&T, ResultSetError> {
        self.get_path(path)
            .ok_or_else(|| ResultSetError::KeyNotFound(path.to_string()))
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    /// Path keys of every loaded object, in no particular order.
    pub fn paths(&self) -> impl Iterator<Item = &str> + '_ {
        self.paths.keys().map(String::as_str)
    }

    /// Position of the first object matching `predicate`.
    pub fn find_index(&self, predicate: impl FnMut(&T) -> bool) -> Option<usize> {
        self.objects.iter().position(predicate)
    }

    /// Iterates objects in load order. Each call starts from the beginning.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.objects.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.objects
    }
}

impl<T: PartialEq> ResultSet<T> {
    pub fn contains(&self, item: &T) -> bool {
        self.objects.contains(item)
    }

    /// Position of the first object equal to `item`.
    pub fn position(&self, item: &T) -> Option<usize> {
        self.objects.iter().position(|o| o == item)
    }
}

impl<T> Index<usize> for ResultSet<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.objects[index]
    }
}

impl<T> Index<&str> for ResultSet<T> {
    type Output = T;

    /// # Panics
    ///
    /// Panics when nothing was loaded from `path`; use
    /// [`ResultSet::get_path`] for a fallible lookup.
    fn index(&self, path: &str) -> &T {
        match self.get_path(path) {
            Some(object) => object,
            None => panic!("{}", ResultSetError::KeyNotFound(path.to_string())),
        }
    }
}

impl<'a, T> IntoIterator for &'a ResultSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
