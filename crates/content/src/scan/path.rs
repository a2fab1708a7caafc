//! Path and extension helpers shared by the scanner and the loaders.

use std::path::Path;

/// Extension claimed by JSON loaders unless they override it.
pub const JSON_EXTENSION: &str = "json";

/// Strips any leading dots so `".png"` and `"png"` name the same bucket.
pub fn normalize_extension(extension: &str) -> &str {
    extension.trim_start_matches('.')
}

/// Splits `name` at its final dot.
///
/// Follows `Path::extension`: a leading dot belongs to the stem, so
/// `.hidden` has no extension.
fn split_suffix(name: &str) -> Option<(&str, &str)> {
    let idx = name.rfind('.')?;
    if idx == 0 {
        return None;
    }
    Some((&name[..idx], &name[idx + 1..]))
}

/// Returns the primary and secondary extension of a file name.
///
/// `"a.weapon.json"` gives `("json", Some("weapon"))`, `"a.png"` gives
/// `("png", None)` and a name without any dot gives `("", None)`.
///
/// Any two-dot name yields a secondary extension, whether or not a JSON
/// loader claims it.
pub fn split_extensions(file_name: &str) -> (&str, Option<&str>) {
    match split_suffix(file_name) {
        None => ("", None),
        Some((stem, primary)) => {
            let secondary = split_suffix(stem)
                .map(|(_, ext)| ext)
                .filter(|ext| !ext.is_empty());
            (primary, secondary)
        }
    }
}

/// Formats `path` relative to `root` with `/` separators and no leading or
/// trailing separator.
///
/// Paths outside `root` are returned whole, still `/`-separated.
pub fn local_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    joined.trim_matches('/').to_string()
}

/// Removes the final `.extension` from a `/`-separated relative path.
pub fn strip_extension<'a>(relative: &'a str, extension: &str) -> &'a str {
    if extension.is_empty() {
        return relative.strip_suffix('.').unwrap_or(relative);
    }
    relative
        .strip_suffix(extension)
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_split_plain_and_json_names() {
        assert_eq!(split_extensions("a.png"), ("png", None));
        assert_eq!(split_extensions("a.weapon.json"), ("json", Some("weapon")));
        assert_eq!(split_extensions("archive.tar.gz"), ("gz", Some("tar")));
    }

    #[test]
    fn test_split_names_without_extension() {
        assert_eq!(split_extensions("README"), ("", None));
        assert_eq!(split_extensions(".hidden"), ("", None));
        assert_eq!(split_extensions(".hidden.json"), ("json", None));
        assert_eq!(split_extensions("trailing."), ("", None));
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".png"), "png");
        assert_eq!(normalize_extension("png"), "png");
    }

    #[test]
    fn test_local_path_uses_forward_slashes() {
        let root = PathBuf::from("/data");
        let path = root.join("maps").join("cave.ron");
        assert_eq!(local_path(&root, &path), "maps/cave.ron");
    }

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("maps/foo.dat", "dat"), "maps/foo");
        assert_eq!(strip_extension("foo.cfg.json", "json"), "foo.cfg");
        assert_eq!(strip_extension("README", ""), "README");
    }
}
