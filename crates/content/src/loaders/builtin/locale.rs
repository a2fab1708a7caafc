//! Localization tables, `*.locale.json`.

use std::collections::HashSet;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::error::RegistrationError;
use crate::loaders::{JsonLoader, LoadContext, LoadResult};
use crate::registry::{LoaderRegistration, Registrar};
use crate::scan::FileRecord;

/// One localized string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleEntry {
    pub key: String,
    pub text: String,
}

/// Loads `*.locale.json` arrays of [`LocaleEntry`].
#[derive(Debug, Default)]
pub struct LocaleLoader;

impl JsonLoader for LocaleLoader {
    type Object = LocaleEntry;

    fn name(&self) -> &str {
        "LocaleLoader"
    }

    fn json_extension(&self) -> &str {
        "locale"
    }

    fn resolve(
        &self,
        file: &FileRecord,
        entries: Vec<LocaleEntry>,
        _ctx: &LoadContext<'_>,
    ) -> LoadResult<Vec<LocaleEntry>> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if entry.key.is_empty() {
                bail!("{} has an entry with an empty key", file.relative);
            }
            if !seen.insert(entry.key.as_str()) {
                bail!("{} defines key `{}` twice", file.relative, entry.key);
            }
        }
        Ok(entries)
    }
}

fn register(registrar: &mut Registrar<'_>) -> Result<(), RegistrationError> {
    registrar.json_loader::<LocaleLoader>()
}

inventory::submit! {
    LoaderRegistration::new("locale", register)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parses_locale_array() {
        let root = Path::new("/data");
        let file = FileRecord::new(0, root, root.join("lang/en.locale.json"));

        let entries = LocaleLoader
            .parse(&file, br#"[{"key": "greet", "text": "Hello"}, {"key": "bye", "text": "Bye"}]"#)
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "Hello");

        assert!(LocaleLoader.parse(&file, br#"{"key": "greet"}"#).is_err());
    }
}
