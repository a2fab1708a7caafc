//! TOML tables.

use crate::error::RegistrationError;
use crate::loaders::{LoadResult, Loader};
use crate::registry::{LoaderRegistration, Registrar};
use crate::scan::FileRecord;

use super::utf8;

/// Loads each `*.toml` file as a [`toml::Table`].
#[derive(Debug, Default)]
pub struct TableLoader;

impl Loader for TableLoader {
    type Object = toml::Table;

    fn name(&self) -> &str {
        "TableLoader"
    }

    fn extension(&self) -> &str {
        "toml"
    }

    fn load_object(&self, file: &FileRecord, data: &[u8]) -> LoadResult<toml::Table> {
        let text = utf8(file, data)?;
        toml::from_str(text).map_err(|e| anyhow::anyhow!("Failed to parse table TOML: {}", e))
    }
}

fn register(registrar: &mut Registrar<'_>) -> Result<(), RegistrationError> {
    registrar.loader::<TableLoader>()
}

inventory::submit! {
    LoaderRegistration::new("table", register)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn record(relative: &str) -> FileRecord {
        let root = Path::new("/data");
        FileRecord::new(0, root, root.join(relative))
    }

    #[test]
    fn test_parses_table() {
        let table = TableLoader
            .load_object(&record("rules.toml"), b"turns = 3\n[combat]\ncrit = 1.5\n")
            .unwrap();
        assert_eq!(table["turns"].as_integer(), Some(3));
        assert_eq!(table["combat"]["crit"].as_float(), Some(1.5));
    }

    #[test]
    fn test_rejects_invalid_toml() {
        let err = TableLoader
            .load_object(&record("rules.toml"), b"turns = = 3")
            .unwrap_err();
        assert!(err.to_string().contains("Failed to parse table TOML"));
    }
}
