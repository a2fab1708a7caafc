//! RON documents.

use crate::error::RegistrationError;
use crate::loaders::{LoadResult, Loader};
use crate::registry::{LoaderRegistration, Registrar};
use crate::scan::FileRecord;

use super::utf8;

/// Loads each `*.ron` file as an untyped [`ron::Value`].
#[derive(Debug, Default)]
pub struct RonLoader;

impl Loader for RonLoader {
    type Object = ron::Value;

    fn name(&self) -> &str {
        "RonLoader"
    }

    fn extension(&self) -> &str {
        "ron"
    }

    fn load_object(&self, file: &FileRecord, data: &[u8]) -> LoadResult<ron::Value> {
        let text = utf8(file, data)?;
        ron::from_str(text).map_err(|e| anyhow::anyhow!("Failed to parse RON: {}", e))
    }
}

fn register(registrar: &mut Registrar<'_>) -> Result<(), RegistrationError> {
    registrar.loader::<RonLoader>()
}

inventory::submit! {
    LoaderRegistration::new("ron", register)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_parses_ron_value() {
        let root = Path::new("/data");
        let file = FileRecord::new(0, root, root.join("npc/goblin.ron"));

        let value = RonLoader
            .load_object(&file, b"(name: \"goblin\", hp: 7)")
            .unwrap();
        assert!(matches!(value, ron::Value::Map(_)));

        assert!(RonLoader.load_object(&file, b"(name: ").is_err());
    }
}
