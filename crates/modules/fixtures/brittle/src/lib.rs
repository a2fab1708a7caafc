//! Module with a loader that panics on some files.

use content_loader::{FileRecord, LoadResult, Loader, Registrar, RegistrationError};

content_loader::declare_module!("brittle", env!("CARGO_PKG_VERSION"), register);

pub fn register(registrar: &mut Registrar<'_>) -> Result<(), RegistrationError> {
    registrar.loader::<BrittleLoader>()
}

/// Loads `*.brittle` text files and panics on any starting with `crash`.
#[derive(Debug, Default)]
pub struct BrittleLoader;

impl Loader for BrittleLoader {
    type Object = String;

    fn name(&self) -> &str {
        "BrittleLoader"
    }

    fn extension(&self) -> &str {
        "brittle"
    }

    fn load_object(&self, file: &FileRecord, data: &[u8]) -> LoadResult<String> {
        let text = String::from_utf8_lossy(data).into_owned();
        if text.starts_with("crash") {
            panic!("{} cracked", file.relative);
        }
        Ok(text)
    }
}
