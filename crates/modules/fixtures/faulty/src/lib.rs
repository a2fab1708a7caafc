//! Module whose entry point panics after announcing a loader.
//!
//! Used to check that a registration panic stays inside the library and
//! that none of the module's loaders reach the registry.

use content_loader::{FileRecord, LoadResult, Loader, Registrar, RegistrationError};

content_loader::declare_module!("faulty", env!("CARGO_PKG_VERSION"), register);

pub fn register(registrar: &mut Registrar<'_>) -> Result<(), RegistrationError> {
    registrar.loader::<OrphanLoader>()?;
    panic!("faulty module refuses to finish registering")
}

#[derive(Debug, Default)]
pub struct OrphanLoader;

impl Loader for OrphanLoader {
    type Object = ();

    fn name(&self) -> &str {
        "OrphanLoader"
    }

    fn extension(&self) -> &str {
        "orphan"
    }

    fn load_object(&self, _: &FileRecord, _: &[u8]) -> LoadResult<()> {
        Ok(())
    }
}
