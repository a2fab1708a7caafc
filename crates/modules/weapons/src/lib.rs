//! Weapon definitions and lore, shipped as an external content module.
//!
//! Build as a `cdylib` and copy the library anywhere under the data root;
//! the host opens it during module loading and registers its loaders.
//!
//! - `*.weapon.json`: arrays of [`Weapon`]
//! - `*.lore`: plain text, first line is the title

use anyhow::{bail, ensure};
use serde::Deserialize;
use tracing::warn;

use content_loader::loaders::builtin::TextureLoader;
use content_loader::{
    FileRecord, JsonLoader, LoadContext, LoadResult, Loader, Registrar, RegistrationError,
};

content_loader::declare_module!("weapons", env!("CARGO_PKG_VERSION"), register);

/// Registration entry point of the module.
pub fn register(registrar: &mut Registrar<'_>) -> Result<(), RegistrationError> {
    registrar.json_loader::<WeaponLoader>()?;
    registrar.loader::<LoreLoader>()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Weapon {
    pub id: String,
    pub name: String,
    pub damage: u32,
    /// Texture path key, e.g. `icons/sword` for `icons/sword.png`.
    #[serde(default)]
    pub icon: Option<String>,
    /// Whether `icon` resolved to a loaded texture.
    #[serde(skip)]
    pub icon_resolved: bool,
}

#[derive(Debug, Default)]
pub struct WeaponLoader;

impl JsonLoader for WeaponLoader {
    type Object = Weapon;

    fn name(&self) -> &str {
        "WeaponLoader"
    }

    fn json_extension(&self) -> &str {
        "weapon"
    }

    fn resolve(
        &self,
        file: &FileRecord,
        mut weapons: Vec<Weapon>,
        ctx: &LoadContext<'_>,
    ) -> LoadResult<Vec<Weapon>> {
        let textures = ctx.get::<TextureLoader>();

        for weapon in &mut weapons {
            ensure!(!weapon.id.is_empty(), "{} has a weapon without an id", file.relative);

            let Some(icon) = weapon.icon.as_deref() else {
                continue;
            };
            weapon.icon_resolved = textures.is_some_and(|t| t.contains_path(icon));
            if !weapon.icon_resolved {
                warn!(
                    "[{}] {} references icon {} which was not loaded",
                    self.name(),
                    weapon.id,
                    icon
                );
            }
        }
        Ok(weapons)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoreEntry {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct LoreLoader;

impl Loader for LoreLoader {
    type Object = LoreEntry;

    fn name(&self) -> &str {
        "LoreLoader"
    }

    fn extension(&self) -> &str {
        "lore"
    }

    fn load_object(&self, file: &FileRecord, data: &[u8]) -> LoadResult<LoreEntry> {
        let text = std::str::from_utf8(data)?;
        let (title, body) = text.split_once('\n').unwrap_or((text, ""));

        let title = title.trim();
        if title.is_empty() {
            bail!("{} has no title line", file.relative);
        }
        Ok(LoreEntry {
            title: title.to_string(),
            body: body.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_loader::{
        FileScanner, LoadEngine, LoadedModule, LoaderState, ModuleSet, ModuleVersion, Registry,
        ScanOptions,
    };
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\x0dIHDR\0\0\0\x10\0\0\0\x10\x08\x06\0\0\0";

    fn register_with_textures(registrar: &mut Registrar<'_>) -> Result<(), RegistrationError> {
        registrar.loader::<TextureLoader>()?;
        register(registrar)
    }

    fn write(root: &Path, relative: &str, contents: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn load(root: &Path) -> Registry {
        let index = FileScanner::scan(root, &ScanOptions::default()).unwrap();
        let modules = ModuleSet::new(vec![LoadedModule::new(
            "test",
            ModuleVersion::new(0, 1, 0),
            register_with_textures,
        )]);
        let mut registry = Registry::discover(&modules);
        LoadEngine::new(&registry, &index).run(&mut registry);
        registry
    }

    #[test]
    fn test_declaration_names_module() {
        assert_eq!(content_module_declaration.name, "weapons");
        assert_eq!(content_module_declaration.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_weapons_resolve_icons_against_textures() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "icons/sword.png", PNG);
        write(
            temp.path(),
            "weapons/melee.weapon.json",
            br#"[
                {"id": "sword", "name": "Sword", "damage": 7, "icon": "icons/sword"},
                {"id": "club", "name": "Club", "damage": 4, "icon": "icons/club"},
                {"id": "fist", "name": "Fist", "damage": 1}
            ]"#,
        );

        let registry = load(temp.path());
        let weapons = registry.get_json::<WeaponLoader>().unwrap().objects().unwrap();

        let melee = weapons.by_path("weapons/melee.weapon").unwrap();
        assert_eq!(melee.len(), 3);
        assert!(melee[0].icon_resolved);
        assert!(!melee[1].icon_resolved);
        assert!(!melee[2].icon_resolved);
    }

    #[test]
    fn test_weapon_without_id_aborts_loader() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            "bad.weapon.json",
            br#"[{"id": "", "name": "Nothing", "damage": 0}]"#,
        );

        let registry = load(temp.path());
        let slot = registry.get_json::<WeaponLoader>().unwrap();
        assert_eq!(slot.state(), LoaderState::Aborted);
    }

    #[test]
    fn test_lore_splits_title_and_body() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "lore/origins.lore", b"Origins\n\nIn the beginning.\n");
        write(temp.path(), "lore/short.lore", b"Only a title");

        let registry = load(temp.path());
        let lore = registry.get::<LoreLoader>().unwrap().objects().unwrap();

        assert_eq!(lore["lore/origins"].title, "Origins");
        assert_eq!(lore["lore/origins"].body, "In the beginning.");
        assert_eq!(lore["lore/short"].body, "");
    }

    #[test]
    fn test_lore_requires_title() {
        let root = Path::new("/data");
        let file = FileRecord::new(0, root, root.join("empty.lore"));
        assert!(LoreLoader.load_object(&file, b"\nbody").is_err());
    }
}
