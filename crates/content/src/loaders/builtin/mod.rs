//! Loaders linked into every host that enables the `builtins` feature.
//!
//! Each file submits its own [`LoaderRegistration`](crate::registry::LoaderRegistration),
//! so the host module picks them up without a central list.

mod document;
mod locale;
mod table;
mod texture;

pub use document::RonLoader;
pub use locale::{LocaleEntry, LocaleLoader};
pub use table::TableLoader;
pub use texture::{ImageFormat, Texture, TextureLoader};

use anyhow::Context;

use crate::loaders::LoadResult;
use crate::scan::FileRecord;

/// Decodes `data` as UTF-8 text.
fn utf8<'a>(file: &FileRecord, data: &'a [u8]) -> LoadResult<&'a str> {
    std::str::from_utf8(data).with_context(|| format!("{} is not valid UTF-8", file.relative))
}
