mod manifest;
mod pack;

pub use manifest::{PageEntry, PagePackManifest, MANIFEST_FILE};
pub use pack::{LocalPack, PackError, PAGE_EXTENSIONS};
