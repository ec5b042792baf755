//! Wraps a page pack directory so the loader can resolve page images by index
//! without caring whether the order came from a manifest or a directory scan.
//!
//! Types:
//!
//! - `PackError` classifies manifest parsing, validation, and I/O failures.
//! - `LocalPack` stores the resolved root directory and the parsed (or
//!   synthesised) `PagePackManifest`.
//!
//! Functions:
//!
//! - `LocalPack::load` reads `pages.toml`, validates it, and checks that every
//!   listed image exists.
//! - `LocalPack::scan` builds a manifest from the image files in a directory,
//!   ordered by file name.
//! - `LocalPack::open` prefers the manifest and falls back to scanning.
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::manifest::{PageEntry, PagePackManifest, MANIFEST_FILE};

/// File extensions picked up by `LocalPack::scan`.
pub const PAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "gif"];

#[derive(Debug, Error)]
pub enum PackError {
    #[error("manifest not found at {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("manifest validation failed: {0:?}")]
    ManifestValidation(Vec<String>),

    #[error("no page images found in {}", .0.display())]
    Empty(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct LocalPack {
    root: PathBuf,
    manifest: PagePackManifest,
}

impl LocalPack {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(PackError::ManifestMissing(manifest_path));
        }

        let manifest_raw = fs::read_to_string(&manifest_path)?;
        let manifest: PagePackManifest = toml::from_str(&manifest_raw)?;
        let mut issues = manifest.validate();
        for page in &manifest.pages {
            let path = root.join(&page.image);
            if !page.image.as_os_str().is_empty() && !path.is_file() {
                issues.push(format!("missing page image: {}", path.display()));
            }
        }
        if !issues.is_empty() {
            return Err(PackError::ManifestValidation(issues));
        }

        tracing::debug!(
            root = %root.display(),
            pages = manifest.pages.len(),
            "loaded page pack manifest"
        );
        Ok(Self { root, manifest })
    }

    pub fn scan(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        let mut images = Vec::new();
        for entry in fs::read_dir(&root)? {
            let path = entry?.path();
            if path.is_file() && has_page_extension(&path) {
                if let Some(name) = path.file_name() {
                    images.push(PathBuf::from(name));
                }
            }
        }
        if images.is_empty() {
            return Err(PackError::Empty(root));
        }
        images.sort();

        tracing::debug!(
            root = %root.display(),
            pages = images.len(),
            "scanned page images without manifest"
        );
        let manifest = PagePackManifest {
            name: root
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            page_size: None,
            pages: images
                .into_iter()
                .map(|image| PageEntry { image, label: None })
                .collect(),
        };
        Ok(Self { root, manifest })
    }

    pub fn open(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref();
        if root.join(MANIFEST_FILE).exists() {
            Self::load(root)
        } else {
            Self::scan(root)
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn manifest(&self) -> &PagePackManifest {
        &self.manifest
    }

    pub fn page_count(&self) -> usize {
        self.manifest.pages.len()
    }

    pub fn page_size(&self) -> Option<(u32, u32)> {
        self.manifest.page_size
    }

    pub fn page_path(&self, index: usize) -> Option<PathBuf> {
        self.manifest
            .pages
            .get(index)
            .map(|page| self.root.join(&page.image))
    }
}

fn has_page_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            PAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_files(dir: &Path, files: &[&str]) {
        for name in files {
            fs::write(dir.join(name), "fake").expect("write file");
        }
    }

    #[test]
    fn loads_valid_pack() {
        let temp = tempfile::tempdir().unwrap();
        write_files(temp.path(), &["a.png", "b.png"]);
        fs::write(
            temp.path().join(MANIFEST_FILE),
            "name = \"Demo\"\n[[pages]]\nimage = \"b.png\"\n[[pages]]\nimage = \"a.png\"\n",
        )
        .unwrap();

        let pack = LocalPack::load(temp.path()).expect("load pack");
        assert_eq!(pack.page_count(), 2);
        assert_eq!(pack.page_path(0), Some(temp.path().join("b.png")));
        assert_eq!(pack.page_path(2), None);
    }

    #[test]
    fn detects_missing_page_image() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join(MANIFEST_FILE),
            "[[pages]]\nimage = \"missing.png\"\n",
        )
        .unwrap();

        let err = LocalPack::load(temp.path()).unwrap_err();
        assert!(matches!(err, PackError::ManifestValidation(_)));
    }

    #[test]
    fn scan_orders_images_by_name() {
        let temp = tempfile::tempdir().unwrap();
        write_files(temp.path(), &["010.png", "002.JPG", "001.png", "notes.txt"]);

        let pack = LocalPack::open(temp.path()).expect("scan pack");
        let names: Vec<_> = pack
            .manifest()
            .pages
            .iter()
            .map(|page| page.image.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["001.png", "002.JPG", "010.png"]);
    }

    #[test]
    fn scan_rejects_directory_without_images() {
        let temp = tempfile::tempdir().unwrap();
        write_files(temp.path(), &["readme.md"]);
        let err = LocalPack::scan(temp.path()).unwrap_err();
        assert!(matches!(err, PackError::Empty(_)));
    }
}
