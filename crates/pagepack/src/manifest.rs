//! Defines the `pages.toml` schema that describes a page pack on disk: the
//! document name, the natural page size, and the ordered page image list the
//! loader decodes from.
//!
//! Types:
//!
//! - `PagePackManifest` captures document metadata and the ordered pages.
//! - `PageEntry` stores one page's image path relative to the pack root plus an
//!   optional label used in logs.
//!
//! Functions:
//!
//! - `PagePackManifest::validate` returns human-readable issues so the pack
//!   loader can surface misconfigurations without panicking.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const MANIFEST_FILE: &str = "pages.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PagePackManifest {
    pub name: Option<String>,
    /// Natural page size in pixels; decoded pages are scaled to the viewport.
    #[serde(default)]
    pub page_size: Option<(u32, u32)>,
    #[serde(default)]
    pub pages: Vec<PageEntry>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PageEntry {
    pub image: PathBuf,
    #[serde(default)]
    pub label: Option<String>,
}

impl PagePackManifest {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.pages.is_empty() {
            issues.push("manifest must list at least one page".to_string());
        }
        if let Some((width, height)) = self.page_size {
            if width == 0 || height == 0 {
                issues.push(format!(
                    "page_size {width}x{height} must be non-zero in both dimensions"
                ));
            }
        }
        for (index, page) in self.pages.iter().enumerate() {
            if page.image.as_os_str().is_empty() {
                issues.push(format!("page {index} has an empty image path"));
            } else if page.image.is_absolute() {
                issues.push(format!(
                    "page {index} image '{}' must be relative to the pack root",
                    page.image.display()
                ));
            }
        }
        issues
    }
}
