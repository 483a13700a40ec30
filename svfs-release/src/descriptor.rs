//! Rendering of the flat package `PackageInfo` and other metadata templates.
//!
//! Templates use `{{version}}` and `{{installed_size}}` placeholders. The
//! installed size is the size of the staged package root in kilobytes.

use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{ReleaseError, Result};

/// A template document loaded once before any target is processed.
#[derive(Debug, Clone)]
pub struct Template {
    content: String,
}

impl Template {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// The `PackageInfo` template shipped with svfs-release.
    pub fn bundled() -> Self {
        Self::new(include_str!("../templates/PackageInfo.tmpl"))
    }

    /// Read a template from disk. An unreadable file is `TemplateMissing`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ReleaseError::TemplateMissing {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(content))
    }

    pub fn render(&self, values: &DescriptorValues) -> String {
        render(&self.content, values)
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorValues {
    pub version: String,
    /// Installed size in KB.
    pub installed_size: u64,
}

impl DescriptorValues {
    /// Values for a package whose files are staged under `root`.
    /// Without a root the size is 0.
    pub fn for_tree(version: &str, root: Option<&Path>) -> Self {
        Self {
            version: version.to_string(),
            installed_size: root.map(installed_size_kb).unwrap_or(0),
        }
    }
}

/// Substitute the placeholders in `template`.
pub fn render(template: &str, values: &DescriptorValues) -> String {
    template
        .replace("{{version}}", &values.version)
        .replace("{{installed_size}}", &values.installed_size.to_string())
}

/// Sum of regular file sizes under `root`, in KB, truncated.
/// A missing or empty directory is 0.
pub fn installed_size_kb(root: &Path) -> u64 {
    let bytes: u64 = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum();

    bytes / 1024
}
