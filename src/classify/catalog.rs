//! Category definitions loaded from a TOML file.
//!
//! ```toml
//! [[category]]
//! name = "Billing"
//! description = "Invoices, receipts and payment reminders"
//! examples = ["samples/invoice-1.eml"]
//! examples_dir = "samples/billing"
//! ```
//!
//! Relative paths resolve against the directory holding the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{MailLensError, Result};

/// The whole categories file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryCatalog {
    #[serde(rename = "category", default)]
    pub categories: Vec<CategorySpec>,
}

/// One `[[category]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Individual example message files.
    #[serde(default)]
    pub examples: Vec<PathBuf>,
    /// Directory whose files are all used as examples (sorted by name).
    #[serde(default)]
    pub examples_dir: Option<PathBuf>,
}

impl CategoryCatalog {
    /// Parse a categories file and resolve its paths.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| MailLensError::io(path, e))?;
        let mut catalog = Self::parse(&contents)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for spec in &mut catalog.categories {
            spec.resolve(base);
        }
        debug!(path = %path.display(), categories = catalog.categories.len(), "Loaded categories");
        Ok(catalog)
    }

    /// Parse TOML text without touching the filesystem.
    pub fn parse(contents: &str) -> Result<Self> {
        let catalog: Self =
            toml::from_str(contents).map_err(|e| MailLensError::Config(e.to_string()))?;
        if let Some(spec) = catalog.categories.iter().find(|c| c.name.trim().is_empty()) {
            return Err(MailLensError::Config(format!(
                "category with empty name (description: {:?})",
                spec.description
            )));
        }
        Ok(catalog)
    }
}

impl CategorySpec {
    fn resolve(&mut self, base: &Path) {
        for example in &mut self.examples {
            if example.is_relative() {
                *example = base.join(&*example);
            }
        }
        if let Some(dir) = &mut self.examples_dir {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }

    /// Explicit examples followed by the files of `examples_dir`.
    pub fn example_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = self.examples.clone();
        if let Some(dir) = &self.examples_dir {
            let mut listed: Vec<PathBuf> = std::fs::read_dir(dir)
                .map_err(|e| MailLensError::io(dir, e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file())
                .collect();
            listed.sort();
            files.extend(listed);
        }
        Ok(files)
    }
}
