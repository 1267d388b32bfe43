//! Logo assets on disk

use std::path::{Path, PathBuf};

use super::traits::LogoExistence;

/// File extension of logo assets
pub const LOGO_EXTENSION: &str = "png";

/// Logos stored as `{dir}/{identity}.png`
#[derive(Debug, Clone)]
pub struct LogoDirectory {
    root: PathBuf,
}

impl LogoDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_name(identity: &str) -> String {
        format!("{identity}.{LOGO_EXTENSION}")
    }
}

impl LogoExistence for LogoDirectory {
    fn logo_exists(&self, identity: &str) -> bool {
        // identities come from rule templates; keep lookups inside the root
        if identity.is_empty() || identity.contains(['/', '\\']) || identity.starts_with('.') {
            return false;
        }
        self.root.join(Self::file_name(identity)).is_file()
    }
}
