// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `BlobStore` for formstate (uses platform config dir).

use directories::ProjectDirs;
use formstate_core::config::{BlobError, BlobStore};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Store blobs as JSON files, one per key.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    base: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at the user config directory (e.g., `~/.config/FormState`).
    pub fn new() -> Result<Self, BlobError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "FormState")
            .ok_or_else(|| BlobError::Other("could not resolve config dir".into()))?;
        Self::at(proj.config_dir())
    }

    /// Create a store rooted at `base`, creating the directory if needed.
    pub fn at(base: impl AsRef<Path>) -> Result<Self, BlobError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    /// Directory holding the blobs.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(['/', '\\', '\0']);
        if !valid {
            return Err(BlobError::Other(format!("invalid blob key `{key}`")));
        }
        Ok(self.base.join(format!("{key}.json")))
    }
}

impl BlobStore for FsBlobStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(key)?;
        match fs::read(path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound),
            Err(err) => Err(BlobError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // write-then-rename so readers never see a torn file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;
        debug!(key, bytes = data.len(), "blob saved");
        Ok(())
    }
}
