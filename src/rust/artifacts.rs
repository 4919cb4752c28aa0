use std::path::{Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::env;
use tokio::sync::Mutex;
use sha2::{Sha256, Digest};

pub const MODEL_FILE: &str = "model.onnx";
pub const LABEL_MAP_FILE: &str = "label_map.json";
pub const FRONTEND_DIR: &str = "frontend";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {0}")]
    Missing(PathBuf),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Hash mismatch: expected {expected}, got {actual} for {path}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

/// Locates, verifies and fetches the files the service needs at startup:
/// the ONNX model, the label map and the static frontend.
#[derive(Clone, Debug)]
pub struct ArtifactManager {
    root: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ArtifactManager {
    /// Creates a new ArtifactManager rooted at the default artifact directory
    pub fn new_default() -> Self {
        Self::new(Self::get_default_root())
    }

    /// Returns the default artifact directory
    pub fn get_default_root() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("GLYPHCAST_HOME") {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific data directory
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("glyphcast");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".glyphcast");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("glyphcast")
    }

    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            download_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn model_path(&self) -> PathBuf {
        self.root.join(MODEL_FILE)
    }

    pub fn label_map_path(&self) -> PathBuf {
        self.root.join(LABEL_MAP_FILE)
    }

    pub fn frontend_dir(&self) -> PathBuf {
        self.root.join(FRONTEND_DIR)
    }

    /// Hex-encoded SHA-256 of the file at `path`
    pub fn sha256_file(path: &Path) -> Result<String, ArtifactError> {
        let bytes = fs::read(path)?;
        Ok(sha256_hex(&bytes))
    }

    /// Returns whether the file at `path` hashes to `expected_hash` (case-insensitive hex)
    pub fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ArtifactError> {
        log::info!("Verifying file: {:?}", path);
        let hash = Self::sha256_file(path)?;
        log::debug!("Calculated hash: {}", hash);
        log::debug!("Expected hash:   {}", expected_hash);
        Ok(hash.eq_ignore_ascii_case(expected_hash.trim()))
    }

    /// Makes sure `path` exists and, when a hash is given, matches it.
    ///
    /// A missing or mismatching file is downloaded from `url` when one is given;
    /// otherwise the condition is reported as an error.
    pub async fn ensure_file(
        &self,
        path: &Path,
        url: Option<&str>,
        expected_hash: Option<&str>,
    ) -> Result<(), ArtifactError> {
        let _lock = self.download_lock.lock().await;

        if path.exists() {
            let Some(expected) = expected_hash else {
                return Ok(());
            };
            if self.verify_file(path, expected)? {
                log::info!("Existing file verified successfully");
                return Ok(());
            }
            let actual = Self::sha256_file(path)?;
            match url {
                Some(_) => log::warn!("File verification failed for {:?}, redownloading", path),
                None => {
                    return Err(ArtifactError::HashMismatch {
                        path: path.display().to_string(),
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }
        }

        match url {
            Some(url) => self.download_and_verify_file(url, path, expected_hash).await,
            None => Err(ArtifactError::Missing(path.to_path_buf())),
        }
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: Option<&str>,
    ) -> Result<(), ArtifactError> {
        log::info!("Downloading {} to {:?}", url, path);
        let response = reqwest::get(url).await?.error_for_status()?;
        log::info!("Download response status: {}", response.status());
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        let hash = sha256_hex(&bytes);
        if let Some(expected) = expected_hash {
            if !hash.eq_ignore_ascii_case(expected.trim()) {
                log::error!("Hash mismatch for {}: expected {}, got {}", url, expected, hash);
                return Err(ArtifactError::HashMismatch {
                    path: path.display().to_string(),
                    expected: expected.to_string(),
                    actual: hash,
                });
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        log::info!("Writing {} bytes to {:?}", bytes.len(), path);
        fs::write(path, &bytes)?;
        Ok(())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_artifact_paths() {
        let manager = ArtifactManager::new("/srv/glyphcast");
        assert_eq!(manager.model_path(), PathBuf::from("/srv/glyphcast/model.onnx"));
        assert_eq!(manager.label_map_path(), PathBuf::from("/srv/glyphcast/label_map.json"));
        assert_eq!(manager.frontend_dir(), PathBuf::from("/srv/glyphcast/frontend"));
    }

    #[test]
    fn test_verify_file() -> Result<(), ArtifactError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hello.bin");
        fs::write(&path, "hello")?;

        let manager = ArtifactManager::new(dir.path());
        assert!(manager.verify_file(&path, HELLO_SHA256)?);
        assert!(manager.verify_file(&path, &HELLO_SHA256.to_uppercase())?);
        assert!(!manager.verify_file(&path, "00")?);
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_existing_file() -> Result<(), ArtifactError> {
        let dir = tempfile::tempdir()?;
        let manager = ArtifactManager::new(dir.path());
        let path = manager.model_path();
        fs::write(&path, "hello")?;

        manager.ensure_file(&path, None, None).await?;
        manager.ensure_file(&path, None, Some(HELLO_SHA256)).await?;

        let result = manager.ensure_file(&path, None, Some("deadbeef")).await;
        assert!(matches!(result, Err(ArtifactError::HashMismatch { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_missing_file_without_url() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ArtifactManager::new(dir.path());
        let result = manager.ensure_file(&manager.model_path(), None, None).await;
        assert!(matches!(result, Err(ArtifactError::Missing(_))));
    }

    #[test]
    fn test_default_root_from_env() {
        env::set_var("GLYPHCAST_HOME", "/tmp/glyphcast-test-home");
        let path = ArtifactManager::get_default_root();
        env::remove_var("GLYPHCAST_HOME");
        assert_eq!(path, PathBuf::from("/tmp/glyphcast-test-home"));
    }
}
