//! SHA-256 digests of result files, computed once per path

use sha2::{Digest, Sha256};
use sr_config::log_debug;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[derive(Debug, Default)]
pub struct DigestCache {
    digests: HashMap<PathBuf, String>,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sha256(&mut self, path: &Path) -> io::Result<String> {
        if let Some(digest) = self.digests.get(path) {
            log_debug!("Digest cache hit", "path" => path.display());
            return Ok(digest.clone());
        }
        let digest = sha256_file(path)?;
        log_debug!("sha256", "digest" => digest, "path" => path.display());
        self.digests.insert(path.to_path_buf(), digest.clone());
        Ok(digest)
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}
