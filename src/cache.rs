use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest as _, Sha256};

/// Flat directory of JSON documents, one per key. Single-process use only:
/// there is no locking between the read and the write of a key.
#[derive(Debug, Clone)]
pub struct JsonCache {
    dir: PathBuf,
}

impl JsonCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Malformed entries are reported and treated as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.path_for(key);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "cache read failed; treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key, "cache hit");
                Some(value)
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "corrupt cache entry; treating as miss");
                None
            }
        }
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create cache dir: {}", self.dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("create temp file in {}", self.dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, value).context("serialize cache entry")?;
        tmp.write_all(b"\n").context("write cache entry")?;

        let path = self.path_for(key);
        tmp.persist(&path)
            .map_err(|err| anyhow::anyhow!("persist cache entry {}: {err}", path.display()))?;
        Ok(())
    }
}

/// `{prefix}_{path}[_{k}_{v}...].json`: the URL relative to the provider base
/// with `/` as `_`, then query pairs sorted by key, everything outside
/// `[A-Za-z0-9-_.]` replaced by `_`.
pub fn cache_key(prefix: &str, base_url: &str, url: &str, params: &[(&str, String)]) -> String {
    let base_url = base_url.trim_end_matches('/');
    let relative = url.strip_prefix(base_url).unwrap_or(url);
    let relative = relative.split('?').next().unwrap_or(relative);
    let mut key = format!("{prefix}_{}", relative.trim_matches('/').replace('/', "_"));

    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(&b.1)));
    for (name, value) in sorted {
        key.push('_');
        key.push_str(name);
        key.push('_');
        key.push_str(&value);
    }

    let mut sanitized = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    sanitized.push_str(".json");
    sanitized
}

/// Key for a parsed résumé record, derived from the document text.
pub fn resume_key(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("resume_{}.json", hex::encode(digest))
}
