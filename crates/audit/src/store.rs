use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, instrument};

use crate::error::AuditError;

/// Append-only, per-stream JSON-lines sink under `<data_root>/memory/`.
///
/// Never reads for decision purposes, never deletes or rewrites. Each line
/// carries a hash-chain (`record_hash`, `previous_hash`) so tampering is
/// detectable without weakening the append-only, never-read-for-decisions
/// character.
pub struct AuditStore {
    data_root: PathBuf,
    last_hash: Mutex<HashMap<String, String>>,
    writers: Mutex<HashMap<String, Arc<Mutex<tokio::fs::File>>>>,
}

fn canonical_hash(value: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

impl AuditStore {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            last_hash: Mutex::new(HashMap::new()),
            writers: Mutex::new(HashMap::new()),
        }
    }

    fn stream_path(&self, stream: &str) -> PathBuf {
        self.data_root.join("memory").join(format!("{stream}.jsonl"))
    }

    async fn writer_for(&self, stream: &str) -> Result<Arc<Mutex<tokio::fs::File>>, AuditError> {
        let mut writers = self.writers.lock().await;
        if let Some(existing) = writers.get(stream) {
            return Ok(existing.clone());
        }
        let path = self.stream_path(stream);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| AuditError::Io {
                stream: stream.to_string(),
                source: e,
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| AuditError::Io { stream: stream.to_string(), source: e })?;
        let file = Arc::new(Mutex::new(file));
        writers.insert(stream.to_string(), file.clone());
        Ok(file)
    }

    /// Append `message` (the raw bus payload) to the `stream`'s audit file.
    ///
    /// Flushes immediately: the caller should treat a returned error as the
    /// sink being unavailable, not as a transient blip. The component that
    /// hit the error halts; the decider continues regardless, so decisions
    /// simply go unaudited until storage is restored.
    #[instrument(skip(self, message), fields(stream))]
    pub async fn record(&self, stream: &str, message: serde_json::Value) -> Result<(), AuditError> {
        let previous_hash = {
            let mut last = self.last_hash.lock().await;
            last.entry(stream.to_string()).or_insert_with(|| "0".repeat(64)).clone()
        };

        let record = serde_json::json!({
            "recorded_at": Utc::now().to_rfc3339(),
            "previous_hash": previous_hash,
            "message": message,
        });
        let record_hash = canonical_hash(&record);
        let line = serde_json::json!({
            "recorded_at": record["recorded_at"],
            "previous_hash": previous_hash,
            "record_hash": record_hash,
            "message": message,
        });
        let mut serialized = serde_json::to_vec(&line)?;
        serialized.push(b'\n');

        let writer = self.writer_for(stream).await?;
        let mut file = writer.lock().await;
        file.write_all(&serialized).await.map_err(|e| AuditError::Io { stream: stream.to_string(), source: e })?;
        file.flush().await.map_err(|e| AuditError::Io { stream: stream.to_string(), source: e })?;
        drop(file);

        let mut last = self.last_hash.lock().await;
        last.insert(stream.to_string(), record_hash);
        Ok(())
    }

    /// Walk a stream's file end to end and confirm each `previous_hash`
    /// matches the prior line's `record_hash`. Used only by the CLI
    /// inspection surface and tests, never by the decision path.
    pub async fn verify_chain(&self, stream: &str) -> Result<(), AuditError> {
        let path = self.stream_path(stream);
        let contents = tokio::fs::read_to_string(&path).await.map_err(|e| AuditError::Io {
            stream: stream.to_string(),
            source: e,
        })?;

        let mut expected_previous = "0".repeat(64);
        for (line_no, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed: serde_json::Value = serde_json::from_str(line)?;
            let found_previous = parsed["previous_hash"].as_str().unwrap_or_default().to_string();
            if found_previous != expected_previous {
                error!(stream, line = line_no, "audit chain broken");
                return Err(AuditError::ChainBroken {
                    stream: stream.to_string(),
                    line: line_no,
                    expected: expected_previous,
                    found: found_previous,
                });
            }

            let record_for_hash = serde_json::json!({
                "recorded_at": parsed["recorded_at"],
                "previous_hash": parsed["previous_hash"],
                "message": parsed["message"],
            });
            let recomputed = canonical_hash(&record_for_hash);
            let stored = parsed["record_hash"].as_str().unwrap_or_default().to_string();
            if recomputed != stored {
                error!(stream, line = line_no, "audit record content does not match its hash");
                return Err(AuditError::ChainBroken {
                    stream: stream.to_string(),
                    line: line_no,
                    expected: recomputed,
                    found: stored,
                });
            }

            expected_previous = stored;
        }
        Ok(())
    }
}

/// Reads an audit file purely for inspection (CLI, tests). Never used by
/// any component on the decision path.
pub async fn read_lines(path: &Path) -> Result<Vec<serde_json::Value>, AuditError> {
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| AuditError::Io {
        stream: path.display().to_string(),
        source: e,
    })?;
    let mut out = Vec::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        out.push(serde_json::from_str(line)?);
    }
    Ok(out)
}
