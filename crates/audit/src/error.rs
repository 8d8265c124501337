/// Errors an audit store can produce.
///
/// Disk-full must fail loudly, not swallow. This enum gives the caller (the
/// decider, correlator, etc.) a typed signal to alarm on instead of a
/// string to parse.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink io error for stream {stream}: {source}")]
    Io {
        stream: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize audit record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("hash chain broken at line {line} of stream {stream}: expected previous_hash {expected}, found {found}")]
    ChainBroken {
        stream: String,
        line: usize,
        expected: String,
        found: String,
    },
}
