use thiserror::Error;

/// Structured error values returned by pipeline components. The orchestrator
/// decides which of these are fatal and which are recoverable; only
/// `MalformedRecord` is ever recoverable.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Contig '{0}' is not present in the reference dictionary")]
    UnknownContig(String),

    #[error("Position {0} exceeds the location encoding range")]
    PositionOutOfRange(u64),

    #[error("Unknown call state tag '{0}'")]
    UnknownState(String),

    #[error("Failed to read cohort records: {0}")]
    ReadError(String),

    #[error("Malformed record dropped: {0}")]
    MalformedRecord(String),

    #[error("Sort spill I/O failure: {0}")]
    SortSpillIo(#[source] std::io::Error),

    #[error("Sort run codec failure: {0}")]
    Codec(#[source] bincode::Error),

    #[error("Filter table malformed: {0}")]
    FilterTableMalformed(String),

    #[error("Reference lookup failed: {0}")]
    ReferenceLookup(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to write VCF output: {0}")]
    VcfWrite(String),

    #[error("Extraction cancelled")]
    Cancelled,
}

impl ExtractError {
    /// Recoverable errors are logged and counted; everything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ExtractError::MalformedRecord(_))
    }
}
