use crate::candidates::BlockRange;
use anyhow::Error as AnyError;

/// Terminal failures of the incremental scanner. None of them is retried by
/// the scanner itself.
#[derive(Debug)]
pub enum ScanError {
    LatestHeader(AnyError),
    Candidates { range: BlockRange, source: AnyError },
    BatchChannelClosed { height: u64 },
    FullScanChannelClosed { height: u64 },
}

impl ScanError {
    pub fn stage(&self) -> &'static str {
        match self {
            ScanError::LatestHeader(_) => "latest_header",
            ScanError::Candidates { .. } => "candidates",
            ScanError::BatchChannelClosed { .. } => "dispatch",
            ScanError::FullScanChannelClosed { .. } => "full_scan_request",
        }
    }
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::LatestHeader(_) => f.write_str("could not get latest block header"),
            ScanError::Candidates { range, .. } => {
                write!(f, "candidate detection failed for blocks {range}")
            }
            ScanError::BatchChannelClosed { height } => {
                write!(f, "address batch channel closed while dispatching height {height}")
            }
            ScanError::FullScanChannelClosed { height } => {
                write!(f, "full scan request channel closed while requesting height {height}")
            }
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScanError::LatestHeader(err) | ScanError::Candidates { source: err, .. } => {
                Some(err.as_ref())
            }
            _ => None,
        }
    }
}
