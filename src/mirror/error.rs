//! Error types for the mirror core

use std::fmt;

/// Synchronous rejection of a buffer submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Buffer is full; recovered by forced eviction and retry
    CapacityExceeded,
    /// Any other rejection; the operation is dropped
    Fault(String),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::CapacityExceeded => write!(f, "buffer capacity exceeded"),
            SubmitError::Fault(msg) => write!(f, "buffer fault: {}", msg),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Segment source could not be started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    /// Device missing or busy
    Unavailable(String),
    /// User or platform refused access
    PermissionDenied,
}

impl fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionError::Unavailable(msg) => write!(f, "capture device unavailable: {}", msg),
            AcquisitionError::PermissionDenied => write!(f, "capture permission denied"),
        }
    }
}

impl std::error::Error for AcquisitionError {}

/// Playback surface refused to start (e.g. autoplay policy)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackError(pub String);

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "playback refused: {}", self.0)
    }
}

impl std::error::Error for PlaybackError {}

/// Errors surfaced to callers of the mirror controller
#[derive(Debug)]
pub enum MirrorError {
    Acquisition(AcquisitionError),
    /// Operation requires an active session
    NotRunning,
    /// The controller task has gone away
    ActorUnavailable,
}

impl fmt::Display for MirrorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorError::Acquisition(e) => write!(f, "session start failed: {}", e),
            MirrorError::NotRunning => write!(f, "mirror is not running"),
            MirrorError::ActorUnavailable => write!(f, "mirror actor unavailable"),
        }
    }
}

impl std::error::Error for MirrorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MirrorError::Acquisition(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AcquisitionError> for MirrorError {
    fn from(e: AcquisitionError) -> Self {
        MirrorError::Acquisition(e)
    }
}

/// Configuration loading/validation failure
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {}", e),
            ConfigError::Parse(msg) => write!(f, "config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            SubmitError::CapacityExceeded.to_string(),
            "buffer capacity exceeded"
        );
        assert_eq!(
            MirrorError::from(AcquisitionError::PermissionDenied).to_string(),
            "session start failed: capture permission denied"
        );
    }

    #[test]
    fn test_mirror_error_source() {
        let err = MirrorError::from(AcquisitionError::Unavailable("no camera".into()));
        assert!(err.source().is_some());
        assert!(MirrorError::NotRunning.source().is_none());
    }
}
