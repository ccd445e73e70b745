use thiserror::Error;

/// Main error type for the trainer
#[derive(Error, Debug)]
pub enum PitError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Dataset errors
    #[error("Data error: {0}")]
    Data(String),

    // Episode sampling errors
    #[error("Episode range error: {0}")]
    EpisodeRange(String),

    // Simulation errors
    #[error("Execution error in episode {episode} (worker {worker}): {reason}")]
    Execution {
        worker: usize,
        episode: u64,
        reason: String,
    },

    // Parameter synchronization errors
    #[error("Sync error: {0}")]
    Sync(String),

    // Checkpoint persistence errors
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for PitError
pub type Result<T> = std::result::Result<T, PitError>;

impl PitError {
    /// Whether this error aborts only the current episode rather than the
    /// worker or the process.
    pub fn is_episode_fatal_only(&self) -> bool {
        matches!(self, PitError::Execution { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_scope() {
        let err = PitError::Execution {
            worker: 3,
            episode: 42,
            reason: "non-finite price".to_string(),
        };
        assert!(err.is_episode_fatal_only());
        assert!(err.to_string().contains("worker 3"));
        assert!(err.to_string().contains("episode 42"));
    }

    #[test]
    fn test_sync_error_scope() {
        let err = PitError::Sync("poisoned parameter lock".to_string());
        assert!(!err.is_episode_fatal_only());
    }
}
