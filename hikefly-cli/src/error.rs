//! CLI error types.

use std::fmt;

use hikefly::daylight::TimezoneError;
use hikefly::pipeline::PipelineError;

/// Errors that can occur while running a CLI command.
#[derive(Debug)]
pub enum CliError {
    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),

    /// Failed to construct the timezone lookup client.
    TimezoneClient(TimezoneError),

    /// The pipeline run failed.
    Pipeline(PipelineError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::RuntimeCreation(msg) => {
                write!(f, "Failed to create Tokio runtime: {}", msg)
            }
            CliError::TimezoneClient(e) => {
                write!(f, "Failed to create timezone lookup client: {}", e)
            }
            CliError::Pipeline(e) => {
                write!(f, "Pipeline failed: {}", e)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::RuntimeCreation(_) => None,
            CliError::TimezoneClient(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

impl From<TimezoneError> for CliError {
    fn from(e: TimezoneError) -> Self {
        CliError::TimezoneClient(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_context() {
        let err = CliError::RuntimeCreation("no threads".to_string());
        assert!(err.to_string().contains("Tokio runtime"));
        assert!(err.to_string().contains("no threads"));
    }
}
