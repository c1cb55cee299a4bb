//! Error types for ec2-bootstrap

use thiserror::Error;

/// Main error type for provisioning operations
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Step '{step}' failed: {source}")]
    Step {
        step: String,
        #[source]
        source: Box<ProvisionError>,
    },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl ProvisionError {
    /// Wrap an error with the name of the step that produced it
    pub fn step(step: impl Into<String>, source: ProvisionError) -> Self {
        Self::Step {
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// Create a command error from a program name and its stderr
    pub fn command(program: &str, code: Option<i32>, stderr: &str) -> Self {
        let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
        Self::Command(format!("{program} exited with {code}: {}", stderr.trim()))
    }
}

impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}
