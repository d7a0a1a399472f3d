//! Error handling module for nb-bootstrap
//!
//! This module defines the error type shared by every command handler.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, NbrError>;

/// Main error type for the nb-bootstrap application
#[derive(Error, Debug)]
pub enum NbrError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("Command execution error: {command} failed with exit code {exit_code}")]
    CommandExecution { command: String, exit_code: i32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl NbrError {
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    pub fn toml(message: impl Into<String>) -> Self {
        Self::Toml(message.into())
    }

    pub fn template(message: impl Into<String>) -> Self {
        Self::Template(message.into())
    }

    pub fn command(command: impl Into<String>, exit_code: i32) -> Self {
        Self::CommandExecution {
            command: command.into(),
            exit_code,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn environment(message: impl Into<String>) -> Self {
        Self::Environment(message.into())
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Json(_) | Self::Toml(_) => "parse",
            Self::Template(_) => "template",
            Self::Prompt(_) => "prompt",
            Self::CommandExecution { .. } => "command",
            Self::NotFound(_) => "not_found",
            Self::InvalidArgument(_) | Self::AlreadyExists(_) => "argument",
            Self::Config(_) => "config",
            Self::Environment(_) => "environment",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<std::io::Error> for NbrError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<toml::de::Error> for NbrError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml(e.to_string())
    }
}

impl From<toml::ser::Error> for NbrError {
    fn from(e: toml::ser::Error) -> Self {
        Self::Toml(e.to_string())
    }
}

impl From<toml_edit::TomlError> for NbrError {
    fn from(e: toml_edit::TomlError) -> Self {
        Self::Toml(e.to_string())
    }
}

impl From<handlebars::TemplateError> for NbrError {
    fn from(e: handlebars::TemplateError) -> Self {
        Self::Template(e.to_string())
    }
}

impl From<handlebars::RenderError> for NbrError {
    fn from(e: handlebars::RenderError) -> Self {
        Self::Template(e.to_string())
    }
}

impl From<config::ConfigError> for NbrError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = NbrError::Cancelled;
        assert_eq!(err.to_string(), "Operation cancelled");
        assert_eq!(err.category(), "cancelled");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(NbrError::not_found("venv").category(), "not_found");
        assert_eq!(NbrError::command("pip list", 1).category(), "command");
        assert_eq!(
            NbrError::command("pip list", 2).to_string(),
            "Command execution error: pip list failed with exit code 2"
        );
    }
}
