//! Structured error types for the report engine.
//!
//! Most failures inside a render are absorbed as placeholders. The variants
//! here cover what has to reach the caller: bad input, unusable fonts,
//! impossible templates and a sink that cannot be written.

use thiserror::Error;

/// The unified error type returned by all public engine functions.
#[derive(Error, Debug)]
pub enum ReportError {
    /// JSON input failed to parse as a report document or configuration.
    #[error("Failed to parse {what}: {source}{}", hint_suffix(.hint))]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
        hint: String,
    },
    /// A custom font could not be loaded or parsed.
    #[error("Font error: {0}")]
    Font(String),
    /// A template cannot be laid out even after clamping.
    #[error("Template error: {0}")]
    Template(String),
    /// The configuration is internally inconsistent.
    #[error("Config error: {0}")]
    Config(String),
    /// Rasterizing or encoding a composed page failed.
    #[error("Render error: {0}")]
    Render(String),
    /// Writing the final document failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

fn hint_suffix(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {}", hint)
    }
}

impl ReportError {
    /// Wrap a serde_json error with a hint describing the likely cause.
    pub fn parse(what: &'static str, e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => format!(
                "The JSON is valid but doesn't match the {} schema. Check field names and types.",
                what
            ),
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the JSON truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        ReportError::Parse {
            what,
            source: e,
            hint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_carries_hint() {
        let err = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}").unwrap_err();
        let msg = ReportError::parse("report", err).to_string();
        assert!(msg.starts_with("Failed to parse report"));
        assert!(msg.contains("trailing commas"));
    }

    #[test]
    fn data_error_names_schema() {
        let err = serde_json::from_str::<Vec<u32>>("{\"a\": 1}").unwrap_err();
        let msg = ReportError::parse("config", err).to_string();
        assert!(msg.contains("config schema"));
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: ReportError = io.into();
        assert!(matches!(err, ReportError::Io(_)));
    }
}
