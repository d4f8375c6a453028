//! Error types for butterfly-net library
//!
//! Every failure of an extraction surfaces as one of these variants; the only
//! failure that is absorbed internally is the status-endpoint fallback of
//! [`crate::OverpassClient::get_pause_duration`].

use strsim::jaro_winkler;
use thiserror::Error as ThisError;

/// Network types understood by [`crate::NetworkType`], used for suggestions
const KNOWN_NETWORK_TYPES: &[&str] = &["walk", "drive"];

/// Minimum Jaro-Winkler similarity for a "did you mean" hint
const SUGGESTION_THRESHOLD: f64 = 0.7;

/// Suggest a known network type for a misspelled one
pub fn suggest_network_type(input: &str) -> Option<&'static str> {
    let input_lower = input.to_lowercase();

    KNOWN_NETWORK_TYPES
        .iter()
        .map(|candidate| (*candidate, jaro_winkler(&input_lower, candidate)))
        .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
}

/// Main error type for butterfly-net operations
#[derive(Debug, ThisError)]
pub enum Error {
    /// Bad caller input: bounding box, network type, geometry or settings
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Non-retryable status from the Overpass API with no JSON body
    #[error("Server returned status {status} and no JSON data: {body}")]
    ServerError { status: u16, body: String },

    /// The merged query returned no elements at all
    #[error("Query resulted in no data: {0}")]
    NoData(String),

    /// Graph construction produced no edges
    #[error("Query resulted in no connected node pairs: {0}")]
    NoEdges(String),

    /// A way references a node that is missing from the node table
    #[error("Way {way_id} references node {node_id} which is not in the node table")]
    MissingNode { way_id: u64, node_id: u64 },

    /// Network connectivity issues (connect failures, timeouts)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// HTTP-specific error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV table writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Settings file could not be parsed
    #[error("Invalid settings file: {0}")]
    Config(#[from] toml::de::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Error::NetworkError(err.to_string())
        } else {
            Error::HttpError(err.to_string())
        }
    }
}

impl Error {
    /// Build the validation error for an unrecognized network type
    pub fn unknown_network_type(network_type: &str) -> Self {
        match suggest_network_type(network_type) {
            Some(suggestion) => Error::InvalidInput(format!(
                "unknown network_type \"{network_type}\". Did you mean \"{suggestion}\"?"
            )),
            None => Error::InvalidInput(format!(
                "unknown network_type \"{network_type}\" (expected one of: {})",
                KNOWN_NETWORK_TYPES.join(", ")
            )),
        }
    }

    /// True for the two empty-result kinds
    pub fn is_empty_result(&self) -> bool {
        matches!(self, Error::NoData(_) | Error::NoEdges(_))
    }
}

/// Convenience result type for butterfly-net operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_network_type_typos() {
        assert_eq!(suggest_network_type("wlak"), Some("walk"));
        assert_eq!(suggest_network_type("WALK"), Some("walk"));
        assert_eq!(suggest_network_type("driv"), Some("drive"));
        assert_eq!(suggest_network_type("drvie"), Some("drive"));
    }

    #[test]
    fn test_suggest_network_type_no_match() {
        assert_eq!(suggest_network_type("bicycle"), None);
        assert_eq!(suggest_network_type(""), None);
    }

    #[test]
    fn test_unknown_network_type_message() {
        let err = Error::unknown_network_type("wlak");
        assert!(err.to_string().contains("Did you mean \"walk\"?"));

        let err = Error::unknown_network_type("bicycle");
        assert!(err.to_string().contains("expected one of: walk, drive"));
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_empty_result_kinds_are_distinct() {
        let no_data = Error::NoData("q".to_string());
        let no_edges = Error::NoEdges("bbox".to_string());
        assert!(no_data.is_empty_result());
        assert!(no_edges.is_empty_result());
        assert!(!matches!(no_data, Error::NoEdges(_)));
        assert!(!Error::InvalidInput("x".to_string()).is_empty_result());
    }

    #[test]
    fn test_server_error_display_carries_status_and_body() {
        let err = Error::ServerError {
            status: 400,
            body: "parse error".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("parse error"));
    }
}
