use std::{fmt, io, path::StripPrefixError};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum XrefError {
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Operation cancelled")]
    OperationCancelled,
    #[error("{0} is not a child path of the root working directory of the context")]
    PathNotInContext(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl From<StripPrefixError> for XrefError {
    fn from(src: StripPrefixError) -> XrefError {
        XrefError::NotFound(format!("Strip prefix failed for path. Error: {src}"))
    }
}

impl From<toml::de::Error> for XrefError {
    fn from(src: toml::de::Error) -> XrefError {
        XrefError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for XrefError {
    fn from(src: toml::ser::Error) -> XrefError {
        XrefError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for XrefError {
    fn from(src: JsonError) -> XrefError {
        XrefError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<UrlParseError> for XrefError {
    fn from(src: UrlParseError) -> XrefError {
        XrefError::Serialization(format!("Invalid URL: {src}"))
    }
}

impl From<io::Error> for XrefError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => XrefError::NotFound(format!("{x}")),
            _ => XrefError::Io(format!("IOError: {}", x.kind())),
        }
    }
}

impl From<fmt::Error> for XrefError {
    fn from(x: fmt::Error) -> Self {
        XrefError::Custom(format!("{x}"))
    }
}

impl From<RegexError> for XrefError {
    fn from(x: RegexError) -> Self {
        XrefError::Serialization(format!("Regex parse failed: {x}"))
    }
}

impl From<reqwest::Error> for XrefError {
    fn from(x: reqwest::Error) -> Self {
        if x.is_builder() {
            XrefError::InvalidConfig(format!("HTTP client could not be built: {x}"))
        } else {
            XrefError::Network(format!("{x}"))
        }
    }
}

impl From<walkdir::Error> for XrefError {
    fn from(x: walkdir::Error) -> Self {
        match x.into_io_error() {
            Some(io_error) => io_error.into(),
            None => XrefError::Io("Directory walk hit a file system loop".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err: XrefError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, XrefError::NotFound(_)));
        let err: XrefError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(matches!(err, XrefError::Io(_)));
    }

    #[test]
    fn path_not_in_context_message_names_path() {
        let err = XrefError::PathNotInContext("../outside.md".to_string());
        assert_eq!(
            err.to_string(),
            "../outside.md is not a child path of the root working directory of the context"
        );
    }
}
