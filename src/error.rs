use std::io;

use hex::FromHexError;
use http::status::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum MapError {
    /// The segment store could not complete a request.
    #[error("Segment store transport error: {0}")]
    Transport(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    /// The store declared more segments than it was willing to page out.
    #[error("Segment store declared {expected} segments but only {received} could be paged")]
    InconsistentPage { expected: usize, received: usize },
    #[error("Map must have exactly one parentless segment, found {count}")]
    NoRoot { count: usize },
    #[error("Segment {id} is not connected to the map root (parent {parent_id})")]
    DisconnectedNode { id: String, parent_id: String },
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
    #[error("Invalid link hash: {0}")]
    InvalidHash(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MapError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            MapError::Transport(_) => StatusCode::BAD_GATEWAY,
            MapError::NotFound(_) => StatusCode::NOT_FOUND,
            MapError::InconsistentPage { .. } => StatusCode::BAD_GATEWAY,
            MapError::NoRoot { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            MapError::DisconnectedNode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            MapError::InvalidPagination(_) => StatusCode::BAD_REQUEST,
            MapError::InvalidHash(_) => StatusCode::BAD_REQUEST,
            MapError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MapError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            MapError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the error was raised while assembling the layout, as opposed to while fetching
    /// segments from the store.
    pub fn is_layout_error(&self) -> bool {
        matches!(
            self,
            MapError::NoRoot { .. } | MapError::DisconnectedNode { .. }
        )
    }
}

impl From<toml::de::Error> for MapError {
    fn from(src: toml::de::Error) -> MapError {
        MapError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for MapError {
    fn from(src: toml::ser::Error) -> MapError {
        MapError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for MapError {
    fn from(src: JsonError) -> MapError {
        MapError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<FromHexError> for MapError {
    fn from(src: FromHexError) -> MapError {
        MapError::InvalidHash(format!("{src}"))
    }
}

impl From<io::Error> for MapError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => MapError::NotFound(format!("{x}")),
            _ => MapError::Io(format!("IOError: {}", x.kind())),
        }
    }
}
