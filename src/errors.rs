//! Defines the custom error types used throughout the `slideshow_media` crate.
//!
//! This module centralizes error handling, providing specific error enums for
//! different categories of issues (configuration, the override store, user media
//! files, stage attachment), and a top-level `AppError` wrapping the ones callers
//! must handle. Attachment errors are only ever logged.
//! Each error type implements `Debug`, `Display`, and `std::error::Error` traits,
//! and provides `From` implementations for common underlying error types.
//!
//! Probe misses are not errors: an existence check that fails simply answers `false`.

use std::error::Error as StdError;
use std::fmt;

use crate::model::SlideIndex;

// --- ConfigError ---
/// Errors related to application configuration loading and parsing.
#[must_use = "a configuration error should be handled or propagated"]
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O error occurred while trying to read the configuration file.
    Io(std::io::Error),
    /// An error occurred while parsing the configuration file content.
    Parse(String),
    /// A key was present but its value could not be interpreted.
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {}", e),
            ConfigError::Parse(e) => write!(f, "Configuration parse error: {}", e),
            ConfigError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{}' for configuration key '{}'", value, key)
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

// --- StoreError ---
/// Errors raised while writing the local key-value store.
///
/// Reads never produce these: corrupt or missing data degrades to an empty store.
#[must_use = "a store error should be handled or propagated"]
#[derive(Debug)]
pub enum StoreError {
    /// An I/O error occurred while writing the store file.
    Io(std::io::Error),
    /// Serializing the stored mapping failed.
    SerdeJson(serde_json::Error),
    /// The temporary file holding the new contents could not replace the store file.
    Persist(tempfile::PersistError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "Store I/O error: {}", e),
            StoreError::SerdeJson(e) => write!(f, "Store serialization error: {}", e),
            StoreError::Persist(e) => write!(f, "Store persist error: {}", e),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StoreError::Io(e) => Some(e),
            StoreError::SerdeJson(e) => Some(e),
            StoreError::Persist(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::SerdeJson(err)
    }
}

impl From<tempfile::PersistError> for StoreError {
    fn from(err: tempfile::PersistError) -> Self {
        StoreError::Persist(err)
    }
}

// --- MediaError ---
/// Errors related to user-supplied media files.
#[must_use = "a media error should be handled or propagated"]
#[derive(Debug)]
pub enum MediaError {
    /// An I/O error occurred, often while copying a file into a temporary blob.
    Io(std::io::Error),
    /// The file extension is in neither the video nor the image list.
    UnsupportedFormat(String),
    /// The slide index is zero or beyond the presentation.
    InvalidSlide(u32),
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::Io(e) => write!(f, "Media I/O error: {}", e),
            MediaError::UnsupportedFormat(s) => write!(f, "Unsupported media format: {}", s),
            MediaError::InvalidSlide(i) => write!(f, "No slide at index {}", i),
        }
    }
}

impl StdError for MediaError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            MediaError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MediaError {
    fn from(err: std::io::Error) -> Self {
        MediaError::Io(err)
    }
}

// --- AttachError ---
/// A resolved record could not be bound into its slide's visual container.
///
/// These are recovered by a single retry and otherwise only logged; the slide keeps
/// its default visual.
#[must_use = "an attachment error should be handled or logged"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachError {
    /// The stage never reported ready within the allowed attempts.
    StageNotReady { attempts: u32 },
    /// The slide has no visual sub-container.
    MissingVisual(SlideIndex),
    /// The stage refused to take the node.
    Rejected(SlideIndex),
    /// No record is resolved for the slide.
    NothingResolved(SlideIndex),
}

impl fmt::Display for AttachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachError::StageNotReady { attempts } => {
                write!(f, "Stage not ready after {} attempts", attempts)
            }
            AttachError::MissingVisual(i) => write!(f, "Visual element not found for slide {}", i),
            AttachError::Rejected(i) => write!(f, "Stage rejected media node for slide {}", i),
            AttachError::NothingResolved(i) => write!(f, "No media resolved for slide {}", i),
        }
    }
}

impl StdError for AttachError {}

// --- AppError (Top-level error enum) ---
/// A top-level error type that can encompass any error within the application.
#[must_use = "an application error should be handled or propagated"]
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Store(StoreError),
    Media(MediaError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(e) => write!(f, "Application Configuration Error: {}", e),
            AppError::Store(e) => write!(f, "Application Store Error: {}", e),
            AppError::Media(e) => write!(f, "Application Media Error: {}", e),
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AppError::Config(e) => Some(e),
            AppError::Store(e) => Some(e),
            AppError::Media(e) => Some(e),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self { AppError::Config(err) }
}
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self { AppError::Store(err) }
}
impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self { AppError::Media(err) }
}
