#![warn(missing_docs)]
//! # quickedit-image-contract
//!
//! ## Purpose
//! Defines the backend response contract for image uploads and field-info
//! lookups, and parses raw JSON bodies into typed values.
//!
//! ## Responsibilities
//! - Distinguish an accepted upload from a validation rejection.
//! - Normalize the `errors` member, which the backend may send as a list, a
//!   single rendered string, or an empty string.
//! - Parse field metadata (alt/title values and per-attribute flags) with the
//!   loose scalar typing the backend emits (`1`, `"1"`, `true`).
//!
//! ## Data flow
//! Raw response body -> [`parse_upload_response`] or [`parse_field_metadata`]
//! -> typed value consumed by the upload pipeline.
//!
//! ## Ownership and lifetimes
//! Parsed values are owned structs so they outlive the transport buffer they
//! were decoded from.
//!
//! ## Error model
//! Invalid JSON or bodies that match neither response shape return
//! [`ContractError`]; the pipeline reports those as transport failures.

use quickedit_image_core::MetadataAttribute;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upload accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSuccess {
    /// Identifier of the newly stored file.
    pub fid: u64,
    /// Rendered markup of the whole field, wrapper included.
    pub html: String,
}

/// Upload rejected by server-side validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRejection {
    /// Short message shown inside the drop-zone.
    pub main_error: String,
    /// Itemized messages shown in the validation panel, in server order.
    pub errors: Vec<String>,
}

/// Interpreted upload response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadResponse {
    /// New image stored in temp-store.
    Accepted(UploadSuccess),
    /// Image failed validation.
    Rejected(UploadRejection),
}

/// Editable text attributes of one image field instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    /// Current alt text.
    #[serde(default, deserialize_with = "loose::text")]
    pub alt: String,
    /// Current title text.
    #[serde(default, deserialize_with = "loose::text")]
    pub title: String,
    /// Whether the field exposes an alt input.
    #[serde(default, deserialize_with = "loose::flag")]
    pub alt_field: bool,
    /// Whether the field exposes a title input.
    #[serde(default, deserialize_with = "loose::flag")]
    pub title_field: bool,
    /// Whether alt text is required.
    #[serde(default, deserialize_with = "loose::flag")]
    pub alt_field_required: bool,
    /// Whether title text is required.
    #[serde(default, deserialize_with = "loose::flag")]
    pub title_field_required: bool,
}

impl FieldMetadata {
    /// Returns `true` when the field exposes an input for `attribute`.
    pub fn has_field(&self, attribute: MetadataAttribute) -> bool {
        match attribute {
            MetadataAttribute::Alt => self.alt_field,
            MetadataAttribute::Title => self.title_field,
        }
    }

    /// Returns `true` when `attribute` must be non-empty.
    pub fn is_required(&self, attribute: MetadataAttribute) -> bool {
        match attribute {
            MetadataAttribute::Alt => self.alt_field_required,
            MetadataAttribute::Title => self.title_field_required,
        }
    }

    /// Current server-side value of `attribute`.
    pub fn value(&self, attribute: MetadataAttribute) -> &str {
        match attribute {
            MetadataAttribute::Alt => &self.alt,
            MetadataAttribute::Title => &self.title,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawUploadResponse {
    #[serde(default)]
    main_error: Option<String>,
    #[serde(default)]
    errors: ErrorList,
    #[serde(default)]
    fid: Option<FileIdValue>,
    #[serde(default)]
    html: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum ErrorList {
    #[default]
    Missing,
    Items(Vec<String>),
    Rendered(String),
}

impl ErrorList {
    fn into_items(self) -> Vec<String> {
        match self {
            ErrorList::Missing => Vec::new(),
            ErrorList::Items(items) => items,
            ErrorList::Rendered(text) if text.trim().is_empty() => Vec::new(),
            ErrorList::Rendered(text) => vec![text],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FileIdValue {
    Number(u64),
    Text(String),
}

impl FileIdValue {
    fn into_id(self) -> Result<u64, ContractError> {
        match self {
            FileIdValue::Number(id) => Ok(id),
            FileIdValue::Text(text) => text.trim().parse().map_err(|_| {
                ContractError::InvalidContract(format!("fid {text:?} is not numeric"))
            }),
        }
    }
}

/// Parses a raw upload response body.
///
/// A non-empty `main_error` marks a validation rejection; its absence marks
/// success, which then requires both `fid` and `html`.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON.
/// Returns [`ContractError::InvalidContract`] when a success body lacks `fid`
/// or `html`.
pub fn parse_upload_response(raw: &str) -> Result<UploadResponse, ContractError> {
    let parsed: RawUploadResponse = serde_json::from_str(raw).map_err(ContractError::Decode)?;

    if let Some(main_error) = parsed.main_error.filter(|message| !message.trim().is_empty()) {
        return Ok(UploadResponse::Rejected(UploadRejection {
            main_error,
            errors: parsed.errors.into_items(),
        }));
    }

    let fid = parsed
        .fid
        .ok_or_else(|| ContractError::InvalidContract("success body lacks fid".to_string()))?
        .into_id()?;
    let html = parsed
        .html
        .ok_or_else(|| ContractError::InvalidContract("success body lacks html".to_string()))?;

    Ok(UploadResponse::Accepted(UploadSuccess { fid, html }))
}

/// Parses a raw field-info response body.
///
/// # Errors
/// Returns [`ContractError::Decode`] for invalid JSON or mistyped members.
pub fn parse_field_metadata(raw: &str) -> Result<FieldMetadata, ContractError> {
    serde_json::from_str(raw).map_err(ContractError::Decode)
}

mod loose {
    //! Lenient scalar decoding for values the backend emits untyped.

    use serde::{Deserialize, Deserializer, de::Error as _};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Bool(bool),
        Int(i64),
        Float(f64),
        Text(String),
    }

    pub(super) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Scalar>::deserialize(deserializer)? {
            None => Ok(false),
            Some(Scalar::Bool(value)) => Ok(value),
            Some(Scalar::Int(value)) => Ok(value != 0),
            Some(Scalar::Float(value)) => Ok(value != 0.0),
            Some(Scalar::Text(value)) => match value.trim() {
                "" | "0" | "false" => Ok(false),
                "1" | "true" => Ok(true),
                other => Err(D::Error::custom(format!("unexpected flag value {other:?}"))),
            },
        }
    }

    pub(super) fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
    }
}

/// Backend contract errors.
#[derive(Debug, Error)]
pub enum ContractError {
    /// JSON decode failure.
    #[error("response decode failure: {0}")]
    Decode(#[from] serde_json::Error),
    /// Parsed body matches neither response shape.
    #[error("response contract violation: {0}")]
    InvalidContract(String),
}
