#![warn(missing_docs)]
//! # quickedit-image-core
//!
//! ## Purpose
//! Defines the pure data model shared by the `quickedit-image` workspace.
//!
//! ## Responsibilities
//! - Identify one editable field instance ([`FieldId`]).
//! - Enumerate the closed set of editor interaction states ([`EditorState`]).
//! - Carry a local file selected by drop or picker ([`UploadFile`]).
//! - Describe the value submitted to the persistence collaborator on save
//!   ([`SaveRequest`], [`FieldValue`], [`ExtraPayload`]).
//!
//! ## Data flow
//! The host page hands a [`FieldId`] to the session when it marks a field as
//! quick-editable. Drag/drop and picker gestures produce [`UploadFile`] values
//! consumed by the upload pipeline. Entering `saving` produces a
//! [`SaveRequest`] for the persistence collaborator.
//!
//! ## Ownership and lifetimes
//! All values own their buffers (`String`, `Vec<u8>`) so they can cross the
//! request/response boundary without borrowing from the region that created
//! them.
//!
//! ## Error model
//! Malformed field identifiers and nameless files are rejected with
//! [`CoreError`] at construction time.
//!
//! ## Example
//! ```rust
//! use quickedit_image_core::{EditorState, FieldId};
//!
//! let field: FieldId = "node/1/field_image/en/full".parse().unwrap();
//! assert_eq!(field.entity_key(), "node/1");
//! assert!(EditorState::Changed.has_unsaved_edits());
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of `/`-separated segments in a serialized [`FieldId`].
pub const FIELD_ID_SEGMENTS: usize = 5;

/// Identifies one field instance as rendered on the page.
///
/// Serialized as `entity_type/entity_id/field_name/langcode/view_mode`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldId {
    entity_type: String,
    entity_id: String,
    field_name: String,
    langcode: String,
    view_mode: String,
}

impl FieldId {
    /// Builds a field id from its parts.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidFieldId`] when any part is blank or contains
    /// a `/`.
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        field_name: impl Into<String>,
        langcode: impl Into<String>,
        view_mode: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let field = Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            field_name: field_name.into(),
            langcode: langcode.into(),
            view_mode: view_mode.into(),
        };

        for segment in field.path_segments() {
            if segment.trim().is_empty() || segment.contains('/') {
                return Err(CoreError::InvalidFieldId(format!(
                    "segment {segment:?} must be non-empty and must not contain '/'"
                )));
            }
        }

        Ok(field)
    }

    /// Entity type machine name (for example `node`).
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Entity identifier.
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Field machine name.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Language code of the rendered translation.
    pub fn langcode(&self) -> &str {
        &self.langcode
    }

    /// View mode the field was rendered with.
    pub fn view_mode(&self) -> &str {
        &self.view_mode
    }

    /// Returns the five identifier segments in URL order.
    pub fn path_segments(&self) -> [&str; FIELD_ID_SEGMENTS] {
        [
            &self.entity_type,
            &self.entity_id,
            &self.field_name,
            &self.langcode,
            &self.view_mode,
        ]
    }

    /// Key of the owning entity (`entity_type/entity_id`).
    pub fn entity_key(&self) -> String {
        format!("{}/{}", self.entity_type, self.entity_id)
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path_segments().join("/"))
    }
}

impl FromStr for FieldId {
    type Err = CoreError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = raw.split('/').collect();
        let [entity_type, entity_id, field_name, langcode, view_mode] = parts.as_slice() else {
            return Err(CoreError::InvalidFieldId(format!(
                "expected {FIELD_ID_SEGMENTS} segments, got {}",
                parts.len()
            )));
        };

        Self::new(
            *entity_type,
            *entity_id,
            *field_name,
            *langcode,
            *view_mode,
        )
    }
}

impl TryFrom<String> for FieldId {
    type Error = CoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<FieldId> for String {
    fn from(field: FieldId) -> Self {
        field.to_string()
    }
}

/// Interaction states of one editable region.
///
/// The set is closed; the legal moves between states are owned by the
/// session coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorState {
    /// Field is not editable in the current session.
    Inactive,
    /// Field may be edited.
    Candidate,
    /// Pointer is over the field.
    Highlighted,
    /// Field is about to become active.
    Activating,
    /// Field is being edited.
    Active,
    /// Field has unsaved edits.
    Changed,
    /// Field value is being persisted.
    Saving,
    /// Field value was persisted.
    Saved,
    /// Field carries validation errors.
    Invalid,
}

impl EditorState {
    /// Every state, in lifecycle order.
    pub const ALL: [EditorState; 9] = [
        EditorState::Inactive,
        EditorState::Candidate,
        EditorState::Highlighted,
        EditorState::Activating,
        EditorState::Active,
        EditorState::Changed,
        EditorState::Saving,
        EditorState::Saved,
        EditorState::Invalid,
    ];

    /// Lowercase state name.
    pub fn as_str(self) -> &'static str {
        match self {
            EditorState::Inactive => "inactive",
            EditorState::Candidate => "candidate",
            EditorState::Highlighted => "highlighted",
            EditorState::Activating => "activating",
            EditorState::Active => "active",
            EditorState::Changed => "changed",
            EditorState::Saving => "saving",
            EditorState::Saved => "saved",
            EditorState::Invalid => "invalid",
        }
    }

    /// Returns `true` while the region shows editing chrome and accepts
    /// pipeline results.
    pub fn is_editing(self) -> bool {
        matches!(
            self,
            EditorState::Active | EditorState::Changed | EditorState::Saving | EditorState::Invalid
        )
    }

    /// Returns `true` when the region holds edits that were not yet saved.
    pub fn has_unsaved_edits(self) -> bool {
        matches!(
            self,
            EditorState::Changed | EditorState::Saving | EditorState::Invalid
        )
    }

    /// Returns `true` for the states that claim the page-wide editing focus.
    pub fn holds_focus(self) -> bool {
        self == EditorState::Activating || self.is_editing()
    }
}

impl fmt::Display for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One state transition as observed by an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    /// State the region is leaving.
    pub from: EditorState,
    /// State the region is entering.
    pub to: EditorState,
}

/// Text attributes of an image that can be edited next to the binary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataAttribute {
    /// Alternative text.
    Alt,
    /// Title text.
    Title,
}

impl MetadataAttribute {
    /// Both attributes in toolbar order.
    pub const ALL: [MetadataAttribute; 2] = [MetadataAttribute::Alt, MetadataAttribute::Title];

    /// Form input name.
    pub fn name(self) -> &'static str {
        match self {
            MetadataAttribute::Alt => "alt",
            MetadataAttribute::Title => "title",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            MetadataAttribute::Alt => "Alt",
            MetadataAttribute::Title => "Title",
        }
    }

    /// Resolves an input name back to an attribute.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|attribute| attribute.name() == name)
    }
}

/// A local file picked or dropped by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// File name as reported by the browser.
    pub name: String,
    /// MIME type as reported by the browser.
    pub mime_type: String,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

/// MIME type used when the browser reports none.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

impl UploadFile {
    /// Constructs a validated upload file.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyFileName`] when `name` is blank.
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, CoreError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::EmptyFileName);
        }

        let mut mime_type = mime_type.into();
        if mime_type.trim().is_empty() {
            mime_type = FALLBACK_MIME_TYPE.to_string();
        }

        Ok(Self {
            name,
            mime_type,
            bytes,
        })
    }

    /// File size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Extra attributes merged into the persisted value on save.
///
/// Populated from the toolbar's current input values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtraPayload(BTreeMap<String, String>);

impl ExtraPayload {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one attribute, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Reads one attribute.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns `true` when no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// Field value carried by a save request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    /// Server-confirmed markup currently displayed in the region.
    pub markup: String,
    /// File id returned by the last successful upload, if any.
    pub uploaded_file_id: Option<u64>,
}

/// Request handed to the persistence collaborator when a field is saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Field being saved.
    pub field_id: FieldId,
    /// Current field value.
    pub value: FieldValue,
    /// Extra attributes (alt/title) merged into the persisted value.
    #[serde(default, skip_serializing_if = "ExtraPayload::is_empty")]
    pub extra: ExtraPayload,
}

/// Error type for core model validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Field identifier is malformed.
    #[error("invalid field id: {0}")]
    InvalidFieldId(String),
    /// Upload file name is blank.
    #[error("upload file name is empty")]
    EmptyFileName,
}
