#![warn(missing_docs)]
//! # quickedit-image-editor
//!
//! ## Purpose
//! Implements the in-place editors that react to state changes of one
//! editable region.
//!
//! ## Responsibilities
//! - Model the region ([`EditableRegion`]) with a display model separate from
//!   the local edit buffer.
//! - Define the polymorphic editor seam ([`InPlaceEditor`]) and the registry
//!   selecting an implementation by field type ([`EditorRegistry`]).
//! - Implement the image editor: drop-zone, toolbar form, upload pipeline
//!   round trips, validation errors, save payload.
//! - Implement a plain-text editor sharing the same seam.
//!
//! ## Data flow
//! The session notifies an editor of each [`StateChange`] and forwards user
//! input and request completions. Editors mutate their region directly and
//! return [`Effect`]s (state requests, requests to send, saves) for the
//! session to execute after the editor call has returned.
//!
//! ## Ownership and lifetimes
//! Editors never hold a reference to their region; the session lends it for
//! the duration of one call. The image editor owns its upload pipeline.
//!
//! ## Error model
//! Editors surface every failure on a user-visible affordance (drop-zone,
//! error panel, notice). Unknown field types fail at registry lookup with
//! [`EditorError`].
//!
//! ## Re-entrancy
//! Editors never trigger transitions synchronously. A transition requested
//! while a state change is being handled is returned as
//! [`Effect::DeferState`] and applied at the end of the current event-loop
//! turn.

mod image;
mod plain_text;
mod region;

use std::collections::BTreeMap;

use quickedit_image_core::{EditorState, MetadataAttribute, SaveRequest, StateChange, UploadFile};
use quickedit_image_upload::{Completion, Dispatch, Endpoints, TransportError};
use thiserror::Error;

pub use image::ImageEditor;
pub use plain_text::{PLAIN_TEXT_EDITING_CLASS, PlainTextEditor};
pub use region::{EditBuffer, EditableRegion};

/// Field type handled by [`ImageEditor`].
pub const IMAGE_FIELD_TYPE: &str = "image";
/// Field type handled by [`PlainTextEditor`].
pub const PLAIN_TEXT_FIELD_TYPE: &str = "plain_text";

/// Work an editor asks the session to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Transition the owning field once the current handler has returned.
    RequestState(EditorState),
    /// Transition the owning field at the end of the current event-loop turn.
    DeferState(EditorState),
    /// Hand a request to the transport.
    Send(Dispatch),
    /// Hand a save request to the persistence collaborator.
    Save(SaveRequest),
    /// Flag the owning entity as holding an uncommitted edit.
    MarkEntityInTempStore,
    /// Open the host's file picker for this region.
    OpenFilePicker,
}

/// User input routed to a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionInput {
    /// A drag moves over the drop-zone.
    DragOver,
    /// A drag enters the drop-zone.
    DragEnter,
    /// A drag leaves the drop-zone.
    DragLeave,
    /// Files dropped on the drop-zone.
    Drop(Vec<UploadFile>),
    /// Click on the drop-zone.
    Click,
    /// Files chosen in the file picker.
    FilePicked(Vec<UploadFile>),
    /// Key released in a toolbar input.
    ToolbarKeyUp {
        /// Attribute of the input.
        attribute: MetadataAttribute,
        /// Input value after the key press.
        value: String,
    },
    /// Content pasted into a toolbar input.
    ToolbarPaste {
        /// Attribute of the input.
        attribute: MetadataAttribute,
        /// Input value after the paste.
        value: String,
    },
    /// Text content edited in place.
    TextEdited(String),
}

/// Whether the host must suppress the browser's default handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Prevent the default action and stop propagation.
    Stop,
    /// Leave the event alone.
    Continue,
}

/// Result of routing one input to an editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputResponse {
    /// Default-action handling for the host.
    pub propagation: Propagation,
    /// Work to perform.
    pub effects: Vec<Effect>,
}

impl InputResponse {
    /// Input not handled by this editor.
    pub fn ignored() -> Self {
        Self {
            propagation: Propagation::Continue,
            effects: Vec::new(),
        }
    }

    /// Input consumed; default action suppressed.
    pub fn stopped(effects: Vec<Effect>) -> Self {
        Self {
            propagation: Propagation::Stop,
            effects,
        }
    }

    /// Input observed; default action kept.
    pub fn observed(effects: Vec<Effect>) -> Self {
        Self {
            propagation: Propagation::Continue,
            effects,
        }
    }
}

/// Presentation hints the host applies around an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiSettings {
    /// Pad the edited element.
    pub padding: bool,
    /// Merge the editor's toolbar into the field toolbar.
    pub unified_toolbar: bool,
    /// Stretch the toolbar to the element width.
    pub full_width_toolbar: bool,
    /// Render the editor in a popup.
    pub popup: bool,
}

/// Polymorphic in-place editor, one implementation per field type.
pub trait InPlaceEditor {
    /// Field type this editor handles.
    fn field_type(&self) -> &'static str;

    /// Reacts to the region entering a new state.
    fn on_state_change(&mut self, region: &mut EditableRegion, change: StateChange) -> Vec<Effect>;

    /// Restores the region to the markup captured at activation.
    fn on_revert(&mut self, region: &mut EditableRegion);

    /// Presentation hints.
    fn ui_settings(&self) -> UiSettings;

    /// Routes user input.
    fn on_input(&mut self, region: &mut EditableRegion, input: RegionInput) -> InputResponse {
        let _ = (region, input);
        InputResponse::ignored()
    }

    /// Applies a request completion.
    fn on_completion(&mut self, region: &mut EditableRegion, completion: Completion) -> Vec<Effect> {
        let _ = (region, completion);
        Vec::new()
    }

    /// Reports a save that failed without a usable response.
    fn on_save_failed(&mut self, region: &mut EditableRegion, error: &TransportError) -> Vec<Effect>;
}

/// Dependencies shared by editor constructors.
#[derive(Debug, Clone)]
pub struct EditorContext {
    /// Backend endpoint layout.
    pub endpoints: Endpoints,
}

/// Editor constructor.
pub type EditorFactory = fn(&EditorContext) -> Box<dyn InPlaceEditor>;

/// Registry of editor constructors keyed by field type.
#[derive(Debug, Clone, Default)]
pub struct EditorRegistry {
    factories: BTreeMap<String, EditorFactory>,
}

impl EditorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the image and plain-text editors.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(IMAGE_FIELD_TYPE, |context| {
            Box::new(ImageEditor::new(context.endpoints.clone()))
        });
        registry.register(PLAIN_TEXT_FIELD_TYPE, |_| Box::new(PlainTextEditor::new()));
        registry
    }

    /// Registers `factory` for `field_type`, replacing any previous entry.
    pub fn register(&mut self, field_type: impl Into<String>, factory: EditorFactory) {
        self.factories.insert(field_type.into(), factory);
    }

    /// Registered field types, sorted.
    pub fn field_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Builds the editor for `field_type`.
    ///
    /// # Errors
    /// Returns [`EditorError::UnknownFieldType`] when nothing is registered.
    pub fn create(
        &self,
        field_type: &str,
        context: &EditorContext,
    ) -> Result<Box<dyn InPlaceEditor>, EditorError> {
        let factory = self
            .factories
            .get(field_type)
            .ok_or_else(|| EditorError::UnknownFieldType(field_type.to_string()))?;
        Ok(factory(context))
    }
}

/// Editor lookup errors.
#[derive(Debug, Error)]
pub enum EditorError {
    /// No editor handles the field type.
    #[error("no editor registered for field type {0:?}")]
    UnknownFieldType(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for the editor registry.

    use super::*;

    #[test]
    fn registry_selects_editor_by_field_type() {
        let registry = EditorRegistry::with_defaults();
        let context = EditorContext {
            endpoints: Endpoints::new("https://example.test/", "quickedit_image")
                .expect("valid base"),
        };

        let image = registry.create(IMAGE_FIELD_TYPE, &context).expect("image editor");
        assert_eq!(image.field_type(), IMAGE_FIELD_TYPE);
        assert!(!image.ui_settings().padding);

        let text = registry.create(PLAIN_TEXT_FIELD_TYPE, &context).expect("text editor");
        assert_eq!(text.field_type(), PLAIN_TEXT_FIELD_TYPE);
        assert!(text.ui_settings().padding);

        assert!(matches!(
            registry.create("entity_reference", &context),
            Err(EditorError::UnknownFieldType(_))
        ));
        assert_eq!(
            registry.field_types().collect::<Vec<_>>(),
            vec![IMAGE_FIELD_TYPE, PLAIN_TEXT_FIELD_TYPE]
        );
    }
}
