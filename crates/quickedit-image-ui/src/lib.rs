#![warn(missing_docs)]
//! # quickedit-image-ui
//!
//! ## Purpose
//! Defines the headless view model rendered around an editable image region:
//! the drop-zone, the metadata toolbar form, and the validation-error panel.
//!
//! ## Responsibilities
//! - Keep drop-zone rendering idempotent (restyle in place, never duplicate).
//! - Build the alt/title toolbar form from server field metadata.
//! - Render every element to HTML with escaped user-visible text.
//! - Extract the field container's inner markup from a rendered field.
//!
//! ## Data flow
//! Editor transitions and pipeline outcomes mutate [`DropZone`] and
//! [`ToolbarGroup`] values; hosts call `render()` to obtain markup.
//!
//! ## Ownership and lifetimes
//! The toolbar group is handed to a region at construction and owned by it, so
//! the form cached inside survives between activations of the same field.
//!
//! ## Error model
//! Rendering is infallible. Fragment extraction returns [`FragmentError`] for
//! markup the parser cannot tokenize.

mod fragment;

use std::borrow::Cow;

use quick_xml::escape::escape;
use quickedit_image_contract::FieldMetadata;
use quickedit_image_core::{ExtraPayload, MetadataAttribute};

pub use fragment::{FIELD_ID_ATTRIBUTE, FragmentError, extract_field_fragment};

/// Class of the drop-zone element.
pub const DROPZONE_CLASS: &str = "quickedit-image-dropzone";
/// Class marking a region as being edited by the image editor.
pub const EDITING_CLASS: &str = "quickedit-image-element";
/// Class marking a region as carrying validation errors.
pub const VALIDATION_ERROR_CLASS: &str = "quickedit-validation-error";
/// Class of the toolbar metadata form.
pub const TOOLBAR_FORM_CLASS: &str = "quickedit-image-field-info";
/// Class of the validation-error panel.
pub const ERRORS_CLASS: &str = "quickedit-image-errors";
/// Transient class toggled while a file is dragged over the drop-zone.
pub const HOVER_CLASS: &str = "hover";

/// Drop-zone prompt shown when the region becomes active.
pub const DROPZONE_PROMPT: &str = "Drag file here or click to upload";
/// Generic drop-zone message for transport failures.
pub const SERVER_ERROR_MESSAGE: &str = "A server error has occurred.";
/// Drop-zone message for drops carrying several files.
pub const SINGLE_FILE_MESSAGE: &str = "Only one file can be uploaded at a time.";

/// Drop-zone text shown while `file_name` uploads.
pub fn uploading_message(file_name: &str) -> String {
    format!("Uploading {file_name}...")
}

/// Validation message for an empty required toolbar input.
pub fn required_message(attribute: MetadataAttribute) -> String {
    format!("{} field is required.", attribute.label())
}

/// Escapes text for inclusion in HTML content or quoted attributes.
pub fn escape_html(raw: &str) -> Cow<'_, str> {
    escape(raw)
}

/// Functional visual state of the drop-zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropZoneState {
    /// Waiting for a file.
    Upload,
    /// Request in flight.
    Loading,
    /// Last attempt failed.
    Error,
}

impl DropZoneState {
    /// CSS classes applied next to [`DROPZONE_CLASS`].
    pub fn classes(self) -> &'static str {
        match self {
            DropZoneState::Upload => "upload",
            DropZoneState::Loading => "upload loading",
            DropZoneState::Error => "error",
        }
    }
}

/// Drop-zone affordance rendered inside an active region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropZone {
    state: DropZoneState,
    text: String,
    hover: bool,
}

impl DropZone {
    /// Current functional state.
    pub fn state(&self) -> DropZoneState {
        self.state
    }

    /// Current message.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the hover class is set.
    pub fn is_hovered(&self) -> bool {
        self.hover
    }

    /// Toggles the transient hover class without touching the state.
    pub fn set_hover(&mut self, hover: bool) {
        self.hover = hover;
    }

    /// Renders the drop-zone element.
    pub fn render(&self) -> String {
        let hover = if self.hover {
            format!(" {HOVER_CLASS}")
        } else {
            String::new()
        };
        format!(
            "<div class=\"{DROPZONE_CLASS} {}{hover}\"><i class=\"quickedit-image-icon\"></i><span class=\"quickedit-image-text\">{}</span></div>",
            self.state.classes(),
            escape_html(&self.text),
        )
    }
}

/// Renders the drop-zone into `slot`.
///
/// An existing drop-zone is restyled and its text replaced in place (which
/// also clears the hover class); otherwise a new one is created.
pub fn render_dropzone(
    slot: &mut Option<DropZone>,
    state: DropZoneState,
    text: impl Into<String>,
) -> &mut DropZone {
    let zone = slot.get_or_insert_with(|| DropZone {
        state,
        text: String::new(),
        hover: false,
    });
    zone.state = state;
    zone.text = text.into();
    zone.hover = false;
    zone
}

/// One text input of the toolbar form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarInput {
    /// Attribute edited by this input.
    pub attribute: MetadataAttribute,
    /// Current input value.
    pub value: String,
    /// Placeholder (server value at fetch time).
    pub placeholder: String,
    /// Whether the input carries the `required` attribute.
    pub required: bool,
}

impl ToolbarInput {
    fn render(&self) -> String {
        let name = self.attribute.name();
        let (label_class, required) = if self.required {
            (" class=\"form-required\"", " required")
        } else {
            ("", "")
        };
        format!(
            "<label for=\"{name}\"{label_class}>{}</label><input type=\"text\" placeholder=\"{}\" value=\"{}\" name=\"{name}\"{required}/>",
            self.attribute.label(),
            escape_html(&self.placeholder),
            escape_html(&self.value),
        )
    }
}

/// Toolbar form editing the image's text attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolbarForm {
    inputs: Vec<ToolbarInput>,
}

impl ToolbarForm {
    /// Builds one input per attribute the field exposes.
    pub fn from_metadata(metadata: &FieldMetadata) -> Self {
        let inputs = MetadataAttribute::ALL
            .into_iter()
            .filter(|attribute| metadata.has_field(*attribute))
            .map(|attribute| ToolbarInput {
                attribute,
                value: metadata.value(attribute).to_string(),
                placeholder: metadata.value(attribute).to_string(),
                required: metadata.is_required(attribute),
            })
            .collect();
        Self { inputs }
    }

    /// Inputs in render order.
    pub fn inputs(&self) -> &[ToolbarInput] {
        &self.inputs
    }

    /// Looks up the input for `attribute`.
    pub fn input(&self, attribute: MetadataAttribute) -> Option<&ToolbarInput> {
        self.inputs.iter().find(|input| input.attribute == attribute)
    }

    /// Replaces the value of the input for `attribute`.
    ///
    /// Returns `false` when the form has no such input.
    pub fn set_value(&mut self, attribute: MetadataAttribute, value: impl Into<String>) -> bool {
        match self.inputs.iter_mut().find(|input| input.attribute == attribute) {
            Some(input) => {
                input.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Required inputs that are currently blank.
    pub fn missing_required(&self) -> Vec<MetadataAttribute> {
        self.inputs
            .iter()
            .filter(|input| input.required && input.value.trim().is_empty())
            .map(|input| input.attribute)
            .collect()
    }

    /// Current input values keyed by attribute name.
    pub fn extra_payload(&self) -> ExtraPayload {
        let mut payload = ExtraPayload::new();
        for input in &self.inputs {
            payload.insert(input.attribute.name(), input.value.clone());
        }
        payload
    }

    /// Renders the form element.
    pub fn render(&self) -> String {
        let inputs: String = self.inputs.iter().map(ToolbarInput::render).collect();
        format!("<form class=\"{TOOLBAR_FORM_CLASS}\">{inputs}</form>")
    }
}

/// Inline panel listing validation errors.
///
/// Messages are server-rendered markup and are inserted verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPanel {
    errors: Vec<String>,
}

impl ErrorPanel {
    /// Messages in display order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Renders the panel element.
    pub fn render(&self) -> String {
        let items: String = self
            .errors
            .iter()
            .map(|error| format!("<div class=\"quickedit-image-error\">{error}</div>"))
            .collect();
        format!("<div class=\"{ERRORS_CLASS}\">{items}</div>")
    }
}

/// Host toolbar group a region renders its form and errors into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolbarGroup {
    id: String,
    form: Option<ToolbarForm>,
    errors: Option<ErrorPanel>,
}

impl ToolbarGroup {
    /// Creates an empty group with the host element id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            form: None,
            errors: None,
        }
    }

    /// Host element id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Rendered form, if metadata was fetched already.
    pub fn form(&self) -> Option<&ToolbarForm> {
        self.form.as_ref()
    }

    /// Mutable access to the rendered form.
    pub fn form_mut(&mut self) -> Option<&mut ToolbarForm> {
        self.form.as_mut()
    }

    /// Returns `true` when a form is already rendered.
    pub fn has_form(&self) -> bool {
        self.form.is_some()
    }

    /// Appends the form, replacing a previous one.
    pub fn insert_form(&mut self, form: ToolbarForm) {
        self.form = Some(form);
    }

    /// Displayed error panel, if any.
    pub fn error_panel(&self) -> Option<&ErrorPanel> {
        self.errors.as_ref()
    }

    /// Shows `errors` in the panel, replacing any previous list.
    pub fn show_errors(&mut self, errors: &[String]) {
        self.errors = Some(ErrorPanel {
            errors: errors.to_vec(),
        });
    }

    /// Removes the error panel.
    pub fn clear_errors(&mut self) {
        self.errors = None;
    }

    /// Renders the group container with its children.
    pub fn render(&self) -> String {
        let form = self.form.as_ref().map(ToolbarForm::render).unwrap_or_default();
        let errors = self.errors.as_ref().map(ErrorPanel::render).unwrap_or_default();
        format!("<div id=\"{}\">{form}{errors}</div>", escape_html(&self.id))
    }
}
