//! The editable region bound to one field instance.

use std::collections::BTreeSet;

use quickedit_image_core::{EditorState, FieldId, StateChange};
use quickedit_image_ui::{DropZone, ToolbarGroup, VALIDATION_ERROR_CLASS};

/// Local edits not yet confirmed by the backend's save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditBuffer {
    /// File id of the last accepted upload.
    pub uploaded_file_id: Option<u64>,
    /// Edited text, for text editors.
    pub text: Option<String>,
}

impl EditBuffer {
    /// Returns `true` when nothing was edited.
    pub fn is_empty(&self) -> bool {
        self.uploaded_file_id.is_none() && self.text.is_none()
    }
}

/// UI element bound to one field instance.
///
/// `content` is the display model: it changes only through server-confirmed
/// markup, revert, or a committed save. In-progress edits live in the
/// [`EditBuffer`].
#[derive(Debug, Clone)]
pub struct EditableRegion {
    field_id: FieldId,
    state: EditorState,
    original_value: String,
    content: String,
    edit: EditBuffer,
    validation_errors: Vec<String>,
    classes: BTreeSet<String>,
    dropzone: Option<DropZone>,
    toolbar: ToolbarGroup,
    notice: Option<String>,
}

impl EditableRegion {
    /// Binds a region to `field_id`, rendered as `markup`, with the host
    /// toolbar group it renders its form into.
    pub fn new(field_id: FieldId, markup: impl Into<String>, toolbar: ToolbarGroup) -> Self {
        let content = markup.into().trim().to_string();
        Self {
            field_id,
            state: EditorState::Inactive,
            original_value: content.clone(),
            content,
            edit: EditBuffer::default(),
            validation_errors: Vec::new(),
            classes: BTreeSet::new(),
            dropzone: None,
            toolbar,
            notice: None,
        }
    }

    /// Field this region edits.
    pub fn field_id(&self) -> &FieldId {
        &self.field_id
    }

    /// Current interaction state.
    pub fn state(&self) -> EditorState {
        self.state
    }

    /// Moves to `to` and returns the change to notify.
    ///
    /// Only the session coordinator calls this; editors request states through
    /// effects.
    pub fn enter(&mut self, to: EditorState) -> StateChange {
        let change = StateChange {
            from: self.state,
            to,
        };
        self.state = to;
        change
    }

    /// Markup captured at the most recent activation.
    pub fn original_value(&self) -> &str {
        &self.original_value
    }

    /// Server-confirmed markup currently displayed.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Snapshots the displayed markup for a later revert.
    pub fn capture_original(&mut self) {
        self.original_value = self.content.clone();
    }

    /// Replaces the displayed markup with server-confirmed `markup`.
    pub fn replace_content(&mut self, markup: impl Into<String>) {
        self.content = markup.into();
    }

    /// Restores the markup captured at activation and drops local edits.
    ///
    /// Idempotent and valid in every state.
    pub fn revert(&mut self) {
        self.content = self.original_value.clone();
        self.dropzone = None;
        self.edit = EditBuffer::default();
    }

    /// Moves confirmed edits into the display model after a successful save.
    pub fn commit_edits(&mut self) {
        if let Some(text) = self.edit.text.take() {
            self.content = text;
        }
        self.edit = EditBuffer::default();
    }

    /// Local edit buffer.
    pub fn edit(&self) -> &EditBuffer {
        &self.edit
    }

    /// Mutable local edit buffer.
    pub fn edit_mut(&mut self) -> &mut EditBuffer {
        &mut self.edit
    }

    /// Stored validation errors, in server order.
    pub fn validation_errors(&self) -> &[String] {
        &self.validation_errors
    }

    /// Replaces the stored validation errors.
    pub fn set_validation_errors(&mut self, errors: Vec<String>) {
        self.validation_errors = errors;
    }

    /// Renders the stored errors into the toolbar and flags the region.
    ///
    /// An empty list leaves no panel behind.
    pub fn show_validation_errors(&mut self) {
        if self.validation_errors.is_empty() {
            self.toolbar.clear_errors();
        } else {
            self.toolbar.show_errors(&self.validation_errors);
        }
        self.add_class(VALIDATION_ERROR_CLASS);
    }

    /// Removes the error panel, the invalid flag, and the stored errors.
    pub fn remove_validation_errors(&mut self) {
        self.toolbar.clear_errors();
        self.remove_class(VALIDATION_ERROR_CLASS);
        self.validation_errors.clear();
    }

    /// Returns `true` when `class` is set on the region element.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    /// Adds a class to the region element.
    pub fn add_class(&mut self, class: &str) {
        self.classes.insert(class.to_string());
    }

    /// Removes a class from the region element.
    pub fn remove_class(&mut self, class: &str) {
        self.classes.remove(class);
    }

    /// Classes on the region element, sorted.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    /// Drop-zone, when rendered.
    pub fn dropzone(&self) -> Option<&DropZone> {
        self.dropzone.as_ref()
    }

    /// Slot the drop-zone renders into.
    pub fn dropzone_slot(&mut self) -> &mut Option<DropZone> {
        &mut self.dropzone
    }

    /// Removes the drop-zone.
    pub fn remove_dropzone(&mut self) {
        self.dropzone = None;
    }

    /// Host toolbar group.
    pub fn toolbar(&self) -> &ToolbarGroup {
        &self.toolbar
    }

    /// Mutable host toolbar group.
    pub fn toolbar_mut(&mut self) -> &mut ToolbarGroup {
        &mut self.toolbar
    }

    /// Status notice shown by editors without a drop-zone.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Sets or clears the status notice.
    pub fn set_notice(&mut self, notice: Option<String>) {
        self.notice = notice;
    }

    /// Renders the region's inner markup: content followed by the drop-zone.
    pub fn render_inner(&self) -> String {
        match &self.dropzone {
            Some(dropzone) => format!("{}{}", self.content, dropzone.render()),
            None => self.content.clone(),
        }
    }
}
