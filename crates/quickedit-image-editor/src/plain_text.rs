//! In-place editor for single-line text fields.

use quickedit_image_core::{EditorState, ExtraPayload, FieldValue, SaveRequest, StateChange};
use quickedit_image_ui::SERVER_ERROR_MESSAGE;
use quickedit_image_upload::TransportError;

use crate::{
    Effect, EditableRegion, InPlaceEditor, InputResponse, PLAIN_TEXT_FIELD_TYPE, RegionInput,
    UiSettings,
};

/// Class marking a region as being edited by the plain-text editor.
pub const PLAIN_TEXT_EDITING_CLASS: &str = "quickedit-plain-text-element";

/// Editor for plain-text fields edited directly in the region.
#[derive(Debug, Clone, Default)]
pub struct PlainTextEditor;

impl PlainTextEditor {
    /// Creates the editor.
    pub fn new() -> Self {
        Self
    }
}

impl InPlaceEditor for PlainTextEditor {
    fn field_type(&self) -> &'static str {
        PLAIN_TEXT_FIELD_TYPE
    }

    fn on_state_change(&mut self, region: &mut EditableRegion, change: StateChange) -> Vec<Effect> {
        match change.to {
            EditorState::Candidate if change.from != EditorState::Inactive => {
                region.remove_class(PLAIN_TEXT_EDITING_CLASS);
                region.set_notice(None);
                if change.from == EditorState::Invalid {
                    region.remove_validation_errors();
                }
                Vec::new()
            }
            EditorState::Activating => {
                region.capture_original();
                vec![Effect::DeferState(EditorState::Active)]
            }
            EditorState::Active => {
                region.add_class(PLAIN_TEXT_EDITING_CLASS);
                Vec::new()
            }
            EditorState::Changed if change.from == EditorState::Invalid => {
                region.remove_validation_errors();
                Vec::new()
            }
            EditorState::Saving => {
                if change.from == EditorState::Invalid {
                    region.remove_validation_errors();
                }
                let markup = region
                    .edit()
                    .text
                    .clone()
                    .unwrap_or_else(|| region.content().to_string());
                vec![Effect::Save(SaveRequest {
                    field_id: region.field_id().clone(),
                    value: FieldValue {
                        markup,
                        uploaded_file_id: None,
                    },
                    extra: ExtraPayload::new(),
                })]
            }
            EditorState::Saved => {
                region.commit_edits();
                Vec::new()
            }
            EditorState::Invalid => {
                region.show_validation_errors();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn on_revert(&mut self, region: &mut EditableRegion) {
        region.revert();
        region.set_notice(None);
    }

    fn ui_settings(&self) -> UiSettings {
        UiSettings {
            padding: true,
            unified_toolbar: false,
            full_width_toolbar: false,
            popup: false,
        }
    }

    fn on_input(&mut self, region: &mut EditableRegion, input: RegionInput) -> InputResponse {
        let RegionInput::TextEdited(text) = input else {
            return InputResponse::ignored();
        };
        if !region.state().is_editing() {
            return InputResponse::ignored();
        }

        region.edit_mut().text = Some(text);
        if matches!(region.state(), EditorState::Active | EditorState::Invalid) {
            InputResponse::observed(vec![Effect::RequestState(EditorState::Changed)])
        } else {
            InputResponse::observed(Vec::new())
        }
    }

    fn on_save_failed(&mut self, region: &mut EditableRegion, error: &TransportError) -> Vec<Effect> {
        tracing::warn!(field = %region.field_id(), %error, "save failed");
        region.set_notice(Some(SERVER_ERROR_MESSAGE.to_string()));
        vec![Effect::RequestState(EditorState::Changed)]
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the plain-text editor.

    use quickedit_image_ui::ToolbarGroup;

    use super::*;

    #[test]
    fn edited_text_is_saved_and_committed() {
        let mut editor = PlainTextEditor::new();
        let field = "node/3/title/en/full".parse().expect("field id should parse");
        let mut region = EditableRegion::new(field, "Old title", ToolbarGroup::new("toolbar-3"));

        for state in [EditorState::Candidate, EditorState::Activating, EditorState::Active] {
            let change = region.enter(state);
            editor.on_state_change(&mut region, change);
        }
        let response = editor.on_input(&mut region, RegionInput::TextEdited("New title".to_string()));
        assert_eq!(response.effects, vec![Effect::RequestState(EditorState::Changed)]);
        assert_eq!(region.content(), "Old title");

        region.enter(EditorState::Changed);
        let change = region.enter(EditorState::Saving);
        let effects = editor.on_state_change(&mut region, change);
        let [Effect::Save(request)] = effects.as_slice() else {
            panic!("expected a save effect, got {effects:?}");
        };
        assert_eq!(request.value.markup, "New title");
        assert!(request.extra.is_empty());

        let change = region.enter(EditorState::Saved);
        editor.on_state_change(&mut region, change);
        assert_eq!(region.content(), "New title");
        assert!(region.edit().is_empty());
    }
}
