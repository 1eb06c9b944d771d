//! In-place editor for image fields.
//!
//! The editor renders the drop-zone and toolbar form, hands picked files to
//! its [`UploadPipeline`], and folds completions back into the region.

use quickedit_image_core::{
    EditorState, FieldValue, MetadataAttribute, SaveRequest, StateChange, UploadFile,
};
use quickedit_image_ui::{
    DROPZONE_PROMPT, DropZoneState, EDITING_CLASS, SERVER_ERROR_MESSAGE, SINGLE_FILE_MESSAGE,
    ToolbarForm, render_dropzone, required_message, uploading_message,
};
use quickedit_image_upload::{
    Completion, Endpoints, PipelineOutcome, RequestKind, TransportError, UploadPipeline,
    UploadStart,
};

use crate::{
    Effect, EditableRegion, IMAGE_FIELD_TYPE, InPlaceEditor, InputResponse, RegionInput,
    UiSettings,
};

/// Editor for single-value image fields.
#[derive(Debug, Clone)]
pub struct ImageEditor {
    pipeline: UploadPipeline,
}

impl ImageEditor {
    /// Creates an editor issuing requests against `endpoints`.
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            pipeline: UploadPipeline::new(endpoints),
        }
    }

    /// Upload pipeline driven by this editor.
    pub fn pipeline(&self) -> &UploadPipeline {
        &self.pipeline
    }

    fn activate(&mut self, region: &mut EditableRegion) -> Vec<Effect> {
        region.add_class(EDITING_CLASS);
        render_dropzone(region.dropzone_slot(), DropZoneState::Upload, DROPZONE_PROMPT);

        if region.toolbar().has_form() {
            return Vec::new();
        }

        match self.pipeline.begin_metadata_fetch(region.field_id()) {
            Ok(Some(dispatch)) => vec![Effect::Send(dispatch)],
            Ok(None) => Vec::new(),
            Err(error) => {
                tracing::warn!(field = %region.field_id(), %error, "metadata fetch not started");
                render_dropzone(region.dropzone_slot(), DropZoneState::Error, SERVER_ERROR_MESSAGE);
                Vec::new()
            }
        }
    }

    fn save(&mut self, region: &mut EditableRegion) -> Vec<Effect> {
        let form = region.toolbar().form().cloned().unwrap_or_default();

        let missing = form.missing_required();
        if !missing.is_empty() {
            tracing::debug!(field = %region.field_id(), missing = missing.len(), "required metadata missing");
            region.set_validation_errors(missing.into_iter().map(required_message).collect());
            return vec![Effect::DeferState(EditorState::Invalid)];
        }

        vec![Effect::Save(SaveRequest {
            field_id: region.field_id().clone(),
            value: FieldValue {
                markup: region.content().to_string(),
                uploaded_file_id: region.edit().uploaded_file_id,
            },
            extra: form.extra_payload(),
        })]
    }

    fn accept_files(&mut self, region: &mut EditableRegion, mut files: Vec<UploadFile>) -> Vec<Effect> {
        if files.len() > 1 {
            render_dropzone(region.dropzone_slot(), DropZoneState::Error, SINGLE_FILE_MESSAGE);
            return Vec::new();
        }
        let Some(file) = files.pop() else {
            return Vec::new();
        };

        match self.pipeline.begin_upload(region.field_id(), &file) {
            Ok(UploadStart::Started(dispatch)) => {
                render_dropzone(
                    region.dropzone_slot(),
                    DropZoneState::Loading,
                    uploading_message(&file.name),
                );
                vec![Effect::Send(dispatch)]
            }
            Ok(UploadStart::Ignored { .. }) => Vec::new(),
            Err(error) => {
                tracing::warn!(field = %region.field_id(), %error, "upload not started");
                render_dropzone(region.dropzone_slot(), DropZoneState::Error, SERVER_ERROR_MESSAGE);
                Vec::new()
            }
        }
    }

    fn edit_metadata(
        &mut self,
        region: &mut EditableRegion,
        attribute: MetadataAttribute,
        value: String,
    ) -> InputResponse {
        let Some(form) = region.toolbar_mut().form_mut() else {
            return InputResponse::ignored();
        };
        form.set_value(attribute, value);

        if matches!(region.state(), EditorState::Active | EditorState::Invalid) {
            InputResponse::observed(vec![Effect::RequestState(EditorState::Changed)])
        } else {
            InputResponse::observed(Vec::new())
        }
    }
}

impl InPlaceEditor for ImageEditor {
    fn field_type(&self) -> &'static str {
        IMAGE_FIELD_TYPE
    }

    fn on_state_change(&mut self, region: &mut EditableRegion, change: StateChange) -> Vec<Effect> {
        match change.to {
            EditorState::Inactive | EditorState::Highlighted => Vec::new(),
            EditorState::Changed => {
                if change.from == EditorState::Invalid {
                    region.remove_validation_errors();
                }
                Vec::new()
            }
            EditorState::Candidate => {
                if change.from != EditorState::Inactive {
                    region.remove_dropzone();
                    region.remove_class(EDITING_CLASS);
                    self.pipeline.abandon();
                    if change.from == EditorState::Invalid {
                        region.remove_validation_errors();
                    }
                }
                Vec::new()
            }
            EditorState::Activating => {
                region.capture_original();
                vec![Effect::DeferState(EditorState::Active)]
            }
            EditorState::Active => self.activate(region),
            EditorState::Saving => {
                if change.from == EditorState::Invalid {
                    region.remove_validation_errors();
                }
                self.save(region)
            }
            EditorState::Saved => {
                region.commit_edits();
                Vec::new()
            }
            EditorState::Invalid => {
                region.show_validation_errors();
                Vec::new()
            }
        }
    }

    fn on_revert(&mut self, region: &mut EditableRegion) {
        self.pipeline.abandon();
        region.revert();
    }

    fn ui_settings(&self) -> UiSettings {
        UiSettings {
            padding: false,
            unified_toolbar: true,
            full_width_toolbar: true,
            popup: false,
        }
    }

    fn on_input(&mut self, region: &mut EditableRegion, input: RegionInput) -> InputResponse {
        match input {
            RegionInput::ToolbarKeyUp { attribute, value }
            | RegionInput::ToolbarPaste { attribute, value } => {
                self.edit_metadata(region, attribute, value)
            }
            RegionInput::TextEdited(_) => InputResponse::ignored(),
            _ if region.dropzone().is_none() => InputResponse::ignored(),
            RegionInput::DragOver => InputResponse::stopped(Vec::new()),
            RegionInput::DragEnter => set_hover(region, true),
            RegionInput::DragLeave => set_hover(region, false),
            RegionInput::Click => InputResponse::stopped(vec![Effect::OpenFilePicker]),
            RegionInput::Drop(files) | RegionInput::FilePicked(files) => {
                InputResponse::stopped(self.accept_files(region, files))
            }
        }
    }

    fn on_completion(&mut self, region: &mut EditableRegion, completion: Completion) -> Vec<Effect> {
        let ticket = completion.ticket;
        let outcome = self.pipeline.complete(completion);
        if outcome != PipelineOutcome::Stale && !region.state().is_editing() {
            tracing::debug!(
                field = %region.field_id(),
                ticket = ticket.get(),
                state = %region.state(),
                "completion ignored outside editing states"
            );
            return Vec::new();
        }

        match outcome {
            PipelineOutcome::Stale => Vec::new(),
            PipelineOutcome::Uploaded { fid, content } => {
                tracing::info!(field = %region.field_id(), fid, "upload accepted");
                region.replace_content(content);
                region.edit_mut().uploaded_file_id = Some(fid);
                region.remove_validation_errors();
                render_dropzone(region.dropzone_slot(), DropZoneState::Upload, DROPZONE_PROMPT);
                vec![
                    Effect::RequestState(EditorState::Changed),
                    Effect::MarkEntityInTempStore,
                ]
            }
            PipelineOutcome::Rejected(rejection) => {
                tracing::debug!(
                    field = %region.field_id(),
                    errors = rejection.errors.len(),
                    "upload rejected by validation"
                );
                render_dropzone(region.dropzone_slot(), DropZoneState::Error, rejection.main_error);
                if !rejection.errors.is_empty() {
                    region.set_validation_errors(rejection.errors);
                }
                if region.state() == EditorState::Invalid {
                    region.show_validation_errors();
                    Vec::new()
                } else {
                    vec![Effect::RequestState(EditorState::Invalid)]
                }
            }
            PipelineOutcome::MetadataLoaded(metadata) => {
                if !region.toolbar().has_form() {
                    region
                        .toolbar_mut()
                        .insert_form(ToolbarForm::from_metadata(&metadata));
                }
                Vec::new()
            }
            PipelineOutcome::Failed { kind, error } => {
                if kind == RequestKind::FetchMetadata {
                    tracing::warn!(field = %region.field_id(), %error, "toolbar metadata unavailable");
                }
                render_dropzone(region.dropzone_slot(), DropZoneState::Error, SERVER_ERROR_MESSAGE);
                Vec::new()
            }
        }
    }

    fn on_save_failed(&mut self, region: &mut EditableRegion, error: &TransportError) -> Vec<Effect> {
        tracing::warn!(field = %region.field_id(), %error, "save failed");
        render_dropzone(region.dropzone_slot(), DropZoneState::Error, SERVER_ERROR_MESSAGE);
        vec![Effect::RequestState(EditorState::Changed)]
    }
}

fn set_hover(region: &mut EditableRegion, hover: bool) -> InputResponse {
    if let Some(zone) = region.dropzone_slot().as_mut() {
        zone.set_hover(hover);
    }
    InputResponse::stopped(Vec::new())
}
