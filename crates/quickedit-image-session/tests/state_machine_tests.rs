//! Integration tests for the field-level state machine and its event loop.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{
    ORIGINAL_MARKUP, OPTIONAL_ALT_METADATA, RecordingPersistence, RecordingTransport,
    activate_with_metadata, harness, image_field, other_image_field,
};
use quickedit_image_core::{EditorState, StateChange, UploadFile};
use quickedit_image_editor::{
    Effect, EditableRegion, EditorRegistry, IMAGE_FIELD_TYPE, InPlaceEditor, RegionInput,
    UiSettings,
};
use quickedit_image_session::{EditingSession, SessionConfig, SessionError};
use quickedit_image_ui::{EDITING_CLASS, ToolbarGroup};
use quickedit_image_upload::{Completion, HttpReply, TransportError};

static HANDLERS_ON_STACK: AtomicUsize = AtomicUsize::new(0);
static DEEPEST_NESTING: AtomicUsize = AtomicUsize::new(0);

/// Editor that requests the next state from inside every handler.
struct EagerEditor;

impl InPlaceEditor for EagerEditor {
    fn field_type(&self) -> &'static str {
        "eager"
    }

    fn on_state_change(&mut self, _region: &mut EditableRegion, change: StateChange) -> Vec<Effect> {
        let nesting = HANDLERS_ON_STACK.fetch_add(1, Ordering::SeqCst) + 1;
        DEEPEST_NESTING.fetch_max(nesting, Ordering::SeqCst);
        let effects = match change.to {
            EditorState::Activating => vec![Effect::RequestState(EditorState::Active)],
            EditorState::Active => vec![Effect::RequestState(EditorState::Changed)],
            EditorState::Changed => vec![Effect::DeferState(EditorState::Saving)],
            _ => Vec::new(),
        };
        HANDLERS_ON_STACK.fetch_sub(1, Ordering::SeqCst);
        effects
    }

    fn on_revert(&mut self, region: &mut EditableRegion) {
        region.revert();
    }

    fn ui_settings(&self) -> UiSettings {
        UiSettings {
            padding: false,
            unified_toolbar: false,
            full_width_toolbar: false,
            popup: false,
        }
    }

    fn on_save_failed(&mut self, _region: &mut EditableRegion, _error: &TransportError) -> Vec<Effect> {
        Vec::new()
    }
}

#[test]
fn state_machine_tests_activating_defers_active_to_end_of_turn() {
    let field = image_field();
    let mut harness = harness(std::slice::from_ref(&field));
    harness.session.take_transition_log();

    harness
        .session
        .request_state(&field, EditorState::Activating)
        .expect("activation should succeed");

    let log = harness.session.transition_log();
    let steps: Vec<_> = log.iter().map(|record| (record.from, record.to)).collect();
    assert_eq!(
        steps,
        vec![
            (EditorState::Candidate, EditorState::Activating),
            (EditorState::Activating, EditorState::Active),
        ]
    );
    assert!(log.iter().all(|record| record.depth == 1));
    assert_eq!(harness.transport.sent().len(), 1);
}

#[test]
fn state_machine_tests_handlers_never_nest() {
    common::init_tracing();
    let mut registry = EditorRegistry::with_defaults();
    registry.register("eager", |_| Box::new(EagerEditor));
    let config = SessionConfig::new("https://cms.example.test/").expect("config should build");
    let mut session = EditingSession::with_registry(
        &config,
        registry,
        Arc::new(RecordingTransport::default()),
        Arc::new(RecordingPersistence::default()),
    )
    .expect("session should build");
    let field = image_field();
    session
        .attach(field.clone(), "eager", "text", ToolbarGroup::new("toolbar"))
        .expect("field should attach");
    session.begin_editing().expect("editing should begin");
    session
        .request_state(&field, EditorState::Activating)
        .expect("activation should succeed");

    assert_eq!(session.state(&field), Some(EditorState::Saving));
    assert_eq!(DEEPEST_NESTING.load(Ordering::SeqCst), 1);
    assert!(session.transition_log().iter().all(|record| record.depth == 1));
    assert_eq!(
        session.editor(&field).map(|editor| editor.field_type()),
        Some("eager")
    );
}

#[test]
fn state_machine_tests_candidate_tears_down_chrome_from_every_state() {
    let reachable: [&[EditorState]; 4] = [
        &[],
        &[EditorState::Changed],
        &[EditorState::Changed, EditorState::Invalid],
        &[EditorState::Changed, EditorState::Saving],
    ];

    for path in reachable {
        let field = image_field();
        let mut harness = harness(std::slice::from_ref(&field));
        activate_with_metadata(&mut harness, &field, OPTIONAL_ALT_METADATA);
        for state in path {
            harness
                .session
                .request_state(&field, *state)
                .expect("path step should be legal");
        }

        harness
            .session
            .request_state(&field, EditorState::Candidate)
            .expect("candidate should be reachable");
        let region = harness.session.region(&field).expect("region");
        assert!(region.dropzone().is_none(), "drop-zone left after {path:?}");
        assert!(!region.has_class(EDITING_CLASS), "editing class left after {path:?}");
        assert!(region.toolbar().error_panel().is_none());
    }
}

#[test]
fn state_machine_tests_revert_restores_activation_markup_in_any_state() {
    let field = image_field();
    let mut harness = harness(std::slice::from_ref(&field));
    harness.session.revert(&field).expect("revert before activation");
    assert_eq!(
        harness.session.region(&field).expect("region").content(),
        ORIGINAL_MARKUP
    );

    activate_with_metadata(&mut harness, &field, OPTIONAL_ALT_METADATA);
    harness
        .session
        .input(
            &field,
            RegionInput::Drop(vec![UploadFile::new("a.jpg", "image/jpeg", vec![1]).expect("file")]),
        )
        .expect("drop should be handled");
    let ticket = harness.transport.last_ticket("POST");
    harness
        .session
        .complete(Completion {
            ticket,
            result: Ok(HttpReply::ok(
                r#"{"fid":7,"html":"<div data-quickedit-field-id=\"f\"><img src=\"/f/7.jpg\"></div>"}"#,
            )),
        })
        .expect("completion should apply");
    assert_ne!(harness.session.region(&field).expect("region").content(), ORIGINAL_MARKUP);

    for _ in 0..2 {
        harness.session.revert(&field).expect("revert should succeed");
        let region = harness.session.region(&field).expect("region");
        assert_eq!(region.render_inner(), ORIGINAL_MARKUP);
        assert!(region.edit().is_empty());
    }
}

#[test]
fn state_machine_tests_single_active_region_per_page() {
    let first = image_field();
    let second = other_image_field();
    let mut harness = harness(&[first.clone(), second.clone()]);

    activate_with_metadata(&mut harness, &first, OPTIONAL_ALT_METADATA);
    activate_with_metadata(&mut harness, &second, OPTIONAL_ALT_METADATA);
    assert_eq!(harness.session.state(&first), Some(EditorState::Candidate));
    assert_eq!(harness.session.state(&second), Some(EditorState::Active));
    assert_eq!(harness.session.focused_field(), Some(&second));

    harness
        .session
        .request_state(&second, EditorState::Changed)
        .expect("changed should be legal");
    let refused = harness.session.request_state(&first, EditorState::Activating);
    assert!(matches!(
        refused,
        Err(SessionError::FocusHeld { ref holder, .. }) if *holder == second
    ));
    assert_eq!(harness.session.state(&first), Some(EditorState::Candidate));
}

#[test]
fn state_machine_tests_rejects_illegal_and_ignores_repeated_requests() {
    let field = image_field();
    let mut harness = harness(std::slice::from_ref(&field));
    harness.session.take_transition_log();

    harness
        .session
        .request_state(&field, EditorState::Candidate)
        .expect("same-state request is a no-op");
    assert!(harness.session.transition_log().is_empty());

    let result = harness.session.request_state(&field, EditorState::Saved);
    assert!(matches!(
        result,
        Err(SessionError::IllegalTransition {
            from: EditorState::Candidate,
            to: EditorState::Saved,
            ..
        })
    ));

    let unknown = other_image_field();
    assert!(matches!(
        harness.session.request_state(&unknown, EditorState::Candidate),
        Err(SessionError::UnknownField(_))
    ));
    assert!(matches!(
        harness
            .session
            .attach(field.clone(), IMAGE_FIELD_TYPE, "x", ToolbarGroup::new("t")),
        Err(SessionError::DuplicateField(_))
    ));
    assert!(matches!(
        harness
            .session
            .attach(unknown, "video", "x", ToolbarGroup::new("t")),
        Err(SessionError::Editor(_))
    ));
}

#[test]
fn state_machine_tests_detach_restores_markup_and_drops_late_completions() {
    let field = image_field();
    let mut harness = harness(std::slice::from_ref(&field));
    harness
        .session
        .request_state(&field, EditorState::Activating)
        .expect("activation should succeed");
    let ticket = harness.transport.last_ticket("GET");

    let region = harness.session.detach(&field).expect("detach should succeed");
    assert_eq!(region.state(), EditorState::Inactive);
    assert_eq!(region.render_inner(), ORIGINAL_MARKUP);

    harness
        .session
        .complete(Completion {
            ticket,
            result: Ok(HttpReply::ok(OPTIONAL_ALT_METADATA)),
        })
        .expect("late completion should be dropped");
    assert!(harness.session.region(&field).is_none());
}
