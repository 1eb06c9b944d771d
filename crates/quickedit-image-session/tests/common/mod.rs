//! Shared fixtures for session integration tests.

use std::sync::{Arc, Mutex};

use quickedit_image_core::{EditorState, FieldId, SaveRequest};
use quickedit_image_session::{EditingSession, FieldPersistence, SessionConfig};
use quickedit_image_ui::ToolbarGroup;
use quickedit_image_upload::{
    BackendRequest, Completion, HttpReply, RequestTicket, Transport, TransportError,
};

/// Markup of the image field before any edit.
#[allow(dead_code)]
pub const ORIGINAL_MARKUP: &str = "<img src=\"/f/1.jpg\" alt=\"\">";

/// Transport recording every request instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(RequestTicket, BackendRequest)>>,
    fail_with: Mutex<Option<TransportError>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    /// Requests sent so far.
    pub fn sent(&self) -> Vec<(RequestTicket, BackendRequest)> {
        self.sent.lock().expect("transport lock should work").clone()
    }

    /// Ticket of the most recent request sent with `method`.
    pub fn last_ticket(&self, method: &str) -> RequestTicket {
        self.sent()
            .iter()
            .rev()
            .find(|(_, request)| request.method() == method)
            .map(|(ticket, _)| *ticket)
            .expect("a matching request should have been sent")
    }

    /// Makes every following send fail with `error`.
    pub fn fail_with(&self, error: TransportError) {
        *self.fail_with.lock().expect("transport lock should work") = Some(error);
    }
}

impl Transport for RecordingTransport {
    fn send(&self, ticket: RequestTicket, request: BackendRequest) -> Result<(), TransportError> {
        if let Some(error) = self.fail_with.lock().expect("transport lock should work").clone() {
            return Err(error);
        }
        self.sent
            .lock()
            .expect("transport lock should work")
            .push((ticket, request));
        Ok(())
    }
}

/// Persistence collaborator recording save requests.
#[derive(Debug, Default)]
pub struct RecordingPersistence {
    saves: Mutex<Vec<(RequestTicket, SaveRequest)>>,
}

#[allow(dead_code)]
impl RecordingPersistence {
    /// Saves started so far.
    pub fn saves(&self) -> Vec<(RequestTicket, SaveRequest)> {
        self.saves.lock().expect("persistence lock should work").clone()
    }
}

impl FieldPersistence for RecordingPersistence {
    fn save(&self, ticket: RequestTicket, request: SaveRequest) -> Result<(), TransportError> {
        self.saves
            .lock()
            .expect("persistence lock should work")
            .push((ticket, request));
        Ok(())
    }
}

/// Session wired to recording collaborators.
#[allow(dead_code)]
pub struct Harness {
    /// Session under test.
    pub session: EditingSession,
    /// Recorded requests.
    pub transport: Arc<RecordingTransport>,
    /// Recorded saves.
    pub persistence: Arc<RecordingPersistence>,
}

/// Installs a test-writer subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Image field used by most tests.
#[allow(dead_code)]
pub fn image_field() -> FieldId {
    "node/1/field_image/en/full".parse().expect("field id should parse")
}

/// Second image field on another entity.
#[allow(dead_code)]
pub fn other_image_field() -> FieldId {
    "node/2/field_image/en/full".parse().expect("field id should parse")
}

/// Builds a session with `fields` attached as image fields and moved to
/// `candidate`.
#[allow(dead_code)]
pub fn harness(fields: &[FieldId]) -> Harness {
    init_tracing();
    let config = SessionConfig::new("https://cms.example.test/").expect("config should build");
    let transport = Arc::new(RecordingTransport::default());
    let persistence = Arc::new(RecordingPersistence::default());
    let mut session = EditingSession::new(&config, transport.clone(), persistence.clone())
        .expect("session should build");

    for (index, field) in fields.iter().enumerate() {
        session
            .attach(
                field.clone(),
                "image",
                ORIGINAL_MARKUP,
                ToolbarGroup::new(format!("quickedit-toolbar-{index}")),
            )
            .expect("field should attach");
    }
    session.begin_editing().expect("editing should begin");

    Harness {
        session,
        transport,
        persistence,
    }
}

/// Activates `field` and answers its metadata fetch with `metadata_json`.
#[allow(dead_code)]
pub fn activate_with_metadata(harness: &mut Harness, field: &FieldId, metadata_json: &str) {
    harness
        .session
        .request_state(field, EditorState::Activating)
        .expect("activation should succeed");
    let ticket = harness.transport.last_ticket("GET");
    harness
        .session
        .complete(Completion {
            ticket,
            result: Ok(HttpReply::ok(metadata_json)),
        })
        .expect("metadata completion should apply");
}

/// Field-info body exposing an optional alt input.
#[allow(dead_code)]
pub const OPTIONAL_ALT_METADATA: &str = r#"{"alt":"Bike","title":"","alt_field":true,"title_field":false,"alt_field_required":false,"title_field_required":false}"#;

/// Field-info body exposing a required, empty alt input.
#[allow(dead_code)]
pub const REQUIRED_ALT_METADATA: &str = r#"{"alt":"","alt_field":true,"alt_field_required":true,"title_field":false}"#;
