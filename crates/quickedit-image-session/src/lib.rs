#![warn(missing_docs)]
//! # quickedit-image-session
//!
//! ## Purpose
//! Coordinates every editable region of one page: the field-level state
//! machine, the event loop that executes editor effects, and the save round
//! trip.
//!
//! ## Responsibilities
//! - Reject transitions outside the legal-transition table.
//! - Keep at most one region holding editing focus.
//! - Execute editor [`Effect`]s after the editor call returns, and apply
//!   deferred transitions at the end of the current turn.
//! - Route request completions and save outcomes back to the owning region.
//! - Track which entities hold uncommitted edits in the backend temp-store.
//!
//! ## Data flow
//! Host event (state request, input, completion, save outcome) -> editor call
//! -> effects queued -> effects executed in order -> deferred transitions
//! fired -> turn ends.
//!
//! ## Ownership and lifetimes
//! The session owns every region and its editor. Transports and persistence
//! collaborators are shared through `Arc` so their worker threads can outlive
//! a single call.
//!
//! ## Error model
//! Misuse by the host (unknown field, illegal transition, focus conflict) is
//! reported as [`SessionError`]. Request failures never surface here; editors
//! render them on the region.
//!
//! ## Re-entrancy
//! A transition never runs while another transition is on the stack. Every
//! transition requested from inside a state-change handler is queued, so the
//! recorded [`TransitionRecord::depth`] is always `1`.

mod config;
mod transitions;

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, TryRecvError};

use quickedit_image_core::{EditorState, FieldId, SaveRequest};
use quickedit_image_editor::{
    Effect, EditableRegion, EditorContext, EditorError, EditorRegistry, InPlaceEditor,
    Propagation, RegionInput,
};
use quickedit_image_ui::ToolbarGroup;
use quickedit_image_upload::{Completion, HttpTransport, RequestTicket, Transport, TransportError};
use thiserror::Error;

pub use config::{
    BASE_URL_ENV, ConfigError, DEFAULT_TIMEOUT, ROUTE_PREFIX_ENV, SessionConfig, TIMEOUT_MS_ENV,
};
pub use transitions::{is_legal_transition, legal_targets};

/// Persistence collaborator receiving save requests.
///
/// Implementations start the save and return immediately; the host reports
/// the result through [`EditingSession::complete_save`] with the same ticket.
pub trait FieldPersistence: Send + Sync {
    /// Starts persisting `request`.
    ///
    /// # Errors
    /// Returns a [`TransportError`] when the save could not be started.
    fn save(&self, ticket: RequestTicket, request: SaveRequest) -> Result<(), TransportError>;
}

/// Result of a save reported by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The edit was committed.
    Saved,
    /// The backend rejected the edit with validation errors.
    Rejected(Vec<String>),
    /// The save failed without a usable response.
    Failed(TransportError),
}

/// One notified state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    /// Field that moved.
    pub field_id: FieldId,
    /// Previous state.
    pub from: EditorState,
    /// New state.
    pub to: EditorState,
    /// Number of transitions on the stack while this one ran.
    pub depth: usize,
}

struct FieldSlot {
    region: EditableRegion,
    editor: Box<dyn InPlaceEditor>,
}

struct DeferredTransition {
    field_id: FieldId,
    expected: EditorState,
    to: EditorState,
}

/// Editing session of one page.
pub struct EditingSession {
    context: EditorContext,
    registry: EditorRegistry,
    transport: Arc<dyn Transport>,
    persistence: Arc<dyn FieldPersistence>,
    fields: BTreeMap<FieldId, FieldSlot>,
    requests: BTreeMap<RequestTicket, FieldId>,
    saves: BTreeMap<RequestTicket, FieldId>,
    temp_store: BTreeSet<String>,
    pending: VecDeque<(FieldId, Effect)>,
    deferred: VecDeque<DeferredTransition>,
    file_picker_requests: Vec<FieldId>,
    log: Vec<TransitionRecord>,
    depth: usize,
}

impl EditingSession {
    /// Creates a session with the default editor registry.
    ///
    /// # Errors
    /// Returns [`SessionError::Config`] when endpoints cannot be built.
    pub fn new(
        config: &SessionConfig,
        transport: Arc<dyn Transport>,
        persistence: Arc<dyn FieldPersistence>,
    ) -> Result<Self, SessionError> {
        Self::with_registry(config, EditorRegistry::with_defaults(), transport, persistence)
    }

    /// Creates a session with a custom editor registry.
    ///
    /// # Errors
    /// Returns [`SessionError::Config`] when endpoints cannot be built.
    pub fn with_registry(
        config: &SessionConfig,
        registry: EditorRegistry,
        transport: Arc<dyn Transport>,
        persistence: Arc<dyn FieldPersistence>,
    ) -> Result<Self, SessionError> {
        let context = EditorContext {
            endpoints: config.endpoints()?,
        };
        Ok(Self {
            context,
            registry,
            transport,
            persistence,
            fields: BTreeMap::new(),
            requests: BTreeMap::new(),
            saves: BTreeMap::new(),
            temp_store: BTreeSet::new(),
            pending: VecDeque::new(),
            deferred: VecDeque::new(),
            file_picker_requests: Vec::new(),
            log: Vec::new(),
            depth: 0,
        })
    }

    /// Creates a session backed by the threaded HTTP transport.
    ///
    /// Completions arrive on the returned receiver; drain it with
    /// [`EditingSession::pump`].
    ///
    /// # Errors
    /// Returns [`SessionError::Config`] when endpoints cannot be built.
    pub fn connect(
        config: &SessionConfig,
        persistence: Arc<dyn FieldPersistence>,
    ) -> Result<(Self, Receiver<Completion>), SessionError> {
        let (transport, completions) = HttpTransport::new(config.timeout());
        let session = Self::new(config, Arc::new(transport), persistence)?;
        Ok((session, completions))
    }

    /// Binds a new region for `field_id`, rendered as `markup`.
    ///
    /// # Errors
    /// Returns [`SessionError::DuplicateField`] when the field is already
    /// attached and [`SessionError::Editor`] for unknown field types.
    pub fn attach(
        &mut self,
        field_id: FieldId,
        field_type: &str,
        markup: impl Into<String>,
        toolbar: ToolbarGroup,
    ) -> Result<(), SessionError> {
        if self.fields.contains_key(&field_id) {
            return Err(SessionError::DuplicateField(field_id));
        }
        let editor = self.registry.create(field_type, &self.context)?;
        let region = EditableRegion::new(field_id.clone(), markup, toolbar);
        tracing::debug!(field = %field_id, field_type, "region attached");
        self.fields.insert(field_id, FieldSlot { region, editor });
        Ok(())
    }

    /// Tears a region down, restoring its original markup.
    ///
    /// Returns the region so the host can re-render it.
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownField`] when the field is not attached.
    pub fn detach(&mut self, field_id: &FieldId) -> Result<EditableRegion, SessionError> {
        let mut slot = self
            .fields
            .remove(field_id)
            .ok_or_else(|| SessionError::UnknownField(field_id.clone()))?;
        slot.editor.on_revert(&mut slot.region);
        slot.region.enter(EditorState::Inactive);
        self.forget_requests(field_id);
        self.pending.retain(|(owner, _)| owner != field_id);
        self.deferred.retain(|deferred| &deferred.field_id != field_id);
        tracing::debug!(field = %field_id, "region detached");
        Ok(slot.region)
    }

    /// Moves every inactive region to `candidate`.
    ///
    /// # Errors
    /// Propagates the first error raised while running the turn.
    pub fn begin_editing(&mut self) -> Result<(), SessionError> {
        let inactive: Vec<FieldId> = self
            .fields
            .iter()
            .filter(|(_, slot)| slot.region.state() == EditorState::Inactive)
            .map(|(field_id, _)| field_id.clone())
            .collect();
        let mut first_error = None;
        for field_id in inactive {
            if let Err(error) = self.transition(&field_id, EditorState::Candidate) {
                first_error.get_or_insert(error);
            }
        }
        let turn = self.finish_turn();
        first_error.map_or(turn, Err)
    }

    /// Requests a transition of `field_id` to `to`, then runs the turn.
    ///
    /// Requests for the current state are no-ops. Activating a field returns
    /// the focused field to `candidate` first.
    ///
    /// # Errors
    /// Returns [`SessionError::IllegalTransition`] outside the transition
    /// table and [`SessionError::FocusHeld`] when another field has unsaved
    /// edits.
    pub fn request_state(&mut self, field_id: &FieldId, to: EditorState) -> Result<(), SessionError> {
        self.ensure_attached(field_id)?;
        if to == EditorState::Activating {
            self.release_focus(field_id)?;
        }
        self.transition(field_id, to)?;
        self.finish_turn()
    }

    /// Routes user input to the field's editor, then runs the turn.
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownField`] for unattached fields and
    /// propagates errors raised by the resulting effects.
    pub fn input(&mut self, field_id: &FieldId, input: RegionInput) -> Result<Propagation, SessionError> {
        let slot = self
            .fields
            .get_mut(field_id)
            .ok_or_else(|| SessionError::UnknownField(field_id.clone()))?;
        let response = slot.editor.on_input(&mut slot.region, input);
        self.queue(field_id, response.effects);
        self.finish_turn()?;
        Ok(response.propagation)
    }

    /// Applies one request completion, then runs the turn.
    ///
    /// Completions for detached fields or forgotten requests are dropped.
    ///
    /// # Errors
    /// Propagates errors raised by the resulting effects.
    pub fn complete(&mut self, completion: Completion) -> Result<(), SessionError> {
        let Some(field_id) = self.requests.remove(&completion.ticket) else {
            tracing::debug!(ticket = completion.ticket.get(), "completion for forgotten request dropped");
            return Ok(());
        };
        let Some(slot) = self.fields.get_mut(&field_id) else {
            return Ok(());
        };
        let effects = slot.editor.on_completion(&mut slot.region, completion);
        self.queue(&field_id, effects);
        self.finish_turn()
    }

    /// Drains every completion currently queued on `completions`.
    ///
    /// Each completion runs as its own turn. Returns the number applied.
    ///
    /// # Errors
    /// Every drained completion is applied before returning; the first error
    /// raised by one of them is returned. Otherwise returns
    /// [`SessionError::CompletionChannelClosed`] when every sender is gone.
    pub fn pump(&mut self, completions: &Receiver<Completion>) -> Result<usize, SessionError> {
        let mut drained = Vec::new();
        let mut disconnected = false;
        loop {
            match completions.try_recv() {
                Ok(completion) => drained.push(completion),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        let applied = drained.len();
        let mut first_error = None;
        for completion in drained {
            if let Err(error) = self.complete(completion) {
                tracing::warn!(%error, "completion failed");
                first_error.get_or_insert(error);
            }
        }
        if let Some(error) = first_error {
            return Err(error);
        }
        if disconnected {
            return Err(SessionError::CompletionChannelClosed);
        }
        Ok(applied)
    }

    /// Applies the result of a save, then runs the turn.
    ///
    /// Outcomes for fields no longer `saving` are dropped.
    ///
    /// # Errors
    /// Propagates errors raised by the resulting transitions.
    pub fn complete_save(&mut self, ticket: RequestTicket, outcome: SaveOutcome) -> Result<(), SessionError> {
        let Some(field_id) = self.saves.remove(&ticket) else {
            tracing::debug!(ticket = ticket.get(), "outcome for forgotten save dropped");
            return Ok(());
        };
        let Some(slot) = self.fields.get_mut(&field_id) else {
            return Ok(());
        };
        if slot.region.state() != EditorState::Saving {
            tracing::debug!(field = %field_id, state = %slot.region.state(), "save outcome ignored");
            return Ok(());
        }

        match outcome {
            SaveOutcome::Saved => {
                tracing::info!(field = %field_id, "field saved");
                self.temp_store.remove(&field_id.entity_key());
                self.transition(&field_id, EditorState::Saved)?;
            }
            SaveOutcome::Rejected(errors) => {
                slot.region.set_validation_errors(errors);
                self.transition(&field_id, EditorState::Invalid)?;
            }
            SaveOutcome::Failed(error) => {
                let effects = slot.editor.on_save_failed(&mut slot.region, &error);
                self.queue(&field_id, effects);
            }
        }
        self.finish_turn()
    }

    /// Restores the field's markup captured at its most recent activation.
    ///
    /// Safe in every state and idempotent. Requests in flight for the field
    /// are forgotten.
    ///
    /// # Errors
    /// Returns [`SessionError::UnknownField`] for unattached fields.
    pub fn revert(&mut self, field_id: &FieldId) -> Result<(), SessionError> {
        let slot = self
            .fields
            .get_mut(field_id)
            .ok_or_else(|| SessionError::UnknownField(field_id.clone()))?;
        slot.editor.on_revert(&mut slot.region);
        self.forget_requests(field_id);
        Ok(())
    }

    /// Region bound to `field_id`.
    pub fn region(&self, field_id: &FieldId) -> Option<&EditableRegion> {
        self.fields.get(field_id).map(|slot| &slot.region)
    }

    /// Current state of `field_id`.
    pub fn state(&self, field_id: &FieldId) -> Option<EditorState> {
        self.region(field_id).map(EditableRegion::state)
    }

    /// Editor bound to `field_id`.
    pub fn editor(&self, field_id: &FieldId) -> Option<&dyn InPlaceEditor> {
        self.fields.get(field_id).map(|slot| &*slot.editor)
    }

    /// Field currently holding editing focus.
    pub fn focused_field(&self) -> Option<&FieldId> {
        self.fields
            .iter()
            .find(|(_, slot)| slot.region.state().holds_focus())
            .map(|(field_id, _)| field_id)
    }

    /// Returns `true` when the entity owning `field_id` holds an uncommitted
    /// edit.
    pub fn is_in_temp_store(&self, field_id: &FieldId) -> bool {
        self.temp_store.contains(&field_id.entity_key())
    }

    /// Every notified state change, oldest first.
    pub fn transition_log(&self) -> &[TransitionRecord] {
        &self.log
    }

    /// Takes the recorded state changes, leaving the log empty.
    pub fn take_transition_log(&mut self) -> Vec<TransitionRecord> {
        std::mem::take(&mut self.log)
    }

    /// Takes the fields whose file picker must be opened.
    pub fn take_file_picker_requests(&mut self) -> Vec<FieldId> {
        std::mem::take(&mut self.file_picker_requests)
    }

    fn ensure_attached(&self, field_id: &FieldId) -> Result<(), SessionError> {
        if self.fields.contains_key(field_id) {
            Ok(())
        } else {
            Err(SessionError::UnknownField(field_id.clone()))
        }
    }

    fn release_focus(&mut self, requested: &FieldId) -> Result<(), SessionError> {
        let holders: Vec<(FieldId, EditorState)> = self
            .fields
            .iter()
            .filter(|(field_id, slot)| *field_id != requested && slot.region.state().holds_focus())
            .map(|(field_id, slot)| (field_id.clone(), slot.region.state()))
            .collect();

        if let Some((holder, _)) = holders.iter().find(|(_, state)| state.has_unsaved_edits()) {
            return Err(SessionError::FocusHeld {
                requested: requested.clone(),
                holder: holder.clone(),
            });
        }

        for (holder, _) in holders {
            self.transition(&holder, EditorState::Candidate)?;
            self.finish_turn()?;
        }
        Ok(())
    }

    fn transition(&mut self, field_id: &FieldId, to: EditorState) -> Result<(), SessionError> {
        let slot = self
            .fields
            .get_mut(field_id)
            .ok_or_else(|| SessionError::UnknownField(field_id.clone()))?;
        let from = slot.region.state();
        if from == to {
            return Ok(());
        }
        if !is_legal_transition(from, to) {
            return Err(SessionError::IllegalTransition {
                field_id: field_id.clone(),
                from,
                to,
            });
        }

        self.depth += 1;
        let change = slot.region.enter(to);
        tracing::debug!(field = %field_id, %from, %to, depth = self.depth, "state changed");
        self.log.push(TransitionRecord {
            field_id: field_id.clone(),
            from,
            to,
            depth: self.depth,
        });
        let effects = slot.editor.on_state_change(&mut slot.region, change);
        self.depth -= 1;

        if from == EditorState::Saving {
            // Outcomes of a save the field has moved past must not land on a later save.
            self.saves.retain(|_, owner| *owner != *field_id);
        }
        self.queue(field_id, effects);
        Ok(())
    }

    fn queue(&mut self, field_id: &FieldId, effects: Vec<Effect>) {
        self.pending
            .extend(effects.into_iter().map(|effect| (field_id.clone(), effect)));
    }

    /// Executes queued effects, then fires deferred transitions, until both
    /// queues are empty.
    fn finish_turn(&mut self) -> Result<(), SessionError> {
        let mut first_error = None;
        loop {
            while let Some((field_id, effect)) = self.pending.pop_front() {
                if let Err(error) = self.execute(&field_id, effect) {
                    tracing::warn!(field = %field_id, %error, "effect failed");
                    first_error.get_or_insert(error);
                }
            }

            let Some(deferred) = self.deferred.pop_front() else {
                break;
            };
            if self.state(&deferred.field_id) != Some(deferred.expected) {
                tracing::debug!(
                    field = %deferred.field_id,
                    to = %deferred.to,
                    "deferred transition superseded"
                );
                continue;
            }
            if let Err(error) = self.transition(&deferred.field_id, deferred.to) {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn execute(&mut self, field_id: &FieldId, effect: Effect) -> Result<(), SessionError> {
        let Some(state) = self.state(field_id) else {
            return Ok(());
        };

        match effect {
            Effect::RequestState(to) => self.transition(field_id, to),
            Effect::DeferState(to) => {
                self.deferred.push_back(DeferredTransition {
                    field_id: field_id.clone(),
                    expected: state,
                    to,
                });
                Ok(())
            }
            Effect::Send(dispatch) => {
                let ticket = dispatch.ticket;
                self.requests.insert(ticket, field_id.clone());
                if let Err(error) = self.transport.send(ticket, dispatch.request) {
                    tracing::warn!(field = %field_id, ticket = ticket.get(), %error, "request not sent");
                    self.requests.remove(&ticket);
                    if let Some(slot) = self.fields.get_mut(field_id) {
                        let effects = slot.editor.on_completion(
                            &mut slot.region,
                            Completion {
                                ticket,
                                result: Err(error),
                            },
                        );
                        self.queue(field_id, effects);
                    }
                }
                Ok(())
            }
            Effect::Save(request) => {
                let ticket = RequestTicket::next();
                self.saves.insert(ticket, field_id.clone());
                if let Err(error) = self.persistence.save(ticket, request) {
                    self.saves.remove(&ticket);
                    if let Some(slot) = self.fields.get_mut(field_id) {
                        let effects = slot.editor.on_save_failed(&mut slot.region, &error);
                        self.queue(field_id, effects);
                    }
                }
                Ok(())
            }
            Effect::MarkEntityInTempStore => {
                self.temp_store.insert(field_id.entity_key());
                Ok(())
            }
            Effect::OpenFilePicker => {
                self.file_picker_requests.push(field_id.clone());
                Ok(())
            }
        }
    }

    fn forget_requests(&mut self, field_id: &FieldId) {
        self.requests.retain(|_, owner| *owner != *field_id);
        self.saves.retain(|_, owner| *owner != *field_id);
    }
}

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No region is attached for the field.
    #[error("field {0} is not attached")]
    UnknownField(FieldId),
    /// A region is already attached for the field.
    #[error("field {0} is already attached")]
    DuplicateField(FieldId),
    /// Transition outside the legal-transition table.
    #[error("field {field_id} cannot move from {from} to {to}")]
    IllegalTransition {
        /// Field the request targeted.
        field_id: FieldId,
        /// State of the field.
        from: EditorState,
        /// Requested state.
        to: EditorState,
    },
    /// Another field holds editing focus with unsaved edits.
    #[error("field {requested} cannot be activated while {holder} has unsaved edits")]
    FocusHeld {
        /// Field that was to be activated.
        requested: FieldId,
        /// Field holding focus.
        holder: FieldId,
    },
    /// Editor lookup failed.
    #[error("editor error: {0}")]
    Editor(#[from] EditorError),
    /// Configuration rejected.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Every completion sender was dropped.
    #[error("completion channel closed")]
    CompletionChannelClosed,
}
