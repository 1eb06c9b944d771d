//! Legal field-level state transitions.

use quickedit_image_core::EditorState;

/// States reachable from `from` in one step.
pub fn legal_targets(from: EditorState) -> &'static [EditorState] {
    use EditorState::*;

    match from {
        Inactive => &[Candidate],
        Candidate => &[Inactive, Highlighted, Activating, Invalid],
        Highlighted => &[Candidate, Activating],
        Activating => &[Active, Candidate],
        Active => &[Changed, Candidate, Invalid],
        Changed => &[Saving, Candidate, Invalid],
        Saving => &[Saved, Invalid, Changed, Candidate],
        Saved => &[Candidate],
        Invalid => &[Candidate, Saving, Changed],
    }
}

/// Returns `true` when `from -> to` is a single legal step.
pub fn is_legal_transition(from: EditorState, to: EditorState) -> bool {
    legal_targets(from).contains(&to)
}
