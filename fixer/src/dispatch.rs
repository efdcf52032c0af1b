//! Map an action to the collaborator that performs it.

use tracing::{debug, instrument};

use crate::core::types::{Action, ActionKind};
use crate::edit::EditPipeline;
use crate::io::config::{SearchConfig, ViewConfig};
use crate::io::workspace::Workspace;
use crate::search::search;
use crate::view::view_file;

pub const SUBMITTED: &str = "Submitted the solution.";

/// Everything actions run against for one workspace.
pub struct Toolbox<'a> {
    pub workspace: &'a Workspace,
    pub edits: EditPipeline<'a>,
    pub search: &'a SearchConfig,
    pub view: &'a ViewConfig,
}

/// Run the action and return its observation.
///
/// Collaborator failures come back as observation text; only the oracle can
/// break the contract, and that is rejected when the action is decoded.
#[instrument(skip_all, fields(action = action.name().as_str()))]
pub fn dispatch(action: &Action, toolbox: &Toolbox<'_>) -> String {
    debug!(kind = %action.kind, "dispatching");
    match &action.kind {
        ActionKind::Search(input) => search(toolbox.workspace, &input.regex, toolbox.search),
        ActionKind::ViewFile(input) => view_file(toolbox.workspace, input, toolbox.view),
        ActionKind::Edits(input) => toolbox.edits.apply_edits(input),
        ActionKind::Submit(_) => SUBMITTED.to_string(),
    }
}
