use std::path::PathBuf;

use serde::Deserialize;

use crate::config::Config;
use crate::db::SqliteBackend;
use crate::sequencer::{AssignmentSequencer, OperatorContext};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub backend: Option<SqliteBackend>,
    pub config: Config,
    pub ctx: OperatorContext,
    pub sequencer: AssignmentSequencer,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the current selection; the next `assign.open` starts from scratch.
    pub fn clear_selection(&mut self) {
        self.ctx.selection = None;
        self.sequencer = AssignmentSequencer::new();
    }
}
