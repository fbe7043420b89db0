//! Session persistence — save, load, and reset the conversation.

use std::path::Path;

use tracing::info;

use skyhook_core::error::Result;

use crate::orchestrator::{LoopState, Orchestrator};

impl Orchestrator {
    /// Write the current transcript to `path` as a JSON snapshot.
    pub fn save_history(&self, path: &Path) -> Result<()> {
        let snapshot = self.transcript().snapshot()?;
        std::fs::write(path, snapshot)?;
        info!(path = %path.display(), turns = self.transcript().len(), "Saved conversation");
        Ok(())
    }

    /// Replace the transcript with a previously saved snapshot.
    ///
    /// Atomic: on read or parse failure the current transcript is left
    /// untouched.
    pub fn load_history(&mut self, path: &Path) -> Result<()> {
        let snapshot = std::fs::read_to_string(path)?;
        self.transcript_mut().restore(&snapshot)?;
        self.set_state(LoopState::Idle);
        info!(path = %path.display(), turns = self.transcript().len(), "Loaded conversation");
        Ok(())
    }

    /// Discard the conversation and start fresh.
    pub fn new_session(&mut self) {
        self.transcript_mut().clear();
        self.set_state(LoopState::Idle);
    }
}
