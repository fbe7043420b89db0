//! Model tier selection — binding a capability tier to a concrete client.
//!
//! Exactly one tier is active at any time. Switching is synchronous and
//! idempotent; the tier a round uses is fixed once at the start of that
//! round, never mid-round.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::client::GenerateClient;

/// A named capability tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    /// Cheap and quick; the default.
    Fast,
    /// Stronger reasoning, higher cost.
    Capable,
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelTier::Fast => write!(f, "fast"),
            ModelTier::Capable => write!(f, "capable"),
        }
    }
}

impl FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(ModelTier::Fast),
            "capable" | "smart" => Ok(ModelTier::Capable),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

/// Binds each tier to a client and tracks which one is active.
pub struct TierSelector {
    fast: Arc<dyn GenerateClient>,
    capable: Arc<dyn GenerateClient>,
    active: ModelTier,
}

/// The selector shared between the orchestrator and the model-control
/// capability module. A std mutex is fine: it is only ever locked for
/// synchronous reads and switches, never across an await point.
pub type SharedTierSelector = Arc<Mutex<TierSelector>>;

impl TierSelector {
    /// Create a selector with `Fast` active.
    pub fn new(fast: Arc<dyn GenerateClient>, capable: Arc<dyn GenerateClient>) -> Self {
        Self {
            fast,
            capable,
            active: ModelTier::Fast,
        }
    }

    pub fn shared(fast: Arc<dyn GenerateClient>, capable: Arc<dyn GenerateClient>) -> SharedTierSelector {
        Arc::new(Mutex::new(Self::new(fast, capable)))
    }

    pub fn active(&self) -> ModelTier {
        self.active
    }

    /// The client serving the active tier.
    pub fn client(&self) -> Arc<dyn GenerateClient> {
        self.client_for(self.active)
    }

    pub fn client_for(&self, tier: ModelTier) -> Arc<dyn GenerateClient> {
        match tier {
            ModelTier::Fast => Arc::clone(&self.fast),
            ModelTier::Capable => Arc::clone(&self.capable),
        }
    }

    /// Activate `tier`. Returns `true` if the active tier changed.
    /// Switching to the already-active tier is a no-op with no side effects.
    pub fn switch(&mut self, tier: ModelTier) -> bool {
        if self.active == tier {
            return false;
        }
        self.active = tier;
        true
    }
}
