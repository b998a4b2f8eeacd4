// mode.rs: Live vs dry-run gate for every mutating step.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether mutating backend calls are issued or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    Live,
    DryRun,
}

impl ApplyMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            ApplyMode::DryRun
        } else {
            ApplyMode::Live
        }
    }

    pub fn is_live(self) -> bool {
        self == ApplyMode::Live
    }
}

impl fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyMode::Live => write!(f, "live"),
            ApplyMode::DryRun => write!(f, "dry-run"),
        }
    }
}
