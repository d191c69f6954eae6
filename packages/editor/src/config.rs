use serde::{Deserialize, Serialize};

/// Tuning for [`EditHistory`](crate::EditHistory)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryConfig {
    /// Checkpoints kept on the undo stack, not counting the initial state.
    /// `0` keeps everything.
    pub max_checkpoints: usize,

    /// Serialize the stack to the backup after every commit
    pub autosave: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_checkpoints: 100,
            autosave: true,
        }
    }
}
