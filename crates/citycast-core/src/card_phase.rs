//! Card lifecycle phases (idle/loading/loaded/failed).
//!
//! A card settles into `Loaded` or `Failed` only from `Loading`. Used by the
//! card controller to reject out-of-order completions.

/// Lifecycle phase of a single forecast card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CardPhase {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

impl CardPhase {
    /// True if a load result can be applied.
    pub fn can_settle(self) -> bool {
        matches!(self, CardPhase::Loading)
    }

    /// Phase after a load finished, or `None` if the card was not loading.
    pub fn settle(self, success: bool) -> Option<Self> {
        if !self.can_settle() {
            return None;
        }
        Some(if success {
            CardPhase::Loaded
        } else {
            CardPhase::Failed
        })
    }
}
