//! Sync engine state machine.

use serde::Serialize;

/// Lifecycle of the sync engine.
///
/// `Syncing` remembers whether the device went offline while a cycle was in
/// flight; the cycle still runs to completion and the engine then settles
/// in `PausedOffline` instead of `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Idle,
    Syncing { offline: bool },
    PausedOffline,
}

impl SyncState {
    /// Start a cycle. Only an idle engine may start one.
    #[must_use]
    pub const fn begin(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::Syncing { offline: false }),
            Self::Syncing { .. } | Self::PausedOffline => None,
        }
    }

    /// End the in-flight cycle
    #[must_use]
    pub const fn finish(self) -> Self {
        match self {
            Self::Syncing { offline: false } => Self::Idle,
            Self::Syncing { offline: true } => Self::PausedOffline,
            other => other,
        }
    }

    #[must_use]
    pub const fn went_offline(self) -> Self {
        match self {
            Self::Idle | Self::PausedOffline => Self::PausedOffline,
            Self::Syncing { .. } => Self::Syncing { offline: true },
        }
    }

    #[must_use]
    pub const fn came_online(self) -> Self {
        match self {
            Self::Idle | Self::PausedOffline => Self::Idle,
            Self::Syncing { .. } => Self::Syncing { offline: false },
        }
    }

    pub const fn is_syncing(self) -> bool {
        matches!(self, Self::Syncing { .. })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing { .. } => "syncing",
            Self::PausedOffline => "paused-offline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SyncState; 4] = [
        SyncState::Idle,
        SyncState::Syncing { offline: false },
        SyncState::Syncing { offline: true },
        SyncState::PausedOffline,
    ];

    #[test]
    fn only_idle_can_begin() {
        for state in ALL {
            let expected = match state {
                SyncState::Idle => Some(SyncState::Syncing { offline: false }),
                SyncState::Syncing { .. } | SyncState::PausedOffline => None,
            };
            assert_eq!(state.begin(), expected, "begin from {state:?}");
        }
    }

    #[test]
    fn finish_settles_by_connectivity() {
        assert_eq!(SyncState::Syncing { offline: false }.finish(), SyncState::Idle);
        assert_eq!(
            SyncState::Syncing { offline: true }.finish(),
            SyncState::PausedOffline
        );
        assert_eq!(SyncState::Idle.finish(), SyncState::Idle);
        assert_eq!(SyncState::PausedOffline.finish(), SyncState::PausedOffline);
    }

    #[test]
    fn offline_from_any_state() {
        for state in ALL {
            let next = state.went_offline();
            match state {
                SyncState::Syncing { .. } => {
                    assert_eq!(next, SyncState::Syncing { offline: true });
                }
                SyncState::Idle | SyncState::PausedOffline => {
                    assert_eq!(next, SyncState::PausedOffline);
                }
            }
        }
    }

    #[test]
    fn online_resumes_without_interrupting_cycle() {
        assert_eq!(SyncState::PausedOffline.came_online(), SyncState::Idle);
        assert_eq!(SyncState::Idle.came_online(), SyncState::Idle);
        assert_eq!(
            SyncState::Syncing { offline: true }.came_online(),
            SyncState::Syncing { offline: false }
        );
    }

    #[test]
    fn offline_during_cycle_then_finish_pauses() {
        let state = SyncState::Idle.begin().unwrap().went_offline().finish();
        assert_eq!(state, SyncState::PausedOffline);
        assert_eq!(state.begin(), None);
        assert_eq!(state.came_online().begin().map(SyncState::is_syncing), Some(true));
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(serde_json::to_string(&SyncState::Idle).unwrap(), "\"idle\"");
        assert_eq!(
            serde_json::to_string(&SyncState::PausedOffline).unwrap(),
            "\"paused_offline\""
        );
        assert_eq!(SyncState::Syncing { offline: true }.as_str(), "syncing");
    }
}
