use std::fmt;

/// Orchestrator phases, in the order startup and shutdown walk through them.
///
/// The derived ordering follows declaration order, so "how far did startup get" is a plain
/// comparison against the highest phase reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecyclePhase {
    Init,
    Connecting,
    MigratingSchema,
    Listening,
    Registered,
    Running,
    ShuttingDown,
    Deregistered,
    Closed,
    Terminated,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecyclePhase::Init => "init",
            LifecyclePhase::Connecting => "connecting",
            LifecyclePhase::MigratingSchema => "migrating_schema",
            LifecyclePhase::Listening => "listening",
            LifecyclePhase::Registered => "registered",
            LifecyclePhase::Running => "running",
            LifecyclePhase::ShuttingDown => "shutting_down",
            LifecyclePhase::Deregistered => "deregistered",
            LifecyclePhase::Closed => "closed",
            LifecyclePhase::Terminated => "terminated",
        }
    }

    pub(crate) fn ordinal(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_ordered_by_progress() {
        assert!(LifecyclePhase::Init < LifecyclePhase::Connecting);
        assert!(LifecyclePhase::Listening < LifecyclePhase::Registered);
        assert!(LifecyclePhase::Running < LifecyclePhase::ShuttingDown);
        assert!(LifecyclePhase::Closed < LifecyclePhase::Terminated);
        assert_eq!(LifecyclePhase::Terminated.ordinal(), 9);
    }
}
