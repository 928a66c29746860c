use crate::types::Phase;

/// Timer expiries reported by [`RoundLifecycle::poll`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleSignal {
    CountdownElapsed,
    PauseElapsed,
}

/// Phase machine for a match. Wall-clock waits are stored as absolute
/// deadlines on the session clock; clearing the deadline cancels the wait.
/// Every transition checks the current phase and refuses otherwise.
#[derive(Clone, Debug)]
pub struct RoundLifecycle {
    phase: Phase,
    round: u32,
    deadline_ms: Option<u64>,
}

impl Default for RoundLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundLifecycle {
    pub fn new() -> Self {
        Self {
            phase: Phase::Initial,
            round: 0,
            deadline_ms: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn accepts_ticks(&self) -> bool {
        self.phase == Phase::Playing
    }

    pub fn begin_round(&mut self) -> Option<u32> {
        let allowed = match self.phase {
            Phase::Initial => true,
            Phase::RoundResolved => self.deadline_ms.is_none(),
            _ => false,
        };
        if !allowed {
            return None;
        }
        self.round += 1;
        self.phase = Phase::RoundSetup;
        self.deadline_ms = None;
        Some(self.round)
    }

    pub fn begin_countdown(&mut self, now_ms: u64, duration_ms: u64) -> bool {
        if self.phase != Phase::RoundSetup {
            return false;
        }
        self.phase = Phase::Countdown;
        self.deadline_ms = Some(now_ms.saturating_add(duration_ms));
        true
    }

    pub fn resolve_round(&mut self, now_ms: u64, pause_ms: u64) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        self.phase = Phase::RoundResolved;
        self.deadline_ms = Some(now_ms.saturating_add(pause_ms));
        true
    }

    pub fn complete_match(&mut self) -> bool {
        if self.phase != Phase::RoundResolved || self.deadline_ms.is_some() {
            return false;
        }
        self.phase = Phase::MatchComplete;
        true
    }

    pub fn restart(&mut self) {
        self.phase = Phase::Initial;
        self.round = 0;
        self.deadline_ms = None;
    }

    /// Fires at most one expired timer. The countdown moves straight to
    /// `Playing`; an elapsed pause leaves the phase for the caller to decide
    /// between the next round and match completion.
    pub fn poll(&mut self, now_ms: u64) -> Option<LifecycleSignal> {
        let deadline = self.deadline_ms?;
        if now_ms < deadline {
            return None;
        }
        self.deadline_ms = None;
        match self.phase {
            Phase::Countdown => {
                self.phase = Phase::Playing;
                Some(LifecycleSignal::CountdownElapsed)
            }
            Phase::RoundResolved => Some(LifecycleSignal::PauseElapsed),
            _ => None,
        }
    }

    pub fn countdown_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        match (self.phase, self.deadline_ms) {
            (Phase::Countdown, Some(deadline)) => Some(deadline.saturating_sub(now_ms)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_round_walkthrough() {
        let mut lifecycle = RoundLifecycle::new();
        assert_eq!(lifecycle.phase(), Phase::Initial);
        assert_eq!(lifecycle.begin_round(), Some(1));
        assert!(lifecycle.begin_countdown(0, 3_000));
        assert_eq!(lifecycle.countdown_remaining_ms(1_000), Some(2_000));
        assert!(!lifecycle.accepts_ticks());

        assert_eq!(lifecycle.poll(2_999), None);
        assert_eq!(lifecycle.poll(3_000), Some(LifecycleSignal::CountdownElapsed));
        assert!(lifecycle.accepts_ticks());
        assert_eq!(lifecycle.countdown_remaining_ms(3_000), None);

        assert!(lifecycle.resolve_round(5_000, 1_500));
        assert_eq!(lifecycle.phase(), Phase::RoundResolved);
        assert_eq!(lifecycle.begin_round(), None);
        assert_eq!(lifecycle.poll(6_499), None);
        assert_eq!(lifecycle.poll(6_500), Some(LifecycleSignal::PauseElapsed));
        assert_eq!(lifecycle.begin_round(), Some(2));
    }

    #[test]
    fn transitions_from_wrong_phase_are_refused() {
        let mut lifecycle = RoundLifecycle::new();
        assert!(!lifecycle.begin_countdown(0, 10));
        assert!(!lifecycle.resolve_round(0, 10));
        assert!(!lifecycle.complete_match());
        assert_eq!(lifecycle.poll(1_000), None);

        lifecycle.begin_round();
        assert_eq!(lifecycle.begin_round(), None);
        assert!(!lifecycle.resolve_round(0, 10));
        lifecycle.begin_countdown(0, 10);
        assert!(!lifecycle.resolve_round(5, 10));
    }

    #[test]
    fn match_completes_only_after_pause() {
        let mut lifecycle = RoundLifecycle::new();
        lifecycle.begin_round();
        lifecycle.begin_countdown(0, 0);
        lifecycle.poll(0);
        lifecycle.resolve_round(10, 100);
        assert!(!lifecycle.complete_match());
        lifecycle.poll(110);
        assert!(lifecycle.complete_match());
        assert_eq!(lifecycle.phase(), Phase::MatchComplete);
        assert_eq!(lifecycle.begin_round(), None);
    }

    #[test]
    fn restart_cancels_pending_countdown() {
        let mut lifecycle = RoundLifecycle::new();
        lifecycle.begin_round();
        lifecycle.begin_countdown(0, 3_000);
        lifecycle.restart();
        assert_eq!(lifecycle.phase(), Phase::Initial);
        assert_eq!(lifecycle.round(), 0);
        assert_eq!(lifecycle.poll(10_000), None);
        assert_eq!(lifecycle.phase(), Phase::Initial);
    }
}
