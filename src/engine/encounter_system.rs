use super::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encounter {
    Apart,
    ChaserTagged,
    RunnerCaught,
}

/// Classifies the runner/chaser contact for this tick. Disabled actors never
/// take part, and the boost check runs once so only one outcome is possible.
pub fn classify_encounter(
    runner: &ActorState,
    chaser: &ActorState,
    tag_distance: f32,
) -> Encounter {
    if runner.is_disabled() || chaser.is_disabled() {
        return Encounter::Apart;
    }
    if runner.position.distance(chaser.position) >= tag_distance {
        return Encounter::Apart;
    }
    if runner.is_boosted() {
        Encounter::ChaserTagged
    } else {
        Encounter::RunnerCaught
    }
}

impl MatchSession {
    pub(super) fn resolve_encounter(&mut self, runner_idx: usize, chaser_idx: usize) -> bool {
        let outcome = classify_encounter(
            &self.actors[runner_idx],
            &self.actors[chaser_idx],
            self.config.tag_distance(),
        );
        match outcome {
            Encounter::Apart => false,
            Encounter::ChaserTagged => {
                let avoid = self.actors[runner_idx].tile();
                let relocated_to = self.relocate_actor(chaser_idx, avoid);
                self.actors[chaser_idx].apply_disable(self.config.disable_ticks);
                self.events.push(RuntimeEvent::ChaserTagged {
                    chaser: self.actors[chaser_idx].id,
                    relocated_to,
                });
                false
            }
            Encounter::RunnerCaught => {
                let winner = self.actors[chaser_idx].id;
                self.resolve_round(winner, RoundEndReason::RunnerTagged);
                true
            }
        }
    }
}
