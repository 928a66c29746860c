use crate::config::{ConfigError, MatchConfig};
use crate::grid::{GridDefinition, GridModel};
use crate::rng::Rng;
use crate::types::{
    ActorId, Direction, MatchSummary, Phase, PickupKind, Role, RoundEndReason, RoundRecord,
    RuntimeEvent, ScoreEntry, Snapshot, Vec2,
};

mod encounter_system;
mod lifecycle;
mod motion;
mod pickup_system;
mod spawn_system;
pub(crate) mod utils;

pub use self::encounter_system::{classify_encounter, Encounter};
pub use self::lifecycle::{LifecycleSignal, RoundLifecycle};
pub use self::motion::{resolve_motion, ActorState};
pub use self::pickup_system::RoundCounters;
pub use self::spawn_system::SpawnPlanner;

use self::utils::tile_distance;

/// One match between actors A and B on a single grid definition. The caller
/// owns the session and drives it with [`MatchSession::step`]; nothing else
/// holds match state.
#[derive(Clone, Debug)]
pub struct MatchSession {
    config: MatchConfig,
    seed: u32,
    rng: Rng,
    grid: GridModel,
    spawn_candidates: Vec<Vec2>,
    actors: [ActorState; 2],
    lifecycle: RoundLifecycle,
    counters: RoundCounters,
    events: Vec<RuntimeEvent>,
    rounds: Vec<RoundRecord>,
    clock_ms: u64,
    tick_counter: u64,
    play_ticks: u64,
    round_started_at_tick: u64,
}

impl MatchSession {
    pub fn new(
        definition: GridDefinition,
        config: MatchConfig,
        names: [&str; 2],
        seed: u32,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let spawn_candidates = definition.path_cells();
        let counters = RoundCounters::new(definition.pickup_count());
        Ok(Self {
            config,
            seed,
            rng: Rng::new(seed),
            grid: GridModel::new(definition),
            spawn_candidates,
            actors: [
                ActorState::new(ActorId::A, names[0]),
                ActorState::new(ActorId::B, names[1]),
            ],
            lifecycle: RoundLifecycle::new(),
            counters,
            events: Vec::new(),
            rounds: Vec::new(),
            clock_ms: 0,
            tick_counter: 0,
            play_ticks: 0,
            round_started_at_tick: 0,
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    pub fn round(&self) -> u32 {
        self.lifecycle.round()
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn tick(&self) -> u64 {
        self.tick_counter
    }

    pub fn grid(&self) -> &GridModel {
        &self.grid
    }

    pub fn counters(&self) -> RoundCounters {
        self.counters
    }

    pub fn actor(&self, id: ActorId) -> &ActorState {
        &self.actors[id.index()]
    }

    pub fn actors(&self) -> &[ActorState] {
        &self.actors
    }

    #[cfg(test)]
    pub(crate) fn actor_mut(&mut self, id: ActorId) -> &mut ActorState {
        &mut self.actors[id.index()]
    }

    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    pub fn is_complete(&self) -> bool {
        self.phase() == Phase::MatchComplete
    }

    pub fn start(&mut self) -> bool {
        if self.phase() != Phase::Initial {
            return false;
        }
        self.setup_round()
    }

    /// Accepted from any phase: scores, round history and timers are cleared
    /// and the match waits in `Initial` for the next start.
    pub fn restart(&mut self) {
        self.lifecycle.restart();
        self.grid.reset_to_definition();
        self.counters = RoundCounters::new(self.grid.definition().pickup_count());
        self.rounds.clear();
        for actor in &mut self.actors {
            actor.score = 0;
            actor.boost_remaining = 0;
            actor.disable_remaining = 0;
            actor.axis = Direction::None;
            actor.intent = Direction::None;
        }
        self.events.push(RuntimeEvent::MatchRestarted);
    }

    /// Queues a turn for the next decision point. Only accepted while a round
    /// is counting down or being played, and never for a disabled actor.
    pub fn set_intent(&mut self, id: ActorId, dir: Direction) -> bool {
        if !matches!(self.phase(), Phase::Countdown | Phase::Playing) {
            return false;
        }
        self.actors[id.index()].set_intent(dir)
    }

    /// Advances the session clock by `dt_ms`. A tick is only simulated when
    /// the round was already in `Playing` when the step began.
    pub fn step(&mut self, dt_ms: u64) {
        self.tick_counter += 1;
        self.clock_ms = self.clock_ms.saturating_add(dt_ms);
        if self.lifecycle.accepts_ticks() {
            self.play_tick();
        }
        self.poll_timers();
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        Snapshot {
            tick: self.tick_counter,
            clock_ms: self.clock_ms,
            phase: self.phase(),
            round: self.round(),
            win_score: self.config.win_score,
            countdown_remaining_ms: self.lifecycle.countdown_remaining_ms(self.clock_ms),
            collected: self.counters.collected,
            required_total: self.counters.required_total,
            actors: self.actors.iter().map(ActorState::to_view).collect(),
            grid: self.grid.to_view(),
            events: if include_events {
                std::mem::take(&mut self.events)
            } else {
                Vec::new()
            },
        }
    }

    pub fn build_summary(&self) -> Option<MatchSummary> {
        if !self.is_complete() {
            return None;
        }
        let winner = self.match_winner()?;
        let mut scores: Vec<ScoreEntry> = self
            .actors
            .iter()
            .map(|actor| ScoreEntry {
                id: actor.id,
                name: actor.name.clone(),
                score: actor.score,
            })
            .collect();
        scores.sort_by(|a, b| b.score.cmp(&a.score));

        Some(MatchSummary {
            winner,
            rounds: self.rounds.clone(),
            scores,
            total_ticks: self.play_ticks,
        })
    }

    fn match_winner(&self) -> Option<ActorId> {
        self.actors
            .iter()
            .filter(|actor| actor.score >= self.config.win_score)
            .max_by_key(|actor| actor.score)
            .map(|actor| actor.id)
    }

    fn role_index(&self, role: Role) -> usize {
        self.actors
            .iter()
            .position(|actor| actor.role == role)
            .unwrap_or(0)
    }

    fn setup_round(&mut self) -> bool {
        let Some(round) = self.lifecycle.begin_round() else {
            return false;
        };
        self.grid.reset_to_definition();
        self.counters = RoundCounters::new(self.grid.definition().pickup_count());
        self.place_round_actors(round);
        self.round_started_at_tick = self.play_ticks;

        let runner = self.actors[self.role_index(Role::Runner)].id;
        self.events.push(RuntimeEvent::RoundStarted {
            round,
            runner,
            required_total: self.counters.required_total,
        });
        self.lifecycle
            .begin_countdown(self.clock_ms, self.config.countdown_ms)
    }

    fn play_tick(&mut self) {
        self.play_ticks += 1;
        for actor in &mut self.actors {
            actor.tick_status_effects();
        }

        let (step, radius) = (self.config.move_step, self.config.actor_radius);
        for actor in &mut self.actors {
            resolve_motion(actor, &self.grid, step, radius);
        }

        let runner_idx = self.role_index(Role::Runner);
        let chaser_idx = 1 - runner_idx;
        self.apply_runner_pickups(runner_idx);

        if self.resolve_encounter(runner_idx, chaser_idx) {
            return;
        }
        if self.counters.is_complete() {
            let winner = self.actors[runner_idx].id;
            self.resolve_round(winner, RoundEndReason::AllPickupsCollected);
        }
    }

    fn resolve_round(&mut self, winner: ActorId, reason: RoundEndReason) {
        if !self
            .lifecycle
            .resolve_round(self.clock_ms, self.config.round_pause_ms)
        {
            return;
        }
        self.actors[winner.index()].score += 1;
        let round = self.round();
        let runner = self.actors[self.role_index(Role::Runner)].id;
        self.rounds.push(RoundRecord {
            round,
            runner,
            winner,
            reason,
            duration_ticks: self.play_ticks - self.round_started_at_tick,
        });
        self.events.push(RuntimeEvent::RoundResolved {
            round,
            winner,
            reason,
        });
    }

    fn poll_timers(&mut self) {
        match self.lifecycle.poll(self.clock_ms) {
            Some(LifecycleSignal::CountdownElapsed) => {
                self.events.push(RuntimeEvent::CountdownFinished {
                    round: self.round(),
                });
            }
            Some(LifecycleSignal::PauseElapsed) => match self.match_winner() {
                Some(winner) => {
                    if self.lifecycle.complete_match() {
                        self.events.push(RuntimeEvent::MatchComplete { winner });
                    }
                }
                None => {
                    self.setup_round();
                }
            },
            None => {}
        }
    }
}
