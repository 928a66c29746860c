use crate::constants::AUTOPILOT_DANGER_DISTANCE;
use crate::engine::utils::{manhattan, offset, route_toward};
use crate::engine::{ActorState, MatchSession};
use crate::grid::GridModel;
use crate::rng::Rng;
use crate::types::{ActorId, CellKind, Direction, Phase, Role, Vec2};

/// Computer controller for one seat. It reads the session and answers with
/// the intent to queue; the caller forwards it through `set_intent`.
#[derive(Clone, Debug)]
pub struct Autopilot {
    actor: ActorId,
    rng: Rng,
    last_tile: Option<Vec2>,
    last_round: u32,
}

impl Autopilot {
    pub fn new(actor: ActorId, seed: u32) -> Self {
        Self {
            actor,
            rng: Rng::new(seed),
            last_tile: None,
            last_round: 0,
        }
    }

    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Returns a new intent when one is needed: on entering a tile, at the
    /// start of a round, or while standing still. `None` keeps the current
    /// plan.
    pub fn decide(&mut self, session: &MatchSession) -> Option<Direction> {
        if !matches!(session.phase(), Phase::Countdown | Phase::Playing) {
            return None;
        }
        let me = session.actor(self.actor);
        if me.is_disabled() {
            self.last_tile = None;
            return None;
        }
        let tile = me.tile();
        let fresh_round = self.last_round != session.round();
        if !fresh_round && self.last_tile == Some(tile) && !me.axis.is_none() {
            return None;
        }
        self.last_tile = Some(tile);
        self.last_round = session.round();

        let other = session.actor(self.actor.other());
        let dir = match me.role {
            Role::Runner => self.runner_move(session.grid(), me, other),
            Role::Chaser => self.chaser_move(session.grid(), me, other),
        };
        Some(dir)
    }

    fn runner_move(
        &mut self,
        grid: &GridModel,
        me: &ActorState,
        chaser: &ActorState,
    ) -> Direction {
        let here = me.tile();
        let threat = chaser.tile();
        let chaser_active = !chaser.is_disabled();

        if chaser_active && me.is_boosted() {
            return self.move_toward(grid, here, threat);
        }
        if chaser_active && manhattan(here, threat) <= AUTOPILOT_DANGER_DISTANCE {
            return self.move_away(grid, here, threat);
        }

        let nearest = route_toward(grid, here, |tile| {
            matches!(grid.cell(tile.x, tile.y), CellKind::Pickup | CellKind::BonusPickup)
        });
        let bonus = grid
            .active_bonus()
            .and_then(|cell| route_toward(grid, here, |tile| tile == cell));
        match (bonus, nearest) {
            (Some(bonus), Some(nearest)) if bonus.steps <= nearest.steps => bonus.first,
            (_, Some(nearest)) => nearest.first,
            (Some(bonus), None) => bonus.first,
            (None, None) => self.wander(grid, here),
        }
    }

    fn chaser_move(
        &mut self,
        grid: &GridModel,
        me: &ActorState,
        runner: &ActorState,
    ) -> Direction {
        let here = me.tile();
        let target = runner.tile();
        if runner.is_boosted() {
            return self.move_away(grid, here, target);
        }
        self.move_toward(grid, here, target)
    }

    fn move_toward(&mut self, grid: &GridModel, from: Vec2, target: Vec2) -> Direction {
        if let Some(route) = route_toward(grid, from, |tile| tile == target) {
            return route.first;
        }
        self.pick_neighbor(grid, from, |next| -manhattan(next, target))
    }

    fn move_away(&mut self, grid: &GridModel, from: Vec2, threat: Vec2) -> Direction {
        self.pick_neighbor(grid, from, |next| manhattan(next, threat))
    }

    fn wander(&mut self, grid: &GridModel, from: Vec2) -> Direction {
        self.pick_neighbor(grid, from, |_| 0)
    }

    /// Highest-scoring open neighbour, ties broken with the seat's own rng.
    fn pick_neighbor(
        &mut self,
        grid: &GridModel,
        from: Vec2,
        score: impl Fn(Vec2) -> i32,
    ) -> Direction {
        let mut best_score = i32::MIN;
        let mut best: Vec<Direction> = Vec::new();
        for dir in Direction::ALL {
            let next = offset(from, dir);
            if grid.is_wall_at(next) {
                continue;
            }
            let value = score(next);
            if value > best_score {
                best_score = value;
                best.clear();
            }
            if value == best_score {
                best.push(dir);
            }
        }
        if best.is_empty() {
            return Direction::None;
        }
        best[self.rng.pick_index(best.len())]
    }
}
