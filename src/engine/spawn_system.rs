use super::*;

/// Draws spawn cells from a fixed candidate list. Candidates are the
/// definition's plain path cells, never pickups or walls.
pub struct SpawnPlanner<'a> {
    candidates: &'a [Vec2],
    min_separation: f32,
    retry_budget: u32,
}

impl<'a> SpawnPlanner<'a> {
    pub fn new(candidates: &'a [Vec2], min_separation: f32, retry_budget: u32) -> Self {
        Self {
            candidates,
            min_separation,
            retry_budget,
        }
    }

    /// Picks two distinct cells at least `min_separation` apart when the
    /// retry budget allows it. Falls back to the farthest remaining candidate,
    /// then to the definition's corners once the candidates run out.
    pub fn plan_pair(&self, corners: [Vec2; 2], rng: &mut Rng) -> [Vec2; 2] {
        match self.candidates {
            [] => return corners,
            [only] => {
                let second = if corners[1] == *only {
                    corners[0]
                } else {
                    corners[1]
                };
                return [*only, second];
            }
            _ => {}
        }
        let mut remaining = self.candidates.to_vec();
        let first = remaining.swap_remove(rng.pick_index(remaining.len()));

        for _ in 0..self.retry_budget {
            let candidate = remaining[rng.pick_index(remaining.len())];
            if tile_distance(first, candidate) >= self.min_separation {
                return [first, candidate];
            }
        }
        let second = farthest_from(&remaining, first).unwrap_or(corners[1]);
        [first, second]
    }

    pub fn draw_one(&self, avoid: Vec2, fallback: Vec2, rng: &mut Rng) -> Vec2 {
        let pool: Vec<Vec2> = self
            .candidates
            .iter()
            .copied()
            .filter(|cell| *cell != avoid)
            .collect();
        if pool.is_empty() {
            return fallback;
        }
        for _ in 0..self.retry_budget {
            let candidate = pool[rng.pick_index(pool.len())];
            if tile_distance(avoid, candidate) >= self.min_separation {
                return candidate;
            }
        }
        farthest_from(&pool, avoid).unwrap_or(fallback)
    }
}

fn farthest_from(cells: &[Vec2], origin: Vec2) -> Option<Vec2> {
    let mut best: Option<(Vec2, f32)> = None;
    for cell in cells {
        let distance = tile_distance(origin, *cell);
        if best.map(|(_, d)| distance > d).unwrap_or(true) {
            best = Some((*cell, distance));
        }
    }
    best.map(|(cell, _)| cell)
}

impl MatchSession {
    pub(super) fn place_round_actors(&mut self, round: u32) {
        let planner = SpawnPlanner::new(
            &self.spawn_candidates,
            self.config.min_spawn_separation,
            self.config.spawn_retry_budget,
        );
        let spawns = planner.plan_pair(self.grid.definition().corners(), &mut self.rng);
        for (actor, spawn) in self.actors.iter_mut().zip(spawns) {
            actor.reset_for_round(spawn, Role::for_round(actor.id, round));
        }
    }

    pub(super) fn relocate_actor(&mut self, idx: usize, avoid: Vec2) -> Vec2 {
        let planner = SpawnPlanner::new(
            &self.spawn_candidates,
            self.config.min_spawn_separation,
            self.config.spawn_retry_budget,
        );
        let fallback = self.grid.definition().corners()[0];
        let target = planner.draw_one(avoid, fallback, &mut self.rng);
        self.actors[idx].place_at(target);
        target
    }
}
