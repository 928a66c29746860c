use super::*;

/// Round progress for the runner's collection goal. `required_total` grows by
/// one every time a regular pickup is promoted to the bonus pickup, so the
/// bonus has to be eaten before the round can be won by collection. Eating
/// the bonus credits both the regular pickup it replaced and the bonus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RoundCounters {
    pub collected: u32,
    pub required_total: u32,
}

impl RoundCounters {
    pub fn new(required_total: u32) -> Self {
        Self {
            collected: 0,
            required_total,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.required_total > 0 && self.collected >= self.required_total
    }
}

impl MatchSession {
    pub(super) fn apply_runner_pickups(&mut self, idx: usize) {
        if self.actors[idx].role != Role::Runner {
            return;
        }
        let tile = self.actors[idx].tile();
        let Some(kind) = self.grid.consume_pickup_at(tile.x, tile.y) else {
            return;
        };
        self.counters.collected += match kind {
            PickupKind::Regular => 1,
            PickupKind::Bonus => 2,
        };
        self.events.push(RuntimeEvent::PickupConsumed {
            x: tile.x,
            y: tile.y,
            kind,
            by: self.actors[idx].id,
        });

        match kind {
            PickupKind::Regular => {
                let remaining = self.grid.remaining_regular();
                if let Some(cell) = self.grid.maybe_promote_bonus_pickup(
                    remaining,
                    self.config.bonus_threshold,
                    &mut self.rng,
                ) {
                    self.counters.required_total += 1;
                    self.events.push(RuntimeEvent::BonusPromoted {
                        x: cell.x,
                        y: cell.y,
                    });
                }
            }
            PickupKind::Bonus => {
                self.actors[idx].apply_boost(self.config.boost_ticks);
            }
        }
    }
}
