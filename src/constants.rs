pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const DEFAULT_WIN_SCORE: u32 = 3;
pub const DEFAULT_COUNTDOWN_MS: u64 = 3_000;
pub const DEFAULT_ROUND_PAUSE_MS: u64 = 1_500;
pub const DEFAULT_BOOST_TICKS: u32 = 8 * TICK_RATE;
pub const DEFAULT_DISABLE_TICKS: u32 = 3 * TICK_RATE;
pub const DEFAULT_MIN_SPAWN_SEPARATION: f32 = 6.0;
pub const DEFAULT_SPAWN_RETRY_BUDGET: u32 = 64;
pub const DEFAULT_MOVE_STEP: f32 = 0.125;
pub const DEFAULT_ACTOR_RADIUS: f32 = 0.4;
pub const DEFAULT_ENCOUNTER_SLACK: f32 = 0.05;
pub const DEFAULT_BONUS_THRESHOLD: u32 = 10;

/// Tolerance used when comparing continuous positions against tile centers.
pub const POSITION_EPSILON: f32 = 1e-4;

/// Manhattan distance at which the autopilot runner starts fleeing.
pub const AUTOPILOT_DANGER_DISTANCE: i32 = 3;

pub fn ticks_to_ms(ticks: u32) -> u64 {
    ticks as u64 * TICK_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_durations_match_tick_rate() {
        assert_eq!(ticks_to_ms(DEFAULT_BOOST_TICKS), 8_000);
        assert_eq!(ticks_to_ms(DEFAULT_DISABLE_TICKS), 3_000);
    }

    #[test]
    fn default_step_divides_a_tile_evenly() {
        let steps = 1.0 / DEFAULT_MOVE_STEP;
        assert_eq!(steps.fract(), 0.0);
    }

    #[test]
    fn default_leading_edge_reaches_next_tile_from_center() {
        assert!(DEFAULT_ACTOR_RADIUS < 0.5);
        assert!(0.5 + DEFAULT_ACTOR_RADIUS + DEFAULT_MOVE_STEP > 1.0);
    }
}
