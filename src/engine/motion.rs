use crate::constants::POSITION_EPSILON;
use crate::grid::GridModel;
use crate::types::{ActorId, ActorView, Direction, Point, Role, Vec2};

use super::utils::offset;

/// Mutable per-actor state. Positions are in tile units; tile `(x, y)` spans
/// `[x, x + 1) x [y, y + 1)`.
#[derive(Clone, Debug)]
pub struct ActorState {
    pub id: ActorId,
    pub name: String,
    pub position: Point,
    pub axis: Direction,
    pub intent: Direction,
    pub role: Role,
    pub score: u32,
    pub boost_remaining: u32,
    pub disable_remaining: u32,
}

impl ActorState {
    pub fn new(id: ActorId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            position: Point::tile_center(Vec2::new(1, 1)),
            axis: Direction::None,
            intent: Direction::None,
            role: Role::for_round(id, 1),
            score: 0,
            boost_remaining: 0,
            disable_remaining: 0,
        }
    }

    pub fn tile(&self) -> Vec2 {
        self.position.tile()
    }

    pub fn place_at(&mut self, tile: Vec2) {
        self.position = Point::tile_center(tile);
        self.axis = Direction::None;
        self.intent = Direction::None;
    }

    pub fn reset_for_round(&mut self, tile: Vec2, role: Role) {
        self.place_at(tile);
        self.role = role;
        self.boost_remaining = 0;
        self.disable_remaining = 0;
    }

    pub fn is_boosted(&self) -> bool {
        self.boost_remaining > 0
    }

    pub fn is_disabled(&self) -> bool {
        self.disable_remaining > 0
    }

    /// Ignored while disabled. Returns whether the intent was recorded.
    pub fn set_intent(&mut self, dir: Direction) -> bool {
        if self.is_disabled() {
            return false;
        }
        self.intent = dir;
        true
    }

    pub fn apply_boost(&mut self, ticks: u32) {
        self.boost_remaining = ticks;
    }

    pub fn apply_disable(&mut self, ticks: u32) {
        self.disable_remaining = ticks;
        self.axis = Direction::None;
        self.intent = Direction::None;
    }

    pub fn tick_status_effects(&mut self) {
        self.boost_remaining = self.boost_remaining.saturating_sub(1);
        self.disable_remaining = self.disable_remaining.saturating_sub(1);
    }

    pub fn to_view(&self) -> ActorView {
        let tile = self.tile();
        ActorView {
            id: self.id,
            name: self.name.clone(),
            x: self.position.x,
            y: self.position.y,
            tile_x: tile.x,
            tile_y: tile.y,
            axis: self.axis,
            intent: self.intent,
            role: self.role,
            score: self.score,
            boost_remaining: self.boost_remaining,
            disable_remaining: self.disable_remaining,
        }
    }
}

pub(crate) fn at_decision_point(position: Point, step: f32) -> bool {
    let center = Point::tile_center(position.tile());
    let limit = (step - POSITION_EPSILON).max(POSITION_EPSILON);
    (position.x - center.x).abs() < limit && (position.y - center.y).abs() < limit
}

/// Advances one actor by one tick. Turns only happen at tile centers, and a
/// queued intent that points into a wall stays queued for a later center.
/// An actor at rest is treated as sitting on its center.
/// Returns whether the position changed.
pub fn resolve_motion(actor: &mut ActorState, grid: &GridModel, step: f32, radius: f32) -> bool {
    if actor.is_disabled() {
        return false;
    }
    let before = actor.position;
    let resting_with_intent = actor.axis.is_none() && !actor.intent.is_none();

    if resting_with_intent || at_decision_point(actor.position, step) {
        let tile = actor.tile();
        actor.position = Point::tile_center(tile);
        if !actor.intent.is_none() && !grid.is_wall_at(offset(tile, actor.intent)) {
            actor.axis = actor.intent;
            actor.intent = Direction::None;
        }
        if !actor.axis.is_none() && grid.is_wall_at(offset(tile, actor.axis)) {
            actor.axis = Direction::None;
        }
    }

    if !actor.axis.is_none() {
        let (dx, dy) = actor.axis.delta();
        let reach = radius + step;
        let leading_edge = Point {
            x: actor.position.x + dx as f32 * reach,
            y: actor.position.y + dy as f32 * reach,
        };
        if grid.is_wall_at(leading_edge.tile()) {
            actor.axis = Direction::None;
        } else {
            actor.position.x += dx as f32 * step;
            actor.position.y += dy as f32 * step;
        }
    }

    actor.position != before
}
