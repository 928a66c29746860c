use std::collections::VecDeque;

use crate::grid::GridModel;
use crate::types::{Direction, Vec2};

pub(crate) fn manhattan(a: Vec2, b: Vec2) -> i32 {
    (a.x - b.x).abs() + (a.y - b.y).abs()
}

pub(crate) fn tile_distance(a: Vec2, b: Vec2) -> f32 {
    let dx = (a.x - b.x) as f32;
    let dy = (a.y - b.y) as f32;
    (dx * dx + dy * dy).sqrt()
}

pub(crate) fn offset(tile: Vec2, dir: Direction) -> Vec2 {
    let (dx, dy) = dir.delta();
    Vec2::new(tile.x + dx, tile.y + dy)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Route {
    pub first: Direction,
    pub steps: u32,
}

/// Shortest path from `from` to the nearest tile matching `is_goal`.
/// `None` when already on a goal or when no goal is reachable.
pub(crate) fn route_toward(
    grid: &GridModel,
    from: Vec2,
    is_goal: impl Fn(Vec2) -> bool,
) -> Option<Route> {
    if is_goal(from) || grid.is_wall_at(from) {
        return None;
    }
    let width = grid.width().max(0) as usize;
    let height = grid.height().max(0) as usize;
    let index = |tile: Vec2| tile.y as usize * width + tile.x as usize;
    let mut first_dir: Vec<Option<Direction>> = vec![None; width * height];
    let mut steps = vec![0u32; width * height];
    let mut visited = vec![false; width * height];

    let mut queue = VecDeque::new();
    visited[index(from)] = true;
    queue.push_back(from);

    while let Some(tile) = queue.pop_front() {
        for dir in Direction::ALL {
            let next = offset(tile, dir);
            if grid.is_wall_at(next) || visited[index(next)] {
                continue;
            }
            visited[index(next)] = true;
            let first = if tile == from {
                Some(dir)
            } else {
                first_dir[index(tile)]
            };
            first_dir[index(next)] = first;
            steps[index(next)] = steps[index(tile)] + 1;
            if is_goal(next) {
                return first.map(|first| Route {
                    first,
                    steps: steps[index(next)],
                });
            }
            queue.push_back(next);
        }
    }
    None
}
