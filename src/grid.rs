use serde::Deserialize;
use thiserror::Error;

use crate::rng::Rng;
use crate::types::{CellKind, GridView, PickupKind, Vec2};

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid definition is empty")]
    Empty,
    #[error("row {row} has {found} cells, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown cell value {value} at ({x},{y})")]
    UnknownCell { x: i32, y: i32, value: i64 },
    #[error("border cell ({x},{y}) must be a wall")]
    OpenBorder { x: i32, y: i32 },
    #[error("bonus pickup at ({x},{y}) cannot be authored")]
    AuthoredBonus { x: i32, y: i32 },
    #[error("grid definition contains no pickups")]
    NoPickups,
    #[error("fallback corner ({x},{y}) is outside the grid")]
    CornerOutOfBounds { x: i32, y: i32 },
    #[error("fallback corner ({x},{y}) is a wall")]
    WallCorner { x: i32, y: i32 },
    #[error("invalid grid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDefinition {
    Matrix(Vec<Vec<i64>>),
    Named {
        #[serde(default)]
        name: Option<String>,
        cells: Vec<Vec<i64>>,
        #[serde(default)]
        corners: Option<[[i32; 2]; 2]>,
    },
}

/// Authored layout of a grid. Immutable once validated; every round starts
/// from a fresh copy of these cells.
#[derive(Clone, Debug)]
pub struct GridDefinition {
    pub name: String,
    width: i32,
    height: i32,
    cells: Vec<CellKind>,
    corners: [Vec2; 2],
}

impl GridDefinition {
    pub fn from_matrix(name: &str, rows: &[Vec<i64>]) -> Result<Self, GridError> {
        let height = rows.len();
        let width = rows.first().map(|row| row.len()).unwrap_or(0);
        if height == 0 || width == 0 {
            return Err(GridError::Empty);
        }

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(GridError::Ragged {
                    row: y,
                    expected: width,
                    found: row.len(),
                });
            }
            for (x, value) in row.iter().enumerate() {
                let (x, y) = (x as i32, y as i32);
                let kind = u8::try_from(*value)
                    .ok()
                    .and_then(CellKind::from_code)
                    .ok_or(GridError::UnknownCell {
                        x,
                        y,
                        value: *value,
                    })?;
                cells.push(kind);
            }
        }

        let width = width as i32;
        let height = height as i32;
        let mut definition = Self {
            name: name.to_string(),
            width,
            height,
            cells,
            corners: [Vec2::new(1, 1), Vec2::new(width - 2, height - 2)],
        };
        definition.validate()?;
        definition.corners = definition.default_corners();
        Ok(definition)
    }

    /// Parses rows written as digit strings, e.g. `"10201"`.
    pub fn from_digit_rows(name: &str, rows: &[&str]) -> Result<Self, GridError> {
        let matrix: Vec<Vec<i64>> = rows
            .iter()
            .map(|row| {
                row.chars()
                    .map(|ch| ch.to_digit(10).map(i64::from).unwrap_or(-1))
                    .collect()
            })
            .collect();
        Self::from_matrix(name, &matrix)
    }

    pub fn from_json(name: &str, raw: &str) -> Result<Self, GridError> {
        match serde_json::from_str::<RawDefinition>(raw)? {
            RawDefinition::Matrix(rows) => Self::from_matrix(name, &rows),
            RawDefinition::Named {
                name: inner_name,
                cells,
                corners,
            } => {
                let mut definition =
                    Self::from_matrix(inner_name.as_deref().unwrap_or(name), &cells)?;
                if let Some([[ax, ay], [bx, by]]) = corners {
                    definition = definition.with_corners(Vec2::new(ax, ay), Vec2::new(bx, by))?;
                }
                Ok(definition)
            }
        }
    }

    pub fn with_corners(mut self, a: Vec2, b: Vec2) -> Result<Self, GridError> {
        for corner in [a, b] {
            if !self.in_bounds(corner.x, corner.y) {
                return Err(GridError::CornerOutOfBounds {
                    x: corner.x,
                    y: corner.y,
                });
            }
            if self.cell(corner.x, corner.y) == CellKind::Wall {
                return Err(GridError::WallCorner {
                    x: corner.x,
                    y: corner.y,
                });
            }
        }
        self.corners = [a, b];
        Ok(self)
    }

    /// `(1, 1)` and `(width - 2, height - 2)` unless they are walls, in which
    /// case the first and last open cells in row-major order stand in.
    fn default_corners(&self) -> [Vec2; 2] {
        let open: Vec<Vec2> = (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| Vec2::new(x, y)))
            .filter(|tile| self.cell(tile.x, tile.y) != CellKind::Wall)
            .collect();
        let [mut first, mut last] = self.corners;
        if self.cell(first.x, first.y) == CellKind::Wall {
            first = open.first().copied().unwrap_or(first);
        }
        if self.cell(last.x, last.y) == CellKind::Wall {
            last = open.last().copied().unwrap_or(last);
        }
        [first, last]
    }

    fn validate(&self) -> Result<(), GridError> {
        let mut pickups = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                let kind = self.cells[(y * self.width + x) as usize];
                let on_border = x == 0 || y == 0 || x == self.width - 1 || y == self.height - 1;
                if on_border && kind != CellKind::Wall {
                    return Err(GridError::OpenBorder { x, y });
                }
                match kind {
                    CellKind::BonusPickup => return Err(GridError::AuthoredBonus { x, y }),
                    CellKind::Pickup => pickups += 1,
                    _ => {}
                }
            }
        }
        if pickups == 0 {
            return Err(GridError::NoPickups);
        }
        Ok(())
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn corners(&self) -> [Vec2; 2] {
        self.corners
    }

    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    pub fn cell(&self, x: i32, y: i32) -> CellKind {
        if !self.in_bounds(x, y) {
            return CellKind::Wall;
        }
        self.cells[(y * self.width + x) as usize]
    }

    /// Plain path cells (no pickup) in row-major order; spawn candidates.
    pub fn path_cells(&self) -> Vec<Vec2> {
        self.cells_of(CellKind::Path)
    }

    pub fn pickup_count(&self) -> u32 {
        self.cells
            .iter()
            .filter(|kind| **kind == CellKind::Pickup)
            .count() as u32
    }

    fn cells_of(&self, wanted: CellKind) -> Vec<Vec2> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.cell(x, y) == wanted {
                    out.push(Vec2::new(x, y));
                }
            }
        }
        out
    }

    pub fn to_matrix(&self) -> Vec<Vec<u8>> {
        matrix_of(&self.cells, self.width)
    }
}

fn matrix_of(cells: &[CellKind], width: i32) -> Vec<Vec<u8>> {
    cells
        .chunks(width as usize)
        .map(|row| row.iter().map(|kind| kind.code()).collect())
        .collect()
}

/// Per-round mutable cell state layered over a definition.
#[derive(Clone, Debug)]
pub struct GridModel {
    definition: GridDefinition,
    cells: Vec<CellKind>,
    active_bonus: Option<Vec2>,
}

impl GridModel {
    pub fn new(definition: GridDefinition) -> Self {
        let cells = definition.cells.clone();
        Self {
            definition,
            cells,
            active_bonus: None,
        }
    }

    pub fn definition(&self) -> &GridDefinition {
        &self.definition
    }

    pub fn width(&self) -> i32 {
        self.definition.width
    }

    pub fn height(&self) -> i32 {
        self.definition.height
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.definition.in_bounds(x, y) {
            return None;
        }
        Some((y * self.definition.width + x) as usize)
    }

    pub fn cell(&self, x: i32, y: i32) -> CellKind {
        self.index(x, y)
            .map(|idx| self.cells[idx])
            .unwrap_or(CellKind::Wall)
    }

    /// Anything outside the grid counts as wall.
    pub fn is_wall(&self, x: i32, y: i32) -> bool {
        self.cell(x, y) == CellKind::Wall
    }

    pub fn is_wall_at(&self, tile: Vec2) -> bool {
        self.is_wall(tile.x, tile.y)
    }

    pub fn consume_pickup_at(&mut self, x: i32, y: i32) -> Option<PickupKind> {
        let idx = self.index(x, y)?;
        let consumed = match self.cells[idx] {
            CellKind::Pickup => PickupKind::Regular,
            CellKind::BonusPickup => {
                self.active_bonus = None;
                PickupKind::Bonus
            }
            CellKind::Wall | CellKind::Path => return None,
        };
        self.cells[idx] = CellKind::Path;
        Some(consumed)
    }

    /// Converts one random remaining regular pickup into the bonus pickup when
    /// `0 < remaining_regular <= threshold` and no bonus is on the grid.
    /// Returns the promoted cell.
    pub fn maybe_promote_bonus_pickup(
        &mut self,
        remaining_regular: u32,
        threshold: u32,
        rng: &mut Rng,
    ) -> Option<Vec2> {
        if self.active_bonus.is_some() || remaining_regular == 0 || remaining_regular > threshold
        {
            return None;
        }
        let candidates = self.remaining_cells(CellKind::Pickup);
        if candidates.is_empty() {
            return None;
        }
        let chosen = candidates[rng.pick_index(candidates.len())];
        let idx = self.index(chosen.x, chosen.y)?;
        self.cells[idx] = CellKind::BonusPickup;
        self.active_bonus = Some(chosen);
        Some(chosen)
    }

    pub fn remaining_regular(&self) -> u32 {
        self.cells
            .iter()
            .filter(|kind| **kind == CellKind::Pickup)
            .count() as u32
    }

    pub fn active_bonus(&self) -> Option<Vec2> {
        self.active_bonus
    }

    pub fn reset_to_definition(&mut self) {
        self.cells.clone_from(&self.definition.cells);
        self.active_bonus = None;
    }

    fn remaining_cells(&self, wanted: CellKind) -> Vec<Vec2> {
        let width = self.definition.width;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, kind)| **kind == wanted)
            .map(|(idx, _)| Vec2::new(idx as i32 % width, idx as i32 / width))
            .collect()
    }

    pub fn pickup_cells(&self) -> Vec<Vec2> {
        let mut cells = self.remaining_cells(CellKind::Pickup);
        cells.extend(self.active_bonus);
        cells
    }

    pub fn cell_matrix(&self) -> Vec<Vec<u8>> {
        matrix_of(&self.cells, self.definition.width)
    }

    pub fn to_view(&self) -> GridView {
        GridView {
            width: self.width(),
            height: self.height(),
            cells: self.cell_matrix(),
        }
    }
}
