use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::grid::{GridDefinition, GridError};

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read map {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("map {name}: {source}")]
    Invalid {
        name: String,
        #[source]
        source: GridError,
    },
}

const ARENA: [&str; 13] = [
    "1111111111111111111",
    "1002222222222222001",
    "1012121211121212101",
    "1222222222222222221",
    "1212111212121112121",
    "1222222220222222221",
    "1211121200021211121",
    "1222222220222222221",
    "1212111212121112121",
    "1222222222222222221",
    "1012121211121212101",
    "1002222222222222001",
    "1111111111111111111",
];

const OPEN: [&str; 7] = [
    "111111111",
    "100222001",
    "102000201",
    "120010021",
    "102000201",
    "100222001",
    "111111111",
];

pub const DEFAULT_MAP: &str = "arena";

pub fn names() -> Vec<&'static str> {
    vec!["arena", "open"]
}

pub fn builtin(name: &str) -> Option<Result<GridDefinition, GridError>> {
    match name {
        "arena" => Some(GridDefinition::from_digit_rows("arena", &ARENA)),
        "open" => Some(GridDefinition::from_digit_rows("open", &OPEN)),
        _ => None,
    }
}

/// Resolves a built-in map name first, then falls back to reading a JSON grid
/// definition from disk.
pub fn resolve(name_or_path: &str) -> Result<GridDefinition, MapError> {
    if let Some(result) = builtin(name_or_path) {
        return result.map_err(|source| MapError::Invalid {
            name: name_or_path.to_string(),
            source,
        });
    }
    load_file(Path::new(name_or_path))
}

pub fn load_file(path: &Path) -> Result<GridDefinition, MapError> {
    let display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| MapError::Io {
        path: display.clone(),
        source,
    })?;
    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| display.clone());
    GridDefinition::from_json(&name, &raw).map_err(|source| MapError::Invalid {
        name: display,
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};

    use super::*;
    use crate::grid::GridModel;
    use crate::types::Vec2;

    fn reachable(grid: &GridModel, start: Vec2) -> HashSet<Vec2> {
        let mut out = HashSet::new();
        let mut queue = VecDeque::new();
        out.insert(start);
        queue.push_back(start);
        while let Some(cell) = queue.pop_front() {
            for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                let next = Vec2::new(cell.x + dx, cell.y + dy);
                if grid.is_wall_at(next) {
                    continue;
                }
                if out.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        out
    }

    #[test]
    fn every_builtin_map_is_valid() {
        for name in names() {
            let definition = builtin(name)
                .expect("listed map exists")
                .expect("builtin map should validate");
            assert_eq!(definition.name, name);
            assert!(definition.path_cells().len() >= 2);
        }
        assert!(builtin("missing").is_none());
    }

    #[test]
    fn all_open_cells_are_connected() {
        for name in names() {
            let definition = builtin(name)
                .expect("listed map exists")
                .expect("builtin map should validate");
            let grid = GridModel::new(definition.clone());
            let start = definition.path_cells()[0];
            let seen = reachable(&grid, start);
            for y in 0..grid.height() {
                for x in 0..grid.width() {
                    if !grid.is_wall(x, y) {
                        assert!(
                            seen.contains(&Vec2::new(x, y)),
                            "unreachable cell on {name}: ({x},{y})"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn fallback_corners_are_open_on_builtin_maps() {
        for name in names() {
            let definition = builtin(name)
                .expect("listed map exists")
                .expect("builtin map should validate");
            let grid = GridModel::new(definition.clone());
            for corner in definition.corners() {
                assert!(!grid.is_wall_at(corner));
            }
        }
    }

    #[test]
    fn resolve_prefers_builtin_names() {
        let definition = resolve("open").expect("open is builtin");
        assert_eq!(definition.name, "open");
    }

    #[test]
    fn resolve_reads_json_files_and_reports_failures() {
        let dir = std::env::temp_dir().join(format!("grid-chase-maps-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("temp dir should be writable");

        let good = dir.join("tiny.json");
        fs::write(&good, "[[1,1,1,1],[1,0,2,1],[1,1,1,1]]").expect("write map");
        let definition = resolve(good.to_str().expect("utf8 path")).expect("map should load");
        assert_eq!(definition.name, "tiny");

        let bad = dir.join("bad.json");
        fs::write(&bad, "[[1,1,1],[1,0,1],[1,1,1]]").expect("write map");
        assert!(matches!(
            resolve(bad.to_str().expect("utf8 path")),
            Err(MapError::Invalid { .. })
        ));

        assert!(matches!(
            resolve(dir.join("missing.json").to_str().expect("utf8 path")),
            Err(MapError::Io { .. })
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
