use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn parse_move(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
            Direction::None => (0, 0),
        }
    }

    pub fn is_none(self) -> bool {
        self == Direction::None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorId {
    A,
    B,
}

impl ActorId {
    pub const BOTH: [ActorId; 2] = [ActorId::A, ActorId::B];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Self::A),
            "b" => Some(Self::B),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            ActorId::A => 0,
            ActorId::B => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            ActorId::A => ActorId::B,
            ActorId::B => ActorId::A,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Runner,
    Chaser,
}

impl Role {
    /// Odd rounds give actor A the runner role, even rounds give it to B.
    pub fn for_round(actor: ActorId, round: u32) -> Self {
        let a_runs = round % 2 == 1;
        match (actor, a_runs) {
            (ActorId::A, true) | (ActorId::B, false) => Role::Runner,
            _ => Role::Chaser,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Wall,
    Path,
    Pickup,
    BonusPickup,
}

impl CellKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Path),
            1 => Some(Self::Wall),
            2 => Some(Self::Pickup),
            3 => Some(Self::BonusPickup),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            CellKind::Path => 0,
            CellKind::Wall => 1,
            CellKind::Pickup => 2,
            CellKind::BonusPickup => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupKind {
    Regular,
    Bonus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initial,
    RoundSetup,
    Countdown,
    Playing,
    RoundResolved,
    MatchComplete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    AllPickupsCollected,
    RunnerTagged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn tile_center(tile: Vec2) -> Self {
        Self {
            x: tile.x as f32 + 0.5,
            y: tile.y as f32 + 0.5,
        }
    }

    pub fn tile(self) -> Vec2 {
        Vec2 {
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
        }
    }

    pub fn distance(self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ActorView {
    pub id: ActorId,
    pub name: String,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "tileX")]
    pub tile_x: i32,
    #[serde(rename = "tileY")]
    pub tile_y: i32,
    pub axis: Direction,
    pub intent: Direction,
    pub role: Role,
    pub score: u32,
    #[serde(rename = "boostRemaining")]
    pub boost_remaining: u32,
    #[serde(rename = "disableRemaining")]
    pub disable_remaining: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct GridView {
    pub width: i32,
    pub height: i32,
    pub cells: Vec<Vec<u8>>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    RoundStarted {
        round: u32,
        runner: ActorId,
        #[serde(rename = "requiredTotal")]
        required_total: u32,
    },
    CountdownFinished {
        round: u32,
    },
    PickupConsumed {
        x: i32,
        y: i32,
        kind: PickupKind,
        by: ActorId,
    },
    BonusPromoted {
        x: i32,
        y: i32,
    },
    ChaserTagged {
        chaser: ActorId,
        #[serde(rename = "relocatedTo")]
        relocated_to: Vec2,
    },
    RoundResolved {
        round: u32,
        winner: ActorId,
        reason: RoundEndReason,
    },
    MatchComplete {
        winner: ActorId,
    },
    MatchRestarted,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "clockMs")]
    pub clock_ms: u64,
    pub phase: Phase,
    pub round: u32,
    #[serde(rename = "winScore")]
    pub win_score: u32,
    #[serde(rename = "countdownRemainingMs")]
    pub countdown_remaining_ms: Option<u64>,
    pub collected: u32,
    #[serde(rename = "requiredTotal")]
    pub required_total: u32,
    pub actors: Vec<ActorView>,
    pub grid: GridView,
    pub events: Vec<RuntimeEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoundRecord {
    pub round: u32,
    pub runner: ActorId,
    pub winner: ActorId,
    pub reason: RoundEndReason,
    #[serde(rename = "durationTicks")]
    pub duration_ticks: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScoreEntry {
    pub id: ActorId,
    pub name: String,
    pub score: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct MatchSummary {
    pub winner: ActorId,
    pub rounds: Vec<RoundRecord>,
    pub scores: Vec<ScoreEntry>,
    #[serde(rename = "totalTicks")]
    pub total_ticks: u64,
}
