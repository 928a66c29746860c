use clap::Parser;
use grid_chase_server::autopilot::Autopilot;
use grid_chase_server::config::{ConfigError, MatchConfig};
use grid_chase_server::constants::TICK_MS;
use grid_chase_server::engine::MatchSession;
use grid_chase_server::grid::GridDefinition;
use grid_chase_server::logging::{emit_log, now_ms, LogContext, LogLevel};
use grid_chase_server::maps::{self, MapError};
use grid_chase_server::rng::Rng;
use grid_chase_server::types::{ActorId, RoundEndReason, RuntimeEvent, Snapshot};
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_MAX_TICKS: u64 = 20 * 60 * 15;

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs autopilot-vs-autopilot matches headlessly")]
struct Cli {
    /// Built-in map name or path to a JSON grid definition.
    #[arg(long, default_value = maps::DEFAULT_MAP)]
    map: String,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value_t = 5)]
    matches: u32,
    /// Safety limit per match, counted in steps.
    #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
    max_ticks: u64,
    #[arg(long)]
    match_id: Option<String>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum SimulateError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Map(#[from] MapError),
    #[error("failed to write summary {path}: {source}")]
    Summary {
        path: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Clone, Debug, Serialize)]
struct MatchResultLine {
    map: String,
    seed: u32,
    winner: Option<ActorId>,
    #[serde(rename = "scoreA")]
    score_a: u32,
    #[serde(rename = "scoreB")]
    score_b: u32,
    rounds: usize,
    #[serde(rename = "durationMs")]
    duration_ms: u64,
    ticks: u64,
    #[serde(rename = "pickupsConsumed")]
    pickups_consumed: u32,
    #[serde(rename = "bonusPromoted")]
    bonus_promoted: u32,
    #[serde(rename = "chaserTagged")]
    chaser_tagged: u32,
    #[serde(rename = "collectionWins")]
    collection_wins: u32,
    #[serde(rename = "catchWins")]
    catch_wins: u32,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
struct AnomalyRecord {
    tick: u64,
    message: String,
}

#[derive(Clone, Debug)]
struct MatchRunResult {
    result: MatchResultLine,
    anomaly_records: Vec<AnomalyRecord>,
    finished_tick: u64,
}

#[derive(Clone, Debug, Serialize)]
struct RunSummary {
    #[serde(rename = "matchId")]
    match_id: String,
    #[serde(rename = "startedAtMs")]
    started_at_ms: u64,
    #[serde(rename = "finishedAtMs")]
    finished_at_ms: u64,
    #[serde(rename = "matchCount")]
    match_count: usize,
    #[serde(rename = "anomalyCount")]
    anomaly_count: usize,
    #[serde(rename = "averageDurationMs")]
    average_duration_ms: u64,
    #[serde(rename = "winnerCounts")]
    winner_counts: BTreeMap<String, usize>,
    matches: Vec<MatchResultLine>,
}

fn main() {
    let cli = Cli::parse();
    let run_started_at_ms = now_ms();
    let base_seed = cli.seed.unwrap_or(run_started_at_ms);
    let match_id = cli
        .match_id
        .clone()
        .unwrap_or_else(|| default_match_id(normalize_seed(base_seed), run_started_at_ms));
    let log = LogContext::new(match_id.clone());

    match run(&cli, &log, base_seed, run_started_at_ms) {
        Ok(true) => std::process::exit(1),
        Ok(false) => {}
        Err(error) => {
            emit_log(
                &log,
                LogLevel::Error,
                "run_failed",
                None,
                json!({ "error": error.to_string() }),
            );
            std::process::exit(2);
        }
    }
}

/// Returns whether any anomaly was recorded.
fn run(
    cli: &Cli,
    log: &LogContext,
    base_seed: u64,
    started_at_ms: u64,
) -> Result<bool, SimulateError> {
    let config = match cli.config.as_deref() {
        Some(path) => MatchConfig::load(path)?,
        None => MatchConfig::default(),
    };
    let definition = maps::resolve(&cli.map)?;

    let mut results = Vec::new();
    let mut winner_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut total_duration_ms = 0u64;
    let mut total_anomalies = 0usize;

    for index in 0..cli.matches {
        let seed = normalize_seed(base_seed.wrapping_add(u64::from(index)));
        let match_log = log.with_seed(seed);
        emit_log(
            &match_log,
            LogLevel::Info,
            "match_started",
            None,
            json!({
                "map": definition.name,
                "index": index,
                "winScore": config.win_score,
            }),
        );

        let outcome = run_match(&definition, &config, seed, cli.max_ticks, &match_log)?;
        for anomaly in &outcome.anomaly_records {
            emit_log(
                &match_log,
                LogLevel::Warn,
                "anomaly_detected",
                Some(anomaly.tick),
                json!({ "message": anomaly.message }),
            );
        }
        total_anomalies += outcome.anomaly_records.len();
        total_duration_ms += outcome.result.duration_ms;
        *winner_counts
            .entry(winner_key(outcome.result.winner))
            .or_insert(0) += 1;

        emit_log(
            &match_log,
            LogLevel::Info,
            "match_finished",
            Some(outcome.finished_tick),
            json!({
                "winner": outcome.result.winner,
                "scoreA": outcome.result.score_a,
                "scoreB": outcome.result.score_b,
                "rounds": outcome.result.rounds,
                "durationMs": outcome.result.duration_ms,
                "anomalyCount": outcome.anomaly_records.len(),
            }),
        );
        print_json_line(&outcome.result);
        results.push(outcome.result);
    }

    let summary = build_run_summary(
        log.match_id.clone().unwrap_or_default(),
        started_at_ms,
        now_ms(),
        results,
        winner_counts,
        total_anomalies,
        total_duration_ms,
    );

    let mut summary_out_written: Option<String> = None;
    if let Some(path) = cli.summary_out.as_ref() {
        write_summary(path, &summary).map_err(|source| SimulateError::Summary {
            path: path.to_string_lossy().to_string(),
            source,
        })?;
        summary_out_written = Some(path.to_string_lossy().to_string());
    }

    emit_log(
        log,
        LogLevel::Info,
        "run_finished",
        None,
        json!({
            "matchCount": summary.match_count,
            "anomalyCount": summary.anomaly_count,
            "averageDurationMs": summary.average_duration_ms,
            "winnerCounts": summary.winner_counts,
            "summaryOut": summary_out_written,
        }),
    );
    Ok(summary.anomaly_count > 0)
}

fn run_match(
    definition: &GridDefinition,
    config: &MatchConfig,
    seed: u32,
    max_ticks: u64,
    log: &LogContext,
) -> Result<MatchRunResult, SimulateError> {
    let mut session = MatchSession::new(definition.clone(), config.clone(), ["A", "B"], seed)?;
    let mut seat_rng = Rng::new(seed);
    let mut pilots = [
        Autopilot::new(ActorId::A, seat_rng.fork(1).next_u32()),
        Autopilot::new(ActorId::B, seat_rng.fork(2).next_u32()),
    ];

    let mut result = MatchResultLine {
        map: definition.name.clone(),
        seed,
        winner: None,
        score_a: 0,
        score_b: 0,
        rounds: 0,
        duration_ms: 0,
        ticks: 0,
        pickups_consumed: 0,
        bonus_promoted: 0,
        chaser_tagged: 0,
        collection_wins: 0,
        catch_wins: 0,
        anomalies: Vec::new(),
    };
    let mut anomaly_records = Vec::new();
    let mut anomaly_seen = HashSet::new();
    let mut previous: Option<Snapshot> = None;

    session.start();
    while !session.is_complete() {
        for pilot in &mut pilots {
            if let Some(dir) = pilot.decide(&session) {
                session.set_intent(pilot.actor(), dir);
            }
        }
        session.step(TICK_MS);
        let snapshot = session.build_snapshot(true);

        for message in collect_snapshot_anomalies(previous.as_ref(), &snapshot) {
            push_anomaly(
                &mut result.anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                message,
            );
        }
        for event in &snapshot.events {
            match event {
                RuntimeEvent::PickupConsumed { .. } => result.pickups_consumed += 1,
                RuntimeEvent::BonusPromoted { .. } => result.bonus_promoted += 1,
                RuntimeEvent::ChaserTagged { .. } => result.chaser_tagged += 1,
                RuntimeEvent::RoundResolved {
                    round,
                    winner,
                    reason,
                } => {
                    match reason {
                        RoundEndReason::AllPickupsCollected => result.collection_wins += 1,
                        RoundEndReason::RunnerTagged => result.catch_wins += 1,
                    }
                    emit_log(
                        log,
                        LogLevel::Info,
                        "round_resolved",
                        Some(snapshot.tick),
                        json!({ "round": round, "winner": winner, "reason": reason }),
                    );
                }
                _ => {}
            }
        }

        if snapshot.tick >= max_ticks && !session.is_complete() {
            push_anomaly(
                &mut result.anomalies,
                &mut anomaly_records,
                &mut anomaly_seen,
                snapshot.tick,
                "tick safety limit exceeded".to_string(),
            );
            break;
        }
        previous = Some(snapshot);
    }

    result.score_a = session.actor(ActorId::A).score;
    result.score_b = session.actor(ActorId::B).score;
    result.rounds = session.rounds().len();
    result.duration_ms = session.clock_ms();
    result.ticks = session.tick();
    result.winner = session.build_summary().map(|summary| summary.winner);

    Ok(MatchRunResult {
        result,
        anomaly_records,
        finished_tick: session.tick(),
    })
}

fn collect_snapshot_anomalies(previous: Option<&Snapshot>, snapshot: &Snapshot) -> Vec<String> {
    let mut anomalies = Vec::new();
    let cell_at = |x: i32, y: i32| -> Option<u8> {
        let row = snapshot.grid.cells.get(usize::try_from(y).ok()?)?;
        row.get(usize::try_from(x).ok()?).copied()
    };

    for actor in &snapshot.actors {
        if matches!(cell_at(actor.tile_x, actor.tile_y), Some(1) | None) {
            anomalies.push(format!(
                "actor {:?} inside wall at ({},{})",
                actor.id, actor.tile_x, actor.tile_y
            ));
        }
    }

    if let Some(previous) = previous.filter(|prev| prev.round == snapshot.round) {
        for (before, after) in previous.actors.iter().zip(&snapshot.actors) {
            let frozen = before.disable_remaining > 0 && after.disable_remaining > 0;
            if frozen && (before.x != after.x || before.y != after.y) {
                anomalies.push(format!("disabled actor {:?} moved", after.id));
            }
        }
    }

    if snapshot.collected > snapshot.required_total {
        anomalies.push(format!(
            "collected exceeds required: {}/{}",
            snapshot.collected, snapshot.required_total
        ));
    }

    let bonus_cells = snapshot
        .grid
        .cells
        .iter()
        .flatten()
        .filter(|&&code| code == 3)
        .count();
    if bonus_cells > 1 {
        anomalies.push(format!("multiple bonus pickups active: {bonus_cells}"));
    }
    anomalies
}

fn normalize_seed(seed: u64) -> u32 {
    seed as u32
}

fn push_anomaly(
    anomalies: &mut Vec<String>,
    anomaly_records: &mut Vec<AnomalyRecord>,
    anomaly_seen: &mut HashSet<String>,
    tick: u64,
    message: String,
) {
    anomaly_records.push(AnomalyRecord {
        tick,
        message: message.clone(),
    });
    if anomaly_seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn default_match_id(seed: u32, timestamp_ms: u64) -> String {
    format!("sim-{seed}-{timestamp_ms}")
}

fn winner_key(winner: Option<ActorId>) -> String {
    match winner {
        Some(ActorId::A) => "a",
        Some(ActorId::B) => "b",
        None => "unfinished",
    }
    .to_string()
}

fn build_run_summary(
    match_id: String,
    started_at_ms: u64,
    finished_at_ms: u64,
    matches: Vec<MatchResultLine>,
    winner_counts: BTreeMap<String, usize>,
    anomaly_count: usize,
    total_duration_ms: u64,
) -> RunSummary {
    let match_count = matches.len();
    let average_duration_ms = if match_count == 0 {
        0
    } else {
        total_duration_ms / match_count as u64
    };
    RunSummary {
        match_id,
        started_at_ms,
        finished_at_ms,
        match_count,
        anomaly_count,
        average_duration_ms,
        winner_counts,
        matches,
    }
}

fn print_json_line(result: &MatchResultLine) {
    match serde_json::to_string(result) {
        Ok(text) => println!("{text}"),
        Err(error) => eprintln!("[simulate] failed to serialize match result: {error}"),
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary).map_err(io::Error::other)?;
    std::fs::write(path, summary_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_chase_server::types::{ActorView, Direction, GridView, Phase, Role};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn make_result(winner: Option<ActorId>, duration_ms: u64) -> MatchResultLine {
        MatchResultLine {
            map: "arena".to_string(),
            seed: 42,
            winner,
            score_a: 0,
            score_b: 0,
            rounds: 0,
            duration_ms,
            ticks: 0,
            pickups_consumed: 0,
            bonus_promoted: 0,
            chaser_tagged: 0,
            collection_wins: 0,
            catch_wins: 0,
            anomalies: Vec::new(),
        }
    }

    fn actor_view(id: ActorId, tile: (i32, i32), disable_remaining: u32) -> ActorView {
        ActorView {
            id,
            name: format!("{id:?}"),
            x: tile.0 as f32 + 0.5,
            y: tile.1 as f32 + 0.5,
            tile_x: tile.0,
            tile_y: tile.1,
            axis: Direction::None,
            intent: Direction::None,
            role: Role::Runner,
            score: 0,
            boost_remaining: 0,
            disable_remaining,
        }
    }

    fn make_snapshot(actors: Vec<ActorView>, cells: Vec<Vec<u8>>) -> Snapshot {
        Snapshot {
            tick: 1,
            clock_ms: 50,
            phase: Phase::Playing,
            round: 1,
            win_score: 3,
            countdown_remaining_ms: None,
            collected: 0,
            required_total: 2,
            actors,
            grid: GridView {
                width: cells[0].len() as i32,
                height: cells.len() as i32,
                cells,
            },
            events: Vec::new(),
        }
    }

    fn cells() -> Vec<Vec<u8>> {
        vec![
            vec![1, 1, 1, 1, 1],
            vec![1, 0, 2, 2, 1],
            vec![1, 1, 1, 1, 1],
        ]
    }

    #[test]
    fn default_match_id_contains_seed_and_timestamp() {
        assert_eq!(default_match_id(42, 123456789), "sim-42-123456789");
    }

    #[test]
    fn build_run_summary_calculates_average_duration() {
        let summary = build_run_summary(
            "sim-42-1".to_string(),
            1,
            2,
            vec![
                make_result(Some(ActorId::A), 60_000),
                make_result(Some(ActorId::B), 90_000),
            ],
            BTreeMap::from([("a".to_string(), 1usize), ("b".to_string(), 1usize)]),
            1,
            150_000,
        );
        assert_eq!(summary.average_duration_ms, 75_000);
        assert_eq!(summary.match_count, 2);
    }

    #[test]
    fn write_summary_returns_error_when_parent_does_not_exist() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let target = std::env::temp_dir()
            .join(format!("grid-chase-missing-{now}"))
            .join("summary.json");
        let summary = build_run_summary(
            "sim-1-1".to_string(),
            1,
            2,
            vec![make_result(None, 60_000)],
            BTreeMap::from([("unfinished".to_string(), 1usize)]),
            0,
            60_000,
        );
        assert!(write_summary(&target, &summary).is_err());
    }

    #[test]
    fn push_anomaly_keeps_records_and_deduplicates_summary_messages() {
        let mut anomalies = Vec::new();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        push_anomaly(&mut anomalies, &mut records, &mut seen, 10, "same".to_string());
        push_anomaly(&mut anomalies, &mut records, &mut seen, 11, "same".to_string());

        assert_eq!(anomalies.len(), 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tick, 10);
        assert_eq!(records[1].tick, 11);
    }

    #[test]
    fn clean_snapshot_has_no_anomalies() {
        let snapshot = make_snapshot(
            vec![
                actor_view(ActorId::A, (1, 1), 0),
                actor_view(ActorId::B, (3, 1), 0),
            ],
            cells(),
        );
        assert!(collect_snapshot_anomalies(None, &snapshot).is_empty());
    }

    #[test]
    fn detects_wall_overlap_and_counter_overflow() {
        let mut grid = cells();
        grid[1][2] = 3;
        grid[1][3] = 3;
        let mut snapshot = make_snapshot(
            vec![
                actor_view(ActorId::A, (0, 1), 0),
                actor_view(ActorId::B, (3, 1), 0),
            ],
            grid,
        );
        snapshot.collected = 3;
        let anomalies = collect_snapshot_anomalies(None, &snapshot);
        assert_eq!(anomalies.len(), 3, "{anomalies:?}");
    }

    #[test]
    fn detects_movement_while_disabled() {
        let before = make_snapshot(
            vec![
                actor_view(ActorId::A, (1, 1), 0),
                actor_view(ActorId::B, (3, 1), 5),
            ],
            cells(),
        );
        let after = make_snapshot(
            vec![
                actor_view(ActorId::A, (1, 1), 0),
                actor_view(ActorId::B, (2, 1), 4),
            ],
            cells(),
        );
        let anomalies = collect_snapshot_anomalies(Some(&before), &after);
        assert_eq!(anomalies, vec!["disabled actor B moved".to_string()]);
    }

    #[test]
    fn autopilot_match_keeps_invariants() {
        let definition = maps::builtin("open")
            .expect("open exists")
            .expect("open is valid");
        let config = MatchConfig {
            countdown_ms: 0,
            round_pause_ms: 0,
            win_score: 1,
            ..MatchConfig::default()
        };
        let outcome = run_match(&definition, &config, 7, 3_000, &LogContext::default())
            .expect("match should run");
        assert!(
            outcome
                .result
                .anomalies
                .iter()
                .all(|message| message == "tick safety limit exceeded"),
            "{:?}",
            outcome.result.anomalies
        );
        assert!(outcome.finished_tick <= 3_000);
    }
}
