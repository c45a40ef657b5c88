use std::fs;
use std::path::Path;

use rosterlab_core::domain::{Category, SnapshotRecord};
use rosterlab_core::history::HistoryTable;
use rosterlab_core::oracle::LinearOracle;
use rosterlab_core::synthetic::SyntheticMarket;
use rosterlab_runner::{
    export_json, export_roster_csv, import_json, load_history, load_round_updates, load_snapshot, run_selection,
    save_history, FormationOutcome, SelectionConfig,
};

fn market() -> (Vec<SnapshotRecord>, HistoryTable) {
    let round = SyntheticMarket::new(21).with_size(12).generate();
    (round.records, round.history)
}

fn write_snapshot_csv(path: &Path, records: &[SnapshotRecord]) {
    let mut out = String::from("id,category,price,nominal_average,price_variation,participated,status,club\n");
    for r in records {
        out.push_str(&format!(
            "{},{},{},{},{},{},,{}\n",
            r.id,
            r.category.code(),
            r.price,
            r.nominal_average,
            r.price_variation,
            r.participated,
            r.club
        ));
    }
    fs::write(path, out).unwrap();
}

#[test]
fn csv_and_json_snapshots_load_the_same_records() {
    let dir = tempfile::tempdir().unwrap();
    let (mut records, _) = market();
    for r in &mut records {
        r.status = Default::default();
    }

    let csv_path = dir.path().join("market.csv");
    let json_path = dir.path().join("market.json");
    write_snapshot_csv(&csv_path, &records);
    fs::write(&json_path, serde_json::to_string(&records).unwrap()).unwrap();

    let from_csv = load_snapshot(&csv_path).unwrap();
    let from_json = load_snapshot(&json_path).unwrap();
    assert_eq!(from_csv.len(), records.len());
    assert_eq!(from_json.len(), records.len());
    for ((a, b), original) in from_csv.iter().zip(&from_json).zip(&records) {
        assert_eq!(a.id, original.id);
        assert_eq!(b.id, original.id);
        assert_eq!(a.category, original.category);
        assert_eq!(b.club, original.club);
        assert!((a.price - original.price).abs() < 1e-9);
        assert!((b.nominal_average - original.nominal_average).abs() < 1e-9);
    }
}

#[test]
fn round_updates_grow_persisted_history() {
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("state").join("history.json");
    let updates_path = dir.path().join("round.csv");
    fs::write(
        &updates_path,
        "id,outcome,participated,price_delta\n1,4.5,true,0.3\n2,0.0,false,-0.2\n1,9.0,true,0.1\n",
    )
    .unwrap();

    let mut table = load_history(&history_path, 3).unwrap();
    assert!(table.is_empty());

    let updates = load_round_updates(&updates_path).unwrap();
    assert_eq!(updates.len(), 3);
    for _ in 0..4 {
        table.apply_round(&updates[..2]);
    }
    save_history(&history_path, &table).unwrap();

    let reloaded = load_history(&history_path, 3).unwrap();
    assert_eq!(reloaded.round(), 4);
    assert_eq!(reloaded.series(updates[0].id).len(), 3);
    assert!(!reloaded.series(updates[1].id)[0].participated);
}

#[test]
fn config_file_drives_a_multi_formation_run() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("selection.toml");
    fs::write(
        &config_path,
        r#"
budget = 100.0
formations = ["4-4-2", "3-4-3"]
backup_policy = "best_score"

[leader_multiplier]
coach = 0.0
"#,
    )
    .unwrap();
    let config = SelectionConfig::from_file(&config_path).unwrap();
    let (records, history) = market();

    let report = run_selection(&config, &records, &history, None, true).unwrap();
    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.candidates, records.len());
    assert_eq!(report.history_round, history.round());

    for roster in report.outcomes.iter().filter_map(FormationOutcome::roster) {
        assert!(roster.total_cost <= config.budget + 1e-9);
        if let Some(leader) = roster.leader {
            let pick = roster.starters.iter().find(|s| s.id == leader).unwrap();
            assert_ne!(pick.category, Category::Coach);
        }
    }
    assert!(report.best_roster().is_some());
}

#[test]
fn parallel_runs_match_sequential_digests() {
    let (records, history) = market();
    let mut config = SelectionConfig::with_budget(95.0);
    config.formations = vec!["4-3-3".into(), "4-4-2".into(), "3-5-2".into(), "5-3-2".into()];

    let seq = run_selection(&config, &records, &history, None, false).unwrap();
    let par = run_selection(&config, &records, &history, None, true).unwrap();
    let digests = |outcomes: &[FormationOutcome]| -> Vec<String> {
        outcomes
            .iter()
            .filter_map(FormationOutcome::roster)
            .map(|r| r.digest().unwrap().to_string())
            .collect()
    };
    assert_eq!(digests(&seq.outcomes), digests(&par.outcomes));
}

#[test]
fn oracle_scores_flow_into_the_report() {
    let (records, history) = market();
    let oracle = LinearOracle::from_json_str(r#"{"intercept": 0.0, "weights": {"baseline": 1.0}}"#).unwrap();
    let config = SelectionConfig::with_budget(110.0);

    let report = run_selection(&config, &records, &history, Some(&oracle), false).unwrap();
    assert!(matches!(
        &report.score_source,
        rosterlab_core::domain::ScoreSource::Oracle { name } if name == "linear"
    ));
}

#[test]
fn exported_artifacts_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let (records, history) = market();
    let report = run_selection(&SelectionConfig::with_budget(120.0), &records, &history, None, false).unwrap();

    let json_path = dir.path().join("report.json");
    fs::write(&json_path, export_json(&report).unwrap()).unwrap();
    let restored = import_json(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(restored.best, report.best);
    assert_eq!(restored.outcomes.len(), report.outcomes.len());
    let restored_best = restored.best_roster().unwrap();
    let ids = |r: &rosterlab_core::domain::RosterResult| r.starters.iter().map(|s| s.id).collect::<Vec<_>>();
    assert_eq!(ids(restored_best), ids(report.best_roster().unwrap()));

    let roster = report.best_roster().unwrap();
    let csv = export_roster_csv(roster).unwrap();
    let starter_rows = csv
        .lines()
        .skip(1)
        .filter(|l| l.starts_with("starter") || l.starts_with("leader"))
        .count();
    assert_eq!(starter_rows, roster.starters.len());
}
