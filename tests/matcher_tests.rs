//! Process matching against realistic process tables.

use std::collections::BTreeSet;

use hang_analyzer::process::{match_processes, MatchMode, MatchSpec, ProcessRecord};

fn table(rows: &[(u32, &str)]) -> Vec<ProcessRecord> {
    rows.iter().map(|(pid, name)| ProcessRecord::new(*pid, name)).collect()
}

fn patterns(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_contains_matches_all_three_runtimes() {
    let all = table(&[(100, "mongod"), (200, "python3"), (300, "java")]);
    let spec = MatchSpec::from_parts(&[], &patterns(&["mongod", "python", "java"]), MatchMode::Contains);

    let result = match_processes(&all, &spec, 400);

    assert_eq!(result.processes, all);
    assert!(result.missing_pids.is_empty());
}

#[test]
fn test_explicit_pids_exclude_self_and_report_missing() {
    let all = table(&[(100, "mongod"), (200, "mongos")]);
    let spec = MatchSpec::from_parts(&[100, 999], &[], MatchMode::Contains);

    let result = match_processes(&all, &spec, 100);

    assert!(result.processes.is_empty());
    assert_eq!(result.missing_pids, BTreeSet::from([999]));
}

#[test]
fn test_explicit_pids_ignore_name_patterns() {
    let all = table(&[(10, "mongod"), (20, "bash")]);
    let spec = MatchSpec::from_parts(&[20], &patterns(&["mongod"]), MatchMode::Exact);

    let result = match_processes(&all, &spec, 1);

    assert_eq!(result.processes, table(&[(20, "bash")]));
}

#[test]
fn test_exact_uses_extension_stripped_name() {
    let all = table(&[(1, "mongod.exe"), (2, "mongodb-tool.exe"), (3, "MONGOS.EXE")]);
    let spec = MatchSpec::from_parts(&[], &patterns(&["mongod", "Mongos"]), MatchMode::Exact);

    let result = match_processes(&all, &spec, 0);
    let pids: Vec<u32> = result.processes.iter().map(|p| p.pid).collect();

    assert_eq!(pids, vec![1, 3]);
}

#[test]
fn test_contains_matches_substrings() {
    let all = table(&[(1, "dbtest"), (2, "mongo_test"), (3, "bash"), (4, "unittest_test")]);
    let spec = MatchSpec::from_parts(&[], &patterns(&["_test", "dbtest"]), MatchMode::Contains);

    let pids: Vec<u32> = match_processes(&all, &spec, 0)
        .processes
        .iter()
        .map(|p| p.pid)
        .collect();

    assert_eq!(pids, vec![1, 2, 4]);
}

#[test]
fn test_self_never_matched() {
    let all = table(&[(1, "python"), (2, "python")]);
    for spec in [
        MatchSpec::from_parts(&[1, 2], &[], MatchMode::Exact),
        MatchSpec::from_parts(&[], &patterns(&["python"]), MatchMode::Exact),
        MatchSpec::from_parts(&[], &patterns(&["py"]), MatchMode::Contains),
    ] {
        let result = match_processes(&all, &spec, 2);
        assert!(result.processes.iter().all(|p| p.pid != 2));
        assert_eq!(result.processes.len(), 1);
    }
}
