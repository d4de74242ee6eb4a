//! End-to-end runs of the `feedmerge` binary.

mod common;

use std::path::Path;
use std::process::{Command, Output};

use common::*;

fn feedmerge_in(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_feedmerge"))
        .args(args)
        .current_dir(dir)
        .env_remove("FEEDMERGE_CONFIG")
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run feedmerge")
}

fn write_feed(dir: &Path, name: &str, agency_id: &str, first: &str) {
    write_zip(
        &dir.join(name),
        &[
            ("agency", &agency(agency_id, name)),
            ("calendar", &calendar(&[("WK", first, "20241231")])),
            ("routes", &routes(agency_id, &[("R1", "1")])),
        ],
    );
}

#[test]
fn merge_writes_archive_and_report() {
    let dir = FeedDir::new();
    write_feed(dir.path(), "bart.zip", "BART", "20240101");
    write_feed(dir.path(), "muni.zip", "MUNI", "20240201");

    let out = feedmerge_in(
        dir.path(),
        &[
            "merge",
            "--type",
            "regional",
            "--out",
            "merged.zip",
            "--report",
            "report.json",
            "source=BART,version=1,path=bart.zip",
            "source=Muni,version=3,path=muni.zip,first=20240201,last=20241231",
        ],
    );

    assert!(
        out.status.success(),
        "feedmerge failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("namespace merge of 2 feeds"), "{stdout}");

    let merged = dir.path().join("merged.zip");
    assert_eq!(column(&merged, "routes", "route_id"), ["Muni3:R1", "BART1:R1"]);

    let report = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&report).unwrap();
    assert_eq!(json["feed_count"], 2);
    assert_eq!(json["failed"], false);
}

#[test]
fn failed_merge_exits_nonzero_and_writes_nothing() {
    let dir = FeedDir::new();
    write_feed(dir.path(), "new.zip", "BART", "20240301");
    write_feed(dir.path(), "old.zip", "SFBART", "20240101");

    let out = feedmerge_in(
        dir.path(),
        &[
            "merge",
            "--type",
            "reconciling",
            "--out",
            "merged.zip",
            "--report",
            "report.json",
            "source=BART,version=2,path=new.zip",
            "source=BART,version=1,path=old.zip",
        ],
    );

    assert!(!out.status.success());
    assert!(!dir.path().join("merged.zip").exists());
    let report = std::fs::read_to_string(dir.path().join("report.json")).unwrap();
    assert!(report.contains("SFBART"), "{report}");
}

#[test]
fn malformed_feed_argument_is_rejected() {
    let dir = FeedDir::new();

    let out = feedmerge_in(dir.path(), &["merge", "--out", "merged.zip", "version=1,path=a.zip"]);

    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("missing source"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = FeedDir::new();
    std::fs::write(dir.path().join("feedmerge.toml"), "[merge]\nskip_tables = [\"nope\"]\n").unwrap();
    write_feed(dir.path(), "bart.zip", "BART", "20240101");

    let out = feedmerge_in(
        dir.path(),
        &["merge", "--out", "merged.zip", "source=BART,version=1,path=bart.zip"],
    );

    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("nope"));
}
