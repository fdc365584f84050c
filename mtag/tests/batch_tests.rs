//! Integration tests for scanning, batch scheduling and reporting

mod helpers;

use helpers::{v, view, write_track, JsonProvider};
use mtag::tag_store::TagStoreProvider;
use mtag::{BatchScheduler, FilePipeline, FileScanner, PipelineOptions, ReportAggregator};
use mtag_common::{AliasTable, Filter, FilterSet, Frame, Operation, Schema};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// `count` tracks; even-numbered ones are by "Band A", odd ones by "Band B"
fn library(dir: &TempDir, count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| {
            let artist = if i % 2 == 0 { "Band A" } else { "Band B" };
            write_track(
                dir.path(),
                &format!("track{:02}", i),
                &[
                    Frame::text("TIT2", format!("Song {}", i)),
                    Frame::text("TPE1", artist),
                ],
            )
        })
        .collect()
}

fn scheduler(ops: Vec<Operation>, filters: FilterSet, workers: usize) -> BatchScheduler {
    let pipeline = FilePipeline::new(
        Arc::new(JsonProvider::new()),
        ops,
        filters,
        PipelineOptions::default(),
    );
    BatchScheduler::new(Arc::new(pipeline))
        .with_workers(Some(workers))
        .with_min_parallel(10)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_batch_writes_every_file_once() {
    let dir = TempDir::new().unwrap();
    let files = library(&dir, 24);

    let outcome = scheduler(vec![Operation::enlist("genre", "Rock", ";")], FilterSet::default(), 4)
        .run(files.clone())
        .await;

    assert!(!outcome.cancelled);
    assert_eq!(outcome.results.len(), files.len());
    let seen: HashSet<_> = outcome.results.iter().map(|r| r.path.clone()).collect();
    assert_eq!(seen, files.iter().cloned().collect());

    for path in &files {
        assert_eq!(view(path, Schema::Canonical)["genre"], v(&["Rock"]));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_filtered_batch_report() {
    let dir = TempDir::new().unwrap();
    let files = library(&dir, 12);
    let filters = FilterSet::new(vec![Filter::parse_expression(
        "artist=band a",
        false,
        AliasTable::standard(),
    )
    .unwrap()]);

    let outcome = scheduler(vec![Operation::prefix("title", "A: ")], filters, 3)
        .run(files)
        .await;

    let mut aggregator = ReportAggregator::new();
    for result in outcome.results {
        aggregator.record(result);
    }

    let summary = aggregator.summary();
    assert_eq!(summary.total, 12);
    assert_eq!(summary.success, 6);
    assert_eq!(summary.skipped, 6);
    assert_eq!(summary.failed, 0);
    assert!(aggregator.per_extension()["json"].all_passed());
    assert_eq!(aggregator.worst_failure(), None);

    let report_path = dir.path().join("report.json");
    aggregator.write_json(&report_path).unwrap();
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    let written: Vec<_> = report["files"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|f| f["status"] == "success")
        .collect();
    assert_eq!(written.len(), 6);
    for file in written {
        let new = file["changes"]["title"]["new"][0].as_str().unwrap();
        assert!(new.starts_with("A: Song "));
    }
}

#[tokio::test]
async fn test_scan_then_process_directory() {
    let dir = TempDir::new().unwrap();
    library(&dir, 3);
    std::fs::write(dir.path().join("cover.jpg"), b"jpeg").unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    write_track(&dir.path().join("nested"), "deep", &[Frame::text("title", "Deep")]);

    let provider = JsonProvider::new();
    let top = FileScanner::new()
        .scan(dir.path(), |ext| provider.supports(ext))
        .unwrap();
    assert_eq!(top.len(), 3);

    let all = FileScanner::new()
        .recursive(true)
        .scan(dir.path(), |ext| provider.supports(ext))
        .unwrap();
    assert_eq!(all.len(), 4);

    let outcome = scheduler(vec![Operation::clear("comment")], FilterSet::default(), 2)
        .run(all)
        .await;
    assert!(outcome.results.iter().all(|r| r.passed && r.wrote));
}
