mod common;

use common::{MockServer, closed_port_url};
use fetchpool::config::Config;
use fetchpool::download::{self, FetchOptions};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_download_saves_successful_bodies() {
    let server = MockServer::start();
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("out");

    let targets = vec![
        server.url("/files/a.txt"),
        server.url("/files/b.txt"),
        server.url("/files/c.txt"),
    ];

    let summary = download::run(
        &Config::default(),
        FetchOptions {
            targets,
            producers: 2,
            output: Some(output.clone()),
        },
    )
    .unwrap();

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.saved, 3);
    assert!(summary.all_succeeded());
    assert_eq!(
        fs::read_to_string(output.join("1-b.txt")).unwrap(),
        "contents of b.txt"
    );
}

#[test]
fn test_download_reports_failures() {
    let server = MockServer::start();
    let temp_dir = TempDir::new().unwrap();
    let list = temp_dir.path().join("urls.txt");
    fs::write(
        &list,
        format!(
            "# batch\n{}\n\n{}\n{}\n",
            server.url("/ok"),
            server.url("/status/503"),
            closed_port_url()
        ),
    )
    .unwrap();

    let mut config = Config::default();
    config.pool.workers = 2;

    let summary = download::run(
        &config,
        FetchOptions {
            targets: download::read_targets(&list).unwrap(),
            producers: 1,
            output: None,
        },
    )
    .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.saved, 0);
    assert!(!summary.all_succeeded());
}
