//! Integration tests for full fetch runs against mock servers.

#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use harvester_core::{
    DomainPatterns, FailureKind, FetchConfig, IdentifierLedger, LineRange, Orchestrator,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

const PDF: &[u8] = b"%PDF-1.4 test body";

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            root: TempDir::new().unwrap(),
        }
    }

    fn output(&self) -> PathBuf {
        self.root.path().join("out")
    }

    fn write_input(&self, lines: &[String]) -> PathBuf {
        let input = self.root.path().join("links.tsv");
        std::fs::write(&input, lines.join("\n") + "\n").unwrap();
        input
    }

    fn config(&self, lines: &[String]) -> FetchConfig {
        let mut config = FetchConfig::new(self.write_input(lines), self.output());
        config.pool_size = 4;
        config.connect_timeout = Duration::from_secs(5);
        config.read_timeout = Duration::from_secs(5);
        config.rate_limit_wait = Duration::ZERO;
        config
    }

    fn artifacts(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.output())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn ledger_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.root.path().join("out.ledger"))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn line(id: &str, server: &MockServer, p: &str) -> String {
    format!("{id}\t{}{p}", server.uri())
}

async fn mount_pdf(server: &MockServer, at: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .set_body_bytes(PDF.to_vec()),
        )
        .mount(server)
        .await;
}

fn read(p: &Path) -> Vec<u8> {
    std::fs::read(p).unwrap()
}

#[tokio::test]
async fn test_duplicate_identifier_produces_one_artifact() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_pdf(&server, "/doc").await;
    mount_pdf(&server, "/doc2").await;

    let ws = Workspace::new();
    let config = ws.config(&[line("P1", &server, "/doc"), line("P1", &server, "/doc2")]);
    let summary = Orchestrator::new(config).run().await.unwrap();

    assert_eq!(ws.artifacts(), vec!["P1.pdf"]);
    assert_eq!(read(&ws.output().join("P1.pdf")), PDF);
    assert_eq!(summary.saved, 1);
    assert_eq!(
        summary.saved + summary.filtered_done + summary.failures_of(FailureKind::Duplicate),
        2,
        "second line is either filtered at dispatch or loses the claim"
    );
    assert_eq!(ws.ledger_lines(), vec!["P1"]);
}

#[tokio::test]
async fn test_relative_redirect_is_followed_to_artifact() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/y"))
        .expect(1)
        .mount(&server)
        .await;
    mount_pdf(&server, "/y").await;

    let ws = Workspace::new();
    let summary = Orchestrator::new(ws.config(&[line("P2", &server, "/x")]))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.saved, 1);
    assert_eq!(read(&ws.output().join("P2.pdf")), PDF);
}

#[tokio::test]
async fn test_forbidden_url_is_never_requested() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let mut config = ws.config(&[
        "P3\thttp://ieee.org/paper.pdf".to_string(),
        line("P4", &server, "/blocked/ieee.org/copy.pdf"),
    ]);
    config.forbidden = DomainPatterns::new(["ieee.org"]);
    let summary = Orchestrator::new(config).run().await.unwrap();

    assert_eq!(summary.filtered_forbidden, 2);
    assert_eq!(summary.dispatched, 0);
    assert!(ws.artifacts().is_empty());
    assert!(ws.ledger_lines().is_empty());
}

#[tokio::test]
async fn test_forbidden_redirect_target_is_never_requested() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/mirror/ieee.org/p.pdf"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/mirror/ieee.org/p.pdf"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let mut config = ws.config(&[line("P5", &server, "/start")]);
    config.forbidden = DomainPatterns::new(["ieee.org"]);
    let summary = Orchestrator::new(config).run().await.unwrap();

    assert_eq!(summary.failures_of(FailureKind::PolicyBlocked), 1);
    assert!(ws.artifacts().is_empty());
}

#[tokio::test]
async fn test_rerun_makes_no_requests_for_saved_identifiers() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_pdf(&server, "/a").await;
    mount_pdf(&server, "/b").await;

    let ws = Workspace::new();
    let lines = [line("A", &server, "/a"), line("B", &server, "/b")];
    let first = Orchestrator::new(ws.config(&lines)).run().await.unwrap();
    assert_eq!(first.saved, 2);

    server.reset().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let second = Orchestrator::new(ws.config(&lines)).run().await.unwrap();
    assert_eq!(second.filtered_done, 2);
    assert_eq!(second.dispatched, 0);
    assert_eq!(ws.artifacts(), vec!["A.pdf", "B.pdf"]);
}

#[tokio::test]
async fn test_split_range_matches_full_run() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    for p in ["/1", "/2", "/3", "/4"] {
        mount_pdf(&server, p).await;
    }
    let lines = [
        line("D1", &server, "/1"),
        String::new(),
        line("D2", &server, "/2"),
        line("D1", &server, "/3"),
        line("D4", &server, "/4"),
    ];

    let full = Workspace::new();
    Orchestrator::new(full.config(&lines)).run().await.unwrap();

    let split = Workspace::new();
    let mut first = split.config(&lines);
    first.range = LineRange::new(1, Some(3));
    Orchestrator::new(first).run().await.unwrap();
    let mut second = split.config(&lines);
    second.range = LineRange::skip(3);
    Orchestrator::new(second).run().await.unwrap();

    assert_eq!(full.artifacts(), vec!["D1.pdf", "D2.pdf", "D4.pdf"]);
    assert_eq!(split.artifacts(), full.artifacts());
    assert_eq!(split.ledger_lines(), full.ledger_lines());
}

#[tokio::test]
async fn test_wrong_content_type_writes_nothing_and_frees_identifier() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html; charset=utf-8")
                .set_body_string("%PDF-looks-like-pdf-but-is-html"),
        )
        .mount(&server)
        .await;

    let ws = Workspace::new();
    let summary = Orchestrator::new(ws.config(&[line("P6", &server, "/landing")]))
        .run()
        .await
        .unwrap();

    assert_eq!(summary.failures_of(FailureKind::TypeMismatch), 1);
    assert!(ws.artifacts().is_empty());
    assert!(ws.ledger_lines().is_empty());
}

#[tokio::test]
async fn test_redirect_chain_over_bound_yields_no_artifact() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    for (from, to) in [("/r0", "/r1"), ("/r1", "/r2"), ("/r2", "/r3")] {
        Mock::given(method("GET"))
            .and(path(from))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", to))
            .mount(&server)
            .await;
    }
    mount_pdf(&server, "/r3").await;

    let within = Workspace::new();
    let mut config = within.config(&[line("C", &server, "/r0")]);
    config.max_hops = 3;
    assert_eq!(Orchestrator::new(config).run().await.unwrap().saved, 1);
    assert_eq!(read(&within.output().join("C.pdf")), PDF);

    let over = Workspace::new();
    let mut config = over.config(&[line("C", &server, "/r0")]);
    config.max_hops = 2;
    let summary = Orchestrator::new(config).run().await.unwrap();
    assert_eq!(summary.failures_of(FailureKind::RedirectExhausted), 1);
    assert!(over.artifacts().is_empty());
}

#[tokio::test]
async fn test_blocked_status_is_counted_and_run_continues() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/denied"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    mount_pdf(&server, "/ok").await;

    let ws = Workspace::new();
    let summary = Orchestrator::new(ws.config(&[
        line("X", &server, "/denied"),
        "not a valid line".to_string(),
        line("Y", &server, "/ok"),
    ]))
    .run()
    .await
    .unwrap();

    assert_eq!(summary.failures_of(FailureKind::Blocked), 1);
    assert_eq!(summary.failures_of(FailureKind::MalformedInput), 1);
    assert_eq!(ws.artifacts(), vec!["Y.pdf"]);
}

#[tokio::test]
async fn test_injected_ledger_skips_identifiers() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ledger = Arc::new(IdentifierLedger::new());
    assert!(ledger.claim("K"));
    ledger.confirm("K");

    let ws = Workspace::new();
    let orchestrator =
        Orchestrator::with_ledger(ws.config(&[line("K", &server, "/k")]), Arc::clone(&ledger));
    let summary = orchestrator.run().await.unwrap();

    assert_eq!(summary.filtered_done, 1);
    assert_eq!(ws.ledger_lines(), vec!["K"]);
}

#[tokio::test]
async fn test_many_lines_for_one_identifier_write_once() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .set_body_bytes(PDF.to_vec())
                .set_delay(Duration::from_millis(20)),
        )
        .mount(&server)
        .await;

    let lines: Vec<String> = (0..40).map(|i| line("SAME", &server, &format!("/v{i}"))).collect();
    let ws = Workspace::new();
    let mut config = ws.config(&lines);
    config.pool_size = 16;
    let summary = Orchestrator::new(config).run().await.unwrap();

    assert_eq!(summary.saved, 1);
    assert_eq!(ws.artifacts(), vec!["SAME.pdf"]);
    assert!(
        std::fs::read_dir(ws.root.path().join("out.tmp"))
            .unwrap()
            .next()
            .is_none(),
        "no scratch files left behind"
    );
}

#[tokio::test]
async fn test_rate_limited_host_waits_before_second_request() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_pdf(&server, "/limited/a").await;
    mount_pdf(&server, "/limited/b").await;

    let ws = Workspace::new();
    let mut config = ws.config(&[
        line("A", &server, "/limited/a"),
        line("B", &server, "/limited/b"),
    ]);
    config.rate_limited = DomainPatterns::new(["/limited/"]);
    config.rate_limit_wait = Duration::from_millis(300);
    config.window_capacity = 4;

    let started = Instant::now();
    let summary = Orchestrator::new(config).run().await.unwrap();

    assert_eq!(summary.throttled, 1, "only the second line finds its host in the window");
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(ws.artifacts(), vec!["A.pdf", "B.pdf"]);
}

#[tokio::test]
async fn test_unlisted_host_or_empty_window_never_waits() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_pdf(&server, "/open/a").await;
    mount_pdf(&server, "/open/b").await;
    mount_pdf(&server, "/limited/c").await;
    mount_pdf(&server, "/limited/d").await;
    let wait = Duration::from_secs(5);

    let unlisted = Workspace::new();
    let mut config = unlisted.config(&[
        line("A", &server, "/open/a"),
        line("B", &server, "/open/b"),
    ]);
    config.rate_limited = DomainPatterns::new(["/limited/"]);
    config.rate_limit_wait = wait;
    let started = Instant::now();
    let summary = Orchestrator::new(config).run().await.unwrap();
    assert_eq!(summary.throttled, 0);
    assert!(started.elapsed() < wait);

    let windowless = Workspace::new();
    let mut config = windowless.config(&[
        line("C", &server, "/limited/c"),
        line("D", &server, "/limited/d"),
    ]);
    config.rate_limited = DomainPatterns::new(["/limited/"]);
    config.rate_limit_wait = wait;
    config.window_capacity = 0;
    let started = Instant::now();
    let summary = Orchestrator::new(config).run().await.unwrap();
    assert_eq!(summary.throttled, 0);
    assert!(started.elapsed() < wait);
    assert_eq!(windowless.artifacts(), vec!["C.pdf", "D.pdf"]);
}

/// Line 1 is fast. Line 2 is rate-limited, so the reader waits long enough
/// for line 1 to finish, then checkpoints while line 2 is still downloading.
async fn mount_checkpoint_fixture(server: &MockServer) {
    mount_pdf(server, "/fast").await;
    Mock::given(method("GET"))
        .and(path("/limited/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/pdf")
                .set_body_bytes(PDF.to_vec())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(server)
        .await;
}

fn checkpoint_config(ws: &Workspace, server: &MockServer) -> FetchConfig {
    let mut config = ws.config(&[
        line("P1", server, "/fast"),
        line("P2", server, "/limited/slow"),
    ]);
    config.rate_limited = DomainPatterns::new(["/limited/"]);
    config.rate_limit_wait = Duration::from_millis(400);
    config.persist_every = 1;
    config
}

#[tokio::test]
async fn test_periodic_checkpoint_persists_finished_items_mid_run() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_checkpoint_fixture(&server).await;

    let ws = Workspace::new();
    let orchestrator = Orchestrator::new(checkpoint_config(&ws, &server));
    let (summary, mid_run) = tokio::join!(orchestrator.run(), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        ws.ledger_lines()
    });

    assert_eq!(mid_run, vec!["P1"], "checkpoint written while P2 is in flight");
    assert_eq!(summary.unwrap().saved, 2);
    assert_eq!(ws.ledger_lines(), vec!["P1", "P2"]);
}

#[tokio::test]
async fn test_failed_checkpoint_does_not_abort_run() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    mount_checkpoint_fixture(&server).await;

    let ws = Workspace::new();
    // A directory where the ledger's staging file goes makes every write fail.
    let staging = ws.root.path().join("out.ledger.partial");
    std::fs::create_dir_all(&staging).unwrap();

    let orchestrator = Orchestrator::new(checkpoint_config(&ws, &server));
    let (summary, ledger_mid_run) = tokio::join!(orchestrator.run(), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let exists = ws.root.path().join("out.ledger").exists();
        std::fs::remove_dir(&staging).unwrap();
        exists
    });

    assert!(!ledger_mid_run, "checkpoints failed");
    let summary = summary.unwrap();
    assert_eq!(summary.saved, 2);
    assert_eq!(ws.ledger_lines(), vec!["P1", "P2"]);
}
