//! Configuration-driven service setup and background ingestion.

use std::collections::HashMap;
use std::sync::Arc;

use chronicle_audit::{ErrorKind, Filter, IngestQueue, IngestReport, PageRequest};
use chronicle_config::loader::load_with_env;
use chronicle_config::{ConfigLayer, LoggingSection};
use chronicle_telemetry::{LogConfig, LogFormat};
use chronicle_test::{TestLog, auth_login, submission, test_config_file};

const CONFIG: &str = r#"
[cache]
ttl_secs = 0

[search]
default_per_page = 5
max_per_page = 20

[export]
page_limit = 3

[logging]
level = "debug"
format = "json"
directives = ["chronicle_audit=trace"]
"#;

#[tokio::test]
async fn loaded_config_shapes_the_service() {
    let file = test_config_file(CONFIG);
    let resolved = load_with_env(Some(file.path()), &HashMap::new()).unwrap();
    assert_eq!(resolved.loaded_files.len(), 1);

    let log = TestLog::with_builder(|b| b.config(&resolved.config));
    for _ in 0..6 {
        log.service.create_log(auth_login()).await.unwrap();
    }

    assert_eq!(log.service.default_page(), PageRequest::first(5));

    // ttl_secs = 0: every search sees the latest writes.
    let page = log
        .service
        .search_logs(&Filter::new(), log.service.default_page())
        .await
        .unwrap();
    assert_eq!(page.records.len(), 5);
    assert_eq!(page.total, 6);
    log.service.create_log(auth_login()).await.unwrap();
    let page = log
        .service
        .search_logs(&Filter::new(), log.service.default_page())
        .await
        .unwrap();
    assert_eq!(page.total, 7);

    let err = log
        .service
        .search_logs(&Filter::new(), PageRequest::first(21))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let export = log.service.export_logs(&Filter::new(), "csv").await.unwrap();
    assert_eq!(export.stream.record_count(), 3);
}

#[test]
fn env_fills_what_the_file_leaves_out() {
    let file = test_config_file("[search]\nmax_per_page = 50\n");
    let env: HashMap<String, String> = [
        ("CHRONICLE_SEARCH_MAX_PER_PAGE", "10"),
        ("CHRONICLE_CACHE_TTL_SECS", "60"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect();

    let resolved = load_with_env(Some(file.path()), &env).unwrap();
    assert_eq!(resolved.config.search.max_per_page, 50);
    assert_eq!(resolved.config.cache.ttl_secs, 60);
    assert_eq!(
        resolved.field_sources.get("cache.ttl_secs"),
        Some(&ConfigLayer::Environment)
    );
}

#[test]
fn logging_section_maps_to_log_config() {
    let file = test_config_file(CONFIG);
    let resolved = load_with_env(Some(file.path()), &HashMap::new()).unwrap();

    let config = LogConfig::from_section(&resolved.config.logging).unwrap();
    assert_eq!(config.level, "debug");
    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.directives, vec!["chronicle_audit=trace"]);

    let bad = LoggingSection {
        format: "xml".into(),
        ..LoggingSection::default()
    };
    assert!(LogConfig::from_section(&bad).is_err());
}

#[tokio::test]
async fn ingest_queue_persists_valid_submissions() {
    let log = TestLog::new();
    let handle = IngestQueue::spawn(Arc::clone(&log.service), 4);

    for i in 0..20 {
        let action = if i % 2 == 0 { "login" } else { "logout" };
        handle.submit(submission("auth", action)).await.unwrap();
    }
    handle.submit(submission("", "login")).await.unwrap();

    let report = handle.shutdown().await;
    assert_eq!(report, IngestReport { processed: 20, failed: 1 });
    assert_eq!(log.service.count().await.unwrap(), 20);

    let logouts = log
        .service
        .search_logs(&Filter::new().action("logout"), PageRequest::first(20))
        .await
        .unwrap();
    assert_eq!(logouts.total, 10);
    for record in &logouts.records {
        assert!(log.service.verify_log(&record.id).await.unwrap());
    }
}
