//! Dispatcher and worker pool behaviour
//!
//! These tests verify:
//! - Records produced from a dump, end to end
//! - Persisted identity fields match the parser regardless of interleaving
//! - Batch-level failures (marshal, persist) stay inside their batch
//! - Run-level failures (hash, read, overlong line) surface to the caller
//!   after the lines read before them are stored
//! - A stalled sink stops the reader after a bounded number of lines

use leakvault_ingest::config::PipelineConfig;
use leakvault_ingest::error::IngestError;
use leakvault_ingest::hasher::CredentialHasher;
use leakvault_ingest::parser::CredentialParser;
use leakvault_ingest::pipeline::IngestPipeline;
use leakvault_ingest::sink::MemorySink;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

mod helpers;

use helpers::{
    cheap_hasher, numbered_dump, pipeline_config, BrokenReader, FailingHasher, GatedSink,
    LineCountingReader,
};

fn pipeline(
    config: PipelineConfig,
    hasher: Arc<dyn CredentialHasher>,
    sink: &Arc<MemorySink>,
) -> IngestPipeline<MemorySink> {
    IngestPipeline::new(config, CredentialParser::default(), hasher, Arc::clone(sink))
}

/// Sorted (email, username, domain) triples
fn identities<'a>(
    records: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>,
) -> Vec<(String, String, String)> {
    let mut all: Vec<_> = records
        .into_iter()
        .map(|(e, u, d)| (e.to_string(), u.to_string(), d.to_string()))
        .collect();
    all.sort();
    all
}

#[tokio::test]
async fn test_end_to_end_example() {
    let hasher = cheap_hasher();
    let sink = Arc::new(MemorySink::new());
    let input = "alice@example.com:Secret123\nbob,nodomain\ncarol@example.org\n";

    pipeline(pipeline_config(3, 25), hasher.clone(), &sink)
        .run(input.as_bytes())
        .await
        .unwrap();

    let mut records = sink.records();
    records.sort_by(|a, b| a.email.cmp(&b.email));
    assert_eq!(records.len(), 3);

    let alice = &records[0];
    assert_eq!(alice.email, "alice@example.com");
    assert_eq!(alice.username, "alice");
    assert_eq!(alice.domain, "example.com");
    assert!(hasher.verify("Secret123", &alice.password_hash).unwrap());

    let carol = &records[1];
    assert_eq!(carol.email, "carol@example.org");
    assert_eq!(carol.username, "carol");
    assert_eq!(carol.domain, "example.org");
    assert!(hasher.verify("", &carol.password_hash).unwrap());

    let bob = &records[2];
    assert_eq!(bob.email, "nodomain");
    assert_eq!(bob.username, "");
    assert_eq!(bob.domain, "empty_domain");
    assert!(hasher.verify("bob", &bob.password_hash).unwrap());

    let mut ids: Vec<_> = records.iter().map(|r| r.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_persisted_identities_match_parser_across_workers() {
    let sink = Arc::new(MemorySink::new());
    let mut dump = numbered_dump(120);
    dump.push_str("\nplainpassword\nhunter2;dave@corp.net\na:b:c\nx@y@z.com:pw\r\n");

    pipeline(pipeline_config(4, 7), cheap_hasher(), &sink)
        .run(dump.as_bytes())
        .await
        .unwrap();

    let parser = CredentialParser::default();
    let expected_parsed: Vec<_> = dump
        .lines()
        .map(|line| parser.parse(line))
        .collect();
    let expected = identities(
        expected_parsed
            .iter()
            .map(|p| (p.email.as_str(), p.username.as_str(), p.domain.as_str())),
    );

    let records = sink.records();
    let actual = identities(
        records
            .iter()
            .map(|r| (r.email.as_str(), r.username.as_str(), r.domain.as_str())),
    );

    assert_eq!(actual.len(), 125);
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_one_put_per_line() {
    let sink = Arc::new(MemorySink::new());

    pipeline(pipeline_config(3, 25), cheap_hasher(), &sink)
        .run(numbered_dump(51).as_bytes())
        .await
        .unwrap();

    assert_eq!(sink.put_calls(), 51);
    assert_eq!(sink.records().len(), 51);
}

#[tokio::test]
async fn test_empty_input_writes_nothing() {
    let sink = Arc::new(MemorySink::new());

    pipeline(pipeline_config(3, 25), cheap_hasher(), &sink)
        .run(&b""[..])
        .await
        .unwrap();

    assert_eq!(sink.put_calls(), 0);
}

#[tokio::test]
async fn test_persist_failure_stops_only_its_batch() {
    // Batches of 3: [0,1,2] [3,4,5] [6,7,8]; line 4 is rejected
    let sink = Arc::new(MemorySink::new().failing_put_on("user4@domain4.com"));

    pipeline(pipeline_config(1, 3), cheap_hasher(), &sink)
        .run(numbered_dump(9).as_bytes())
        .await
        .unwrap();

    let emails: Vec<_> = sink.records().into_iter().map(|r| r.email).collect();
    assert_eq!(emails.len(), 7);
    assert!(emails.contains(&"user3@domain3.com".to_string()));
    assert!(!emails.contains(&"user4@domain4.com".to_string()));
    assert!(!emails.contains(&"user5@domain5.com".to_string()));
    assert!(emails.contains(&"user8@domain1.com".to_string()));
    assert_eq!(sink.put_calls(), 8);
}

#[tokio::test]
async fn test_marshal_failure_skips_whole_batch() {
    let sink = Arc::new(MemorySink::new().failing_marshal_on("user5@domain5.com"));

    pipeline(pipeline_config(2, 3), cheap_hasher(), &sink)
        .run(numbered_dump(9).as_bytes())
        .await
        .unwrap();

    let emails: Vec<_> = sink.records().into_iter().map(|r| r.email).collect();
    assert_eq!(emails.len(), 6);
    for skipped in ["user3@domain3.com", "user4@domain4.com", "user5@domain5.com"] {
        assert!(!emails.contains(&skipped.to_string()));
    }
    assert_eq!(sink.put_calls(), 6);
}

#[tokio::test]
async fn test_hash_failure_aborts_run() {
    let sink = Arc::new(MemorySink::new());
    let hasher = Arc::new(FailingHasher::on("pass3"));

    let result = pipeline(pipeline_config(1, 2), hasher, &sink)
        .run(numbered_dump(8).as_bytes())
        .await;

    assert!(matches!(result, Err(IngestError::Hash(_))));

    let emails: Vec<_> = sink.records().into_iter().map(|r| r.email).collect();
    // Batch [2,3] holds the failing line: none of it may be persisted
    assert!(!emails.contains(&"user2@domain2.com".to_string()));
    assert!(!emails.contains(&"user3@domain3.com".to_string()));
    // Nothing after the failure is processed by the single worker
    assert!(!emails.contains(&"user4@domain4.com".to_string()));
    assert_eq!(emails.len(), 2);
}

#[tokio::test]
async fn test_hash_failure_with_many_workers_persists_no_plaintext() {
    let sink = Arc::new(MemorySink::new());
    let hasher = Arc::new(FailingHasher::on("pass40"));

    let result = pipeline(pipeline_config(3, 5), hasher, &sink)
        .run(numbered_dump(200).as_bytes())
        .await;

    assert!(matches!(result, Err(IngestError::Hash(_))));
    let records = sink.records();
    assert!(records.len() < 200);
    assert!(records.iter().all(|r| r.email != "user40@domain5.com"));
    assert!(records.iter().all(|r| r.password_hash.starts_with("$argon2id$")));
}

#[tokio::test]
async fn test_read_error_drains_queue_then_fails() {
    let sink = Arc::new(MemorySink::new());
    let reader = BrokenReader::after(b"a@x.com:1\nb@y.com:2\n");

    let result = pipeline(pipeline_config(1, 1), cheap_hasher(), &sink)
        .run(reader)
        .await;

    assert!(matches!(result, Err(IngestError::Fetch(_))));
    assert_eq!(sink.records().len(), 2);
}

#[tokio::test]
async fn test_read_error_keeps_partial_batch() {
    // Fewer lines than one batch were read when the stream broke
    let sink = Arc::new(MemorySink::new());
    let reader = BrokenReader::after(b"a@x.com:1\nb@y.com:2\n");

    let result = pipeline(pipeline_config(3, 25), cheap_hasher(), &sink)
        .run(reader)
        .await;

    assert!(matches!(result, Err(IngestError::Fetch(_))));
    let mut emails: Vec<_> = sink.records().into_iter().map(|r| r.email).collect();
    emails.sort();
    assert_eq!(emails, ["a@x.com", "b@y.com"]);
}

#[tokio::test]
async fn test_overlong_line_fails_run_without_storing_it() {
    let sink = Arc::new(MemorySink::new());
    let config = PipelineConfig {
        max_line_bytes: 1024,
        ..pipeline_config(2, 25)
    };
    let mut dump = numbered_dump(3);
    dump.push_str(&"x".repeat(1024 * 1024));
    dump.push_str("@huge.com:pw\nafter@x.com:1\n");

    let result = pipeline(config, cheap_hasher(), &sink)
        .run(dump.as_bytes())
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, IngestError::Fetch(_)));
    assert!(err.to_string().contains("line 4 exceeds 1024 bytes"));

    let records = sink.records();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.email.len() < 64));
    assert!(records.iter().all(|r| r.email != "after@x.com"));
}

#[tokio::test]
async fn test_default_line_cap_rejects_64_mib_line() {
    let sink = Arc::new(MemorySink::new());
    let mut dump = "x".repeat(64 * 1024 * 1024);
    dump.push_str("@huge.com:pw\n");

    let result = pipeline(pipeline_config(1, 25), cheap_hasher(), &sink)
        .run(dump.as_bytes())
        .await;

    assert!(matches!(result, Err(IngestError::Fetch(_))));
    assert_eq!(sink.put_calls(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stalled_sink_bounds_lines_read() {
    const WORKERS: usize = 2;
    const BATCH: usize = 5;
    const LINES: usize = 200;

    let sink = Arc::new(GatedSink::closed());
    let dump = numbered_dump(LINES);
    let (reader, served) = LineCountingReader::new(dump.as_bytes());
    let pipeline = IngestPipeline::new(
        pipeline_config(WORKERS, BATCH),
        CredentialParser::default(),
        cheap_hasher(),
        Arc::clone(&sink),
    );

    let run = tokio::spawn(async move { pipeline.run(reader).await });
    tokio::time::sleep(Duration::from_millis(300)).await;

    // One batch held by each blocked worker, a full queue, one batch waiting to send
    let read_while_stalled = served.load(Ordering::SeqCst);
    assert!(read_while_stalled <= (2 * WORKERS + 1) * BATCH);
    assert!(read_while_stalled < LINES);
    assert!(sink.inner.records().is_empty());

    sink.open();
    run.await.unwrap().unwrap();

    assert_eq!(served.load(Ordering::SeqCst), LINES);
    assert_eq!(sink.inner.records().len(), LINES);
}

#[tokio::test]
async fn test_invalid_pool_shape_rejected() {
    let sink = Arc::new(MemorySink::new());

    let result = pipeline(pipeline_config(0, 25), cheap_hasher(), &sink)
        .run(&b"a@x.com:1\n"[..])
        .await;

    assert!(matches!(result, Err(IngestError::Configuration(_))));
    assert_eq!(sink.put_calls(), 0);
}
