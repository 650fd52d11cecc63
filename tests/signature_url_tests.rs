//! Signed URL resolution: existence probe, then sign.

use stowage_cluster::{
    ClusterStorage, HttpMethod, MemoryStorage, ObjectStorage, ObjectStorageExt, Schedule,
    SignatureOptions,
};

#[path = "test_common/mod.rs"]
mod test_common;

use test_common::{EventLog, Outcome, Recorder, ScriptedStorage};

fn master_slave(
    backends: Vec<ScriptedStorage>,
    events: &std::sync::Arc<EventLog>,
) -> ClusterStorage<ScriptedStorage> {
    ClusterStorage::builder()
        .backends(backends)
        .schedule(Schedule::MasterSlave)
        .on_failover(EventLog::listener(events))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_not_found_probe_still_signs_on_same_backend() {
    let recorder = Recorder::new();
    let events = EventLog::new();
    let storage = master_slave(
        vec![
            ScriptedStorage::new("a", &recorder).on("head", Outcome::Status(404)),
            ScriptedStorage::new("b", &recorder),
        ],
        &events,
    );

    let url = storage
        .signature_url("photo.jpg", &SignatureOptions::default())
        .await
        .unwrap();

    assert_eq!(url, "https://a.example.com/photo.jpg");
    assert_eq!(
        recorder.calls(),
        vec![
            ("a".to_string(), "head"),
            ("a".to_string(), "signature_url"),
        ]
    );
    assert_eq!(recorder.calls_to("b"), 0);
    assert_eq!(events.len(), 0);
}

#[tokio::test]
async fn test_successful_probe_signs_on_probed_backend() {
    let recorder = Recorder::new();
    let events = EventLog::new();
    let storage = master_slave(
        vec![
            ScriptedStorage::new("a", &recorder),
            ScriptedStorage::new("b", &recorder),
        ],
        &events,
    );

    let url = storage
        .signature_url("file", &SignatureOptions::default())
        .await
        .unwrap();
    assert_eq!(url, "https://a.example.com/file");
    assert_eq!(recorder.calls_to("b"), 0);
}

#[tokio::test]
async fn test_transient_probe_moves_on_and_last_backend_is_not_probed() {
    let recorder = Recorder::new();
    let events = EventLog::new();
    let storage = master_slave(
        vec![
            ScriptedStorage::new("a", &recorder).on("head", Outcome::Status(503)),
            ScriptedStorage::new("b", &recorder).on("head", Outcome::Connection),
            ScriptedStorage::new("c", &recorder).on("head", Outcome::Status(503)),
        ],
        &events,
    );

    let url = storage
        .signature_url("file", &SignatureOptions::default())
        .await
        .unwrap();

    assert_eq!(url, "https://c.example.com/file");
    assert_eq!(recorder.calls_of("c", "head"), 0);
    assert_eq!(recorder.calls_of("c", "signature_url"), 1);
    assert_eq!(recorder.calls_of("a", "signature_url"), 0);
    assert_eq!(recorder.calls_of("b", "signature_url"), 0);
    assert_eq!(
        events.events(),
        vec![
            ("signature_url", 0, 0, Some(503)),
            ("signature_url", 1, 1, None)
        ]
    );
}

#[tokio::test]
async fn test_fatal_probe_on_second_backend() {
    let recorder = Recorder::new();
    let events = EventLog::new();
    let storage = master_slave(
        vec![
            ScriptedStorage::new("a", &recorder).on("head", Outcome::Status(502)),
            ScriptedStorage::new("b", &recorder).on("head", Outcome::Status(404)),
            ScriptedStorage::new("c", &recorder),
        ],
        &events,
    );

    let url = storage
        .signature_url("file", &SignatureOptions::default())
        .await
        .unwrap();
    assert_eq!(url, "https://b.example.com/file");
    assert_eq!(recorder.calls_to("c"), 0);
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_round_robin_probe_uses_shared_cursor() {
    let recorder = Recorder::new();
    let storage = ClusterStorage::new(vec![
        ScriptedStorage::new("a", &recorder),
        ScriptedStorage::new("b", &recorder),
        ScriptedStorage::new("c", &recorder),
    ])
    .unwrap();

    storage.head("warmup").await.unwrap();
    let url = storage
        .signature_url("file", &SignatureOptions::default())
        .await
        .unwrap();

    assert_eq!(url, "https://b.example.com/file");
    assert_eq!(storage.cursor(), 2);
}

#[tokio::test]
async fn test_signs_with_memory_backends() {
    let primary = MemoryStorage::with_bucket("primary");
    let replica = MemoryStorage::with_bucket("replica");
    primary.set_available(false);
    replica.put_bytes("docs/report.pdf", b"%PDF").await.unwrap();

    let storage = ClusterStorage::builder()
        .add_backend(primary)
        .add_backend(replica)
        .schedule(Schedule::MasterSlave)
        .build()
        .unwrap();

    let options = SignatureOptions {
        method: HttpMethod::Put,
        ..SignatureOptions::default()
    };
    let url = storage
        .signature_url("docs/report.pdf", &options)
        .await
        .unwrap();
    assert!(
        url.starts_with("memory://replica/docs/report.pdf?Expires="),
        "{url}"
    );
    assert!(url.ends_with("&Method=PUT"), "{url}");
}
