//! Common test utilities: a scripted backend that records every call, and a
//! reusable CRUD suite for any `ObjectStorage` implementation.

#![allow(dead_code)]

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use stowage_cluster::{
    CopyOptions, DeleteMultiOptions, DeleteMultiResult, Error, GetObject, ListPage, ListQuery,
    Metadata, ObjectMeta, ObjectReader, ObjectStorage, ObjectStorageExt, PutOptions, PutResult,
    Result, SignatureOptions,
};
use tokio::io::{AsyncRead, AsyncReadExt};

/// What a scripted call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Status(u16),
    /// A failure without status (network level)
    Connection,
}

/// Call log and concurrency gauge shared by a set of scripted backends.
#[derive(Debug, Default)]
pub struct Recorder {
    calls: Mutex<Vec<(String, &'static str)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call in start order, as `(backend label, operation)`.
    pub fn calls(&self) -> Vec<(String, &'static str)> {
        self.calls.lock().unwrap().clone()
    }

    /// Backend labels in call order.
    pub fn labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|(label, _)| label).collect()
    }

    pub fn calls_to(&self, label: &str) -> usize {
        self.calls().iter().filter(|(l, _)| l == label).count()
    }

    pub fn calls_of(&self, label: &str, op: &str) -> usize {
        self.calls()
            .iter()
            .filter(|(l, o)| l == label && *o == op)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

/// A backend whose calls succeed or fail as scripted per operation.
///
/// Successful calls return values tagged with the backend label, so tests
/// can tell which backend produced a result.
#[derive(Debug, Clone)]
pub struct ScriptedStorage {
    label: String,
    recorder: Arc<Recorder>,
    outcomes: Arc<Mutex<HashMap<&'static str, Outcome>>>,
    fallback: Arc<Mutex<Outcome>>,
    delay: Option<Duration>,
}

impl ScriptedStorage {
    pub fn new(label: &str, recorder: &Arc<Recorder>) -> Self {
        Self {
            label: label.to_string(),
            recorder: Arc::clone(recorder),
            outcomes: Arc::default(),
            fallback: Arc::new(Mutex::new(Outcome::Ok)),
            delay: None,
        }
    }

    /// Script one operation.
    pub fn on(self, op: &'static str, outcome: Outcome) -> Self {
        self.outcomes.lock().unwrap().insert(op, outcome);
        self
    }

    /// Script every operation that has no explicit outcome.
    pub fn always(self, outcome: Outcome) -> Self {
        *self.fallback.lock().unwrap() = outcome;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    async fn call(&self, op: &'static str) -> Result<()> {
        self.recorder
            .calls
            .lock()
            .unwrap()
            .push((self.label.clone(), op));
        let now = self.recorder.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.recorder.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.recorder.in_flight.fetch_sub(1, Ordering::SeqCst);

        let outcome = {
            let outcomes = self.outcomes.lock().unwrap();
            outcomes
                .get(op)
                .copied()
                .unwrap_or(*self.fallback.lock().unwrap())
        };
        match outcome {
            Outcome::Ok => Ok(()),
            Outcome::Status(status) => Err(Error::status_code(
                status,
                format!("{} {} scripted failure", self.label, op),
            )),
            Outcome::Connection => Err(Error::Connection(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("{} refused", self.label),
            )))),
        }
    }

    fn meta(&self, name: &str) -> ObjectMeta {
        ObjectMeta {
            name: name.to_string(),
            size: self.label.len() as u64,
            etag: self.label.clone(),
            content_type: None,
            last_modified: SystemTime::UNIX_EPOCH,
            metadata: Metadata::new(),
        }
    }

    fn put_result(&self, name: &str) -> PutResult {
        PutResult {
            name: name.to_string(),
            etag: self.label.clone(),
        }
    }
}

impl ObjectStorage for ScriptedStorage {
    async fn head(&self, name: &str) -> Result<ObjectMeta> {
        self.call("head").await?;
        Ok(self.meta(name))
    }

    async fn get(&self, name: &str) -> Result<GetObject> {
        self.call("get").await?;
        Ok(GetObject {
            content: Bytes::from(self.label.clone()),
            meta: self.meta(name),
        })
    }

    async fn get_stream(&self, _name: &str) -> Result<ObjectReader> {
        self.call("get_stream").await?;
        let content = self.label.clone().into_bytes();
        Ok(Box::new(std::io::Cursor::new(content)))
    }

    async fn list(&self, _query: &ListQuery) -> Result<ListPage> {
        self.call("list").await?;
        Ok(ListPage {
            objects: vec![self.meta(&self.label)],
            ..ListPage::default()
        })
    }

    async fn put(&self, name: &str, _content: Bytes, _options: &PutOptions) -> Result<PutResult> {
        self.call("put").await?;
        Ok(self.put_result(name))
    }

    async fn put_stream<R: AsyncRead + Send + Unpin>(
        &self,
        name: &str,
        mut input: R,
        _options: &PutOptions,
    ) -> Result<PutResult> {
        let mut buf = Vec::new();
        input.read_to_end(&mut buf).await?;
        self.call("put_stream").await?;
        Ok(self.put_result(name))
    }

    async fn delete(&self, _name: &str) -> Result<()> {
        self.call("delete").await
    }

    async fn delete_multi(
        &self,
        names: &[String],
        _options: &DeleteMultiOptions,
    ) -> Result<DeleteMultiResult> {
        self.call("delete_multi").await?;
        Ok(DeleteMultiResult {
            deleted: names.to_vec(),
        })
    }

    async fn copy(&self, target: &str, _source: &str, _options: &CopyOptions) -> Result<PutResult> {
        self.call("copy").await?;
        Ok(self.put_result(target))
    }

    async fn put_meta(&self, _name: &str, _metadata: &Metadata) -> Result<()> {
        self.call("put_meta").await
    }

    async fn signature_url(&self, name: &str, _options: &SignatureOptions) -> Result<String> {
        self.call("signature_url").await?;
        Ok(format!("https://{}.example.com/{}", self.label, name))
    }
}

/// `(operation, attempt, backend_index, status)` of one failover event.
pub type EventRecord = (&'static str, usize, usize, Option<u16>);

/// Collects failover events from a cluster listener.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<EventRecord>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A listener closure that records into this log.
    pub fn listener(
        log: &Arc<Self>,
    ) -> impl Fn(&stowage_cluster::FailoverEvent) + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |event| {
            log.events.lock().unwrap().push((
                event.operation,
                event.attempt,
                event.backend_index,
                event.error.status(),
            ));
        }
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

// Reusable CRUD suite

pub async fn run_test_put_and_exists<S: ObjectStorage>(storage: &S) {
    assert!(!storage.exists("test.txt").await.unwrap());
    storage.put_bytes("test.txt", b"hello world").await.unwrap();
    assert!(storage.exists("test.txt").await.unwrap());
}

pub async fn run_test_put_and_get<S: ObjectStorage>(storage: &S) {
    storage.put_bytes("test.txt", b"hello world").await.unwrap();
    let object = storage.get("test.txt").await.unwrap();
    assert_eq!(object.content.as_ref(), b"hello world");
    assert_eq!(object.meta.size, 11);
}

pub async fn run_test_get_nonexistent<S: ObjectStorage>(storage: &S) {
    let err = storage.get("nonexistent.txt").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

pub async fn run_test_delete_idempotent<S: ObjectStorage>(storage: &S) {
    storage.put_bytes("test.txt", b"data").await.unwrap();
    storage.delete("test.txt").await.unwrap();
    assert!(!storage.exists("test.txt").await.unwrap());
    storage.delete("test.txt").await.unwrap();
}

pub async fn run_test_overwrite<S: ObjectStorage>(storage: &S) {
    storage.put_bytes("test.txt", b"original").await.unwrap();
    storage.put_bytes("test.txt", b"updated").await.unwrap();
    assert_eq!(storage.get_string("test.txt").await.unwrap(), "updated");
}

pub async fn run_test_stream_round_trip<S: ObjectStorage>(storage: &S) {
    let data: Vec<u8> = (0..100_000).map(|i| (i % 256) as u8).collect();
    storage
        .put_stream("large.bin", data.as_slice(), &PutOptions::default())
        .await
        .unwrap();

    let mut reader = storage.get_stream("large.bin").await.unwrap();
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.unwrap();
    assert_eq!(buf, data);
}
