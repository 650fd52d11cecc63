//! Round-robin reads, failover and fan-out writes over [`MemoryStorage`] backends.
//!
//! Run with:
//! ```sh
//! RUST_LOG=stowage_cluster=debug cargo run --example cluster
//! ```

use stowage_cluster::{
    ClusterConfig, ClusterStorageBuilder, Error, MemoryConfig, MemoryStorage, ObjectStorage,
    ObjectStorageExt, SignatureOptions,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ClusterConfig::new(vec![
        MemoryConfig::new("eu-west"),
        MemoryConfig::new("eu-central"),
        MemoryConfig::new("us-east"),
    ]);
    let storage = ClusterStorageBuilder::from_config(config, MemoryStorage::from_config)?
        .on_failover(|event| {
            println!(
                "  failover: {} on backend {} ({})",
                event.operation, event.backend_index, event.error
            );
        })
        .build()?;

    // Write: goes to all three backends
    let put = storage.put_bytes("hello.txt", b"Hello, World!").await?;
    println!("stored hello.txt, etag {}", put.etag);

    // Read: rotates over the backends
    for _ in 0..3 {
        let meta = storage.head("hello.txt").await?;
        println!(
            "head hello.txt: {} bytes (next cursor {})",
            meta.size,
            storage.cursor()
        );
    }

    // Take one backend down; reads fail over, writes fail
    if let Some(backend) = storage.backend(storage.cursor()) {
        backend.set_available(false);
        println!("{} is down", backend.bucket());
    }
    println!("read: {}", storage.get_string("hello.txt").await?);

    match storage.put_bytes("world.txt", b"Goodbye").await {
        Err(Error::WriteFailure(details)) => println!("write: {details}"),
        other => println!("write: {other:?}"),
    }

    let url = storage
        .signature_url("hello.txt", &SignatureOptions::default())
        .await?;
    println!("signed: {url}");

    Ok(())
}
