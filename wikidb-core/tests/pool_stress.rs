//! Pool non-leak property: after any mix of concurrent, failing, and
//! cancelled pipelines settles, every lease is back in the pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use wikidb_core::{ConnPool, PoolOptions, QueryRegistry, WikiDatabase, WikiDatabaseService};

const POOL_SIZE: usize = 4;

async fn setup() -> (tempfile::TempDir, Arc<ConnPool>, Arc<WikiDatabase>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = Arc::new(
        PoolOptions::new(dir.path().join("wiki.db"))
            .max_size(POOL_SIZE)
            .open()
            .await
            .expect("pool opens"),
    );
    let queries = Arc::new(QueryRegistry::embedded().expect("embedded queries"));
    let service = WikiDatabase::connect(Arc::clone(&pool), queries)
        .await
        .expect("service connects");
    (dir, pool, Arc::new(service))
}

/// Cancelled pipelines release on the blocking side, so give detached
/// tasks a moment to drain before asserting.
async fn assert_pool_refills(pool: &ConnPool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if pool.available() == pool.max_size() {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "pool never refilled: {}/{} leases free",
            pool.available(),
            pool.max_size()
        );
        sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn no_lease_is_lost_under_concurrency_and_cancellation() {
    let (_dir, pool, service) = setup().await;
    service.create_page("Test", "content").await.unwrap();

    let mut tasks = Vec::new();
    for i in 0..(POOL_SIZE * 8) {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            match i % 3 {
                // Hit.
                0 => {
                    let page = service.fetch_page("Test").await.unwrap();
                    assert!(page.is_some());
                }
                // Miss: found=false is not an error and must still release.
                1 => {
                    let page = service.fetch_page("NotThere").await.unwrap();
                    assert!(page.is_none());
                }
                // Abandoned mid-flight: dropping the future must not
                // strand the lease.
                _ => {
                    let _ = timeout(Duration::from_micros(10), service.fetch_page("Test")).await;
                }
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_pool_refills(&pool).await;
}

#[tokio::test]
async fn failed_queries_release_their_leases() {
    let (_dir, pool, service) = setup().await;
    service.create_page("Dup", "x").await.unwrap();

    for _ in 0..POOL_SIZE * 2 {
        // Constraint violation on every call.
        let _ = service.create_page("Dup", "x").await.unwrap_err();
    }

    assert_pool_refills(&pool).await;
}

#[tokio::test]
async fn waiters_queue_behind_the_bound_instead_of_failing() {
    let (_dir, pool, service) = setup().await;
    service.create_page("Test", "content").await.unwrap();

    // Hold every lease, then issue a read that has to queue.
    let mut held = Vec::new();
    for _ in 0..POOL_SIZE {
        held.push(pool.acquire().await.unwrap());
    }
    assert_eq!(pool.available(), 0);

    let queued = {
        let service = Arc::clone(&service);
        tokio::spawn(async move { service.fetch_page("Test").await })
    };

    // The read cannot complete until a lease frees up.
    sleep(Duration::from_millis(50)).await;
    assert!(!queued.is_finished());

    drop(held);
    let page = queued.await.unwrap().unwrap();
    assert_eq!(page.unwrap().content, "content");

    assert_pool_refills(&pool).await;
}
