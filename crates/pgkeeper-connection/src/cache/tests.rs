//! Tests for the per-database cache

use super::*;
use crate::reconnect::RetryPolicy;
use crate::test_support::{MockConnector, identity, init_test_logging};
use pretty_assertions::assert_eq;

fn cache(mock: &Arc<MockConnector>) -> DatabaseCache {
    DatabaseCache::new(
        identity(),
        RetryingConnector::new(mock.clone(), RetryPolicy::default()),
    )
}

#[tokio::test]
async fn test_healthy_connection_is_reused() {
    init_test_logging();
    let mock = MockConnector::new();
    let mut cache = cache(&mock);

    let first = cache.get_connection(None).await.unwrap();
    let second = cache.get_connection(Some("postgres")).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(mock.count(), 1);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_bad_connection_is_replaced_and_closed_once() {
    init_test_logging();
    let mock = MockConnector::new();
    let mut cache = cache(&mock);

    let first = cache.get_connection(None).await.unwrap();
    mock.connection(0).break_link();

    let second = cache.get_connection(None).await.unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(second.status().is_ok());
    assert_eq!(mock.connection(0).close_calls(), 1);
    assert_eq!(mock.count(), 2);

    // Healthy again, so no further replacement or close.
    cache.get_connection(None).await.unwrap();
    assert_eq!(mock.connection(0).close_calls(), 1);
    assert_eq!(mock.count(), 2);
}

#[tokio::test]
async fn test_one_entry_per_database() {
    init_test_logging();
    let mock = MockConnector::new();
    let mut cache = cache(&mock);

    cache.get_connection(None).await.unwrap();
    cache.get_connection(Some("app")).await.unwrap();
    cache.get_connection(Some("app")).await.unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.contains("postgres"));
    assert!(cache.contains("app"));
    assert_eq!(mock.connection(1).dbname, "app");
}

#[tokio::test(start_paused = true)]
async fn test_cache_miss_rides_out_transient_failures() {
    init_test_logging();
    let mock = MockConnector::failing(2);
    let mut cache = cache(&mock);

    let conn = cache.get_connection(None).await.unwrap();

    assert!(!conn.is_closed());
    assert_eq!(mock.attempts(), 3);
}

#[tokio::test]
async fn test_close_all_is_idempotent() {
    init_test_logging();
    let mock = MockConnector::new();
    let mut cache = cache(&mock);

    cache.get_connection(None).await.unwrap();
    cache.get_connection(Some("app")).await.unwrap();

    cache.close_all().await;
    cache.close_all().await;

    assert!(cache.is_empty());
    assert_eq!(mock.connection(0).close_calls(), 1);
    assert_eq!(mock.connection(1).close_calls(), 1);
}

#[tokio::test]
async fn test_drop_closes_connections() {
    init_test_logging();
    let mock = MockConnector::new();
    {
        let mut cache = cache(&mock);
        cache.get_connection(None).await.unwrap();
    }

    // Close runs on a spawned task.
    tokio::task::yield_now().await;
    assert_eq!(mock.connection(0).close_calls(), 1);
}
