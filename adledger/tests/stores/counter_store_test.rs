use adledger::store::counter::CounterStore;
use adledger::test_utils::redis::spawn_counter_store;
use adledger::types::{AdvertisementId, CounterDeltas, CounterField, GroupClear};
use adledger_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn clear_group_keeps_late_increments() {
    init_test_tracing();
    let store = spawn_counter_store().await;
    let id = AdvertisementId::new(1);
    let key = store.keyspace().group_key(id);

    store.increment(id, CounterField::Impression, 3).await.unwrap();
    store.increment(id, CounterField::Click, 1).await.unwrap();
    let snapshot = store.read_group(&key).await.unwrap();
    store.increment(id, CounterField::Impression, 2).await.unwrap();

    let clear = store.clear_group(&key, snapshot).await.unwrap();

    assert_eq!(snapshot, CounterDeltas::new(3, 1));
    assert_eq!(clear, GroupClear::Retained(CounterDeltas::new(2, 0)));
    assert_eq!(store.read_group(&key).await.unwrap(), CounterDeltas::new(2, 0));

    store.delete_group(&key).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_group_removes_single_field_group() {
    init_test_tracing();
    let store = spawn_counter_store().await;
    let clicks_only = AdvertisementId::new(1);
    let impressions_only = AdvertisementId::new(2);

    store.increment(clicks_only, CounterField::Click, 4).await.unwrap();
    store
        .increment(impressions_only, CounterField::Impression, 5)
        .await
        .unwrap();

    for id in [clicks_only, impressions_only] {
        let key = store.keyspace().group_key(id);
        let snapshot = store.read_group(&key).await.unwrap();

        let clear = store.clear_group(&key, snapshot).await.unwrap();

        assert_eq!(clear, GroupClear::Removed);
    }

    let pattern = store.keyspace().pattern();
    assert!(store.list_pending_group_keys(&pattern).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_group_with_zero_snapshot_removes_empty_group() {
    init_test_tracing();
    let store = spawn_counter_store().await;
    let id = AdvertisementId::new(7);
    let key = store.keyspace().group_key(id);

    store.increment(id, CounterField::Impression, 0).await.unwrap();

    let clear = store.clear_group(&key, CounterDeltas::default()).await.unwrap();

    assert_eq!(clear, GroupClear::Removed);
    assert!(store.read_group(&key).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_group_clamps_each_field_at_zero() {
    init_test_tracing();
    let store = spawn_counter_store().await;
    let id = AdvertisementId::new(3);
    let key = store.keyspace().group_key(id);

    store.increment(id, CounterField::Impression, 1).await.unwrap();
    store.increment(id, CounterField::Click, 4).await.unwrap();

    let clear = store
        .clear_group(&key, CounterDeltas::new(3, 0))
        .await
        .unwrap();

    assert_eq!(clear, GroupClear::Retained(CounterDeltas::new(0, 4)));
    assert_eq!(store.read_group(&key).await.unwrap(), CounterDeltas::new(0, 4));

    store.delete_group(&key).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn list_pending_group_keys_stays_in_namespace() {
    init_test_tracing();
    let store = spawn_counter_store().await;
    let other = spawn_counter_store().await;

    for id in 1..=25 {
        store
            .increment(AdvertisementId::new(id), CounterField::Impression, 1)
            .await
            .unwrap();
    }
    other
        .increment(AdvertisementId::new(1), CounterField::Click, 1)
        .await
        .unwrap();

    let keys = store
        .list_pending_group_keys(&store.keyspace().pattern())
        .await
        .unwrap();

    assert_eq!(keys.len(), 25);
    for key in &keys {
        assert!(store.keyspace().parse(key).is_ok());
        store.delete_group(key).await.unwrap();
    }
    other
        .delete_group(&other.keyspace().group_key(AdvertisementId::new(1)))
        .await
        .unwrap();
}
