use adledger::flush::worker::{FlushWorker, GroupFlushOutcome};
use adledger::store::aggregate::AggregateStore;
use adledger::store::counter::CounterStore;
use adledger::test_utils::database::spawn_ledger_database;
use adledger::test_utils::redis::spawn_counter_store;
use adledger::types::{AdvertisementId, CounterField, GroupClear};
use adledger_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn click_only_group_is_merged_once() {
    init_test_tracing();
    let database = spawn_ledger_database().await;
    let counters = spawn_counter_store().await;
    let advertiser = database.insert_advertiser("acme", 100.0).await;
    let id = database.insert_advertisement(advertiser).await;
    let key = counters.keyspace().group_key(id);
    let worker = FlushWorker::new(
        counters.clone(),
        database.store.clone(),
        counters.keyspace().clone(),
    );

    counters.increment(id, CounterField::Click, 4).await.unwrap();

    let outcome = worker.flush(&key).await.unwrap();
    assert!(matches!(
        outcome,
        GroupFlushOutcome::Merged {
            clear: GroupClear::Removed,
            ..
        }
    ));

    // Flushing again finds nothing left to merge.
    let outcome = worker.flush(&key).await.unwrap();
    assert!(matches!(outcome, GroupFlushOutcome::Empty { .. }));

    let aggregate = database.store.get_aggregate(id).await.unwrap().unwrap();
    assert_eq!(aggregate.impression_count, 0);
    assert_eq!(aggregate.click_count, 4);

    database.drop_database().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn orphaned_group_is_discarded() {
    init_test_tracing();
    let database = spawn_ledger_database().await;
    let counters = spawn_counter_store().await;
    let missing = AdvertisementId::new(9_999);
    let key = counters.keyspace().group_key(missing);
    let worker = FlushWorker::new(
        counters.clone(),
        database.store.clone(),
        counters.keyspace().clone(),
    );

    counters
        .increment(missing, CounterField::Impression, 2)
        .await
        .unwrap();

    let outcome = worker.flush(&key).await.unwrap();

    assert!(matches!(outcome, GroupFlushOutcome::Orphaned { .. }));
    assert!(counters.read_group(&key).await.unwrap().is_empty());

    database.drop_database().await;
}
