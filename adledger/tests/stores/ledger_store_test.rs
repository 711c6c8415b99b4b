use adledger::store::aggregate::AggregateStore;
use adledger::store::catalog::AdCatalog;
use adledger::test_utils::database::spawn_ledger_database;
use adledger::types::{AdvertisementId, CounterDeltas, MergeOutcome};
use adledger_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn merge_counts_is_additive() {
    init_test_tracing();
    let database = spawn_ledger_database().await;
    let advertiser = database.insert_advertiser("acme", 100.0).await;
    let id = database.insert_advertisement(advertiser).await;

    let first = database
        .store
        .merge_counts(id, CounterDeltas::new(3, 1))
        .await
        .unwrap();
    let second = database
        .store
        .merge_counts(id, CounterDeltas::new(2, 0))
        .await
        .unwrap();

    assert_eq!(first, MergeOutcome::Applied);
    assert_eq!(second, MergeOutcome::Applied);
    let aggregate = database.store.get_aggregate(id).await.unwrap().unwrap();
    assert_eq!(aggregate.impression_count, 5);
    assert_eq!(aggregate.click_count, 1);

    database.drop_database().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn merge_counts_into_missing_advertisement() {
    init_test_tracing();
    let database = spawn_ledger_database().await;
    let missing = AdvertisementId::new(7);

    let outcome = database
        .store
        .merge_counts(missing, CounterDeltas::new(4, 2))
        .await
        .unwrap();

    assert_eq!(outcome, MergeOutcome::AggregateMissing);
    assert!(database.store.get_aggregate(missing).await.unwrap().is_none());

    database.drop_database().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn unfunded_advertisers_are_not_eligible() {
    init_test_tracing();
    let database = spawn_ledger_database().await;
    let funded = database.insert_advertiser("funded", 10.0).await;
    let unfunded = database.insert_advertiser("unfunded", 0.0).await;
    let eligible = database.insert_advertisement(funded).await;
    database.insert_advertisement(unfunded).await;

    let advertisements = database.store.list_eligible_advertisements().await.unwrap();

    assert_eq!(advertisements.len(), 1);
    assert_eq!(advertisements[0].id, eligible);

    database.drop_database().await;
}
