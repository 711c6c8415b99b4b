use adledger::error::ErrorKind;
use adledger::failpoints::{FLUSH_WORKER__AFTER_MERGE_COMMIT, FLUSH_WORKER__BEFORE_MERGE};
use adledger::flush::cycle::FlushPipeline;
use adledger::store::aggregate::AggregateStore;
use adledger::store::counter::CounterStore;
use adledger::store::counter::memory::MemoryCounterStore;
use adledger::test_utils::failpoints::FailpointGuard;
use adledger::test_utils::seed::seed_ledger;
use adledger::types::{AdvertisementId, CounterDeltas, CounterField};
use adledger_config::shared::FlushConfig;
use adledger_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn crash_after_merge_commit_double_applies_on_retry() {
    init_test_tracing();
    let ledger = seed_ledger([42]).await;
    let counters = MemoryCounterStore::default();
    let id = AdvertisementId::new(42);
    counters.increment(id, CounterField::Impression, 3).await.unwrap();
    counters.increment(id, CounterField::Click, 1).await.unwrap();
    let pipeline =
        FlushPipeline::from_config(counters.clone(), ledger.store.clone(), &FlushConfig::default());

    let guard = FailpointGuard::setup(&[(FLUSH_WORKER__AFTER_MERGE_COMMIT, "return")]);
    let report = pipeline.run_cycle().await.unwrap();

    assert_eq!(report.error().unwrap().kind(), ErrorKind::FailpointTriggered);
    let aggregate = ledger.store.get_aggregate(id).await.unwrap().unwrap();
    assert_eq!((aggregate.impression_count, aggregate.click_count), (3, 1));
    assert_eq!(counters.group(id).await, Some(CounterDeltas::new(3, 1)));

    guard.disable(FLUSH_WORKER__AFTER_MERGE_COMMIT);
    pipeline.run_cycle().await.unwrap().into_result().unwrap();

    let aggregate = ledger.store.get_aggregate(id).await.unwrap().unwrap();
    assert_eq!((aggregate.impression_count, aggregate.click_count), (6, 2));
    assert_eq!(counters.group(id).await, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_before_merge_leaves_everything_untouched() {
    init_test_tracing();
    let ledger = seed_ledger([7]).await;
    let counters = MemoryCounterStore::default();
    let id = AdvertisementId::new(7);
    counters.increment(id, CounterField::Click, 2).await.unwrap();
    let pipeline =
        FlushPipeline::from_config(counters.clone(), ledger.store.clone(), &FlushConfig::default());

    let guard = FailpointGuard::setup(&[(FLUSH_WORKER__BEFORE_MERGE, "return")]);
    let report = pipeline.run_cycle().await.unwrap();

    assert_eq!(report.failed(), 1);
    let aggregate = ledger.store.get_aggregate(id).await.unwrap().unwrap();
    assert_eq!(aggregate.click_count, 0);
    assert_eq!(counters.group(id).await, Some(CounterDeltas::new(0, 2)));

    drop(guard);
    pipeline.run_cycle().await.unwrap();

    let aggregate = ledger.store.get_aggregate(id).await.unwrap().unwrap();
    assert_eq!(aggregate.click_count, 2);
}
