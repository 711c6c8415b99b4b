use std::time::Duration;

use adledger::concurrency::shutdown::create_shutdown_channel;
use adledger::events::record_event;
use adledger::flush::cycle::FlushPipeline;
use adledger::flush::scheduler::FlushScheduler;
use adledger::store::aggregate::AggregateStore;
use adledger::store::counter::memory::MemoryCounterStore;
use adledger::test_utils::seed::seed_ledger;
use adledger::types::{AdvertisementId, CounterField};
use adledger_config::shared::FlushConfig;
use adledger_telemetry::tracing::init_test_tracing;

#[tokio::test(flavor = "multi_thread")]
async fn scheduler_keeps_flushing_while_events_arrive() {
    init_test_tracing();
    let ledger = seed_ledger([1, 2, 3]).await;
    let counters = MemoryCounterStore::default();
    let config = FlushConfig {
        interval_ms: 20,
        max_concurrent_workers: 2,
        ..FlushConfig::default()
    };
    let pipeline = FlushPipeline::from_config(counters.clone(), ledger.store.clone(), &config);
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let handle = FlushScheduler::new(pipeline, config.interval(), shutdown_rx).start();

    let mut producers = tokio::task::JoinSet::new();
    for id in ledger.ids() {
        let counters = counters.clone();
        producers.spawn(async move {
            for _ in 0..100 {
                record_event(&counters, id, CounterField::Impression).await.unwrap();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });
    }
    while let Some(result) = producers.join_next().await {
        result.unwrap();
    }

    // Give the scheduler time for at least one cycle after the last event.
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.shutdown();
    handle.wait().await.unwrap();

    assert!(counters.is_empty().await);
    for id in ledger.ids() {
        let aggregate = ledger.store.get_aggregate(id).await.unwrap().unwrap();
        assert_eq!(aggregate.impression_count, 100);
    }
    assert!(
        ledger
            .store
            .get_aggregate(AdvertisementId::new(4))
            .await
            .unwrap()
            .is_none()
    );
}
