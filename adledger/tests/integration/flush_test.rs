use std::time::Duration;

use adledger::error::ErrorKind;
use adledger::events::record_event;
use adledger::flush::cycle::FlushPipeline;
use adledger::store::aggregate::AggregateStore;
use adledger::store::both::memory::MemoryLedgerStore;
use adledger::store::counter::CounterStore;
use adledger::store::counter::memory::MemoryCounterStore;
use adledger::test_utils::faulty::{FaultyAggregateStore, FaultyCounterStore};
use adledger::test_utils::seed::seed_ledger;
use adledger::types::{AdvertisementAggregate, AdvertisementId, CounterDeltas, CounterField};
use adledger_config::shared::FlushConfig;
use adledger_telemetry::tracing::init_test_tracing;

fn flush_config(max_concurrent_workers: u16) -> FlushConfig {
    FlushConfig {
        max_concurrent_workers,
        ..FlushConfig::default()
    }
}

async fn ledger_totals(ledger: &MemoryLedgerStore, id: i64) -> AdvertisementAggregate {
    ledger
        .get_aggregate(AdvertisementId::new(id))
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn advertisement_42_is_merged_and_its_group_removed() {
    init_test_tracing();
    let ledger = seed_ledger([42]).await;
    let counters = MemoryCounterStore::default();
    let id = AdvertisementId::new(42);

    for _ in 0..3 {
        record_event(&counters, id, CounterField::Impression).await.unwrap();
    }
    record_event(&counters, id, CounterField::Click).await.unwrap();

    let pipeline =
        FlushPipeline::from_config(counters.clone(), ledger.store.clone(), &flush_config(20));
    let report = pipeline.run_cycle().await.unwrap();

    assert_eq!(report.merged(), 1);
    let aggregate = ledger_totals(&ledger.store, 42).await;
    assert_eq!(aggregate.impression_count, 3);
    assert_eq!(aggregate.click_count, 1);
    assert_eq!(counters.group(id).await, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn increments_between_cycles_are_merged_exactly_once() {
    init_test_tracing();
    let ledger = seed_ledger([1, 2]).await;
    let counters = MemoryCounterStore::default();
    let pipeline =
        FlushPipeline::from_config(counters.clone(), ledger.store.clone(), &flush_config(4));

    record_event(&counters, AdvertisementId::new(1), CounterField::Impression)
        .await
        .unwrap();
    pipeline.run_cycle().await.unwrap();

    for _ in 0..25 {
        record_event(&counters, AdvertisementId::new(1), CounterField::Impression)
            .await
            .unwrap();
        record_event(&counters, AdvertisementId::new(2), CounterField::Click)
            .await
            .unwrap();
    }
    pipeline.run_cycle().await.unwrap();

    assert_eq!(ledger_totals(&ledger.store, 1).await.impression_count, 26);
    assert_eq!(ledger_totals(&ledger.store, 2).await.click_count, 25);

    // A cycle without new events changes nothing.
    let report = pipeline.run_cycle().await.unwrap();
    assert_eq!(report.scanned(), 0);
    assert_eq!(ledger_totals(&ledger.store, 1).await.impression_count, 26);
}

#[tokio::test(flavor = "multi_thread")]
async fn increments_after_the_snapshot_wait_for_the_next_cycle() {
    init_test_tracing();
    let ledger = seed_ledger([5]).await;
    let counters = MemoryCounterStore::default();
    let faulty = FaultyCounterStore::new(counters.clone());
    let id = AdvertisementId::new(5);
    let pipeline =
        FlushPipeline::from_config(faulty.clone(), ledger.store.clone(), &flush_config(1));

    record_event(&counters, id, CounterField::Impression).await.unwrap();
    record_event(&counters, id, CounterField::Impression).await.unwrap();

    // Hold the cycle after the merge committed and before the group is cleared.
    faulty.gate_clears();
    let cycle = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run_cycle().await }
    });
    while faulty.clear_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    record_event(&counters, id, CounterField::Impression).await.unwrap();
    record_event(&counters, id, CounterField::Click).await.unwrap();
    faulty.release_clears(1);
    cycle.await.unwrap().unwrap();

    assert_eq!(ledger_totals(&ledger.store, 5).await.impression_count, 2);
    assert_eq!(counters.group(id).await, Some(CounterDeltas::new(1, 1)));

    faulty.release_clears(1);
    pipeline.run_cycle().await.unwrap();

    let aggregate = ledger_totals(&ledger.store, 5).await;
    assert_eq!(aggregate.impression_count, 3);
    assert_eq!(aggregate.click_count, 1);
    assert_eq!(counters.group(id).await, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn dispatcher_never_exceeds_the_worker_cap() {
    init_test_tracing();
    let ids: Vec<i64> = (1..=200).collect();
    let ledger = seed_ledger(ids.clone()).await;
    let counters = MemoryCounterStore::default();
    for id in &ids {
        counters
            .increment(AdvertisementId::new(*id), CounterField::Impression, *id)
            .await
            .unwrap();
    }
    let faulty = FaultyCounterStore::new(counters.clone());
    faulty.set_read_delay(Some(Duration::from_millis(5)));

    let pipeline =
        FlushPipeline::from_config(faulty.clone(), ledger.store.clone(), &flush_config(8));
    let report = pipeline.run_cycle().await.unwrap();

    assert_eq!(report.merged(), 200);
    assert!(faulty.peak_in_flight_reads() <= 8);
    assert!(counters.is_empty().await);
    for id in [1, 100, 200] {
        assert_eq!(ledger_totals(&ledger.store, id).await.impression_count, id);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_ledger_leaves_groups_until_a_later_cycle() {
    init_test_tracing();
    let ledger = seed_ledger([1, 2, 3]).await;
    let counters = MemoryCounterStore::default();
    for id in ledger.ids() {
        record_event(&counters, id, CounterField::Impression).await.unwrap();
        record_event(&counters, id, CounterField::Click).await.unwrap();
    }
    let aggregate_store = FaultyAggregateStore::new(ledger.store.clone());
    let pipeline =
        FlushPipeline::from_config(counters.clone(), aggregate_store.clone(), &flush_config(2));

    aggregate_store.set_unreachable(true);
    let report = pipeline.run_cycle().await.unwrap();

    assert_eq!(report.failed(), 3);
    let err = report.error().unwrap();
    assert!(
        err.kinds()
            .iter()
            .all(|kind| *kind == ErrorKind::AggregateStoreConnectionFailed)
    );
    for id in ledger.ids() {
        assert_eq!(counters.group(id).await, Some(CounterDeltas::new(1, 1)));
    }

    aggregate_store.set_unreachable(false);
    let report = pipeline.run_cycle().await.unwrap();

    assert!(report.is_success());
    assert!(counters.is_empty().await);
    for id in [1, 2, 3] {
        let aggregate = ledger_totals(&ledger.store, id).await;
        assert_eq!((aggregate.impression_count, aggregate.click_count), (1, 1));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn failure_between_commit_and_clear_merges_twice() {
    init_test_tracing();
    let ledger = seed_ledger([9]).await;
    let counters = MemoryCounterStore::default();
    let id = AdvertisementId::new(9);
    for _ in 0..4 {
        record_event(&counters, id, CounterField::Click).await.unwrap();
    }
    let faulty = FaultyCounterStore::new(counters.clone());
    let pipeline =
        FlushPipeline::from_config(faulty.clone(), ledger.store.clone(), &flush_config(1));

    faulty.fail_clears(true);
    let report = pipeline.run_cycle().await.unwrap();
    assert_eq!(report.failed(), 1);
    assert_eq!(ledger_totals(&ledger.store, 9).await.click_count, 4);
    assert_eq!(counters.group(id).await, Some(CounterDeltas::new(0, 4)));

    faulty.fail_clears(false);
    pipeline.run_cycle().await.unwrap();

    assert_eq!(ledger_totals(&ledger.store, 9).await.click_count, 8);
    assert_eq!(counters.group(id).await, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn orphaned_and_malformed_groups_do_not_affect_others() {
    init_test_tracing();
    let ledger = seed_ledger([1]).await;
    let counters = MemoryCounterStore::default();
    record_event(&counters, AdvertisementId::new(1), CounterField::Click)
        .await
        .unwrap();
    record_event(&counters, AdvertisementId::new(404), CounterField::Click)
        .await
        .unwrap();
    counters
        .insert_raw_group("advertisement:not-a-number:counts", CounterDeltas::new(1, 1))
        .await;

    let pipeline =
        FlushPipeline::from_config(counters.clone(), ledger.store.clone(), &flush_config(20));
    let report = pipeline.run_cycle().await.unwrap();

    assert_eq!(report.scanned(), 3);
    assert_eq!(report.merged(), 1);
    assert_eq!(report.orphaned(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.error().unwrap().kind(), ErrorKind::InvalidCounterKey);
    assert_eq!(ledger_totals(&ledger.store, 1).await.click_count, 1);
    // Only the malformed group is left behind.
    assert_eq!(counters.len().await, 1);
}
