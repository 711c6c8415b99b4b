#![allow(dead_code)]

use std::io;
use std::net::TcpListener;

use adledger::store::counter::memory::MemoryCounterStore;
use adledger::test_utils::faulty::FaultyCounterStore;
use adledger::test_utils::seed::{SeededLedger, seed_ledger};
use adledger_api::startup::run;
use reqwest::Response;

pub struct TestApp {
    pub address: String,
    pub api_client: reqwest::Client,
    pub counter_store: FaultyCounterStore<MemoryCounterStore>,
    pub ledger: SeededLedger,
    server_handle: tokio::task::JoinHandle<io::Result<()>>,
}

impl TestApp {
    pub async fn get(&self, path: &str) -> Response {
        self.api_client
            .get(format!("{}{path}", self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn record_impression(&self, advertisement_id: &str) -> Response {
        self.get(&format!("/api/advertisements/{advertisement_id}/impression"))
            .await
    }

    pub async fn record_click(&self, advertisement_id: &str) -> Response {
        self.get(&format!("/api/advertisements/{advertisement_id}/click"))
            .await
    }

    pub async fn read_advertisement(&self, advertisement_id: &str) -> Response {
        self.get(&format!("/api/advertisements/{advertisement_id}"))
            .await
    }

    pub async fn read_advertiser(&self, advertiser_id: &str) -> Response {
        self.get(&format!("/api/advertisers/{advertiser_id}")).await
    }

    pub async fn request_ad(&self) -> Response {
        self.get("/api/ad/request").await
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server_handle.abort();
    }
}

/// Serves the API over memory stores seeded with one advertisement per id.
pub async fn spawn_test_app(advertisement_ids: impl IntoIterator<Item = i64>) -> TestApp {
    spawn_test_app_with(seed_ledger(advertisement_ids).await).await
}

pub async fn spawn_test_app_with(ledger: SeededLedger) -> TestApp {
    let base_address = "127.0.0.1";
    let listener =
        TcpListener::bind(format!("{base_address}:0")).expect("failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let counter_store = FaultyCounterStore::new(MemoryCounterStore::default());

    let server = run(listener, counter_store.clone(), ledger.store.clone())
        .expect("failed to bind address");
    let server_handle = tokio::spawn(server);

    TestApp {
        address: format!("http://{base_address}:{port}"),
        api_client: reqwest::Client::new(),
        counter_store,
        ledger,
        server_handle,
    }
}
