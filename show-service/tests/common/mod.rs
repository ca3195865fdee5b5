use serde_json::Value;
use show_service::services::{InMemoryShowStore, ShowStore};
use show_service::startup::Application;
use show_service::workers::ChannelSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct TestApp<S = InMemoryShowStore> {
    pub address: String,
    pub port: u16,
    pub store: S,
    pub client: reqwest::Client,
    publisher: mpsc::Sender<Vec<u8>>,
    shutdown: CancellationToken,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestApp {
    /// Spawns the real application on a random port with an in-memory store
    /// and an in-process acceptance queue.
    pub async fn spawn() -> Self {
        Self::spawn_with_store(InMemoryShowStore::new()).await
    }
}

impl<S> TestApp<S>
where
    S: ShowStore + Clone + 'static,
{
    /// Spawns the real application around `store`.
    pub async fn spawn_with_store(store: S) -> Self {
        let (publisher, source) = ChannelSource::new(64);

        let app = Application::build_with(0, Arc::new(store.clone()), Box::new(source))
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);
        let shutdown = app.shutdown_token();

        let handle = tokio::spawn(app.run_until_stopped());

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            store,
            client,
            publisher,
            shutdown,
            handle,
        }
    }

    pub async fn add_show(&self, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}/show/add", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_json(&self, path: &str) -> Value {
        self.get(path)
            .await
            .json()
            .await
            .expect("Failed to parse response")
    }

    /// Publishes `{"showId": id}` on the acceptance queue.
    pub async fn publish_acceptance(&self, show_id: &str) {
        self.publish_raw(serde_json::json!({ "showId": show_id }).to_string().into_bytes())
            .await;
    }

    pub async fn publish_raw(&self, payload: Vec<u8>) {
        self.publisher
            .send(payload)
            .await
            .expect("Acceptance queue closed");
    }

    /// Polls the show until it reports `accepted == true` or gives up.
    pub async fn wait_until_accepted(&self, show_id: &str) -> bool {
        for _ in 0..50 {
            let show = self.get_json(&format!("/show/get/{}", show_id)).await;
            if show["accepted"] == true {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    /// Cancels the shared token and waits for the server and updater to stop.
    pub async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("Application did not shut down")
            .expect("Application task panicked")
            .expect("Application returned an error");
    }
}
