#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use wiremock::MockServer;

use vanpi_app_api::app::{router, AppState};
use vanpi_app_api::config::AppConfig;
use vanpi_app_api::services::{build_http_client, HttpControlService};
pub use vanpi_app_api::testing::InMemoryRegistry;

pub const ALLOWED_ORIGIN: &str = "http://panel.local";

/// Gateway running in-process against mocked device and automation APIs
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub vanpi_api: MockServer,
    pub automation_api: MockServer,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn spawn(registry: InMemoryRegistry) -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("vanpi_app_api=debug")
            .with_test_writer()
            .try_init();

        let vanpi_api = MockServer::start().await;
        let automation_api = MockServer::start().await;

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let vars: HashMap<&str, String> = [
            ("DATABASE_URL", "postgres://vanpi@localhost/vanpi".to_string()),
            ("VANPI_API_ROOT_URL", format!("{}/", vanpi_api.uri())),
            ("AUTOMATION_API_ROOT_URL", automation_api.uri()),
            ("VANPI_APP_API_ALLOWED_DOMAINS", ALLOWED_ORIGIN.to_string()),
            ("VANPI_APP_API_PORT", port.to_string()),
            ("DOWNSTREAM_TIMEOUT_SECS", "5".to_string()),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_lookup(|key| vars.get(key).cloned())?;

        let client = build_http_client(&config.downstream)?;
        let control = Arc::new(HttpControlService::new(client.clone(), &config.downstream));
        let app = router(AppState::new(config, Arc::new(registry), control, client));

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind {}", base_url))?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            port,
            base_url,
            vanpi_api,
            automation_api,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(5)).await?;
        Ok(server)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request line untouched by client-side URL normalization and
    /// return the raw response
    pub async fn send_raw(&self, method: &str, target: &str) -> Result<String> {
        let mut stream = TcpStream::connect(("127.0.0.1", self.port)).await?;
        let request = format!(
            "{} {} HTTP/1.1\r\nHost: 127.0.0.1\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            method, target
        );
        stream.write_all(request.as_bytes()).await?;

        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        Ok(response)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = self.client.get(self.url("/health")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}
