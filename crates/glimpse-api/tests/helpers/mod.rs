//! Test helpers: build the router over temporary storage roots.

use axum_test::TestServer;
use glimpse_api::setup;
use glimpse_api::state::AppState;
use glimpse_core::{Config, GlimpseConfig};
use image::{ImageFormat, Rgb, RgbImage};
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    /// Poll `GET /job/{id}` until the job leaves `running`
    pub async fn wait_for_job(&self, id: &str) -> Value {
        for _ in 0..200 {
            let body: Value = self.server.get(&format!("/job/{}", id)).await.json();
            if body["status"] != "running" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("job {} did not finish", id);
    }
}

/// Setup a test app with private source hosts allowed (mockito binds to localhost).
pub async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();

    let mut inner = GlimpseConfig {
        download_root: temp_dir.path().join("downloads"),
        preview_root: temp_dir.path().join("previews"),
        allow_private_urls: true,
        ..GlimpseConfig::default()
    };
    inner.base.environment = "test".to_string();

    let (state, router) = setup::build_app(Config::from(inner)).await.unwrap();
    let server = TestServer::new(router).unwrap();

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut body = Vec::new();
    RgbImage::from_pixel(width, height, Rgb([200, 40, 40]))
        .write_to(&mut Cursor::new(&mut body), ImageFormat::Png)
        .unwrap();
    body
}

/// Serve `body` at `path` for both the HEAD check and the download
pub async fn serve(server: &mut mockito::ServerGuard, path: &str, body: Vec<u8>) {
    server
        .mock("HEAD", path)
        .with_status(200)
        .with_header("content-length", &body.len().to_string())
        .create_async()
        .await;
    server
        .mock("GET", path)
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;
}
