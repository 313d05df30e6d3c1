//! Integration tests for the HTTP API
#![cfg(feature = "server")]

use std::net::SocketAddr;
use std::sync::Arc;

use fakechat::server::{Server, ServerConfig};
use fakechat::{AsyncRenderer, FontBook, MockupConfig, Renderer};
use tokio::sync::oneshot;

struct TestService {
    addr: SocketAddr,
    dir: tempfile::TempDir,
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<fakechat::Result<()>>,
}

async fn start_service() -> TestService {
    let fonts = Arc::new(FontBook::empty());
    let renderer = AsyncRenderer::with_factory(2, move || {
        let config = MockupConfig { pattern_seed: Some(1), ..Default::default() };
        Renderer::from_parts(config, fonts.clone())
    })
    .await
    .expect("render pool");

    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        output_dir: dir.path().join("Generated"),
        ..Default::default()
    };
    let server = Server::bind(&config, renderer).expect("bind");
    let addr = server.local_addr().expect("tcp listener");

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(server.run(async move {
        let _ = stopped.await;
    }));
    TestService { addr, dir, stop, task }
}

impl TestService {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    fn stored_files(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("Generated")).unwrap().count()
    }

    async fn shutdown(self) {
        let _ = self.stop.send(());
        self.task.await.unwrap().unwrap();
    }
}

async fn json(resp: reqwest::Response) -> serde_json::Value {
    let bytes = resp.bytes().await.unwrap();
    serde_json::from_slice(&bytes).expect("JSON body")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn render_endpoint_returns_a_served_image() {
    let service = start_service().await;
    let client = reqwest::Client::new();

    let resp = client.get(service.url("/api/whatsapp/Alice/Hello%20there")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body = json(resp).await;
    assert_eq!(body["username"], "Alice");
    assert_eq!(body["message"], "Hello there");

    let image_url = body["image"].as_str().unwrap().to_string();
    let prefix = service.url("/images/image-");
    assert!(image_url.starts_with(&prefix), "{image_url}");
    assert!(image_url.ends_with(".png"));
    assert_eq!(service.stored_files(), 1);

    let resp = client.get(&image_url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/png");
    let bytes = resp.bytes().await.unwrap();
    assert_eq!(&bytes[0..8], b"\x89PNG\r\n\x1a\n");

    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn blank_name_is_a_bad_request_and_stores_nothing() {
    let service = start_service().await;
    let client = reqwest::Client::new();

    let resp = client.get(service.url("/api/whatsapp/%20/Hi")).send().await.unwrap();
    assert_eq!(resp.status(), 400);
    let body = json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("display name"));

    let resp = client.get(service.url("/api/whatsapp/Alice/Hi?theme=neon")).send().await.unwrap();
    assert_eq!(resp.status(), 400);

    assert_eq!(service.stored_files(), 0);
    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_paths_and_methods() {
    let service = start_service().await;
    let client = reqwest::Client::new();

    for path in ["/", "/api/whatsapp/Alice", "/images/missing.png", "/images/..%2FCargo.toml"] {
        let resp = client.get(service.url(path)).send().await.unwrap();
        assert_eq!(resp.status(), 404, "{path}");
        let body = json(resp).await;
        assert_eq!(body["error"], "not found");
    }

    let resp = client.post(service.url("/api/whatsapp/Alice/Hello")).send().await.unwrap();
    assert_eq!(resp.status(), 405);

    service.shutdown().await;
}
