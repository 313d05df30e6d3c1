//! HTTP surface.
//!
//! `GET /api/whatsapp/{name}/{message}` renders through the worker pool,
//! stores the PNG and answers with a JSON body pointing at
//! `GET /images/{filename}`. Generated files are removed by the housekeeping
//! timer started in [`serve`].

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use percent_encoding::percent_decode_str;
use serde::Serialize;
use tiny_http::{Header, Method, Request, Response};

use crate::storage::{spawn_housekeeping, DirectoryStore};
use crate::{AsyncRenderer, Error, MockupConfig, RenderRequest, Result, ThemeKind};

/// Configuration for the HTTP service
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,
    /// Where generated images are written and served from
    pub output_dir: PathBuf,
    /// Files older than this are deleted by the sweep
    pub max_age: Duration,
    /// Time between sweeps
    pub sweep_interval: Duration,
    /// Render worker threads
    pub workers: usize,
    /// Base for image links; `http://<Host header>` when unset
    pub public_base: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
            output_dir: PathBuf::from("Generated"),
            max_age: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(5),
            workers: num_cpus::get(),
            public_base: None,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        self.bind
            .parse::<SocketAddr>()
            .map_err(|e| Error::ConfigError(format!("invalid bind address {}: {}", self.bind, e)))?;
        if self.sweep_interval.is_zero() {
            return Err(Error::ConfigError("sweep interval must be positive".into()));
        }
        if self.workers == 0 {
            return Err(Error::ConfigError("at least one worker is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Rendered<'a> {
    username: &'a str,
    message: &'a str,
    image: String,
}

#[derive(Debug, Serialize)]
struct Failure<'a> {
    error: &'a str,
}

struct Reply {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Reply {
    fn json(status: u16, value: &impl Serialize) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self { status, content_type: "application/json", body },
            Err(e) => Self::error(500, &format!("serialization failed: {}", e)),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        let body = serde_json::to_vec(&Failure { error: message }).unwrap_or_default();
        Self { status, content_type: "application/json", body }
    }

    fn png(body: Vec<u8>) -> Self {
        Self { status: 200, content_type: "image/png", body }
    }

    fn from_error(err: &Error) -> Self {
        if err.is_validation() {
            Self::error(400, &err.to_string())
        } else {
            error!("Request failed: {}", err);
            Self::error(500, &err.to_string())
        }
    }
}

#[derive(Debug, PartialEq)]
enum Route {
    Render { name: String, message: String, profile: Option<String>, theme: Option<String> },
    Image(String),
    NotFound,
}

fn decode_segment(segment: &str) -> Result<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| Error::ValidationError("path is not valid UTF-8".into()))
}

fn route(url: &str) -> Result<Route> {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match segments.as_slice() {
        ["api", "whatsapp", name, message] => {
            let mut profile = None;
            let mut theme = None;
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                match key.as_ref() {
                    "profile" if !value.is_empty() => profile = Some(value.into_owned()),
                    "theme" if !value.is_empty() => theme = Some(value.into_owned()),
                    _ => {}
                }
            }
            Ok(Route::Render { name: decode_segment(name)?, message: decode_segment(message)?, profile, theme })
        }
        ["images", file] => Ok(Route::Image(decode_segment(file)?)),
        _ => Ok(Route::NotFound),
    }
}

struct AppState {
    renderer: AsyncRenderer,
    store: Arc<DirectoryStore>,
    public_base: Option<String>,
}

impl AppState {
    async fn dispatch(&self, url: &str, host: Option<String>) -> Result<Reply> {
        match route(url)? {
            Route::Render { name, message, profile, theme } => {
                let mut request = RenderRequest::new(name, message);
                request.profile = profile;
                if let Some(theme) = theme {
                    let kind = theme
                        .parse::<ThemeKind>()
                        .map_err(|e| Error::ValidationError(e.to_string()))?;
                    request = request.with_theme(kind);
                }

                let image = self.renderer.render(request.clone()).await?;
                let store = self.store.clone();
                let filename = image.filename.clone();
                tokio::task::spawn_blocking(move || store.put(&image))
                    .await
                    .map_err(|e| Error::StorageError(format!("write task failed: {}", e)))??;

                let base = match (&self.public_base, host) {
                    (Some(base), _) => base.trim_end_matches('/').to_string(),
                    (None, Some(host)) => format!("http://{}", host),
                    (None, None) => String::new(),
                };
                Ok(Reply::json(
                    200,
                    &Rendered {
                        username: &request.display_name,
                        message: &request.message,
                        image: format!("{}/images/{}", base, filename),
                    },
                ))
            }
            Route::Image(name) => {
                let store = self.store.clone();
                let found = tokio::task::spawn_blocking(move || store.open(&name))
                    .await
                    .map_err(|e| Error::StorageError(format!("read task failed: {}", e)))??;
                Ok(match found {
                    Some(bytes) => Reply::png(bytes),
                    None => Reply::error(404, "not found"),
                })
            }
            Route::NotFound => Ok(Reply::error(404, "not found")),
        }
    }
}

async fn handle(state: Arc<AppState>, request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();
    let host = request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Host"))
        .map(|h| h.value.as_str().to_string());

    let reply = if method != Method::Get {
        Reply::error(405, "method not allowed")
    } else {
        match state.dispatch(&url, host).await {
            Ok(reply) => reply,
            Err(e) => Reply::from_error(&e),
        }
    };
    info!("{} {} -> {}", method, url.split('?').next().unwrap_or(""), reply.status);

    let mut response = Response::from_data(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], reply.content_type.as_bytes()) {
        response.add_header(header);
    }
    let sent = tokio::task::spawn_blocking(move || request.respond(response)).await;
    if let Ok(Err(e)) = sent {
        debug!("Client went away before the response was written: {}", e);
    }
}

/// A bound HTTP listener
pub struct Server {
    http: Arc<tiny_http::Server>,
    state: Arc<AppState>,
}

impl Server {
    /// Bind `config.bind` and prepare the output directory.
    pub fn bind(config: &ServerConfig, renderer: AsyncRenderer) -> Result<Self> {
        let store = Arc::new(DirectoryStore::new(&config.output_dir)?);
        let http = tiny_http::Server::http(config.bind.as_str())
            .map_err(|e| Error::ConfigError(format!("Failed to bind {}: {}", config.bind, e)))?;
        Ok(Self {
            http: Arc::new(http),
            state: Arc::new(AppState { renderer, store, public_base: config.public_base.clone() }),
        })
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.http.server_addr().to_ip()
    }

    pub fn store(&self) -> &Arc<DirectoryStore> {
        &self.state.store
    }

    /// Accept requests until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let unblocker = self.http.clone();
        tokio::spawn(async move {
            shutdown.await;
            unblocker.unblock();
        });

        loop {
            let http = self.http.clone();
            let request = match tokio::task::spawn_blocking(move || http.recv()).await {
                Ok(Ok(request)) => request,
                Ok(Err(e)) => {
                    debug!("Listener stopped: {}", e);
                    break;
                }
                Err(e) => return Err(Error::Other(format!("Accept task failed: {}", e))),
            };
            tokio::spawn(handle(self.state.clone(), request));
        }
        Ok(())
    }
}

/// Run the service until Ctrl-C.
pub async fn serve(config: ServerConfig, mockup: MockupConfig) -> Result<()> {
    config.validate()?;
    match &mockup.assets.base_dir {
        Some(dir) => info!("Avatar paths are resolved in {}", dir.display()),
        None => info!("No asset directory; avatars load from URLs and data URIs only"),
    }
    let renderer = AsyncRenderer::new(mockup, config.workers).await?;
    let workers = renderer.workers();
    let server = Server::bind(&config, renderer)?;
    info!("Writing images to {} with {} render workers", server.store().root().display(), workers);
    let housekeeping = spawn_housekeeping(server.store().clone(), config.sweep_interval, config.max_age);

    match server.local_addr() {
        Some(addr) => info!("Server running on http://{}", addr),
        None => info!("Server running on {}", config.bind),
    }
    let result = server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
        })
        .await;

    housekeeping.shutdown().await;
    result
}
