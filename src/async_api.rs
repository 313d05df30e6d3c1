use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use log::debug;
use tokio::sync::oneshot;

use crate::{Error, FontBook, MockupConfig, RenderRequest, RenderedImage, Renderer, Result};

enum Command {
    Render(RenderRequest, oneshot::Sender<Result<RenderedImage>>),
    Close(oneshot::Sender<()>),
}

/// An async-friendly renderer backed by a pool of dedicated worker threads.
///
/// Each worker owns a synchronous [`Renderer`] (and with it a blocking HTTP
/// client for avatars) and pulls requests from a shared queue, so a slow
/// avatar fetch only ever occupies its own worker.
#[derive(Clone)]
pub struct AsyncRenderer {
    cmd_tx: Sender<Command>,
    workers: usize,
}

impl AsyncRenderer {
    /// Load fonts once and start `workers` render threads.
    pub async fn new(config: MockupConfig, workers: usize) -> Result<Self> {
        let font_config = config.fonts.clone();
        let fonts = tokio::task::spawn_blocking(move || FontBook::load(&font_config))
            .await
            .map_err(|e| Error::Other(format!("Font loading panicked: {}", e)))?;
        let fonts = Arc::new(fonts);
        Self::with_factory(workers, move || Renderer::from_parts(config.clone(), fonts.clone())).await
    }

    /// Start `workers` threads, each building its renderer with `factory`.
    pub async fn with_factory<F>(workers: usize, factory: F) -> Result<Self>
    where
        F: Fn() -> Result<Renderer> + Send + Sync + 'static,
    {
        let workers = workers.max(1);
        let factory = Arc::new(factory);
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let cmd_rx = Arc::new(Mutex::new(cmd_rx));

        let mut inits = Vec::with_capacity(workers);
        for id in 0..workers {
            let (init_tx, init_rx) = oneshot::channel::<Result<()>>();
            let factory = factory.clone();
            let queue = cmd_rx.clone();
            thread::Builder::new()
                .name(format!("fakechat-render-{}", id))
                .spawn(move || {
                    // Renderer (and its blocking client) must be built off the runtime
                    let renderer = match factory() {
                        Ok(r) => r,
                        Err(err) => {
                            let _ = init_tx.send(Err(err));
                            return;
                        }
                    };
                    let _ = init_tx.send(Ok(()));
                    worker_loop(id, &renderer, &queue);
                })
                .map_err(|e| Error::Other(format!("Failed to spawn render worker: {}", e)))?;
            inits.push(init_rx);
        }

        // Wait for every worker to report initialization success or failure
        for init_rx in inits {
            init_rx
                .await
                .map_err(|e| Error::Other(format!("Worker init canceled: {}", e)))??;
        }
        debug!("Started {} render workers", workers);

        Ok(Self { cmd_tx, workers })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Render on the pool
    pub async fn render(&self, request: RenderRequest) -> Result<RenderedImage> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Render(request, tx))
            .map_err(|_| Error::Other("Render pool is shut down".into()))?;
        rx.await
            .map_err(|e| Error::Other(format!("Render canceled: {}", e)))?
    }

    /// Stop every worker once it finishes its current request.
    pub async fn close(self) -> Result<()> {
        let mut acks = Vec::with_capacity(self.workers);
        for _ in 0..self.workers {
            let (tx, rx) = oneshot::channel();
            if self.cmd_tx.send(Command::Close(tx)).is_err() {
                break;
            }
            acks.push(rx);
        }
        for ack in acks {
            ack.await
                .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?;
        }
        Ok(())
    }
}

fn worker_loop(id: usize, renderer: &Renderer, queue: &Mutex<Receiver<Command>>) {
    loop {
        // hold the lock only while waiting for the next command
        let cmd = match queue.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };
        match cmd {
            Ok(Command::Render(request, resp)) => {
                let res = renderer.render(&request);
                let _ = resp.send(res);
            }
            Ok(Command::Close(resp)) => {
                let _ = resp.send(());
                break;
            }
            Err(_) => break,
        }
    }
    debug!("Render worker {} stopped", id);
}
