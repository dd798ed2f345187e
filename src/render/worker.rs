//! Tile render worker - runs in a dedicated thread

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use flume::{Receiver, Sender};
use log::{debug, trace, warn};

use crate::error::PageError;
use crate::tiles::{PixelBuffer, PixelFormat, Tile};

use super::document::OpenedDocument;
use super::request::{RenderResponse, TileRequest};

/// Largest tile buffer the worker will allocate, in pixels
pub const DEFAULT_MAX_TILE_PIXELS: u64 = 16 * 1024 * 1024;

enum WorkerMessage {
    Render(TileRequest),
    Shutdown,
}

/// Flags shared between the worker thread and its handle
#[derive(Clone)]
struct WorkerState {
    /// Held by the worker from the final check until the result is sent
    running: Arc<Mutex<bool>>,
    current_pass: Arc<AtomicU64>,
}

impl WorkerState {
    fn running(&self) -> MutexGuard<'_, bool> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        *self.running()
    }

    fn set_running(&self, running: bool) {
        *self.running() = running;
    }

    fn is_stale(&self, request: &TileRequest) -> bool {
        !request.thumbnail && request.pass < self.current_pass.load(Ordering::Acquire)
    }
}

/// Serial render queue for one opened document
pub struct RenderWorker {
    request_tx: Sender<WorkerMessage>,
    state: WorkerState,
    handle: Option<JoinHandle<()>>,
}

impl RenderWorker {
    /// Spawn the worker thread. Results go to `responses`.
    pub fn spawn(
        document: Arc<OpenedDocument>,
        responses: Sender<RenderResponse>,
        max_tile_pixels: u64,
    ) -> std::io::Result<Self> {
        let (request_tx, request_rx) = flume::unbounded();
        let state = WorkerState {
            running: Arc::new(Mutex::new(true)),
            current_pass: Arc::new(AtomicU64::new(0)),
        };

        let thread_state = state.clone();
        let handle = std::thread::Builder::new()
            .name("tile-render".to_string())
            .spawn(move || {
                render_worker(
                    &document,
                    request_rx,
                    responses,
                    &thread_state,
                    max_tile_pixels,
                );
            })?;

        Ok(Self {
            request_tx,
            state,
            handle: Some(handle),
        })
    }

    /// Queue a request. Returns false when the worker has exited.
    pub fn submit(&self, request: TileRequest) -> bool {
        self.request_tx.send(WorkerMessage::Render(request)).is_ok()
    }

    /// Mark `pass` as current; queued page tiles from older passes are skipped
    pub fn begin_pass(&self, pass: u64) {
        self.state.current_pass.store(pass, Ordering::Release);
    }

    /// Stop delivering results. The tile being rendered is finished and
    /// dropped; once this returns nothing more reaches the response channel.
    pub fn stop(&self) {
        self.state.set_running(false);
    }

    pub fn start(&self) {
        self.state.set_running(true);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Stop, drain the queue and join the thread
    pub fn shutdown(&mut self) {
        self.stop();
        let _ = self.request_tx.send(WorkerMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Render worker panicked");
            }
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
fn render_worker(
    document: &OpenedDocument,
    requests: Receiver<WorkerMessage>,
    responses: Sender<RenderResponse>,
    state: &WorkerState,
    max_tile_pixels: u64,
) {
    for message in requests {
        match message {
            WorkerMessage::Render(request) => {
                handle_tile_request(document, &request, state, &responses, max_tile_pixels);
            }
            WorkerMessage::Shutdown => break,
        }
    }
    debug!("Render worker exiting");
}

fn handle_tile_request(
    document: &OpenedDocument,
    request: &TileRequest,
    state: &WorkerState,
    responses: &Sender<RenderResponse>,
    max_tile_pixels: u64,
) {
    if !state.is_running() {
        trace!("Worker stopped, skipping tile {:?}", request.id);
        return;
    }
    if state.is_stale(request) {
        trace!(
            "Skipping tile {:?} from pass {} (page {})",
            request.id, request.pass, request.page
        );
        return;
    }

    let response = match render_tile(document, request, max_tile_pixels) {
        Ok(Some(tile)) => RenderResponse::Tile(tile),
        Ok(None) => return,
        Err(error) => RenderResponse::PageError {
            id: request.id,
            error,
        },
    };

    // Held across the send so a stop cannot slip in between
    let running = state.running();
    if !*running {
        debug!("Worker stopped during tile {:?}, dropping result", request.id);
        return;
    }
    let _ = responses.send(response);
}

/// Rasterize one request. `Ok(None)` means the buffer could not be
/// allocated and the tile was skipped.
pub fn render_tile(
    document: &OpenedDocument,
    request: &TileRequest,
    max_tile_pixels: u64,
) -> Result<Option<Tile>, PageError> {
    document.open_page(request.page)?;

    let (width, height) = request.buffer_size();
    let format = if request.best_quality {
        PixelFormat::Rgba8888
    } else {
        PixelFormat::Rgb565
    };
    let mut buffer = match PixelBuffer::try_new(width, height, format, max_tile_pixels) {
        Ok(buffer) => buffer,
        Err(e) => {
            debug!("Skipping tile on page {}: {e}", request.page);
            return Ok(None);
        }
    };

    document
        .render_region(
            request.page,
            &mut buffer,
            request.render_rect(),
            request.annotations,
        )
        .map_err(|e| PageError::new(request.page, e.to_string()))?;

    Ok(Some(Tile {
        page: request.page,
        bounds: request.bounds,
        thumbnail: request.thumbnail,
        load_order: request.load_order,
        pass: request.pass,
        pixels: Arc::new(buffer),
    }))
}
