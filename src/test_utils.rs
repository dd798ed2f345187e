//! Scripted rasterizer for driving the pipeline in tests

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use flume::{Receiver, Sender};

use crate::error::{OpenError, RasterFault};
use crate::layout::PageSize;
use crate::render::{
    Bookmark, DocumentMeta, DocumentSource, PageLink, PixelRect, RasterDocument, Rasterizer,
};
use crate::tiles::PixelBuffer;

/// Calls made into a [`ScriptedRasterizer`], shared with every document it opens
#[derive(Debug, Default)]
pub struct CallCounters {
    pub open_document: AtomicUsize,
    pub open_page: AtomicUsize,
    pub render_region: AtomicUsize,
    pub close_page: AtomicUsize,
}

impl CallCounters {
    #[must_use]
    pub fn open_page(&self) -> usize {
        self.open_page.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn render_region(&self) -> usize {
        self.render_region.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn open_document(&self) -> usize {
        self.open_document.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn close_page(&self) -> usize {
        self.close_page.load(Ordering::SeqCst)
    }
}

/// Blocks renders (or opens) until released, announcing each blocked call
pub struct Gate {
    entered_tx: Sender<usize>,
    entered_rx: Receiver<usize>,
    release_tx: Sender<()>,
    release_rx: Receiver<()>,
}

impl Gate {
    fn new() -> Self {
        let (entered_tx, entered_rx) = flume::unbounded();
        let (release_tx, release_rx) = flume::unbounded();
        Self {
            entered_tx,
            entered_rx,
            release_tx,
            release_rx,
        }
    }

    /// Wait until a call reaches the gate; returns its page
    pub fn wait_entered(&self, timeout: std::time::Duration) -> Option<usize> {
        self.entered_rx.recv_timeout(timeout).ok()
    }

    /// Let one blocked call continue
    pub fn release(&self) {
        let _ = self.release_tx.send(());
    }

    fn pass(&self, page: usize) {
        let _ = self.entered_tx.send(page);
        let _ = self.release_rx.recv();
    }
}

#[derive(Default)]
struct Script {
    failing_pages: HashSet<usize>,
    open_error: Option<OpenError>,
    password: Option<String>,
    render_gate: Option<Arc<Gate>>,
    open_gate: Option<Arc<Gate>>,
}

/// Rasterizer whose behaviour is set up by the test: failing pages, a
/// failing open, a password and gates to hold calls in flight.
#[derive(Clone)]
pub struct ScriptedRasterizer {
    pages: Vec<PageSize>,
    script: Arc<Mutex<Script>>,
    counters: Arc<CallCounters>,
}

impl ScriptedRasterizer {
    #[must_use]
    pub fn new(pages: Vec<PageSize>) -> Self {
        Self {
            pages,
            script: Arc::new(Mutex::new(Script::default())),
            counters: Arc::new(CallCounters::default()),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn counters(&self) -> Arc<CallCounters> {
        Arc::clone(&self.counters)
    }

    /// Make `page` fail to open
    #[must_use]
    pub fn failing_page(self, page: usize) -> Self {
        self.script().failing_pages.insert(page);
        self
    }

    #[must_use]
    pub fn failing_open(self, error: OpenError) -> Self {
        self.script().open_error = Some(error);
        self
    }

    #[must_use]
    pub fn with_password(self, password: &str) -> Self {
        self.script().password = Some(password.to_string());
        self
    }

    /// Hold every render until the returned gate releases it
    #[must_use]
    pub fn gate_renders(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::new());
        self.script().render_gate = Some(Arc::clone(&gate));
        gate
    }

    /// Hold `open_document` until the returned gate releases it
    #[must_use]
    pub fn gate_open(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::new());
        self.script().open_gate = Some(Arc::clone(&gate));
        gate
    }
}

impl Rasterizer for ScriptedRasterizer {
    fn open_document(
        &self,
        _source: &DocumentSource,
        password: Option<&str>,
    ) -> Result<Box<dyn RasterDocument>, OpenError> {
        self.counters.open_document.fetch_add(1, Ordering::SeqCst);

        let gate = self.script().open_gate.clone();
        if let Some(gate) = gate {
            gate.pass(0);
        }

        let script = self.script();
        if let Some(error) = &script.open_error {
            return Err(error.clone());
        }
        if let Some(expected) = &script.password {
            if password != Some(expected.as_str()) {
                return Err(OpenError::WrongPassword);
            }
        }

        Ok(Box::new(ScriptedDocument {
            pages: self.pages.clone(),
            script: Arc::clone(&self.script),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct ScriptedDocument {
    pages: Vec<PageSize>,
    script: Arc<Mutex<Script>>,
    counters: Arc<CallCounters>,
}

impl RasterDocument for ScriptedDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn natural_page_size(&mut self, page: usize) -> Result<PageSize, RasterFault> {
        self.pages
            .get(page)
            .copied()
            .ok_or_else(|| RasterFault::generic(format!("no page {page}")))
    }

    fn open_page(&mut self, page: usize) -> Result<(), RasterFault> {
        self.counters.open_page.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failing_pages
            .contains(&page);
        if failing {
            return Err(RasterFault::generic(format!("cannot decode page {page}")));
        }
        Ok(())
    }

    fn render_region(
        &mut self,
        page: usize,
        target: &mut PixelBuffer,
        _rect: PixelRect,
        _annotations: bool,
    ) -> Result<(), RasterFault> {
        self.counters.render_region.fetch_add(1, Ordering::SeqCst);
        let gate = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .render_gate
            .clone();
        if let Some(gate) = gate {
            gate.pass(page);
        }
        target.put_rgb(0, 0, [0, 0, 0]);
        Ok(())
    }

    fn metadata(&mut self) -> DocumentMeta {
        DocumentMeta {
            title: Some("Scripted".to_string()),
            ..DocumentMeta::default()
        }
    }

    fn bookmarks(&mut self) -> Vec<Bookmark> {
        Vec::new()
    }

    fn links(&mut self, _page: usize) -> Vec<PageLink> {
        Vec::new()
    }

    fn close_page(&mut self, _page: usize) {
        self.counters.close_page.fetch_add(1, Ordering::SeqCst);
    }
}
