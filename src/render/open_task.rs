//! Background document open

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use flume::Sender;
use log::{debug, info};

use crate::error::OpenError;
use crate::layout::{DocumentLayout, LayoutOptions, PageSize};

use super::backend::{DocumentSource, Rasterizer};
use super::document::OpenedDocument;

/// Everything needed to open and lay out a document
#[derive(Clone, Debug)]
pub struct OpenRequest {
    pub source: DocumentSource,
    pub password: Option<String>,
    /// Document pages to show, in order
    pub user_pages: Option<Vec<usize>>,
    pub layout: LayoutOptions,
    /// Viewport size used for the initial layout
    pub view: PageSize,
}

/// Successful open: the document plus its computed layout
pub struct LoadedDocument {
    pub document: Arc<OpenedDocument>,
    pub layout: DocumentLayout,
}

impl std::fmt::Debug for LoadedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedDocument")
            .field("page_count", &self.document.page_count())
            .finish_non_exhaustive()
    }
}

pub type OpenReport = Result<LoadedDocument, OpenError>;

/// Open a document and compute its layout on the calling thread
pub fn open_document(rasterizer: &dyn Rasterizer, request: &OpenRequest) -> OpenReport {
    debug!("Opening document {}", request.source.describe());
    let handle = rasterizer.open_document(&request.source, request.password.as_deref())?;
    let document = OpenedDocument::new(handle, request.user_pages.clone());

    let sizes = document.natural_page_sizes();
    let layout = DocumentLayout::new(sizes, request.layout, request.view);
    info!(
        "Opened document {} with {} pages",
        request.source.describe(),
        document.page_count()
    );

    Ok(LoadedDocument {
        document: Arc::new(document),
        layout,
    })
}

/// Opens a document on a background thread and reports exactly once,
/// unless cancelled first.
pub struct DocumentOpenTask {
    cancelled: Arc<Mutex<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl DocumentOpenTask {
    pub fn spawn(
        rasterizer: Arc<dyn Rasterizer>,
        request: OpenRequest,
        reply: Sender<OpenReport>,
    ) -> std::io::Result<Self> {
        let cancelled = Arc::new(Mutex::new(false));

        let thread_cancelled = Arc::clone(&cancelled);
        let handle = std::thread::Builder::new()
            .name("document-open".to_string())
            .spawn(move || {
                let report = open_document(rasterizer.as_ref(), &request);

                // Held across the send so a cancel cannot interleave
                let cancelled = thread_cancelled
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if *cancelled {
                    debug!("Open of {} cancelled, discarding result", request.source.describe());
                } else {
                    let _ = reply.send(report);
                }
            })?;

        Ok(Self {
            cancelled,
            handle: Some(handle),
        })
    }

    /// Suppress the report. Once this returns nothing more is sent.
    pub fn cancel(&self) {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the background thread exits
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::synthetic::SyntheticRasterizer;
    use std::time::Duration;

    fn request(password: Option<&str>) -> OpenRequest {
        OpenRequest {
            source: DocumentSource::Bytes(Vec::new().into()),
            password: password.map(str::to_string),
            user_pages: None,
            layout: LayoutOptions::default(),
            view: PageSize::new(600.0, 800.0),
        }
    }

    #[test]
    fn open_task_reports_layout() {
        let rasterizer = Arc::new(SyntheticRasterizer::new(vec![PageSize::new(300.0, 400.0); 3]));
        let (tx, rx) = flume::unbounded();
        let task = DocumentOpenTask::spawn(rasterizer, request(None), tx).expect("spawn");

        let loaded = rx
            .recv_timeout(Duration::from_secs(5))
            .expect("report")
            .expect("opened");
        assert_eq!(loaded.document.page_count(), 3);
        assert_eq!(loaded.layout.page_size(0), PageSize::new(600.0, 800.0));

        task.join();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn open_task_reports_wrong_password() {
        let rasterizer = Arc::new(
            SyntheticRasterizer::new(vec![PageSize::new(300.0, 400.0)]).with_password("secret"),
        );
        let (tx, rx) = flume::unbounded();
        let task = DocumentOpenTask::spawn(rasterizer, request(Some("nope")), tx).expect("spawn");
        task.join();

        let report = rx.try_recv().expect("report");
        assert!(matches!(report, Err(OpenError::WrongPassword)));
    }

    #[test]
    fn open_document_accepts_correct_password() {
        let rasterizer =
            SyntheticRasterizer::new(vec![PageSize::new(300.0, 400.0)]).with_password("secret");
        assert!(open_document(&rasterizer, &request(Some("secret"))).is_ok());
        assert!(matches!(
            open_document(&rasterizer, &request(None)),
            Err(OpenError::WrongPassword)
        ));
    }
}
