//! Consumer facade tying the layout, planner, cache and render worker together

mod events;
mod placement;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use flume::Receiver;
use log::{debug, info, warn};

use crate::error::{OpenError, ViewerError};
use crate::layout::{DocumentLayout, LayoutOptions, Navigator, PageSize, SnapEdge};
use crate::render::{
    Bookmark, DEFAULT_MAX_TILE_PIXELS, DocumentMeta, DocumentOpenTask, DocumentSource,
    LoadedDocument, OpenReport, OpenRequest, OpenedDocument, PageLink, PageRect, Rasterizer,
    RenderResponse, RenderWorker,
};
use crate::tiles::{
    DEFAULT_CACHE_SIZE, DEFAULT_THUMBNAIL_CACHE_SIZE, PlannerConfig, Tile, TileCache, Viewport,
    ViewportPlanner,
};

pub use events::{ViewerEvent, ViewerState};
pub use placement::{PageGeometry, PlacedTile, place_tile};

pub const DEFAULT_MIN_ZOOM: f32 = 1.0;
pub const DEFAULT_MID_ZOOM: f32 = 1.75;
pub const DEFAULT_MAX_ZOOM: f32 = 3.0;

/// Everything a viewer needs besides the rasterizer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewerOptions {
    pub layout: LayoutOptions,
    pub planner: PlannerConfig,
    pub cache_capacity: usize,
    pub thumbnail_capacity: usize,
    /// Page shown once the document has loaded
    pub default_page: usize,
    pub min_zoom: f32,
    pub mid_zoom: f32,
    pub max_zoom: f32,
    /// Settle on a page edge when scrolling ends
    pub page_snap: bool,
    pub max_tile_pixels: u64,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            planner: PlannerConfig::default(),
            cache_capacity: DEFAULT_CACHE_SIZE,
            thumbnail_capacity: DEFAULT_THUMBNAIL_CACHE_SIZE,
            default_page: 0,
            min_zoom: DEFAULT_MIN_ZOOM,
            mid_zoom: DEFAULT_MID_ZOOM,
            max_zoom: DEFAULT_MAX_ZOOM,
            page_snap: false,
            max_tile_pixels: DEFAULT_MAX_TILE_PIXELS,
        }
    }
}

struct Session {
    document: Arc<OpenedDocument>,
    layout: DocumentLayout,
    worker: RenderWorker,
    responses: Receiver<RenderResponse>,
}

/// Drives tile rendering for one document at a time.
///
/// All methods run on the consumer thread; rendering happens on the worker
/// and results arrive through [`TileViewer::poll_events`].
pub struct TileViewer {
    rasterizer: Arc<dyn Rasterizer>,
    options: ViewerOptions,
    state: ViewerState,
    open_task: Option<DocumentOpenTask>,
    open_rx: Option<Receiver<OpenReport>>,
    session: Option<Session>,
    cache: TileCache,
    planner: ViewportPlanner,
    viewport: Viewport,
    current_page: Option<usize>,
    pending: VecDeque<ViewerEvent>,
}

impl TileViewer {
    #[must_use]
    pub fn new(rasterizer: Arc<dyn Rasterizer>, options: ViewerOptions) -> Self {
        Self {
            rasterizer,
            options,
            state: ViewerState::Recycled,
            open_task: None,
            open_rx: None,
            session: None,
            cache: TileCache::new(options.cache_capacity, options.thumbnail_capacity),
            planner: ViewportPlanner::new(options.planner),
            viewport: Viewport::new(0.0, 0.0, 0.0, 0.0, options.min_zoom),
            current_page: None,
            pending: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    #[must_use]
    pub fn state(&self) -> ViewerState {
        self.state
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn zoom(&self) -> f32 {
        self.viewport.zoom
    }

    /// Page under the viewport, once known
    #[must_use]
    pub fn current_page(&self) -> Option<usize> {
        self.current_page
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.layout.page_count())
    }

    #[must_use]
    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    #[must_use]
    pub fn layout(&self) -> Option<&DocumentLayout> {
        self.session.as_ref().map(|session| &session.layout)
    }

    fn view_size(&self) -> PageSize {
        PageSize::new(self.viewport.width, self.viewport.height)
    }

    /// Set the viewport size used for the initial layout
    pub fn set_view_size(&mut self, width: f32, height: f32) {
        if self.session.is_some() {
            let viewport = Viewport {
                width,
                height,
                ..self.viewport
            };
            self.on_viewport_changed(viewport);
        } else {
            self.viewport.width = width;
            self.viewport.height = height;
        }
    }

    /// Start opening a document in the background. The outcome arrives as
    /// [`ViewerEvent::LoadComplete`] or [`ViewerEvent::LoadError`].
    pub fn open(
        &mut self,
        source: DocumentSource,
        password: Option<&str>,
        user_pages: Option<Vec<usize>>,
    ) -> Result<(), ViewerError> {
        if self.state != ViewerState::Recycled {
            return Err(ViewerError::NotRecycled);
        }

        let request = OpenRequest {
            source,
            password: password.map(str::to_string),
            user_pages,
            layout: self.options.layout,
            view: self.view_size(),
        };
        let (reply_tx, reply_rx) = flume::bounded(1);
        self.state = ViewerState::Loading;

        match DocumentOpenTask::spawn(Arc::clone(&self.rasterizer), request, reply_tx) {
            Ok(task) => {
                self.open_task = Some(task);
                self.open_rx = Some(reply_rx);
            }
            Err(e) => {
                warn!("Failed to spawn document open task: {e}");
                self.fail_load(OpenError::from(e));
            }
        }
        Ok(())
    }

    fn fail_load(&mut self, error: OpenError) {
        warn!("Document failed to load: {error}");
        self.state = ViewerState::Error;
        self.pending.push_back(ViewerEvent::LoadError(error));
    }

    /// Tear everything down so another document can be opened
    pub fn recycle(&mut self) {
        if let Some(task) = self.open_task.take() {
            task.cancel();
        }
        self.open_rx = None;

        if let Some(mut session) = self.session.take() {
            session.worker.stop();
            session.worker.shutdown();
        }

        self.cache.clear();
        self.planner = ViewportPlanner::new(self.options.planner);
        self.viewport = Viewport::new(
            0.0,
            0.0,
            self.viewport.width,
            self.viewport.height,
            self.options.min_zoom,
        );
        self.current_page = None;
        self.pending.clear();
        self.state = ViewerState::Recycled;
        debug!("Viewer recycled");
    }

    /// Drain events produced since the last call without blocking
    pub fn poll_events(&mut self) -> Vec<ViewerEvent> {
        let report = self.open_rx.as_ref().and_then(|rx| rx.try_recv().ok());
        if let Some(report) = report {
            self.handle_open_report(report);
        }

        loop {
            let response = self
                .session
                .as_ref()
                .and_then(|session| session.responses.try_recv().ok());
            let Some(response) = response else {
                break;
            };
            self.handle_render_response(response);
        }

        self.pending.drain(..).collect()
    }

    /// Like [`Self::poll_events`] but blocks up to `timeout` for the first event
    pub fn wait_events(&mut self, timeout: Duration) -> Vec<ViewerEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let events = self.poll_events();
            if !events.is_empty() {
                return events;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return events;
            }

            if let Some(rx) = self.open_rx.as_ref() {
                match rx.recv_timeout(remaining) {
                    Ok(report) => self.handle_open_report(report),
                    Err(_) => return self.poll_events(),
                }
            } else if let Some(session) = self.session.as_ref() {
                match session.responses.recv_timeout(remaining) {
                    Ok(response) => self.handle_render_response(response),
                    Err(_) => return self.poll_events(),
                }
            } else {
                return events;
            }
        }
    }

    fn handle_open_report(&mut self, report: OpenReport) {
        self.open_task = None;
        self.open_rx = None;

        if self.state != ViewerState::Loading {
            debug!("Ignoring open report in state {:?}", self.state);
            return;
        }

        match report {
            Ok(loaded) => self.load_complete(loaded),
            Err(error) => self.fail_load(error),
        }
    }

    fn load_complete(&mut self, loaded: LoadedDocument) {
        let LoadedDocument {
            document,
            mut layout,
        } = loaded;

        let (response_tx, response_rx) = flume::unbounded();
        let worker = match RenderWorker::spawn(
            Arc::clone(&document),
            response_tx,
            self.options.max_tile_pixels,
        ) {
            Ok(worker) => worker,
            Err(e) => {
                self.fail_load(OpenError::from(e));
                return;
            }
        };

        // The view may have been resized while the open task ran
        if layout.view_size() != self.view_size() {
            layout.recalculate(self.view_size());
        }

        let page_count = layout.page_count();
        self.session = Some(Session {
            document,
            layout,
            worker,
            responses: response_rx,
        });
        self.state = ViewerState::Loaded;
        info!("Document loaded with {page_count} pages");
        self.pending
            .push_back(ViewerEvent::LoadComplete { page_count });

        self.jump_to(self.options.default_page);
    }

    fn handle_render_response(&mut self, response: RenderResponse) {
        match response {
            RenderResponse::Tile(tile) => self.tile_rendered(tile),
            RenderResponse::PageError { id, error } => {
                debug!("Request {id:?} failed: {error}");
                self.pending.push_back(ViewerEvent::PageRenderError {
                    page: error.page,
                    error,
                });
            }
        }
    }

    fn tile_rendered(&mut self, tile: Tile) {
        if !self.state.has_document() {
            return;
        }

        if tile.thumbnail {
            if self.cache.contains_thumbnail(tile.page, &tile.bounds) {
                return;
            }
            self.cache.insert_thumbnail(tile.clone());
        } else {
            if tile.pass != self.planner.current_pass() {
                debug!(
                    "Dropping tile for page {} from pass {} (current {})",
                    tile.page,
                    tile.pass,
                    self.planner.current_pass()
                );
                return;
            }
            self.cache.insert(tile.clone());
        }

        if self.state == ViewerState::Loaded {
            self.state = ViewerState::Shown;
            self.pending.push_back(ViewerEvent::FirstContentRendered {
                page_count: self.page_count(),
            });
        }
        self.pending.push_back(ViewerEvent::TileRendered(tile));
    }

    fn navigator(&self) -> Option<Navigator<'_>> {
        self.session
            .as_ref()
            .map(|session| Navigator::new(&session.layout, self.viewport.zoom, self.view_size()))
    }

    /// React to a scroll, zoom or resize. Offsets are clamped to the
    /// document and a planner pass runs.
    pub fn on_viewport_changed(&mut self, viewport: Viewport) {
        let resized = viewport.width != self.viewport.width || viewport.height != self.viewport.height;
        let zoom = self.clamp_zoom(viewport.zoom);
        let mut target = Viewport { zoom, ..viewport };

        if resized {
            if let Some(session) = self.session.as_mut() {
                session.layout.recalculate(PageSize::new(target.width, target.height));

                // Keep the current page at the start of the view
                let page = self.current_page.unwrap_or(0);
                let anchored = session.layout.page_offset(page, zoom);
                if session.layout.axis().is_vertical() {
                    target.scroll_y = anchored;
                } else {
                    target.scroll_x = anchored;
                }
            }
        }

        self.viewport = Viewport {
            width: target.width,
            height: target.height,
            zoom,
            ..self.viewport
        };
        self.move_to(target.scroll_x, target.scroll_y);
    }

    /// Scroll to an absolute offset, clamped to the document
    pub fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = match self.navigator() {
            Some(navigator) => navigator.clamp_scroll(x, y),
            None => (x, y),
        };
        self.viewport.scroll_x = x;
        self.viewport.scroll_y = y;
        self.load_pages();
        self.update_current_page();
    }

    /// Bring `page` to the start of the viewport
    pub fn jump_to(&mut self, page: usize) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let layout = &session.layout;
        let page = layout.valid_page(i64::try_from(page).unwrap_or(i64::MAX));
        let offset = Navigator::new(layout, self.viewport.zoom, self.view_size()).jump_offset(page);
        self.set_primary_scroll(offset);
    }

    /// Zoom to `zoom` keeping the point `pivot` (viewport pixels) in place
    pub fn zoom_centered_to(&mut self, zoom: f32, pivot: (f32, f32)) {
        let zoom = self.clamp_zoom(zoom);
        let ratio = zoom / self.viewport.zoom;
        let x = (self.viewport.scroll_x + pivot.0) * ratio - pivot.0;
        let y = (self.viewport.scroll_y + pivot.1) * ratio - pivot.1;
        self.viewport.zoom = zoom;
        self.move_to(x, y);
    }

    /// Next zoom level in the min, mid, max cycle
    #[must_use]
    pub fn next_zoom_level(&self) -> f32 {
        let zoom = self.viewport.zoom;
        if zoom < self.options.mid_zoom {
            self.options.mid_zoom
        } else if zoom < self.options.max_zoom {
            self.options.max_zoom
        } else {
            self.options.min_zoom
        }
    }

    fn clamp_zoom(&self, zoom: f32) -> f32 {
        if !zoom.is_finite() || zoom <= 0.0 {
            return self.options.min_zoom;
        }
        zoom.clamp(self.options.min_zoom, self.options.max_zoom.max(self.options.min_zoom))
    }

    fn primary_scroll(&self) -> f32 {
        let axis = self
            .session
            .as_ref()
            .map(|session| session.layout.axis())
            .unwrap_or_default();
        self.viewport.scroll_along(axis).0
    }

    fn set_primary_scroll(&mut self, offset: f32) {
        let vertical = self
            .session
            .as_ref()
            .is_none_or(|session| session.layout.axis().is_vertical());
        if vertical {
            self.move_to(self.viewport.scroll_x, offset);
        } else {
            self.move_to(offset, self.viewport.scroll_y);
        }
    }

    /// Scroll progress in `0.0..=1.0`
    #[must_use]
    pub fn position_offset(&self) -> f32 {
        self.navigator()
            .map_or(0.0, |navigator| navigator.position_offset(self.primary_scroll()))
    }

    pub fn set_position_offset(&mut self, progress: f32) {
        let Some(offset) = self
            .navigator()
            .map(|navigator| navigator.scroll_for_position(progress))
        else {
            return;
        };
        self.set_primary_scroll(offset);
    }

    #[must_use]
    pub fn page_at_position_offset(&self, progress: f32) -> usize {
        self.navigator()
            .map_or(0, |navigator| navigator.page_at_position_offset(progress))
    }

    #[must_use]
    pub fn find_focus_page(&self) -> usize {
        self.navigator()
            .map_or(0, |navigator| navigator.focus_page(self.primary_scroll()))
    }

    #[must_use]
    pub fn find_snap_edge(&self, page: usize) -> SnapEdge {
        self.navigator().map_or(SnapEdge::None, |navigator| {
            navigator.find_snap_edge(self.primary_scroll(), page)
        })
    }

    #[must_use]
    pub fn snap_offset_for_page(&self, page: usize, edge: SnapEdge) -> f32 {
        self.navigator()
            .map_or(0.0, |navigator| navigator.snap_offset_for_page(page, edge))
    }

    #[must_use]
    pub fn page_fills_screen(&self) -> bool {
        let page = self.find_focus_page();
        self.navigator().is_some_and(|navigator| {
            navigator.page_fills_screen(self.primary_scroll(), page)
        })
    }

    /// Align the focus page with the viewport when snapping is enabled
    pub fn on_scroll_end(&mut self) {
        if !self.options.page_snap || self.page_count() == 0 {
            return;
        }
        let page = self.find_focus_page();
        let edge = self.find_snap_edge(page);
        if edge == SnapEdge::None {
            return;
        }
        let offset = self.snap_offset_for_page(page, edge);
        self.set_primary_scroll(offset);
    }

    fn update_current_page(&mut self) {
        let Some(navigator) = self.navigator() else {
            return;
        };
        let page_count = self.page_count();
        if page_count == 0 {
            return;
        }
        let page = navigator.focus_page(self.primary_scroll());
        if self.current_page != Some(page) {
            self.current_page = Some(page);
            self.pending
                .push_back(ViewerEvent::PageChanged { page, page_count });
        }
    }

    /// Run one planner pass and queue the missing tiles
    fn load_pages(&mut self) {
        if !self.state.has_document() {
            return;
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };

        let planned = self
            .planner
            .plan(&session.layout, &self.viewport, &self.cache);
        session.worker.begin_pass(planned.pass);
        for request in planned.requests {
            if !session.worker.submit(request) {
                warn!("Render worker is gone, dropping pass {}", planned.pass);
                break;
            }
        }
    }

    /// Tiles in draw order: thumbnails, then cached tiles by load order
    #[must_use]
    pub fn tiles_to_draw(&self) -> Vec<Tile> {
        let mut tiles = self.cache.thumbnails();
        tiles.extend(self.cache.tiles());
        tiles
    }

    /// Drawable tiles with their destination in viewport pixels
    #[must_use]
    pub fn placed_tiles(&self) -> Vec<PlacedTile> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        self.tiles_to_draw()
            .into_iter()
            .filter_map(|tile| {
                let dest = place_tile(&session.layout, &self.viewport, &tile)?;
                Some(PlacedTile { tile, dest })
            })
            .collect()
    }

    /// Geometry of `page` at the current zoom
    #[must_use]
    pub fn page_geometry(&self, page: usize) -> Option<PageGeometry> {
        self.page_geometry_at(page, self.viewport.zoom)
    }

    #[must_use]
    pub fn page_geometry_at(&self, page: usize, zoom: f32) -> Option<PageGeometry> {
        let session = self.session.as_ref()?;
        (page < session.layout.page_count()).then(|| PageGeometry::of(&session.layout, page, zoom))
    }

    fn document(&self) -> Result<&OpenedDocument, ViewerError> {
        self.session
            .as_ref()
            .map(|session| session.document.as_ref())
            .ok_or(ViewerError::NoDocument)
    }

    pub fn metadata(&self) -> Result<DocumentMeta, ViewerError> {
        Ok(self.document()?.metadata())
    }

    pub fn bookmarks(&self) -> Result<Vec<Bookmark>, ViewerError> {
        Ok(self.document()?.bookmarks())
    }

    pub fn links(&self, page: usize) -> Result<Vec<PageLink>, ViewerError> {
        Ok(self.document()?.links(page))
    }

    pub fn natural_page_size(&self, page: usize) -> Result<PageSize, ViewerError> {
        Ok(self.document()?.natural_page_size(page))
    }

    pub fn map_rect_to_device(
        &self,
        page: usize,
        origin: (i32, i32),
        size: (i32, i32),
        rect: PageRect,
    ) -> Result<PageRect, ViewerError> {
        Ok(self.document()?.map_rect_to_device(page, origin, size, rect))
    }

    /// Whether the first open attempt of `page` failed or never happened
    pub fn page_has_error(&self, page: usize) -> Result<bool, ViewerError> {
        Ok(self.document()?.page_has_error(page))
    }
}

impl Drop for TileViewer {
    fn drop(&mut self) {
        self.recycle();
    }
}
