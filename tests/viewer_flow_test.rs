use std::sync::Arc;
use std::time::{Duration, Instant};

use tileview::layout::PageSize;
use tileview::render::synthetic::SyntheticRasterizer;
use tileview::test_utils::ScriptedRasterizer;
use tileview::tiles::Tile;
use tileview::{
    DocumentSource, OpenError, Rasterizer, TileViewer, ViewerError, ViewerEvent, ViewerOptions,
    ViewerState, Viewport,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn source() -> DocumentSource {
    DocumentSource::Bytes(Vec::new().into())
}

fn viewer(rasterizer: impl Rasterizer + 'static) -> TileViewer {
    let mut viewer = TileViewer::new(Arc::new(rasterizer), ViewerOptions::default());
    viewer.set_view_size(300.0, 500.0);
    viewer
}

fn three_pages() -> Vec<PageSize> {
    vec![PageSize::new(600.0, 800.0); 3]
}

/// Pump events until `done` holds for the collected list or the timeout expires
fn pump_until(
    viewer: &mut TileViewer,
    mut done: impl FnMut(&[ViewerEvent]) -> bool,
) -> Vec<ViewerEvent> {
    let deadline = Instant::now() + TIMEOUT;
    let mut events = Vec::new();
    while !done(&events) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        events.extend(viewer.wait_events(remaining.min(Duration::from_millis(50))));
    }
    events
}

/// Pump until no event arrives for a short while
fn settle(viewer: &mut TileViewer) {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if viewer.wait_events(Duration::from_millis(300)).is_empty() {
            return;
        }
    }
}

fn loaded(events: &[ViewerEvent]) -> bool {
    events
        .iter()
        .any(|e| matches!(e, ViewerEvent::LoadComplete { .. } | ViewerEvent::LoadError(_)))
}

fn shown(events: &[ViewerEvent]) -> bool {
    events
        .iter()
        .any(|e| matches!(e, ViewerEvent::FirstContentRendered { .. }))
}

/// Open, first page reported, tiles delivered and placed
#[test]
fn test_open_renders_first_screen() {
    let mut viewer = viewer(SyntheticRasterizer::new(three_pages()));
    assert_eq!(viewer.state(), ViewerState::Recycled);

    viewer.open(source(), None, None).expect("open");
    assert_eq!(viewer.state(), ViewerState::Loading);

    let mut events = pump_until(&mut viewer, loaded);
    assert!(matches!(events[0], ViewerEvent::LoadComplete { page_count: 3 }));
    assert!(events.iter().any(|e| matches!(
        e,
        ViewerEvent::PageChanged {
            page: 0,
            page_count: 3
        }
    )));
    assert_eq!(viewer.page_count(), 3);
    assert_eq!(viewer.current_page(), Some(0));

    if !shown(&events) {
        events.extend(pump_until(&mut viewer, shown));
    }
    assert!(shown(&events));
    assert_eq!(viewer.state(), ViewerState::Shown);
    let first_content = events
        .iter()
        .filter(|e| matches!(e, ViewerEvent::FirstContentRendered { .. }))
        .count();
    assert_eq!(first_content, 1);

    settle(&mut viewer);
    assert!(!viewer.placed_tiles().is_empty());
    assert!(!viewer.cache().is_empty());

    let drawn = viewer.tiles_to_draw();
    let first_page_tile = drawn.iter().position(|t| !t.thumbnail);
    let last_thumbnail = drawn.iter().rposition(|t| t.thumbnail);
    if let (Some(tile), Some(thumb)) = (first_page_tile, last_thumbnail) {
        assert!(thumb < tile, "thumbnails are drawn before page tiles");
    }
}

/// A second open requires a recycle, which empties everything
#[test]
fn test_recycle_is_required_between_documents() {
    let mut viewer = viewer(SyntheticRasterizer::new(three_pages()));
    viewer.open(source(), None, None).expect("open");
    pump_until(&mut viewer, shown);

    assert_eq!(
        viewer.open(source(), None, None),
        Err(ViewerError::NotRecycled)
    );

    viewer.recycle();
    assert_eq!(viewer.state(), ViewerState::Recycled);
    assert!(viewer.cache().is_empty());
    assert_eq!(viewer.cache().thumbnail_len(), 0);
    assert_eq!(viewer.page_count(), 0);
    assert_eq!(viewer.current_page(), None);
    assert!(viewer.poll_events().is_empty());

    viewer.open(source(), None, None).expect("reopen");
    let events = pump_until(&mut viewer, loaded);
    assert!(matches!(events[0], ViewerEvent::LoadComplete { page_count: 3 }));
}

/// Wrong password surfaces as a load error and leaves the viewer in Error
#[test]
fn test_wrong_password_fails_load() {
    let mut viewer = viewer(SyntheticRasterizer::new(three_pages()).with_password("secret"));

    viewer.open(source(), Some("guess"), None).expect("open");
    let events = pump_until(&mut viewer, loaded);
    assert!(matches!(
        events[0],
        ViewerEvent::LoadError(OpenError::WrongPassword)
    ));
    assert_eq!(viewer.state(), ViewerState::Error);
    assert_eq!(
        viewer.open(source(), Some("secret"), None),
        Err(ViewerError::NotRecycled)
    );

    viewer.recycle();
    viewer.open(source(), Some("secret"), None).expect("open");
    let events = pump_until(&mut viewer, loaded);
    assert!(matches!(events[0], ViewerEvent::LoadComplete { .. }));
}

/// A page that cannot be opened is reported without stopping other pages
#[test]
fn test_failing_page_reports_render_error() {
    let rasterizer = ScriptedRasterizer::new(three_pages()).failing_page(0);
    let counters = rasterizer.counters();
    let mut viewer = viewer(rasterizer);

    viewer.open(source(), None, None).expect("open");
    let events = pump_until(&mut viewer, |events| {
        events
            .iter()
            .any(|e| matches!(e, ViewerEvent::PageRenderError { page: 0, .. }))
    });

    let error = events.iter().find_map(|e| match e {
        ViewerEvent::PageRenderError { page, error } => Some((*page, error.clone())),
        _ => None,
    });
    let (page, error) = error.expect("page error");
    assert_eq!(page, 0);
    assert!(error.detail.contains("cannot decode"));
    assert_eq!(viewer.page_has_error(0), Ok(true));

    // The failure is cached: further passes never reopen page 0
    settle(&mut viewer);
    viewer.move_to(0.0, 1.0);
    settle(&mut viewer);
    assert_eq!(counters.open_page(), 2);
    assert_eq!(viewer.page_has_error(1), Ok(false));
}

/// Document queries need a loaded document
#[test]
fn test_queries_before_load() {
    let viewer = viewer(SyntheticRasterizer::new(three_pages()));
    assert_eq!(viewer.metadata().err(), Some(ViewerError::NoDocument));
    assert_eq!(viewer.bookmarks().err(), Some(ViewerError::NoDocument));
    assert_eq!(viewer.links(0).err(), Some(ViewerError::NoDocument));
    assert_eq!(viewer.page_has_error(0), Err(ViewerError::NoDocument));
    assert!(viewer.placed_tiles().is_empty());
    assert!(viewer.page_geometry(0).is_none());
}

/// Metadata, bookmarks and links pass through from the rasterizer
#[test]
fn test_document_queries_after_load() {
    let mut viewer = viewer(SyntheticRasterizer::new(three_pages()));
    viewer.open(source(), None, None).expect("open");
    pump_until(&mut viewer, loaded);

    let meta = viewer.metadata().expect("metadata");
    assert_eq!(meta.title.as_deref(), Some("Synthetic document"));
    assert_eq!(viewer.bookmarks().expect("bookmarks").len(), 3);
    let links = viewer.links(0).expect("links");
    assert_eq!(links[0].dest_page, Some(1));
    assert_eq!(
        viewer.natural_page_size(2),
        Ok(PageSize::new(600.0, 800.0))
    );
}

/// Only the chosen document pages are laid out, in the given order
#[test]
fn test_user_pages_subset() {
    let pages = vec![
        PageSize::new(600.0, 800.0),
        PageSize::new(600.0, 1600.0),
        PageSize::new(600.0, 800.0),
    ];
    let mut viewer = viewer(SyntheticRasterizer::new(pages));
    viewer.open(source(), None, Some(vec![1, 0])).expect("open");
    let events = pump_until(&mut viewer, loaded);

    assert!(matches!(events[0], ViewerEvent::LoadComplete { page_count: 2 }));
    let layout = viewer.layout().expect("layout");
    assert_eq!(layout.page_size(0), PageSize::new(300.0, 800.0));
    assert_eq!(layout.page_size(1), PageSize::new(300.0, 400.0));
    assert_eq!(
        viewer.natural_page_size(0),
        Ok(PageSize::new(600.0, 1600.0))
    );
}

/// Scrolling past the end is clamped and reports the last page
#[test]
fn test_scroll_clamps_and_tracks_page() {
    let mut viewer = viewer(SyntheticRasterizer::new(three_pages()));
    viewer.open(source(), None, None).expect("open");
    pump_until(&mut viewer, loaded);

    viewer.move_to(0.0, 10_000.0);
    assert_eq!(viewer.viewport().scroll_y, 700.0);
    assert_eq!(viewer.current_page(), Some(2));
    assert!((viewer.position_offset() - 1.0).abs() < 1e-6);

    let events = viewer.poll_events();
    assert!(events.iter().any(|e| matches!(
        e,
        ViewerEvent::PageChanged {
            page: 2,
            page_count: 3
        }
    )));

    viewer.jump_to(1);
    assert_eq!(viewer.viewport().scroll_y, 400.0);
    assert_eq!(viewer.current_page(), Some(1));
}

/// A resize keeps the current page at the start of the view
#[test]
fn test_resize_keeps_current_page() {
    let mut viewer = viewer(SyntheticRasterizer::new(three_pages()));
    viewer.open(source(), None, None).expect("open");
    pump_until(&mut viewer, loaded);

    viewer.jump_to(1);
    assert_eq!(viewer.viewport().scroll_y, 400.0);

    viewer.set_view_size(600.0, 500.0);
    assert_eq!(viewer.viewport().width, 600.0);
    assert_eq!(viewer.viewport().scroll_y, 800.0);
    assert_eq!(viewer.current_page(), Some(1));
    let layout = viewer.layout().expect("layout");
    assert_eq!(layout.page_size(1), PageSize::new(600.0, 800.0));
}

/// A page tile finishing after the view moved on is neither cached nor reported
#[test]
fn test_tile_from_superseded_pass_is_dropped() {
    let rasterizer = ScriptedRasterizer::new(three_pages());
    let gate = rasterizer.gate_renders();
    let mut viewer = viewer(rasterizer);

    viewer.open(source(), None, None).expect("open");
    pump_until(&mut viewer, loaded);

    // Two thumbnails lead the first pass, the third render is a page tile
    for _ in 0..2 {
        assert!(gate.wait_entered(TIMEOUT).is_some());
        gate.release();
    }
    assert!(gate.wait_entered(TIMEOUT).is_some());

    viewer.move_to(0.0, 700.0);
    for _ in 0..64 {
        gate.release();
    }

    let mut events = Vec::new();
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        let batch = viewer.wait_events(Duration::from_millis(300));
        if batch.is_empty() {
            break;
        }
        events.extend(batch);
    }

    let superseded = |tile: &Tile| !tile.thumbnail && tile.pass == 1;
    assert!(!viewer.cache().tiles().iter().any(superseded));
    assert!(!events.iter().any(|e| matches!(e, ViewerEvent::TileRendered(t) if superseded(t))));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, ViewerEvent::TileRendered(t) if !t.thumbnail && t.pass == 2))
    );
}

/// Zoom is clamped to the configured range and cycles through levels
#[test]
fn test_zoom_levels() {
    let mut viewer = viewer(SyntheticRasterizer::new(three_pages()));
    viewer.open(source(), None, None).expect("open");
    pump_until(&mut viewer, loaded);

    assert_eq!(viewer.next_zoom_level(), 1.75);
    viewer.zoom_centered_to(10.0, (150.0, 250.0));
    assert_eq!(viewer.zoom(), 3.0);
    assert_eq!(viewer.next_zoom_level(), 1.0);

    let geometry = viewer.page_geometry(0).expect("geometry");
    assert_eq!(geometry.size, PageSize::new(900.0, 1200.0));

    let current = viewer.viewport();
    viewer.on_viewport_changed(Viewport {
        zoom: 0.1,
        ..current
    });
    assert_eq!(viewer.zoom(), 1.0);
}

/// Recycling while the open task runs discards its result
#[test]
fn test_recycle_during_load_discards_open() {
    let rasterizer = ScriptedRasterizer::new(three_pages());
    let gate = rasterizer.gate_open();
    let mut viewer = viewer(rasterizer);

    viewer.open(source(), None, None).expect("open");
    assert!(gate.wait_entered(TIMEOUT).is_some());
    viewer.recycle();
    gate.release();

    assert!(viewer.wait_events(Duration::from_millis(200)).is_empty());
    assert_eq!(viewer.state(), ViewerState::Recycled);
    assert_eq!(viewer.page_count(), 0);
}
