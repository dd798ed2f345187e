use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;
use image::{Rgb, RgbImage};
use log::{debug, error, info, warn};
use simplelog::{Config, LevelFilter, WriteLogger};

use tileview::layout::PageSize;
use tileview::panic_handler;
use tileview::render::synthetic::{SyntheticRasterizer, parse_page_size};
use tileview::render::{DocumentSource, Rasterizer};
use tileview::settings;
use tileview::viewer::PlacedTile;
use tileview::{TileViewer, ViewerEvent, Viewport};

#[derive(Parser)]
#[command(name = "tileview", version, about = "Render a viewport of a paginated document")]
struct Args {
    /// Document to open
    document: Option<PathBuf>,

    /// Use generated pages instead of a document, e.g. 600x800,600x800
    #[arg(long, value_delimiter = ',', value_parser = parse_page_size)]
    pages: Vec<PageSize>,

    #[arg(long)]
    password: Option<String>,

    /// Document pages to show, in order
    #[arg(long, value_delimiter = ',')]
    user_pages: Option<Vec<usize>>,

    /// Settings file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 800.0)]
    width: f32,

    #[arg(long, default_value_t = 1000.0)]
    height: f32,

    /// Page to jump to after loading
    #[arg(long)]
    page: Option<usize>,

    #[arg(long)]
    zoom: Option<f32>,

    /// Scroll offset along the scroll axis, applied after the jump
    #[arg(long)]
    scroll: Option<f32>,

    /// Print document information as JSON
    #[arg(long)]
    info: bool,

    /// Write the composed viewport to a PNG file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Give up waiting for tiles after this many milliseconds
    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    #[arg(long, default_value = "debug")]
    log_level: LevelFilter,
}

fn rasterizer_for(args: &Args) -> Result<(Arc<dyn Rasterizer>, DocumentSource)> {
    if !args.pages.is_empty() {
        let source = DocumentSource::Bytes(Vec::new().into());
        return Ok((Arc::new(SyntheticRasterizer::new(args.pages.clone())), source));
    }

    let Some(path) = args.document.clone() else {
        bail!("either a document path or --pages is required");
    };

    #[cfg(feature = "mupdf")]
    return Ok((
        Arc::new(tileview::render::mupdf::MupdfRasterizer),
        DocumentSource::Path(path),
    ));

    #[cfg(not(feature = "mupdf"))]
    bail!(
        "cannot open {}: built without the mupdf feature, use --pages",
        path.display()
    );
}

/// Pump events until the document has loaded or failed
fn wait_for_load(viewer: &mut TileViewer, deadline: Instant) -> Result<()> {
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            bail!("timed out opening document");
        }
        for event in viewer.wait_events(remaining) {
            match event {
                ViewerEvent::LoadComplete { page_count } => {
                    info!("Loaded {page_count} pages");
                    return Ok(());
                }
                ViewerEvent::LoadError(e) => bail!("failed to open document: {e}"),
                other => debug!("Event before load: {other:?}"),
            }
        }
    }
}

/// Pump events until no tile has arrived for a short while
fn wait_for_tiles(viewer: &mut TileViewer, deadline: Instant) {
    let idle = Duration::from_millis(300);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!("Timed out waiting for tiles");
            return;
        }
        let events = viewer.wait_events(idle.min(remaining));
        if events.is_empty() {
            return;
        }
        for event in events {
            match event {
                ViewerEvent::PageRenderError { page, error } => {
                    warn!("Page {page} failed: {error}");
                }
                ViewerEvent::PageChanged { page, page_count } => {
                    debug!("Page {}/{page_count}", page + 1);
                }
                _ => {}
            }
        }
    }
}

fn print_info(viewer: &TileViewer) -> Result<()> {
    let pages: Vec<_> = (0..viewer.page_count())
        .filter_map(|page| {
            let geometry = viewer.page_geometry(page)?;
            Some(serde_json::json!({
                "page": page,
                "natural": viewer.natural_page_size(page).ok(),
                "scaled": geometry.size,
                "offset": geometry.primary_offset,
                "secondary_offset": geometry.secondary_offset,
            }))
        })
        .collect();

    let info = serde_json::json!({
        "page_count": viewer.page_count(),
        "current_page": viewer.current_page(),
        "zoom": viewer.zoom(),
        "position": viewer.position_offset(),
        "metadata": viewer.metadata()?,
        "bookmarks": viewer.bookmarks()?,
        "pages": pages,
        "cached_tiles": viewer.cache().len(),
        "thumbnails": viewer.cache().thumbnail_len(),
    });
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

/// Nearest-neighbour blit of every placed tile into a white canvas
fn compose(viewport: &Viewport, placed: &[PlacedTile]) -> RgbImage {
    let width = viewport.width.max(1.0) as u32;
    let height = viewport.height.max(1.0) as u32;
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([0xFF, 0xFF, 0xFF]));

    for PlacedTile { tile, dest } in placed {
        let pixels = &tile.pixels;
        if dest.width == 0 || dest.height == 0 {
            continue;
        }
        for dy in 0..dest.height {
            let y = i64::from(dest.y) + i64::from(dy);
            if y < 0 || y >= i64::from(height) {
                continue;
            }
            let sy = u64::from(dy) * u64::from(pixels.height()) / u64::from(dest.height);
            for dx in 0..dest.width {
                let x = i64::from(dest.x) + i64::from(dx);
                if x < 0 || x >= i64::from(width) {
                    continue;
                }
                let sx = u64::from(dx) * u64::from(pixels.width()) / u64::from(dest.width);
                if let Some(rgb) = pixels.rgb_at(sx as u32, sy as u32) {
                    canvas.put_pixel(x as u32, y as u32, Rgb(rgb));
                }
            }
        }
    }
    canvas
}

fn run(args: &Args) -> Result<()> {
    match &args.config {
        Some(path) => settings::load_settings_from_path(path),
        None => settings::load_settings(),
    }

    let (rasterizer, source) = rasterizer_for(args)?;
    let mut viewer = TileViewer::new(rasterizer, settings::get_viewer_options());
    viewer.set_view_size(args.width, args.height);
    viewer.open(
        source,
        args.password.as_deref(),
        args.user_pages.clone(),
    )?;

    let deadline = Instant::now() + Duration::from_millis(args.timeout_ms);
    wait_for_load(&mut viewer, deadline)?;

    if let Some(page) = args.page {
        viewer.jump_to(page);
    }
    if args.zoom.is_some() || args.scroll.is_some() {
        let current = viewer.viewport();
        let zoom = args.zoom.unwrap_or(current.zoom);
        let mut target = Viewport { zoom, ..current };
        if let Some(scroll) = args.scroll {
            let vertical = viewer.layout().is_none_or(|layout| layout.axis().is_vertical());
            if vertical {
                target.scroll_y = scroll;
            } else {
                target.scroll_x = scroll;
            }
        }
        viewer.on_viewport_changed(target);
    }

    wait_for_tiles(&mut viewer, deadline);

    if args.info {
        print_info(&viewer)?;
    }

    if let Some(output) = &args.output {
        let canvas = compose(&viewer.viewport(), &viewer.placed_tiles());
        canvas
            .save(output)
            .with_context(|| format!("failed to write {}", output.display()))?;
        info!("Wrote {}", output.display());
    }

    viewer.recycle();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    WriteLogger::init(
        args.log_level,
        Config::default(),
        File::create("tileview.log")?,
    )?;
    panic_handler::initialize_panic_handler();

    info!("Starting tileview");
    let result = run(&args);
    if let Err(e) = &result {
        error!("tileview failed: {e:?}");
    }
    info!("Shutting down tileview");
    result
}
