//! Scroll position helpers built on top of [`DocumentLayout`].
//!
//! Scroll offsets are positive distances from the document origin to the
//! viewport origin. A negative offset means the content is shifted into the
//! viewport, which happens when it is smaller than the viewport.

use super::document::{DocumentLayout, ScrollAxis};
use super::fit::PageSize;

/// Edge of a page a snapping gesture should align with
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapEdge {
    Start,
    Center,
    End,
    None,
}

/// Layout queries bound to a zoom factor and viewport size
#[derive(Clone, Copy, Debug)]
pub struct Navigator<'a> {
    layout: &'a DocumentLayout,
    zoom: f32,
    view: PageSize,
}

impl<'a> Navigator<'a> {
    #[must_use]
    pub fn new(layout: &'a DocumentLayout, zoom: f32, view: PageSize) -> Self {
        Self { layout, zoom, view }
    }

    fn axis(&self) -> ScrollAxis {
        self.layout.axis()
    }

    fn view_length(&self) -> f32 {
        self.axis().primary(self.view)
    }

    /// Keep the viewport over the document. Content smaller than the viewport
    /// is centred on that axis.
    #[must_use]
    pub fn clamp_scroll(&self, x: f32, y: f32) -> (f32, f32) {
        let axis = self.axis();
        let secondary_content = axis.secondary(self.layout.max_page_size()) * self.zoom;
        let primary_content = self.layout.doc_len(self.zoom);

        let clamp = |value: f32, content: f32, view: f32| {
            if content < view {
                -(view - content) / 2.0
            } else {
                value.clamp(0.0, content - view)
            }
        };

        match axis {
            ScrollAxis::Vertical => (
                clamp(x, secondary_content, self.view.width),
                clamp(y, primary_content, self.view.height),
            ),
            ScrollAxis::Horizontal => (
                clamp(x, primary_content, self.view.width),
                clamp(y, secondary_content, self.view.height),
            ),
        }
    }

    /// Scroll progress along the primary axis in `0.0..=1.0`
    #[must_use]
    pub fn position_offset(&self, primary_scroll: f32) -> f32 {
        let range = self.layout.doc_len(self.zoom) - self.view_length();
        if range <= 0.0 {
            return 0.0;
        }
        (primary_scroll / range).clamp(0.0, 1.0)
    }

    /// Primary scroll offset for a progress value in `0.0..=1.0`
    #[must_use]
    pub fn scroll_for_position(&self, progress: f32) -> f32 {
        (self.layout.doc_len(self.zoom) - self.view_length()) * progress.clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn page_at_position_offset(&self, progress: f32) -> usize {
        self.layout
            .page_at_offset(self.layout.doc_len(self.zoom) * progress, self.zoom)
    }

    /// Page under the centre of the viewport
    #[must_use]
    pub fn page_at_viewport_center(&self, primary_scroll: f32) -> usize {
        self.layout
            .page_at_offset(primary_scroll + self.view_length() / 2.0, self.zoom)
    }

    /// Page a snap should settle on; the first and last pages win at the
    /// document edges.
    #[must_use]
    pub fn focus_page(&self, primary_scroll: f32) -> usize {
        let count = self.layout.page_count();
        if primary_scroll < 1.0 || count == 0 {
            return 0;
        }
        if primary_scroll > self.layout.doc_len(self.zoom) - self.view_length() - 1.0 {
            return count - 1;
        }
        self.page_at_viewport_center(primary_scroll)
    }

    #[must_use]
    pub fn find_snap_edge(&self, primary_scroll: f32, page: usize) -> SnapEdge {
        if page >= self.layout.page_count() {
            return SnapEdge::None;
        }

        let start = self.layout.page_offset(page, self.zoom);
        let length = self.layout.page_length(page, self.zoom);
        let view_length = self.view_length();

        if view_length >= length {
            SnapEdge::Center
        } else if primary_scroll <= start {
            SnapEdge::Start
        } else if start + length < primary_scroll + view_length {
            SnapEdge::End
        } else {
            SnapEdge::None
        }
    }

    /// Primary scroll offset that aligns `edge` of `page` with the viewport
    #[must_use]
    pub fn snap_offset_for_page(&self, page: usize, edge: SnapEdge) -> f32 {
        let offset = self.layout.page_offset(page, self.zoom);
        let length = self.layout.page_length(page, self.zoom);
        let view_length = self.view_length();

        match edge {
            SnapEdge::Center => offset - view_length / 2.0 + length / 2.0,
            SnapEdge::End => offset - view_length + length,
            SnapEdge::Start | SnapEdge::None => offset,
        }
    }

    /// True when `page` covers the whole viewport along the scroll axis
    #[must_use]
    pub fn page_fills_screen(&self, primary_scroll: f32, page: usize) -> bool {
        let start = self.layout.page_offset(page, self.zoom);
        let end = start + self.layout.page_length(page, self.zoom);
        start < primary_scroll && end > primary_scroll + self.view_length()
    }

    /// Primary scroll offset that brings `page` to the top of the viewport
    #[must_use]
    pub fn jump_offset(&self, page: usize) -> f32 {
        if page == 0 {
            0.0
        } else {
            self.layout.page_offset(page, self.zoom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::document::LayoutOptions;
    use super::*;

    fn layout() -> DocumentLayout {
        DocumentLayout::new(
            vec![
                PageSize::new(600.0, 800.0),
                PageSize::new(600.0, 800.0),
                PageSize::new(600.0, 1600.0),
            ],
            LayoutOptions::default(),
            PageSize::new(300.0, 500.0),
        )
    }

    #[test]
    fn navigation_clamps_scroll_range() {
        let layout = layout();
        let nav = Navigator::new(&layout, 1.0, PageSize::new(300.0, 500.0));

        assert_eq!(nav.clamp_scroll(10.0, -50.0), (0.0, 0.0));
        assert_eq!(nav.clamp_scroll(0.0, 5000.0), (0.0, 1100.0));

        let zoomed = Navigator::new(&layout, 2.0, PageSize::new(300.0, 500.0));
        assert_eq!(zoomed.clamp_scroll(1000.0, 10.0), (300.0, 10.0));
    }

    #[test]
    fn navigation_centres_small_content() {
        let layout = DocumentLayout::new(
            vec![PageSize::new(600.0, 300.0)],
            LayoutOptions::default(),
            PageSize::new(300.0, 500.0),
        );
        let nav = Navigator::new(&layout, 0.5, PageSize::new(300.0, 500.0));
        let (x, y) = nav.clamp_scroll(0.0, 0.0);
        assert_eq!(x, -75.0);
        assert_eq!(y, -(500.0 - 75.0) / 2.0);
    }

    #[test]
    fn navigation_position_offset_round_trip() {
        let layout = layout();
        let nav = Navigator::new(&layout, 1.0, PageSize::new(300.0, 500.0));

        assert_eq!(nav.position_offset(0.0), 0.0);
        assert_eq!(nav.position_offset(550.0), 0.5);
        assert_eq!(nav.position_offset(9999.0), 1.0);
        assert_eq!(nav.scroll_for_position(0.5), 550.0);
        assert_eq!(nav.page_at_position_offset(0.9), 2);
    }

    #[test]
    fn navigation_focus_page_prefers_edges() {
        let layout = layout();
        let nav = Navigator::new(&layout, 1.0, PageSize::new(300.0, 500.0));

        assert_eq!(nav.focus_page(0.0), 0);
        assert_eq!(nav.focus_page(1100.0), 2);
        assert_eq!(nav.focus_page(300.0), 1);
    }

    #[test]
    fn navigation_snap_edges() {
        let layout = layout();
        let nav = Navigator::new(&layout, 1.0, PageSize::new(300.0, 500.0));

        assert_eq!(nav.find_snap_edge(100.0, 1), SnapEdge::Center);
        assert_eq!(nav.snap_offset_for_page(1, SnapEdge::Center), 350.0);
        assert_eq!(nav.find_snap_edge(700.0, 2), SnapEdge::Start);
        assert_eq!(nav.find_snap_edge(1000.0, 2), SnapEdge::None);
        assert_eq!(nav.find_snap_edge(1200.0, 2), SnapEdge::End);
        assert_eq!(nav.snap_offset_for_page(2, SnapEdge::End), 1100.0);
        assert_eq!(nav.find_snap_edge(0.0, 7), SnapEdge::None);
    }

    #[test]
    fn navigation_page_fills_screen() {
        let layout = layout();
        let nav = Navigator::new(&layout, 1.0, PageSize::new(300.0, 500.0));

        assert!(nav.page_fills_screen(900.0, 2));
        assert!(!nav.page_fills_screen(800.0, 2));
        assert!(!nav.page_fills_screen(0.0, 0));
    }

    #[test]
    fn navigation_jump_offset() {
        let layout = layout();
        let nav = Navigator::new(&layout, 2.0, PageSize::new(300.0, 500.0));
        assert_eq!(nav.jump_offset(0), 0.0);
        assert_eq!(nav.jump_offset(2), 1600.0);
    }
}
