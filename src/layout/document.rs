//! Whole-document layout: scaled page sizes, spacing and cumulative offsets

use serde::{Deserialize, Serialize};

use super::fit::{FitPolicy, PageSize, PageSizeCalculator};

/// Direction pages are stacked in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrollAxis {
    #[default]
    Vertical,
    Horizontal,
}

impl ScrollAxis {
    #[must_use]
    pub fn is_vertical(self) -> bool {
        self == ScrollAxis::Vertical
    }

    /// Extent of `size` along the scroll axis
    #[must_use]
    pub fn primary(self, size: PageSize) -> f32 {
        match self {
            ScrollAxis::Vertical => size.height,
            ScrollAxis::Horizontal => size.width,
        }
    }

    /// Extent of `size` across the scroll axis
    #[must_use]
    pub fn secondary(self, size: PageSize) -> f32 {
        match self {
            ScrollAxis::Vertical => size.width,
            ScrollAxis::Horizontal => size.height,
        }
    }
}

/// Parameters fixed for the lifetime of a loaded document
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutOptions {
    pub fit_policy: FitPolicy,
    pub axis: ScrollAxis,
    /// Gap between pages in pixels
    pub spacing_px: f32,
    /// Centre pages smaller than the viewport by absorbing the remainder as spacing
    pub auto_spacing: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            fit_policy: FitPolicy::Width,
            axis: ScrollAxis::Vertical,
            spacing_px: 0.0,
            auto_spacing: false,
        }
    }
}

/// Unzoomed page geometry for a document. All `*_zoom` queries multiply the
/// stored values by the zoom factor.
#[derive(Clone, Debug)]
pub struct DocumentLayout {
    options: LayoutOptions,
    view: PageSize,
    original_sizes: Vec<PageSize>,
    original_max_width_page: PageSize,
    original_max_height_page: PageSize,
    page_sizes: Vec<PageSize>,
    max_width_page: PageSize,
    max_height_page: PageSize,
    page_spacing: Vec<f32>,
    page_offsets: Vec<f32>,
    document_length: f32,
}

impl DocumentLayout {
    /// Build the layout for pages of the given natural sizes
    #[must_use]
    pub fn new(original_sizes: Vec<PageSize>, options: LayoutOptions, view: PageSize) -> Self {
        let mut original_max_width_page = PageSize::zero();
        let mut original_max_height_page = PageSize::zero();
        for size in &original_sizes {
            if size.width > original_max_width_page.width {
                original_max_width_page = *size;
            }
            if size.height > original_max_height_page.height {
                original_max_height_page = *size;
            }
        }

        let mut layout = Self {
            options,
            view,
            original_sizes,
            original_max_width_page,
            original_max_height_page,
            page_sizes: Vec::new(),
            max_width_page: PageSize::zero(),
            max_height_page: PageSize::zero(),
            page_spacing: Vec::new(),
            page_offsets: Vec::new(),
            document_length: 0.0,
        };
        layout.recalculate(view);
        layout
    }

    /// Recompute scaled sizes, spacing and offsets for a new viewport size.
    /// Repeated calls with the same viewport produce identical output.
    pub fn recalculate(&mut self, view: PageSize) {
        self.view = view;

        let calculator = PageSizeCalculator::new(
            self.options.fit_policy,
            self.original_max_width_page,
            self.original_max_height_page,
            view,
        );
        self.max_width_page = calculator.optimal_max_width_page();
        self.max_height_page = calculator.optimal_max_height_page();

        self.page_sizes.clear();
        self.page_sizes.extend(
            self.original_sizes
                .iter()
                .map(|size| calculator.calculate(*size)),
        );

        if self.options.auto_spacing {
            self.prepare_auto_spacing();
        } else {
            self.page_spacing.clear();
        }
        self.prepare_document_length();
        self.prepare_page_offsets();
    }

    fn prepare_auto_spacing(&mut self) {
        let axis = self.options.axis;
        let view_length = axis.primary(self.view);
        let last = self.page_sizes.len().saturating_sub(1);

        self.page_spacing.clear();
        for (i, size) in self.page_sizes.iter().enumerate() {
            let mut spacing = (view_length - axis.primary(*size)).max(0.0);
            if i < last {
                spacing += self.options.spacing_px;
            }
            self.page_spacing.push(spacing);
        }
    }

    fn prepare_document_length(&mut self) {
        let axis = self.options.axis;
        let last = self.page_sizes.len().saturating_sub(1);

        let mut length = 0.0;
        for (i, size) in self.page_sizes.iter().enumerate() {
            length += axis.primary(*size);
            if self.options.auto_spacing {
                length += self.page_spacing[i];
            } else if i < last {
                length += self.options.spacing_px;
            }
        }
        self.document_length = length;
    }

    fn prepare_page_offsets(&mut self) {
        let axis = self.options.axis;
        let count = self.page_sizes.len();
        let half_gap = self.options.spacing_px / 2.0;

        self.page_offsets.clear();
        let mut offset = 0.0;
        for (i, size) in self.page_sizes.iter().enumerate() {
            let length = axis.primary(*size);
            if self.options.auto_spacing {
                let half_spacing = self.page_spacing[i] / 2.0;
                offset += half_spacing;
                // The outer half-gaps are not part of the document
                if count > 1 && i == 0 {
                    offset -= half_gap;
                } else if count > 1 && i == count - 1 {
                    offset += half_gap;
                }
                self.page_offsets.push(offset);
                offset += length + half_spacing;
            } else {
                self.page_offsets.push(offset);
                offset += length + self.options.spacing_px;
            }
        }
    }

    #[must_use]
    pub fn options(&self) -> &LayoutOptions {
        &self.options
    }

    #[must_use]
    pub fn axis(&self) -> ScrollAxis {
        self.options.axis
    }

    #[must_use]
    pub fn view_size(&self) -> PageSize {
        self.view
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    /// Fitted size before zoom; zero for unknown pages
    #[must_use]
    pub fn page_size(&self, page: usize) -> PageSize {
        self.page_sizes
            .get(page)
            .copied()
            .unwrap_or_else(PageSize::zero)
    }

    #[must_use]
    pub fn scaled_page_size(&self, page: usize, zoom: f32) -> PageSize {
        self.page_size(page).scaled(zoom)
    }

    /// Largest fitted page on the secondary axis (widest when scrolling vertically)
    #[must_use]
    pub fn max_page_size(&self) -> PageSize {
        match self.options.axis {
            ScrollAxis::Vertical => self.max_width_page,
            ScrollAxis::Horizontal => self.max_height_page,
        }
    }

    #[must_use]
    pub fn doc_len(&self, zoom: f32) -> f32 {
        self.document_length * zoom
    }

    /// Page extent along the scroll axis
    #[must_use]
    pub fn page_length(&self, page: usize, zoom: f32) -> f32 {
        self.options.axis.primary(self.page_size(page)) * zoom
    }

    #[must_use]
    pub fn page_spacing(&self, page: usize, zoom: f32) -> f32 {
        let spacing = if self.options.auto_spacing {
            self.page_spacing.get(page).copied().unwrap_or(0.0)
        } else {
            self.options.spacing_px
        };
        spacing * zoom
    }

    /// Distance from the document start to the page start along the scroll axis
    #[must_use]
    pub fn page_offset(&self, page: usize, zoom: f32) -> f32 {
        self.page_offsets.get(page).copied().unwrap_or(0.0) * zoom
    }

    /// Offset that centres the page across the scroll axis
    #[must_use]
    pub fn secondary_page_offset(&self, page: usize, zoom: f32) -> f32 {
        let axis = self.options.axis;
        let max = axis.secondary(self.max_page_size());
        zoom * (max - axis.secondary(self.page_size(page))) / 2.0
    }

    /// Highest page whose start (minus half its spacing) lies at or before
    /// `offset`. Offsets before the first page resolve to page 0.
    #[must_use]
    pub fn page_at_offset(&self, offset: f32, zoom: f32) -> usize {
        (0..self.page_count())
            .rev()
            .find(|&i| self.page_start(i, zoom) <= offset)
            .unwrap_or(0)
    }

    fn page_start(&self, page: usize, zoom: f32) -> f32 {
        self.page_offset(page, zoom) - self.page_spacing(page, zoom) / 2.0
    }

    /// Clamp any requested page number into the valid range
    #[must_use]
    pub fn valid_page(&self, page: i64) -> usize {
        if page <= 0 || self.page_count() == 0 {
            return 0;
        }
        (page as usize).min(self.page_count() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(list: &[(f32, f32)]) -> Vec<PageSize> {
        list.iter().map(|&(w, h)| PageSize::new(w, h)).collect()
    }

    fn three_pages(options: LayoutOptions) -> DocumentLayout {
        DocumentLayout::new(
            sizes(&[(600.0, 800.0), (600.0, 800.0), (600.0, 1600.0)]),
            options,
            PageSize::new(300.0, 500.0),
        )
    }

    #[test]
    fn layout_width_policy_scales_uniformly() {
        let layout = three_pages(LayoutOptions::default());

        assert_eq!(layout.page_size(0), PageSize::new(300.0, 400.0));
        assert_eq!(layout.page_size(1), PageSize::new(300.0, 400.0));
        assert_eq!(layout.page_size(2), PageSize::new(300.0, 800.0));
        assert_eq!(layout.page_size(2).height, 2.0 * layout.page_size(0).height);
    }

    #[test]
    fn layout_fixed_spacing_offsets() {
        let options = LayoutOptions {
            spacing_px: 10.0,
            ..LayoutOptions::default()
        };
        let layout = three_pages(options);

        assert_eq!(layout.page_offset(0, 1.0), 0.0);
        assert_eq!(layout.page_offset(1, 1.0), 410.0);
        assert_eq!(layout.page_offset(2, 1.0), 820.0);
        assert_eq!(layout.doc_len(1.0), 1620.0);
        assert_eq!(layout.page_offset(2, 2.0), 1640.0);
    }

    #[test]
    fn layout_auto_spacing_centres_small_pages() {
        let options = LayoutOptions {
            spacing_px: 10.0,
            auto_spacing: true,
            ..LayoutOptions::default()
        };
        let layout = three_pages(options);

        // 500 - 400 = 100 free pixels plus the 10px gap on inner pages
        assert_eq!(layout.page_spacing(0, 1.0), 110.0);
        assert_eq!(layout.page_spacing(1, 1.0), 110.0);
        assert_eq!(layout.page_spacing(2, 1.0), 0.0);
        assert_eq!(layout.page_offset(0, 1.0), 50.0);
        assert_eq!(layout.page_offset(1, 1.0), 50.0 + 400.0 + 55.0 + 55.0);
        assert_eq!(layout.doc_len(1.0), 400.0 + 400.0 + 800.0 + 220.0);

        let last = layout.page_offset(2, 1.0) + layout.page_length(2, 1.0)
            + layout.page_spacing(2, 1.0) / 2.0;
        assert_eq!(last, layout.doc_len(1.0));
    }

    #[test]
    fn layout_single_page_auto_spacing_is_centred() {
        let layout = DocumentLayout::new(
            sizes(&[(600.0, 800.0)]),
            LayoutOptions {
                spacing_px: 10.0,
                auto_spacing: true,
                ..LayoutOptions::default()
            },
            PageSize::new(300.0, 500.0),
        );
        assert_eq!(layout.page_offset(0, 1.0), 50.0);
        assert_eq!(layout.doc_len(1.0), 500.0);
    }

    #[test]
    fn layout_offsets_are_monotonic() {
        let pages = sizes(&[
            (600.0, 800.0),
            (0.0, 800.0),
            (800.0, 600.0),
            (300.0, 2000.0),
            (600.0, -5.0),
            (600.0, 800.0),
        ]);
        for auto_spacing in [false, true] {
            for policy in [FitPolicy::Width, FitPolicy::Height, FitPolicy::Both] {
                let layout = DocumentLayout::new(
                    pages.clone(),
                    LayoutOptions {
                        fit_policy: policy,
                        spacing_px: 12.0,
                        auto_spacing,
                        ..LayoutOptions::default()
                    },
                    PageSize::new(320.0, 480.0),
                );
                for i in 0..layout.page_count() - 1 {
                    let next = layout.page_offset(i + 1, 1.0) + layout.page_spacing(i, 1.0);
                    let end = layout.page_offset(i, 1.0) + layout.page_length(i, 1.0);
                    assert!(next >= end, "page {i}: {next} < {end} ({policy:?})");
                    assert!(layout.page_offset(i + 1, 1.0) >= layout.page_offset(i, 1.0));
                }
            }
        }
    }

    #[test]
    fn layout_degenerate_page_has_zero_length() {
        let layout = DocumentLayout::new(
            sizes(&[(600.0, 800.0), (0.0, 0.0), (600.0, 800.0)]),
            LayoutOptions::default(),
            PageSize::new(300.0, 500.0),
        );
        assert_eq!(layout.page_size(1), PageSize::zero());
        assert_eq!(layout.page_offset(1, 1.0), 400.0);
        assert_eq!(layout.page_offset(2, 1.0), 400.0);
        assert_eq!(layout.doc_len(1.0), 800.0);
    }

    #[test]
    fn layout_recalculate_is_idempotent() {
        let mut layout = three_pages(LayoutOptions {
            fit_policy: FitPolicy::Both,
            spacing_px: 7.0,
            auto_spacing: true,
            ..LayoutOptions::default()
        });
        let view = PageSize::new(333.0, 517.0);

        layout.recalculate(view);
        let first: Vec<_> = (0..3)
            .map(|i| {
                let size = layout.page_size(i);
                (
                    size.width.to_bits(),
                    size.height.to_bits(),
                    layout.page_offset(i, 1.0).to_bits(),
                )
            })
            .collect();

        layout.recalculate(view);
        let second: Vec<_> = (0..3)
            .map(|i| {
                let size = layout.page_size(i);
                (
                    size.width.to_bits(),
                    size.height.to_bits(),
                    layout.page_offset(i, 1.0).to_bits(),
                )
            })
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn layout_page_at_offset() {
        let layout = three_pages(LayoutOptions::default());

        assert_eq!(layout.page_at_offset(-100.0, 1.0), 0);
        assert_eq!(layout.page_at_offset(0.0, 1.0), 0);
        assert_eq!(layout.page_at_offset(399.0, 1.0), 0);
        assert_eq!(layout.page_at_offset(400.0, 1.0), 1);
        assert_eq!(layout.page_at_offset(1000.0, 1.0), 2);
        assert_eq!(layout.page_at_offset(100_000.0, 1.0), 2);
        assert_eq!(layout.page_at_offset(799.0, 2.0), 0);
        assert_eq!(layout.page_at_offset(800.0, 2.0), 1);
    }

    #[test]
    fn layout_secondary_offset_centres_narrow_pages() {
        let layout = DocumentLayout::new(
            sizes(&[(600.0, 800.0), (300.0, 800.0)]),
            LayoutOptions::default(),
            PageSize::new(300.0, 500.0),
        );
        assert_eq!(layout.secondary_page_offset(0, 1.0), 0.0);
        assert_eq!(layout.secondary_page_offset(1, 1.0), 75.0);
        assert_eq!(layout.secondary_page_offset(1, 2.0), 150.0);
    }

    #[test]
    fn layout_horizontal_axis_uses_widths() {
        let layout = DocumentLayout::new(
            sizes(&[(800.0, 600.0), (400.0, 600.0)]),
            LayoutOptions {
                fit_policy: FitPolicy::Height,
                axis: ScrollAxis::Horizontal,
                spacing_px: 4.0,
                auto_spacing: false,
            },
            PageSize::new(500.0, 300.0),
        );
        assert_eq!(layout.page_size(0), PageSize::new(400.0, 300.0));
        assert_eq!(layout.page_length(0, 1.0), 400.0);
        assert_eq!(layout.page_offset(1, 1.0), 404.0);
        assert_eq!(layout.doc_len(1.0), 604.0);
    }

    #[test]
    fn layout_valid_page_clamps() {
        let layout = three_pages(LayoutOptions::default());
        assert_eq!(layout.valid_page(-3), 0);
        assert_eq!(layout.valid_page(1), 1);
        assert_eq!(layout.valid_page(42), 2);
    }
}
