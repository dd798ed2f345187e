//! Fit policies and per-page size calculation

use serde::{Deserialize, Serialize};

/// Which viewport axis governs page scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// Widest page fills the viewport width
    #[default]
    Width,
    /// Tallest page fills the viewport height
    Height,
    /// Pages fit inside the viewport on both axes
    Both,
}

impl FitPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitPolicy::Width => "width",
            FitPolicy::Height => "height",
            FitPolicy::Both => "both",
        }
    }
}

/// Width and height pair, in points for natural sizes and pixels once scaled
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// True when either dimension is zero or negative
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    #[must_use]
    pub fn scaled(&self, factor: f32) -> Self {
        Self::new(self.width * factor, self.height * factor)
    }
}

/// Derives scaled page sizes from a single global ratio per axis.
///
/// The widest and tallest pages of the document are fitted to the viewport
/// first; every other page reuses the resulting ratio so pages keep their
/// relative proportions.
#[derive(Clone, Debug)]
pub struct PageSizeCalculator {
    policy: FitPolicy,
    optimal_max_width_page: PageSize,
    optimal_max_height_page: PageSize,
    width_ratio: f32,
    height_ratio: f32,
}

impl PageSizeCalculator {
    #[must_use]
    pub fn new(
        policy: FitPolicy,
        max_width_page: PageSize,
        max_height_page: PageSize,
        view: PageSize,
    ) -> Self {
        let mut calc = Self {
            policy,
            optimal_max_width_page: PageSize::zero(),
            optimal_max_height_page: PageSize::zero(),
            width_ratio: 0.0,
            height_ratio: 0.0,
        };
        if !max_width_page.is_degenerate() && !max_height_page.is_degenerate() {
            calc.calculate_max_pages(max_width_page, max_height_page, view);
        }
        calc
    }

    fn calculate_max_pages(&mut self, max_width: PageSize, max_height: PageSize, view: PageSize) {
        match self.policy {
            FitPolicy::Height => {
                self.optimal_max_height_page = fit_height(max_height, view.height);
                self.height_ratio = self.optimal_max_height_page.height / max_height.height;
                self.optimal_max_width_page =
                    fit_height(max_width, max_width.height * self.height_ratio);
            }
            FitPolicy::Both => {
                let local_max_width = fit_both(max_width, view.width, view.height);
                let local_width_ratio = local_max_width.width / max_width.width;
                self.optimal_max_height_page = fit_both(
                    max_height,
                    max_height.width * local_width_ratio,
                    view.height,
                );
                self.height_ratio = self.optimal_max_height_page.height / max_height.height;
                self.optimal_max_width_page = fit_both(
                    max_width,
                    view.width,
                    max_width.height * self.height_ratio,
                );
                self.width_ratio = self.optimal_max_width_page.width / max_width.width;
            }
            FitPolicy::Width => {
                self.optimal_max_width_page = fit_width(max_width, view.width);
                self.width_ratio = self.optimal_max_width_page.width / max_width.width;
                self.optimal_max_height_page =
                    fit_width(max_height, max_height.width * self.width_ratio);
            }
        }
    }

    /// Scaled size for one page; degenerate pages collapse to zero
    #[must_use]
    pub fn calculate(&self, page: PageSize) -> PageSize {
        if page.is_degenerate() {
            return PageSize::zero();
        }

        match self.policy {
            FitPolicy::Height => fit_height(page, page.height * self.height_ratio),
            FitPolicy::Both => fit_both(
                page,
                page.width * self.width_ratio,
                page.height * self.height_ratio,
            ),
            FitPolicy::Width => fit_width(page, page.width * self.width_ratio),
        }
    }

    #[must_use]
    pub fn optimal_max_width_page(&self) -> PageSize {
        self.optimal_max_width_page
    }

    #[must_use]
    pub fn optimal_max_height_page(&self) -> PageSize {
        self.optimal_max_height_page
    }

    #[must_use]
    pub fn width_ratio(&self) -> f32 {
        self.width_ratio
    }

    #[must_use]
    pub fn height_ratio(&self) -> f32 {
        self.height_ratio
    }
}

/// Width becomes `max_width`, height follows the aspect ratio (floored)
#[must_use]
pub fn fit_width(page: PageSize, max_width: f32) -> PageSize {
    let ratio = page.width / page.height;
    PageSize::new(max_width, (max_width / ratio).floor())
}

/// Height becomes `max_height`, width follows the aspect ratio (floored)
#[must_use]
pub fn fit_height(page: PageSize, max_height: f32) -> PageSize {
    let ratio = page.height / page.width;
    PageSize::new((max_height / ratio).floor(), max_height)
}

/// Fit width first and fall back to fitting height when the result is too tall
#[must_use]
pub fn fit_both(page: PageSize, max_width: f32, max_height: f32) -> PageSize {
    let ratio = page.width / page.height;
    let height = (max_width / ratio).floor();
    if height > max_height {
        PageSize::new((max_height * ratio).floor(), max_height)
    } else {
        PageSize::new(max_width, height)
    }
}
