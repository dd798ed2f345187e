//! Page geometry: fit policies, offsets and scroll navigation

mod document;
mod fit;
mod navigation;

pub use document::{DocumentLayout, LayoutOptions, ScrollAxis};
pub use fit::{FitPolicy, PageSize, PageSizeCalculator, fit_both, fit_height, fit_width};
pub use navigation::{Navigator, SnapEdge};
