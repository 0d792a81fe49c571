// ============================================================================
// RESIZE-BEFORE-FILTER ACCELERATION
// ============================================================================
//
// Expensive smooth-field filters (caustics, rays) can run at a reduced
// resolution and have their result scaled back up: the fields they render
// vary slowly, so bilinear upscaling stays within interpolation tolerance of
// the full-resolution output. This is a performance policy, not a
// correctness requirement — factor 1 means the plan is inactive and the
// filter runs at full resolution.
// ============================================================================

use image::RgbaImage;
use image::imageops::{self, FilterType};

/// Pixel count above which the acceleration engages.
const COST_THRESHOLD_PIXELS: u32 = 1_500_000;

/// Pixel count above which the stronger reduction is used.
const LARGE_THRESHOLD_PIXELS: u32 = 6_000_000;

/// Scale parameter below which features are too fine to survive downscaling.
const MIN_SMOOTH_SCALE: f32 = 50.0;

/// Decision on whether a filter pass should render downscaled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResizePlan {
    factor: u32,
}

impl ResizePlan {
    /// Full-resolution plan.
    pub fn full() -> Self {
        Self { factor: 1 }
    }

    /// Decide for an image of the given size and a filter whose feature size
    /// is governed by `scale` (the user-facing zoom). Small scales mean fine
    /// detail that would be destroyed by downscaling, so those run full-res
    /// regardless of cost.
    pub fn for_scale(width: u32, height: u32, scale: f32) -> Self {
        if scale < MIN_SMOOTH_SCALE {
            return Self::full();
        }
        Self::for_cost(width, height)
    }

    /// Decide on pixel count alone, for filters whose output is smooth at
    /// any parameter setting.
    pub fn for_cost(width: u32, height: u32) -> Self {
        let pixels = width.saturating_mul(height);
        let factor = if pixels <= COST_THRESHOLD_PIXELS {
            1
        } else if pixels <= LARGE_THRESHOLD_PIXELS {
            2
        } else {
            4
        };
        Self { factor }
    }

    pub fn active(&self) -> bool {
        self.factor > 1
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    /// Dimensions the filter actually renders at. Never below 1x1.
    pub fn down_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        ((width / self.factor).max(1), (height / self.factor).max(1))
    }

    /// Work units the resize steps contribute to a tracked pass: one unit
    /// per output row of the upscale (the downscale on a generator pass is
    /// free — it renders small instead of shrinking).
    pub fn work_units(&self, full_height: u32) -> u32 {
        if self.active() { full_height } else { 0 }
    }
}

/// Bilinear downscale to the plan's reduced dimensions.
pub fn downscale(img: &RgbaImage, plan: ResizePlan) -> RgbaImage {
    let (w, h) = plan.down_dimensions(img.width(), img.height());
    imageops::resize(img, w, h, FilterType::Triangle)
}

/// Bilinear upscale back to the full dimensions.
pub fn upscale(img: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    imageops::resize(img, width, height, FilterType::Triangle)
}
