// ============================================================================
// CONVOLUTION OPS — 3x3 kernels, edge-detection operators
// ============================================================================

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::dispatch::FilterEnv;
use crate::error::FilterError;
use crate::ops::{EdgePolicy, apply_point_filter, sample_edge};

// ============================================================================
// KERNELS
// ============================================================================

/// A 3x3 convolution kernel, row-major.
pub type Kernel3 = [f32; 9];

const SQRT_2: f32 = std::f32::consts::SQRT_2;

pub const SOBEL_H: Kernel3 = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];
pub const SOBEL_V: Kernel3 = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
pub const PREWITT_H: Kernel3 = [-1.0, -1.0, -1.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
pub const PREWITT_V: Kernel3 = [-1.0, 0.0, 1.0, -1.0, 0.0, 1.0, -1.0, 0.0, 1.0];
pub const ROBERTS_H: Kernel3 = [-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
pub const ROBERTS_V: Kernel3 = [0.0, 0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
pub const FREI_CHEN_H: Kernel3 = [-1.0, -SQRT_2, -1.0, 0.0, 0.0, 0.0, 1.0, SQRT_2, 1.0];
pub const FREI_CHEN_V: Kernel3 = [-1.0, 0.0, 1.0, -SQRT_2, 0.0, SQRT_2, -1.0, 0.0, 1.0];
const NONE_KERNEL: Kernel3 = [0.0; 9];

/// Magnitude normalization matching the original edge filter's output range.
const EDGE_SCALE: f32 = 1.8;

// ============================================================================
// GENERIC 3x3 CONVOLUTION
// ============================================================================

/// Convolve every pixel (all four channels) with a 3x3 kernel under the
/// given edge policy. Out-of-bounds taps under `Transparent` contribute
/// nothing.
pub fn convolve3(
    src: &RgbaImage,
    kernel: &Kernel3,
    edge: EdgePolicy,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    let kernel = *kernel;
    apply_point_filter(src, env, move |x, y, _px| {
        let mut sums = [0.0f32; 4];
        for row in 0..3i32 {
            for col in 0..3i32 {
                let weight = kernel[(row * 3 + col) as usize];
                if weight == 0.0 {
                    continue;
                }
                let p = sample_edge(src, x as i32 + col - 1, y as i32 + row - 1, edge);
                for c in 0..4 {
                    sums[c] += weight * p[c] as f32;
                }
            }
        }
        Rgba([
            sums[0].round().clamp(0.0, 255.0) as u8,
            sums[1].round().clamp(0.0, 255.0) as u8,
            sums[2].round().clamp(0.0, 255.0) as u8,
            sums[3].round().clamp(0.0, 255.0) as u8,
        ])
    })
}

// ============================================================================
// EDGE DETECTION
// ============================================================================

/// Edge operator selectable independently per direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeOperator {
    Sobel,
    Prewitt,
    Roberts,
    FreiChen,
    None,
}

impl EdgeOperator {
    fn horizontal_kernel(self) -> Kernel3 {
        match self {
            EdgeOperator::Sobel => SOBEL_H,
            EdgeOperator::Prewitt => PREWITT_H,
            EdgeOperator::Roberts => ROBERTS_H,
            EdgeOperator::FreiChen => FREI_CHEN_H,
            EdgeOperator::None => NONE_KERNEL,
        }
    }

    fn vertical_kernel(self) -> Kernel3 {
        match self {
            EdgeOperator::Sobel => SOBEL_V,
            EdgeOperator::Prewitt => PREWITT_V,
            EdgeOperator::Roberts => ROBERTS_V,
            EdgeOperator::FreiChen => FREI_CHEN_V,
            EdgeOperator::None => NONE_KERNEL,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDetectParams {
    pub horizontal: EdgeOperator,
    pub vertical: EdgeOperator,
    pub edge: EdgePolicy,
    /// Invert the detected edges (white background, dark edges).
    pub invert: bool,
}

impl Default for EdgeDetectParams {
    fn default() -> Self {
        Self {
            horizontal: EdgeOperator::Sobel,
            vertical: EdgeOperator::Sobel,
            edge: EdgePolicy::Clamp,
            invert: false,
        }
    }
}

/// Convolution edge detection: horizontal and vertical kernel responses per
/// channel, combined via magnitude `sqrt(h² + v²)`. Alpha passes through
/// from the source.
pub fn edge_detect(
    src: &RgbaImage,
    params: &EdgeDetectParams,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    let hk = params.horizontal.horizontal_kernel();
    let vk = params.vertical.vertical_kernel();
    let edge = params.edge;
    let invert = params.invert;

    apply_point_filter(src, env, move |x, y, px| {
        let mut h_sums = [0.0f32; 3];
        let mut v_sums = [0.0f32; 3];
        for row in 0..3i32 {
            for col in 0..3i32 {
                let ki = (row * 3 + col) as usize;
                let hw = hk[ki];
                let vw = vk[ki];
                if hw == 0.0 && vw == 0.0 {
                    continue;
                }
                let p = sample_edge(src, x as i32 + col - 1, y as i32 + row - 1, edge);
                for c in 0..3 {
                    h_sums[c] += hw * p[c] as f32;
                    v_sums[c] += vw * p[c] as f32;
                }
            }
        }
        let mut out = [0u8; 4];
        for c in 0..3 {
            let magnitude = (h_sums[c] * h_sums[c] + v_sums[c] * v_sums[c]).sqrt() / EDGE_SCALE;
            let v = magnitude.clamp(0.0, 255.0) as u8;
            out[c] = if invert { v ^ 0xFF } else { v };
        }
        out[3] = px[3];
        Rgba(out)
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;

    fn vertical_split(width: u32, height: u32) -> RgbaImage {
        // left half black, right half white: one vertical edge
        RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    #[test]
    fn identity_kernel_is_identity() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = vertical_split(6, 6);
        let identity: Kernel3 = [0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let out = convolve3(&img, &identity, EdgePolicy::Clamp, &env).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn sobel_finds_the_vertical_edge() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = vertical_split(8, 8);
        let out = edge_detect(&img, &EdgeDetectParams::default(), &env).unwrap();
        // response at the step, silence in flat regions
        assert!(out.get_pixel(4, 4)[0] > 100);
        assert_eq!(out.get_pixel(1, 4)[0], 0);
        assert_eq!(out.get_pixel(6, 4)[0], 0);
    }

    #[test]
    fn none_operators_produce_black() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = vertical_split(6, 6);
        let params = EdgeDetectParams {
            horizontal: EdgeOperator::None,
            vertical: EdgeOperator::None,
            ..Default::default()
        };
        let out = edge_detect(&img, &params, &env).unwrap();
        for p in out.pixels() {
            assert_eq!((p[0], p[1], p[2]), (0, 0, 0));
            assert_eq!(p[3], 255);
        }
    }

    #[test]
    fn invert_flips_the_response() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = vertical_split(8, 8);
        let params = EdgeDetectParams {
            invert: true,
            ..Default::default()
        };
        let out = edge_detect(&img, &params, &env).unwrap();
        assert_eq!(out.get_pixel(1, 4)[0], 255);
    }

    #[test]
    fn wrap_policy_sees_the_seam() {
        let dispatcher = Dispatcher::new(1).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = vertical_split(8, 4);
        // wrapping joins white right edge to black left edge -> response at x=0
        let params = EdgeDetectParams {
            edge: EdgePolicy::Wrap,
            ..Default::default()
        };
        let out = edge_detect(&img, &params, &env).unwrap();
        assert!(out.get_pixel(0, 2)[0] > 100);

        // clamping repeats the border -> x=0 stays flat
        let clamped = edge_detect(&img, &EdgeDetectParams::default(), &env).unwrap();
        assert_eq!(clamped.get_pixel(0, 2)[0], 0);
    }

    #[test]
    fn alpha_passes_through_edge_detection() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let mut img = vertical_split(6, 6);
        img.put_pixel(2, 2, Rgba([0, 0, 0, 77]));
        let out = edge_detect(&img, &EdgeDetectParams::default(), &env).unwrap();
        assert_eq!(out.get_pixel(2, 2)[3], 77);
    }
}
