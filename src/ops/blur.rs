// ============================================================================
// BLUR OPS — iterated separable box blur, glow
// ============================================================================

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::color::{is_fully_opaque, premultiply, unpremultiply};
use crate::dispatch::{FilterEnv, run_bands_on};
use crate::error::FilterError;
use crate::ops::apply_point_filter;

// ============================================================================
// BOX BLUR
// ============================================================================

/// Separable box kernel, iterated. Iterating the kernel `iterations` times
/// approximates a Gaussian — the count is an explicit quality knob, never
/// derived from the radius.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxBlurParams {
    pub h_radius: f32,
    pub v_radius: f32,
    pub iterations: u32,
    /// Blur premultiplied color channels to avoid fringing at partially
    /// transparent edges. Skipped automatically when the source is fully
    /// opaque.
    pub premultiply: bool,
}

impl Default for BoxBlurParams {
    fn default() -> Self {
        Self {
            h_radius: 0.0,
            v_radius: 0.0,
            iterations: 3,
            premultiply: true,
        }
    }
}

impl BoxBlurParams {
    pub fn radius(radius: f32) -> Self {
        Self {
            h_radius: radius,
            v_radius: radius,
            ..Default::default()
        }
    }

    /// Work units a tracked pass reports: one per row per directional pass.
    pub fn work_units(&self, height: u32) -> u32 {
        let passes = (self.h_radius > 0.0) as u32 + (self.v_radius > 0.0) as u32;
        self.iterations * passes * height
    }
}

/// One horizontal box pass over an f32 working buffer. The kernel has
/// `2*floor(radius)+1` full taps plus two fractional outer taps, so
/// non-integer radii blend smoothly. Edges clamp.
fn box_pass_h(
    src: &[f32],
    dst: &mut [f32],
    width: usize,
    radius: f32,
    env: &FilterEnv<'_>,
) -> Result<(), FilterError> {
    let stride = width * 4;
    let r = radius.floor() as i32;
    let frac = radius - r as f32;
    let divisor = (2 * r + 1) as f32 + 2.0 * frac;

    run_bands_on(dst, stride, env, |y_start, band| {
        for (dy, row_out) in band.chunks_mut(stride).enumerate() {
            let row_in = &src[(y_start + dy) * stride..(y_start + dy + 1) * stride];
            for x in 0..width {
                let mut sums = [0.0f32; 4];
                for k in -r..=r {
                    let sx = (x as i32 + k).clamp(0, width as i32 - 1) as usize;
                    for c in 0..4 {
                        sums[c] += row_in[sx * 4 + c];
                    }
                }
                if frac > 0.0 {
                    let lo = (x as i32 - r - 1).clamp(0, width as i32 - 1) as usize;
                    let hi = (x as i32 + r + 1).clamp(0, width as i32 - 1) as usize;
                    for c in 0..4 {
                        sums[c] += frac * (row_in[lo * 4 + c] + row_in[hi * 4 + c]);
                    }
                }
                for c in 0..4 {
                    row_out[x * 4 + c] = sums[c] / divisor;
                }
            }
        }
        Ok(())
    })
}

/// One vertical box pass; same kernel shape as [`box_pass_h`].
fn box_pass_v(
    src: &[f32],
    dst: &mut [f32],
    width: usize,
    height: usize,
    radius: f32,
    env: &FilterEnv<'_>,
) -> Result<(), FilterError> {
    let stride = width * 4;
    let r = radius.floor() as i32;
    let frac = radius - r as f32;
    let divisor = (2 * r + 1) as f32 + 2.0 * frac;

    run_bands_on(dst, stride, env, |y_start, band| {
        for (dy, row_out) in band.chunks_mut(stride).enumerate() {
            let y = (y_start + dy) as i32;
            for x in 0..width {
                let mut sums = [0.0f32; 4];
                for k in -r..=r {
                    let sy = (y + k).clamp(0, height as i32 - 1) as usize;
                    for c in 0..4 {
                        sums[c] += src[sy * stride + x * 4 + c];
                    }
                }
                if frac > 0.0 {
                    let lo = (y - r - 1).clamp(0, height as i32 - 1) as usize;
                    let hi = (y + r + 1).clamp(0, height as i32 - 1) as usize;
                    for c in 0..4 {
                        sums[c] += frac * (src[lo * stride + x * 4 + c] + src[hi * stride + x * 4 + c]);
                    }
                }
                for c in 0..4 {
                    row_out[x * 4 + c] = sums[c] / divisor;
                }
            }
        }
        Ok(())
    })
}

/// Iterated separable box blur.
///
/// Zero radius on both axes returns the source unchanged without touching
/// the kernel loop, as does a 1-pixel-wide or 1-pixel-tall image (no defined
/// neighbor to difference against).
pub fn box_blur(
    src: &RgbaImage,
    params: &BoxBlurParams,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    if (params.h_radius <= 0.0 && params.v_radius <= 0.0) || params.iterations == 0 {
        return Ok(src.clone());
    }
    let (width, height) = src.dimensions();
    if width == 1 || height == 1 {
        return Ok(src.clone());
    }

    let w = width as usize;
    let h = height as usize;

    let premultiplied = params.premultiply && !is_fully_opaque(src);
    let mut staging = src.clone();
    if premultiplied {
        premultiply(&mut staging);
    }

    // ping-pong f32 working buffers
    let mut front: Vec<f32> = staging.as_raw().iter().map(|&v| v as f32).collect();
    let mut back = vec![0.0f32; w * h * 4];

    for _ in 0..params.iterations {
        if params.h_radius > 0.0 {
            box_pass_h(&front, &mut back, w, params.h_radius, env)?;
            std::mem::swap(&mut front, &mut back);
        }
        if params.v_radius > 0.0 {
            box_pass_v(&front, &mut back, w, h, params.v_radius, env)?;
            std::mem::swap(&mut front, &mut back);
        }
    }

    let out_raw: Vec<u8> = front
        .iter()
        .map(|&v| v.round().clamp(0.0, 255.0) as u8)
        .collect();
    let mut out = RgbaImage::from_raw(width, height, out_raw)
        .ok_or(FilterError::InvalidGeometry { width, height })?;
    if premultiplied {
        unpremultiply(&mut out);
    }
    Ok(out)
}

// ============================================================================
// GLOW
// ============================================================================

/// Additive glow: a blurred copy of the image added back onto itself.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlowParams {
    /// Glow contribution, 0 (none) to 1 (full).
    pub amount: f32,
    /// Softness radius of the underlying blur.
    pub radius: f32,
}

impl GlowParams {
    pub fn work_units(&self, height: u32) -> u32 {
        BoxBlurParams::radius(self.radius).work_units(height) + height
    }
}

/// `out = clamp(src + 2*amount*blurred)`, alpha taken from the source.
/// Amount 0 and 1-pixel extents short-circuit to the unchanged source.
pub fn glow(
    src: &RgbaImage,
    params: &GlowParams,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    if params.amount == 0.0 {
        return Ok(src.clone());
    }
    if src.width() == 1 || src.height() == 1 {
        return Ok(src.clone());
    }

    let blurred = box_blur(src, &BoxBlurParams::radius(params.radius), env)?;
    let gain = 2.0 * params.amount;

    apply_point_filter(src, env, move |x, y, px| {
        let b = blurred.get_pixel(x, y);
        let mut out = px;
        for c in 0..3 {
            let v = px[c] as f32 + gain * b[c] as f32;
            out[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        out
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::progress::{DebugTracker, ProgressTracker};
    use image::Rgba;

    #[test]
    fn zero_radius_short_circuits() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(4, 4, Rgba([9, 8, 7, 255]));
        let out = box_blur(&img, &BoxBlurParams::radius(0.0), &env).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn one_pixel_extent_short_circuits() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(1, 16, Rgba([9, 8, 7, 255]));
        let out = box_blur(&img, &BoxBlurParams::radius(3.0), &env).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn uniform_image_is_blur_invariant() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(8, 8, Rgba([100, 150, 200, 255]));
        let out = box_blur(&img, &BoxBlurParams::radius(2.0), &env).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn blur_spreads_an_impulse() {
        let dispatcher = Dispatcher::new(1).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let mut img = RgbaImage::from_pixel(9, 9, Rgba([0, 0, 0, 255]));
        img.put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let out = box_blur(&img, &BoxBlurParams::radius(1.0), &env).unwrap();
        assert!(out.get_pixel(4, 4)[0] < 255);
        assert!(out.get_pixel(3, 4)[0] > 0);
        assert!(out.get_pixel(4, 3)[0] > 0);
    }

    #[test]
    fn blur_reports_declared_work_units() {
        let dispatcher = Dispatcher::new(3).unwrap();
        let params = BoxBlurParams::radius(2.0);
        let tracker = DebugTracker::new(params.work_units(12));
        let env = FilterEnv::new(&dispatcher, &tracker);
        let img = RgbaImage::from_pixel(6, 12, Rgba([40, 40, 40, 255]));
        box_blur(&img, &params, &env).unwrap();
        tracker.finished();
        assert_eq!(tracker.received(), tracker.expected());
    }

    #[test]
    fn glow_zero_amount_short_circuits() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(5, 5, Rgba([10, 20, 30, 255]));
        let params = GlowParams {
            amount: 0.0,
            radius: 4.0,
        };
        let out = glow(&img, &params, &env).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn glow_brightens_bright_regions() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(8, 8, Rgba([100, 100, 100, 255]));
        let params = GlowParams {
            amount: 0.5,
            radius: 2.0,
        };
        let out = glow(&img, &params, &env).unwrap();
        assert!(out.get_pixel(4, 4)[0] > 100);
        assert_eq!(out.get_pixel(4, 4)[3], 255);
    }
}
