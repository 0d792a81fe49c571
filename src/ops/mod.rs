// ============================================================================
// FILTER FRAMEWORKS — point-wise and inverse-transform mapping over images
// ============================================================================
//
// Every op in the submodules is a pure function of (source buffer, parameter
// snapshot) -> destination buffer. The frameworks here own the shared loop
// structure: row-band parallel iteration, out-of-bounds sampling policy, and
// fractional-coordinate sampling.
// ============================================================================

pub mod adjust;
pub mod blur;
pub mod distort;
pub mod edges;
pub mod render;

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::dispatch::{FilterEnv, run_bands};
use crate::error::FilterError;

// ============================================================================
// EDGE POLICY
// ============================================================================

/// How out-of-bounds source coordinates are resolved, applied consistently
/// on all four borders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgePolicy {
    /// Repeat the edge pixel.
    Clamp,
    /// Toroidal wraparound.
    Wrap,
    /// Out-of-bounds reads as fully transparent black.
    Transparent,
}

#[inline]
fn resolve_coord(v: i32, len: i32, edge: EdgePolicy) -> Option<i32> {
    if (0..len).contains(&v) {
        return Some(v);
    }
    match edge {
        EdgePolicy::Clamp => Some(v.clamp(0, len - 1)),
        EdgePolicy::Wrap => Some(v.rem_euclid(len)),
        EdgePolicy::Transparent => None,
    }
}

/// Sample at integer coordinates under an edge policy.
#[inline]
pub fn sample_edge(img: &RgbaImage, x: i32, y: i32, edge: EdgePolicy) -> Rgba<u8> {
    let w = img.width() as i32;
    let h = img.height() as i32;
    match (resolve_coord(x, w, edge), resolve_coord(y, h, edge)) {
        (Some(sx), Some(sy)) => *img.get_pixel(sx as u32, sy as u32),
        _ => Rgba([0, 0, 0, 0]),
    }
}

/// Sample at integer coordinates, clamping into bounds.
#[inline]
pub fn sample_clamped(img: &RgbaImage, x: i32, y: i32) -> Rgba<u8> {
    let cx = x.clamp(0, img.width() as i32 - 1) as u32;
    let cy = y.clamp(0, img.height() as i32 - 1) as u32;
    *img.get_pixel(cx, cy)
}

// ============================================================================
// FRACTIONAL SAMPLING
// ============================================================================

/// Source-sampling mode for transform filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sampling {
    Nearest,
    Bilinear,
}

/// Bilinear-sample at fractional coordinates under an edge policy.
#[inline]
pub fn sample_bilinear(img: &RgbaImage, fx: f32, fy: f32, edge: EdgePolicy) -> Rgba<u8> {
    let x0 = fx.floor() as i32;
    let y0 = fy.floor() as i32;
    let dx = fx - x0 as f32;
    let dy = fy - y0 as f32;

    let p00 = sample_edge(img, x0, y0, edge);
    let p10 = sample_edge(img, x0 + 1, y0, edge);
    let p01 = sample_edge(img, x0, y0 + 1, edge);
    let p11 = sample_edge(img, x0 + 1, y0 + 1, edge);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let v = p00[c] as f32 * (1.0 - dx) * (1.0 - dy)
            + p10[c] as f32 * dx * (1.0 - dy)
            + p01[c] as f32 * (1.0 - dx) * dy
            + p11[c] as f32 * dx * dy;
        out[c] = (v + 0.5) as u8;
    }
    Rgba(out)
}

// ============================================================================
// POINT-WISE FRAMEWORK
// ============================================================================

/// Map `dest[x,y] = f(x, y, src[x,y])` over the whole image, parallelized by
/// row-band. `f` must be side-effect-free: rows are processed concurrently
/// and in no guaranteed order.
pub fn apply_point_filter<F>(
    src: &RgbaImage,
    env: &FilterEnv<'_>,
    f: F,
) -> Result<RgbaImage, FilterError>
where
    F: Fn(u32, u32, Rgba<u8>) -> Rgba<u8> + Sync,
{
    let (width, height) = src.dimensions();
    let mut dest = RgbaImage::new(width, height);
    let src_raw = src.as_raw();
    let stride = width as usize * 4;

    run_bands(&mut dest, env, |y_start, band| {
        for (dy, row_out) in band.chunks_mut(stride).enumerate() {
            let y = y_start + dy;
            let row_in = &src_raw[y * stride..(y + 1) * stride];
            for x in 0..width as usize {
                let pi = x * 4;
                let p = Rgba([row_in[pi], row_in[pi + 1], row_in[pi + 2], row_in[pi + 3]]);
                let q = f(x as u32, y as u32, p);
                row_out[pi..pi + 4].copy_from_slice(&q.0);
            }
        }
        Ok(())
    })?;
    Ok(dest)
}

/// Synthesize an image from coordinates alone (no source reads).
pub fn render_point_filter<F>(
    width: u32,
    height: u32,
    env: &FilterEnv<'_>,
    f: F,
) -> Result<RgbaImage, FilterError>
where
    F: Fn(u32, u32) -> Rgba<u8> + Sync,
{
    if width == 0 || height == 0 {
        return Err(FilterError::InvalidGeometry { width, height });
    }
    let mut dest = RgbaImage::new(width, height);
    let stride = width as usize * 4;

    run_bands(&mut dest, env, |y_start, band| {
        for (dy, row_out) in band.chunks_mut(stride).enumerate() {
            let y = (y_start + dy) as u32;
            for x in 0..width as usize {
                let pi = x * 4;
                let q = f(x as u32, y);
                row_out[pi..pi + 4].copy_from_slice(&q.0);
            }
        }
        Ok(())
    })?;
    Ok(dest)
}

// ============================================================================
// INVERSE-TRANSFORM FRAMEWORK
// ============================================================================

/// Geometric distortion by inverse mapping: for every destination pixel the
/// `inverse` function names the source coordinate to sample, which is then
/// fetched under the given edge policy and sampling mode.
pub fn apply_transform_filter<F>(
    src: &RgbaImage,
    env: &FilterEnv<'_>,
    edge: EdgePolicy,
    sampling: Sampling,
    inverse: F,
) -> Result<RgbaImage, FilterError>
where
    F: Fn(f32, f32) -> (f32, f32) + Sync,
{
    let (width, height) = src.dimensions();
    let mut dest = RgbaImage::new(width, height);
    let stride = width as usize * 4;

    run_bands(&mut dest, env, |y_start, band| {
        for (dy, row_out) in band.chunks_mut(stride).enumerate() {
            let y = y_start + dy;
            for x in 0..width as usize {
                let (sx, sy) = inverse(x as f32, y as f32);
                let q = match sampling {
                    Sampling::Nearest => {
                        sample_edge(src, sx.round() as i32, sy.round() as i32, edge)
                    }
                    Sampling::Bilinear => sample_bilinear(src, sx, sy, edge),
                };
                let pi = x * 4;
                row_out[pi..pi + 4].copy_from_slice(&q.0);
            }
        }
        Ok(())
    })?;
    Ok(dest)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;

    fn checker(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    #[test]
    fn wrap_edge_reads_opposite_side() {
        let img = RgbaImage::from_fn(4, 1, |x, _| Rgba([x as u8, 0, 0, 255]));
        let p = sample_edge(&img, -1, 0, EdgePolicy::Wrap);
        assert_eq!(p[0], 3);
    }

    #[test]
    fn clamp_edge_repeats_border() {
        let img = RgbaImage::from_fn(4, 1, |x, _| Rgba([x as u8, 0, 0, 255]));
        assert_eq!(sample_edge(&img, -5, 0, EdgePolicy::Clamp)[0], 0);
        assert_eq!(sample_edge(&img, 9, 0, EdgePolicy::Clamp)[0], 3);
    }

    #[test]
    fn transparent_edge_reads_zero_alpha() {
        let img = checker(3, 3);
        assert_eq!(sample_edge(&img, -1, 0, EdgePolicy::Transparent), Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn point_filter_preserves_dimensions_and_maps_pixels() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = checker(5, 7);
        let out = apply_point_filter(&img, &env, |_, _, p| {
            Rgba([p[0] ^ 0xFF, p[1], p[2], p[3]])
        })
        .unwrap();
        assert_eq!(out.dimensions(), (5, 7));
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn identity_transform_is_identity() {
        let dispatcher = Dispatcher::new(1).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let img = checker(6, 4);
        let out = apply_transform_filter(&img, &env, EdgePolicy::Clamp, Sampling::Nearest, |x, y| {
            (x, y)
        })
        .unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn render_rejects_zero_geometry() {
        let dispatcher = Dispatcher::new(1).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let result = render_point_filter(0, 5, &env, |_, _| Rgba([0, 0, 0, 0]));
        assert!(matches!(result, Err(FilterError::InvalidGeometry { .. })));
    }
}
