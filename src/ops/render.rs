// ============================================================================
// PROCEDURAL RENDER OPS — value noise, caustics, wood texture
// ============================================================================
//
// These ops synthesize their output from a captured NoiseContext and a
// parameter snapshot. The context is taken by value: reseeding elsewhere
// produces a new context and cannot disturb a pass in flight.
// ============================================================================

use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::color::{Colormap, LinearColormap, build_lut, fract, smooth_step};
use crate::dispatch::{FilterEnv, row_bands};
use crate::error::FilterError;
use crate::noise::{Interpolation, NoiseContext, noise2, turbulence2, value_noise};
use crate::ops::{apply_point_filter, render_point_filter};
use crate::resize::{ResizePlan, upscale};

// ============================================================================
// VALUE NOISE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueNoiseParams {
    /// User-facing zoom; the sampling frequency is `1/scale`.
    pub scale: f32,
    /// Octave count ("details").
    pub octaves: u32,
    /// Per-octave amplitude decay ("roughness").
    pub persistence: f32,
    pub interpolation: Interpolation,
    pub colormap: LinearColormap,
}

impl Default for ValueNoiseParams {
    fn default() -> Self {
        Self {
            scale: 100.0,
            octaves: 5,
            persistence: 0.6,
            interpolation: Interpolation::Cubic,
            colormap: LinearColormap::new([0, 0, 0, 255], [255, 255, 255, 255]),
        }
    }
}

/// Render a multi-octave value-noise field through the colormap. The output
/// ignores source content entirely, so only dimensions are taken.
pub fn value_noise_render(
    width: u32,
    height: u32,
    params: &ValueNoiseParams,
    ctx: NoiseContext,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    let lut = build_lut(&params.colormap);
    let frequency = 1.0 / params.scale;
    let p = *params;

    render_point_filter(width, height, env, move |x, y| {
        let v = value_noise(
            ctx,
            x as i32,
            y as i32,
            p.octaves,
            frequency,
            p.persistence,
            p.interpolation,
        );
        lut[(v * 255.0) as usize]
    })
}

// ============================================================================
// WOOD TEXTURE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WoodParams {
    pub scale: f32,
    /// Anisotropic stretch along the grain.
    pub stretch: f32,
    /// Grain direction in radians.
    pub angle: f32,
    /// Ring density, 0 to 1.
    pub rings: f32,
    pub turbulence: f32,
    /// Amount of fibre noise added on top of the rings.
    pub fibres: f32,
    /// Smooth-step threshold attenuating the ring pattern.
    pub gain: f32,
    pub colormap: LinearColormap,
}

impl Default for WoodParams {
    fn default() -> Self {
        Self {
            scale: 200.0,
            stretch: 10.0,
            angle: std::f32::consts::FRAC_PI_2,
            rings: 0.5,
            turbulence: 0.0,
            fibres: 0.5,
            gain: 0.8,
            colormap: LinearColormap::wood(),
        }
    }
}

/// Simulated wood grain: rotated, anisotropically scaled noise folded into a
/// periodic ring pattern, attenuated by a smooth-step gain and roughened
/// with a second fibre-noise term.
///
/// Extreme parameter combinations (a zero scale, for one) can drive the
/// field to NaN; those pixels are substituted with the colormap midpoint
/// (0.5) and logged rather than written out.
pub fn wood(
    src: &RgbaImage,
    params: &WoodParams,
    ctx: NoiseContext,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    let cos = params.angle.cos();
    let sin = params.angle.sin();
    let (m00, m01, m10, m11) = (cos, sin, -sin, cos);
    let p = *params;

    apply_point_filter(src, env, move |x, y, _px| {
        let xf = x as f32;
        let yf = y as f32;
        let nx = (m00 * xf + m01 * yf) / p.scale;
        let ny = (m10 * xf + m11 * yf) / (p.scale * p.stretch);

        let mut f = noise2(ctx, nx, ny);
        f += 0.1 * p.turbulence * noise2(ctx, nx * 0.05, ny * 20.0);
        f = f * 0.5 + 0.5;

        f *= p.rings * 50.0;
        f = fract(f);
        f *= 1.0 - smooth_step(p.gain, 1.0, f);

        f += p.fibres * noise2(ctx, nx * p.scale, ny * 50.0);

        if f.is_nan() {
            log::warn!("wood: NaN field value at ({x}, {y}), substituting 0.5");
            f = 0.5;
        }

        p.colormap.color(f)
    })
}

// ============================================================================
// CAUSTICS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CausticsParams {
    /// User-facing zoom; feature size in pixels.
    pub scale: f32,
    /// Brightness added per sample hit.
    pub brightness: u32,
    /// Focus: how sharply the light bands converge.
    pub amount: f32,
    /// Turbulence octaves for the refracting height field (0 = smooth).
    pub turbulence: f32,
    /// Chromatic dispersion: 0 renders white light, higher values separate
    /// the color channels.
    pub dispersion: f32,
    /// Animation offset through the height field.
    pub time: f32,
    /// Jittered samples per pixel (quality).
    pub samples: u32,
    pub bg_color: [u8; 4],
    /// Allow rendering downscaled when the image is large and the field is
    /// smooth (resize-before-filter policy).
    pub accelerate: bool,
}

impl Default for CausticsParams {
    fn default() -> Self {
        Self {
            scale: 100.0,
            brightness: 7,
            amount: 0.5,
            turbulence: 1.0,
            dispersion: 0.0,
            time: 0.0,
            samples: 1,
            bg_color: [0, 200, 175, 255],
            accelerate: true,
        }
    }
}

impl CausticsParams {
    fn plan(&self, width: u32, height: u32) -> ResizePlan {
        if self.accelerate {
            ResizePlan::for_scale(width, height, self.scale)
        } else {
            ResizePlan::full()
        }
    }

    /// Declared work units for a tracked pass on a width x height target.
    pub fn work_units(&self, width: u32, height: u32) -> u32 {
        let plan = self.plan(width, height);
        let (_, down_h) = plan.down_dimensions(width, height);
        // scatter + composite at render resolution, plus the upscale
        2 * down_h + plan.work_units(height)
    }
}

/// Height field the light refracts through.
#[inline]
fn caustics_field(ctx: NoiseContext, x: f32, y: f32, time: f32, turbulence: f32) -> f32 {
    if turbulence == 0.0 {
        noise2(ctx, x + time, y + time)
    } else {
        turbulence2(ctx, x + time, y, turbulence)
    }
}

/// Render refracted-light caustics over a flat background color.
///
/// Each pixel scatters `samples` jittered rays; every ray lands where the
/// local height-field gradient displaces it and deposits a fixed brightness
/// there. Bands accumulate into private grids merged by summation, so the
/// result is identical for any worker count. Large smooth fields render
/// downscaled and are bilinearly upscaled (resize-before-filter policy).
pub fn caustics(
    width: u32,
    height: u32,
    params: &CausticsParams,
    ctx: NoiseContext,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    if width == 0 || height == 0 {
        return Err(FilterError::InvalidGeometry { width, height });
    }

    let plan = params.plan(width, height);
    let (rw, rh) = plan.down_dimensions(width, height);
    let scale = params.scale / plan.factor() as f32;

    let w = rw as usize;
    let h = rh as usize;
    let samples = params.samples.max(1);
    let mut v = params.brightness / samples;
    if v == 0 {
        v = 1;
    }
    let rs = 1.0 / scale.max(1e-6);
    let d = 0.95f32;
    let focus = 0.1 + params.amount;
    let dispersion = params.dispersion;
    let turbulence = params.turbulence;
    let time = params.time;
    let tracker = env.tracker;

    let bands = row_bands(h, env.dispatcher.workers());
    let acc: Vec<[u32; 3]> = env.dispatcher.install(|| {
        bands
            .par_iter()
            .map(|band| {
                let mut grid = vec![[0u32; 3]; w * h];
                for y in band.clone() {
                    for x in 0..w {
                        for s in 0..samples {
                            // deterministic sub-pixel jitter from the hash
                            let jx = 0.5
                                * (ctx.hash_noise((x as u32 * samples + s) as i32, y as i32) + 1.0);
                            let jy = 0.5
                                * (ctx.hash_noise(x as i32, (y as u32 * samples + s) as i32) + 1.0);
                            let sx = x as f32 + jx;
                            let sy = y as f32 + jy;
                            let nx = sx * rs;
                            let ny = sy * rs;

                            let xd = caustics_field(ctx, nx - d, ny, time, turbulence)
                                - caustics_field(ctx, nx + d, ny, time, turbulence);
                            let yd = caustics_field(ctx, nx, ny + d, time, turbulence)
                                - caustics_field(ctx, nx, ny - d, time, turbulence);

                            if dispersion > 0.0 {
                                for c in 0..3usize {
                                    let ca = 1.0 + c as f32 * dispersion;
                                    let tx = (sx + scale * focus * xd * ca) as i32;
                                    let ty = (sy + scale * focus * yd * ca) as i32;
                                    if (0..w as i32).contains(&tx) && (0..h as i32).contains(&ty) {
                                        grid[ty as usize * w + tx as usize][c] += v;
                                    }
                                }
                            } else {
                                let tx = (sx + scale * focus * xd) as i32;
                                let ty = (sy + scale * focus * yd) as i32;
                                if (0..w as i32).contains(&tx) && (0..h as i32).contains(&ty) {
                                    let cell = &mut grid[ty as usize * w + tx as usize];
                                    cell[0] += v;
                                    cell[1] += v;
                                    cell[2] += v;
                                }
                            }
                        }
                    }
                    tracker.unit_done();
                }
                grid
            })
            .reduce(
                || vec![[0u32; 3]; w * h],
                |mut a, b| {
                    for (pa, pb) in a.iter_mut().zip(b.iter()) {
                        pa[0] += pb[0];
                        pa[1] += pb[1];
                        pa[2] += pb[2];
                    }
                    a
                },
            )
    });

    let bg = params.bg_color;
    let rendered = render_point_filter(rw, rh, env, move |x, y| {
        let cell = acc[y as usize * w + x as usize];
        Rgba([
            (bg[0] as u32 + cell[0]).min(255) as u8,
            (bg[1] as u32 + cell[1]).min(255) as u8,
            (bg[2] as u32 + cell[2]).min(255) as u8,
            bg[3],
        ])
    })?;

    if plan.active() {
        let full = upscale(&rendered, width, height);
        tracker.units_done(height);
        Ok(full)
    } else {
        Ok(rendered)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;
    use crate::progress::{DebugTracker, ProgressTracker};

    fn ctx() -> NoiseContext {
        NoiseContext::from_seeds(45_289, 561_337, 764_033_219)
    }

    #[test]
    fn value_noise_render_is_deterministic_across_worker_counts() {
        let params = ValueNoiseParams::default();
        let single = Dispatcher::new(1).unwrap();
        let multi = Dispatcher::new(4).unwrap();
        let a = value_noise_render(32, 24, &params, ctx(), &FilterEnv::untracked(&single)).unwrap();
        let b = value_noise_render(32, 24, &params, ctx(), &FilterEnv::untracked(&multi)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn value_noise_render_preserves_dimensions() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let out = value_noise_render(17, 9, &ValueNoiseParams::default(), ctx(), &env).unwrap();
        assert_eq!(out.dimensions(), (17, 9));
    }

    #[test]
    fn value_noise_render_rejects_zero_geometry() {
        let dispatcher = Dispatcher::new(1).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let result = value_noise_render(0, 0, &ValueNoiseParams::default(), ctx(), &env);
        assert!(matches!(result, Err(FilterError::InvalidGeometry { .. })));
    }

    #[test]
    fn wood_maps_every_pixel_through_the_colormap() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let src = RgbaImage::new(16, 16);
        let params = WoodParams::default();
        let out = wood(&src, &params, ctx(), &env).unwrap();
        assert_eq!(out.dimensions(), (16, 16));
        for p in out.pixels() {
            assert_eq!(p[3], 255);
        }
    }

    #[test]
    fn wood_survives_zero_scale() {
        // scale 0 divides the coordinates to infinity; the NaN guard and the
        // colormap clamp must keep the output defined
        let dispatcher = Dispatcher::new(1).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let src = RgbaImage::new(4, 4);
        let params = WoodParams {
            scale: 0.0,
            ..Default::default()
        };
        let out = wood(&src, &params, ctx(), &env).unwrap();
        assert_eq!(out.dimensions(), (4, 4));
    }

    #[test]
    fn caustics_is_deterministic_across_worker_counts() {
        let params = CausticsParams::default();
        let single = Dispatcher::new(1).unwrap();
        let multi = Dispatcher::new(4).unwrap();
        let a = caustics(24, 16, &params, ctx(), &FilterEnv::untracked(&single)).unwrap();
        let b = caustics(24, 16, &params, ctx(), &FilterEnv::untracked(&multi)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn caustics_accounts_its_declared_work() {
        let dispatcher = Dispatcher::new(2).unwrap();
        let params = CausticsParams::default();
        let tracker = DebugTracker::new(params.work_units(20, 14));
        let env = FilterEnv::new(&dispatcher, &tracker);
        caustics(20, 14, &params, ctx(), &env).unwrap();
        tracker.finished();
        assert_eq!(tracker.received(), tracker.expected());
    }

    #[test]
    fn caustics_zero_brightness_still_deposits_minimum() {
        let dispatcher = Dispatcher::new(1).unwrap();
        let env = FilterEnv::untracked(&dispatcher);
        let params = CausticsParams {
            brightness: 0,
            ..Default::default()
        };
        // must not divide to a zero deposit and render only background
        let out = caustics(12, 12, &params, ctx(), &env).unwrap();
        let bg = Rgba([0, 200, 175, 255]);
        assert!(out.pixels().any(|&p| p != bg));
    }
}
