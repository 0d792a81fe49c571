// ============================================================================
// DISTORTION OPS — kaleidoscope, pixelate/brick, rays
// ============================================================================

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::dispatch::FilterEnv;
use crate::error::FilterError;
use crate::color::triangle;
use crate::ops::{EdgePolicy, Sampling, apply_point_filter, apply_transform_filter, sample_clamped};
use crate::resize::{ResizePlan, downscale, upscale};

// ============================================================================
// KALEIDOSCOPE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KaleidoscopeParams {
    /// Mirror center, relative to the image (0..1).
    pub center_x: f32,
    pub center_y: f32,
    /// Rotation of the source wedge.
    pub angle: f32,
    /// Rotation applied to the folded result.
    pub rotate_result: f32,
    /// Number of angular mirror sectors.
    pub sides: u32,
    /// Zoom into the sampled wedge (1 = none).
    pub zoom: f32,
    pub edge: EdgePolicy,
    pub sampling: Sampling,
}

impl Default for KaleidoscopeParams {
    fn default() -> Self {
        Self {
            center_x: 0.5,
            center_y: 0.5,
            angle: 0.0,
            rotate_result: 0.0,
            sides: 3,
            zoom: 1.0,
            edge: EdgePolicy::Clamp,
            sampling: Sampling::Bilinear,
        }
    }
}

/// Mirror the image across N angular sectors around a center: destination
/// angles are folded through a triangle wave into a single source wedge
/// before inverse sampling. Zero sides is degenerate and returns the source
/// unchanged.
pub fn kaleidoscope(
    src: &RgbaImage,
    params: &KaleidoscopeParams,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    if params.sides == 0 {
        return Ok(src.clone());
    }

    let icx = params.center_x * src.width() as f32;
    let icy = params.center_y * src.height() as f32;
    let zoom = params.zoom.max(0.01);
    let p = *params;

    apply_transform_filter(src, env, p.edge, p.sampling, move |x, y| {
        let dx = x - icx;
        let dy = y - icy;
        let r = (dx * dx + dy * dy).sqrt() / zoom;

        let mut theta = dy.atan2(dx) - p.angle - p.rotate_result;
        theta = triangle(theta / std::f32::consts::PI * p.sides as f32 * 0.5);
        theta += p.angle;

        (icx + r * theta.cos(), icy + r * theta.sin())
    })
}

// ============================================================================
// PIXELATE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelGrid {
    Square,
    /// Rows of double-width cells, every other row offset by half a cell.
    Brick,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelateStyle {
    /// Flat cell fill.
    Flat,
    /// Cell fill shaded by an embossed grid mask.
    ThreeD,
    /// Cell fill shaded by its own luminance relief.
    Embedded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelateParams {
    pub cell_size: u32,
    pub grid: PixelGrid,
    pub style: PixelateStyle,
}

impl Default for PixelateParams {
    fn default() -> Self {
        Self {
            cell_size: 20,
            grid: PixelGrid::Square,
            style: PixelateStyle::Flat,
        }
    }
}

/// Cell geometry shared by the averaging and fill passes.
#[derive(Clone, Copy)]
struct CellLayout {
    cell_w: u32,
    cell_h: u32,
    cols: u32,
    brick: bool,
}

impl CellLayout {
    fn new(width: u32, params: &PixelateParams) -> Self {
        let (cell_w, cell_h) = match params.grid {
            PixelGrid::Square => (params.cell_size, params.cell_size),
            PixelGrid::Brick => (params.cell_size * 2, params.cell_size),
        };
        Self {
            cell_w,
            cell_h,
            // brick offsetting can push pixels into one extra column
            cols: width.div_ceil(cell_w) + 1,
            brick: matches!(params.grid, PixelGrid::Brick),
        }
    }

    /// Cell index for a pixel. Odd brick rows shift right by half a cell.
    #[inline]
    fn cell_of(&self, x: u32, y: u32) -> (u32, u32) {
        let row = y / self.cell_h;
        let shifted_x = if self.brick && row % 2 == 1 {
            x + self.cell_w / 2
        } else {
            x
        };
        (shifted_x / self.cell_w, row)
    }

    #[inline]
    fn index(&self, col: u32, row: u32) -> usize {
        (row * self.cols + col) as usize
    }
}

/// Luminance in [0, 1].
#[inline]
fn luminance(p: Rgba<u8>) -> f32 {
    (0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32) / 255.0
}

/// Replace each grid cell with its average color; optionally shade the
/// result with a bump-mapped grid/brick mask (`ThreeD`) or its own
/// luminance relief (`Embedded`). Cell sizes below 2 are degenerate and
/// return the source unchanged.
pub fn pixelate(
    src: &RgbaImage,
    params: &PixelateParams,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    if params.cell_size < 2 {
        return Ok(src.clone());
    }
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return Ok(src.clone());
    }

    let layout = CellLayout::new(width, params);
    let rows = height.div_ceil(layout.cell_h);

    // accumulate cell averages in one sequential sweep (cheap next to the
    // fill pass), then fill in parallel
    let mut sums = vec![[0u64; 5]; (layout.cols * rows) as usize];
    for (x, y, p) in src.enumerate_pixels() {
        let (col, row) = layout.cell_of(x, y);
        let cell = &mut sums[layout.index(col, row)];
        cell[0] += p[0] as u64;
        cell[1] += p[1] as u64;
        cell[2] += p[2] as u64;
        cell[3] += p[3] as u64;
        cell[4] += 1;
    }
    let averages: Vec<Rgba<u8>> = sums
        .iter()
        .map(|cell| {
            let n = cell[4].max(1);
            Rgba([
                ((cell[0] + n / 2) / n) as u8,
                ((cell[1] + n / 2) / n) as u8,
                ((cell[2] + n / 2) / n) as u8,
                ((cell[3] + n / 2) / n) as u8,
            ])
        })
        .collect();

    let blocked = apply_point_filter(src, env, |x, y, _px| {
        let (col, row) = layout.cell_of(x, y);
        averages[layout.index(col, row)]
    })?;

    match params.style {
        PixelateStyle::Flat => Ok(blocked),
        PixelateStyle::ThreeD => {
            let gap = if params.cell_size < 15 { 1 } else { 2 };
            let mask = move |x: i32, y: i32| -> f32 {
                let x = x.clamp(0, width as i32 - 1) as u32;
                let y = y.clamp(0, height as i32 - 1) as u32;
                let row = y / layout.cell_h;
                let shifted_x = if layout.brick && row % 2 == 1 {
                    x + layout.cell_w / 2
                } else {
                    x
                };
                if shifted_x % layout.cell_w < gap || y % layout.cell_h < gap {
                    0.5
                } else {
                    1.0
                }
            };
            shade_by_bump(&blocked, env, mask)
        }
        PixelateStyle::Embedded => {
            let relief = blocked.clone();
            let mask = move |x: i32, y: i32| -> f32 { luminance(sample_clamped(&relief, x, y)) };
            shade_by_bump(&blocked, env, mask)
        }
    }
}

/// Emboss shading: the bump field's gradient lit from the top-left scales
/// each pixel's color up (facing the light) or down (facing away).
fn shade_by_bump<F>(
    img: &RgbaImage,
    env: &FilterEnv<'_>,
    bump: F,
) -> Result<RgbaImage, FilterError>
where
    F: Fn(i32, i32) -> f32 + Sync,
{
    const DEPTH: f32 = 2.0;
    const INV_SQRT_2: f32 = std::f32::consts::FRAC_1_SQRT_2;

    apply_point_filter(img, env, move |x, y, px| {
        let xi = x as i32;
        let yi = y as i32;
        let gx = bump(xi + 1, yi) - bump(xi - 1, yi);
        let gy = bump(xi, yi + 1) - bump(xi, yi - 1);
        let shade = 1.0 + DEPTH * (-gx - gy) * INV_SQRT_2;
        let mut out = px;
        for c in 0..3 {
            out[c] = (px[c] as f32 * shade).round().clamp(0.0, 255.0) as u8;
        }
        out
    })
}

// ============================================================================
// RAYS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RaysParams {
    /// Light source, relative to the image (0..1).
    pub center_x: f32,
    pub center_y: f32,
    /// Ray length as the fraction of the distance swept toward the center.
    pub zoom: f32,
    /// Twirl applied along the sweep, in radians.
    pub rotation: f32,
    /// Luminance threshold below which pixels emit no rays.
    pub threshold: f32,
    /// Amplification of the blurred rays.
    pub strength: f32,
    /// Opacity of the additive composite onto the source.
    pub opacity: f32,
    /// Output the rays alone on a transparent background.
    pub rays_only: bool,
    /// Allow the threshold/sweep passes to run downscaled on large images
    /// (resize-before-filter policy).
    pub accelerate: bool,
}

impl Default for RaysParams {
    fn default() -> Self {
        Self {
            center_x: 0.5,
            center_y: 0.5,
            zoom: 0.2,
            rotation: 0.0,
            threshold: 0.25,
            strength: 2.0,
            opacity: 0.8,
            rays_only: false,
            accelerate: true,
        }
    }
}

const RAY_SAMPLES: u32 = 24;

impl RaysParams {
    fn plan(&self, width: u32, height: u32) -> ResizePlan {
        if self.accelerate {
            ResizePlan::for_cost(width, height)
        } else {
            ResizePlan::full()
        }
    }

    /// Declared work units: threshold + sweep at render resolution,
    /// composite at full resolution, plus the upscale when the pass renders
    /// downscaled.
    pub fn work_units(&self, width: u32, height: u32) -> u32 {
        let plan = self.plan(width, height);
        let (_, down_h) = plan.down_dimensions(width, height);
        2 * down_h + height + plan.work_units(height)
    }
}

/// Radiating light rays: bright source areas are swept radially away from a
/// light position and added back over the image.
///
/// Zero zoom or strength returns the source unchanged. On large images the
/// threshold/sweep passes run downscaled and the ray layer is upscaled
/// before compositing (resize-before-filter policy); the progress total
/// accounts resize + filter + composite units so a tracked pass lands on
/// exactly 100%.
pub fn rays(
    src: &RgbaImage,
    params: &RaysParams,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    if params.zoom <= 0.0 || params.strength <= 0.0 {
        return Ok(src.clone());
    }
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return Ok(src.clone());
    }

    let plan = params.plan(width, height);
    let working;
    let working_ref = if plan.active() {
        working = downscale(src, plan);
        &working
    } else {
        src
    };

    // pass 1: keep only luminance above the threshold, scaled back to full
    // range so faint areas fade in smoothly
    let threshold = params.threshold.clamp(0.0, 0.999);
    let bright = apply_point_filter(working_ref, env, move |_x, _y, px| {
        let l = luminance(px);
        let factor = ((l - threshold) / (1.0 - threshold)).max(0.0);
        Rgba([
            (px[0] as f32 * factor) as u8,
            (px[1] as f32 * factor) as u8,
            (px[2] as f32 * factor) as u8,
            255,
        ])
    })?;

    // pass 2: radial sweep toward the light source
    let cx = params.center_x * working_ref.width() as f32;
    let cy = params.center_y * working_ref.height() as f32;
    let sweep = params.zoom.min(0.99);
    let rotation = params.rotation;
    let strength = params.strength;
    let inv_n = 1.0 / RAY_SAMPLES as f32;

    let ray_layer = apply_point_filter(&bright, env, |x, y, _px| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let mut sums = [0.0f32; 3];
        for i in 0..RAY_SAMPLES {
            let progress = i as f32 / (RAY_SAMPLES - 1) as f32;
            let t = 1.0 - sweep * progress;
            let a = rotation * progress;
            let (sin, cos) = a.sin_cos();
            let rx = dx * t * cos - dy * t * sin;
            let ry = dx * t * sin + dy * t * cos;
            let p = sample_clamped(&bright, (cx + rx).round() as i32, (cy + ry).round() as i32);
            for c in 0..3 {
                sums[c] += p[c] as f32;
            }
        }
        Rgba([
            (sums[0] * inv_n * strength).clamp(0.0, 255.0) as u8,
            (sums[1] * inv_n * strength).clamp(0.0, 255.0) as u8,
            (sums[2] * inv_n * strength).clamp(0.0, 255.0) as u8,
            255,
        ])
    })?;

    let ray_layer = if plan.active() {
        let full = upscale(&ray_layer, width, height);
        env.tracker.units_done(height);
        full
    } else {
        ray_layer
    };

    // pass 3: composite
    let opacity = params.opacity.clamp(0.0, 1.0);
    if params.rays_only {
        apply_point_filter(src, env, move |x, y, _px| {
            let r = ray_layer.get_pixel(x, y);
            let alpha = r[0].max(r[1]).max(r[2]);
            Rgba([r[0], r[1], r[2], ((alpha as f32) * opacity) as u8])
        })
    } else {
        apply_point_filter(src, env, move |x, y, px| {
            let r = ray_layer.get_pixel(x, y);
            let mut out = px;
            for c in 0..3 {
                let v = px[c] as f32 + r[c] as f32 * opacity;
                out[c] = v.round().clamp(0.0, 255.0) as u8;
            }
            out
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
