// ============================================================================
// ADJUSTMENT OPS — hue/saturation/brightness shift, channel invert
// ============================================================================

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::color::{clamp01, hsb_to_rgb, rgb_to_hsb, rgba_to_argb, unpack_argb};
use crate::dispatch::FilterEnv;
use crate::error::FilterError;
use crate::ops::apply_point_filter;

// ============================================================================
// HUE / SATURATION / BRIGHTNESS
// ============================================================================

/// Normalized shifts: hue in turns (0.5 = 180°), saturation and brightness
/// as additive offsets in [-1, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HueSatParams {
    pub hue_shift: f32,
    pub sat_shift: f32,
    pub bri_shift: f32,
}

/// Shift hue/saturation/brightness per pixel through an HSB round trip.
///
/// All-zero shifts return the source unchanged (identity, not merely
/// visually equal). Fully transparent pixels pass through untouched so they
/// are never recolored.
pub fn hue_sat(
    src: &RgbaImage,
    params: &HueSatParams,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    if params.hue_shift == 0.0 && params.sat_shift == 0.0 && params.bri_shift == 0.0 {
        return Ok(src.clone());
    }

    let p = *params;
    apply_point_filter(src, env, move |_x, _y, px| {
        if px[3] == 0 {
            return px;
        }
        let [h, s, b] = rgb_to_hsb(px[0], px[1], px[2]);
        let shifted_hue = h + p.hue_shift;
        let shifted_sat = clamp01(s + p.sat_shift);
        let shifted_bri = clamp01(b + p.bri_shift);

        let packed = hsb_to_rgb(shifted_hue, shifted_sat, shifted_bri);
        let (_, r, g, b) = unpack_argb(packed);
        Rgba([r, g, b, px[3]])
    })
}

// ============================================================================
// CHANNEL INVERT
// ============================================================================

/// Which channel(s) to invert. RGB variants run as a packed XOR; the
/// hue/saturation/brightness variants go through HSB space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvertMode {
    Nothing,
    Red,
    Green,
    Blue,
    RedGreen,
    RedBlue,
    GreenBlue,
    RedGreenBlue,
    Hue,
    Saturation,
    Brightness,
    HueSaturation,
    HueBrightness,
    SaturationBrightness,
    HueSaturationBrightness,
}

impl InvertMode {
    /// XOR mask over the packed RGB bits, for the fast path.
    fn rgb_mask(self) -> Option<u32> {
        match self {
            InvertMode::Red => Some(0x00FF_0000),
            InvertMode::Green => Some(0x0000_FF00),
            InvertMode::Blue => Some(0x0000_00FF),
            InvertMode::RedGreen => Some(0x00FF_FF00),
            InvertMode::RedBlue => Some(0x00FF_00FF),
            InvertMode::GreenBlue => Some(0x0000_FFFF),
            InvertMode::RedGreenBlue => Some(0x00FF_FFFF),
            _ => None,
        }
    }

    /// (invert hue, invert saturation, invert brightness)
    fn hsb_flags(self) -> (bool, bool, bool) {
        match self {
            InvertMode::Hue => (true, false, false),
            InvertMode::Saturation => (false, true, false),
            InvertMode::Brightness => (false, false, true),
            InvertMode::HueSaturation => (true, true, false),
            InvertMode::HueBrightness => (true, false, true),
            InvertMode::SaturationBrightness => (false, true, true),
            InvertMode::HueSaturationBrightness => (true, true, true),
            _ => (false, false, false),
        }
    }
}

/// Invert the selected channel(s). `Nothing` returns the source unchanged;
/// zero-alpha pixels always pass through.
///
/// The mode is resolved to either an XOR mask or a set of HSB flags once,
/// before the pixel loop — never per pixel.
pub fn channel_invert(
    src: &RgbaImage,
    mode: InvertMode,
    env: &FilterEnv<'_>,
) -> Result<RgbaImage, FilterError> {
    if mode == InvertMode::Nothing {
        return Ok(src.clone());
    }

    if let Some(mask) = mode.rgb_mask() {
        return apply_point_filter(src, env, move |_x, _y, px| {
            if px[3] == 0 {
                return px;
            }
            let inverted = rgba_to_argb(px) ^ mask;
            let (a, r, g, b) = unpack_argb(inverted);
            Rgba([r, g, b, a])
        });
    }

    let (inv_h, inv_s, inv_b) = mode.hsb_flags();
    apply_point_filter(src, env, move |_x, _y, px| {
        if px[3] == 0 {
            return px;
        }
        let [h, s, b] = rgb_to_hsb(px[0], px[1], px[2]);
        let h = if inv_h { 0.5 + h } else { h };
        let s = if inv_s { 1.0 - s } else { s };
        let b = if inv_b { 1.0 - b } else { b };
        let packed = hsb_to_rgb(h, s, b);
        let (_, r, g, bl) = unpack_argb(packed);
        Rgba([r, g, bl, px[3]])
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Dispatcher;

    fn env_and_pool() -> Dispatcher {
        Dispatcher::new(2).unwrap()
    }

    #[test]
    fn zero_shift_is_identity() {
        let dispatcher = env_and_pool();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 200, 77, 255]));
        let out = hue_sat(&img, &HueSatParams::default(), &env).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn hue_rotation_of_gray_is_noop() {
        // zero-saturation colors have no hue to rotate
        let dispatcher = env_and_pool();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(3, 3, Rgba([128, 128, 128, 255]));
        let params = HueSatParams {
            hue_shift: 0.5,
            ..Default::default()
        };
        let out = hue_sat(&img, &params, &env).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn transparent_pixels_pass_through_hue_sat() {
        let dispatcher = env_and_pool();
        let env = FilterEnv::untracked(&dispatcher);
        let mut img = RgbaImage::from_pixel(2, 2, Rgba([90, 30, 60, 255]));
        img.put_pixel(1, 1, Rgba([90, 30, 60, 0]));
        let params = HueSatParams {
            hue_shift: 0.25,
            sat_shift: 0.1,
            bri_shift: -0.1,
        };
        let out = hue_sat(&img, &params, &env).unwrap();
        assert_eq!(*out.get_pixel(1, 1), Rgba([90, 30, 60, 0]));
        assert_ne!(*out.get_pixel(0, 0), Rgba([90, 30, 60, 255]));
    }

    #[test]
    fn red_only_invert_xors_red_channel() {
        let dispatcher = env_and_pool();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(1, 1, Rgba([0x10, 0x20, 0x30, 0xFF]));
        let out = channel_invert(&img, InvertMode::Red, &env).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([0xEF, 0x20, 0x30, 0xFF]));
    }

    #[test]
    fn invert_nothing_is_identity() {
        let dispatcher = env_and_pool();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(2, 3, Rgba([1, 2, 3, 200]));
        let out = channel_invert(&img, InvertMode::Nothing, &env).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn brightness_invert_flips_value() {
        let dispatcher = env_and_pool();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 255]));
        let out = channel_invert(&img, InvertMode::Brightness, &env).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn rgb_invert_is_an_involution() {
        let dispatcher = env_and_pool();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(3, 2, Rgba([13, 77, 201, 255]));
        let once = channel_invert(&img, InvertMode::RedGreenBlue, &env).unwrap();
        let twice = channel_invert(&once, InvertMode::RedGreenBlue, &env).unwrap();
        assert_eq!(twice, img);
    }

    #[test]
    fn transparent_pixels_skip_inversion() {
        let dispatcher = env_and_pool();
        let env = FilterEnv::untracked(&dispatcher);
        let img = RgbaImage::from_pixel(1, 1, Rgba([0x10, 0x20, 0x30, 0]));
        let out = channel_invert(&img, InvertMode::RedGreenBlue, &env).unwrap();
        assert_eq!(*out.get_pixel(0, 0), Rgba([0x10, 0x20, 0x30, 0]));
    }
}
