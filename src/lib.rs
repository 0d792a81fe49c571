//! rasterfx — a pixel-level image filter engine.
//!
//! Every filter is a pure function of a borrowed source buffer and an
//! immutable parameter snapshot, returning a freshly allocated destination
//! of identical dimensions. Internally a pass is parallelized by contiguous
//! row-bands over an explicit worker pool; externally it is synchronous.
//!
//! The crate has no knowledge of documents, layers, undo history or widget
//! state — callers hand in an [`image::RgbaImage`] and a parameter struct,
//! and get a buffer and a completion signal back:
//!
//! ```
//! use rasterfx::{Dispatcher, FilterEnv, HueSatParams, hue_sat};
//! use image::{Rgba, RgbaImage};
//!
//! let src = RgbaImage::from_pixel(64, 64, Rgba([180, 90, 30, 255]));
//! let dispatcher = Dispatcher::new(4)?;
//! let env = FilterEnv::untracked(&dispatcher);
//!
//! let params = HueSatParams { hue_shift: 0.25, sat_shift: 0.0, bri_shift: 0.0 };
//! let dst = hue_sat(&src, &params, &env)?;
//! assert_eq!(dst.dimensions(), src.dimensions());
//! # Ok::<(), rasterfx::FilterError>(())
//! ```

pub mod color;
pub mod dispatch;
pub mod error;
pub mod noise;
pub mod ops;
pub mod progress;
pub mod resize;

pub use dispatch::{Dispatcher, FilterEnv, row_bands};
pub use error::FilterError;
pub use noise::{Interpolation, NoiseContext};
pub use ops::adjust::{HueSatParams, InvertMode, channel_invert, hue_sat};
pub use ops::blur::{BoxBlurParams, GlowParams, box_blur, glow};
pub use ops::distort::{
    KaleidoscopeParams, PixelGrid, PixelateParams, PixelateStyle, RaysParams, kaleidoscope,
    pixelate, rays,
};
pub use ops::edges::{EdgeDetectParams, EdgeOperator, edge_detect};
pub use ops::render::{CausticsParams, ValueNoiseParams, WoodParams, caustics, value_noise_render, wood};
pub use ops::{EdgePolicy, Sampling};
pub use progress::{DebugTracker, NoProgress, ProgressTracker, ThresholdTracker};
