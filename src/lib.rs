//! Quotereel is a quote-video composition and rendering engine.
//!
//! It turns a declarative [`Storyboard`] (canvas, fps, background, timed
//! quote clips) into pixels and, optionally, an MP4 encoded by the system
//! `ffmpeg` binary.
//!
//! # Pipeline overview
//!
//! 1. **Evaluate**: `Storyboard + FrameIndex -> FrameScript` (which quotes
//!    are visible, with their sampled animation state)
//! 2. **Compose**: `FrameScript -> FrameRGBA` (CPU rasterization of the
//!    background and centered, wrapped quote lines)
//! 3. **Encode** (optional): stream frames to the system `ffmpeg` binary for
//!    MP4 output
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic-by-default**: wrapping and animation sampling are pure
//!   functions of their explicit arguments; identical inputs give identical
//!   outputs, so frames may be rendered in any order or in parallel.
//! - **No IO in evaluation or composition**: external IO is front-loaded in
//!   [`PreparedAssets`].
//! - **No ambient state**: cache sizes, flatten colors, and scratch locations
//!   are explicit configuration values, never process-global.
#![forbid(unsafe_code)]

pub mod assets;
pub mod core;
pub mod ease;
pub mod encode_ffmpeg;
pub mod error;
pub mod eval;
pub mod model;
pub mod render;
pub mod sampler;
pub mod text;

pub use assets::{
    ParleyMetrics, PreparedAssets, PreparedBackground, PreparedQuote, TextBrushRgba8,
    TextLayoutEngine, normalize_rel_path,
};
pub use assets::decode::{PreparedImage, decode_image};
pub use assets::media::{
    VideoSourceInfo, background_source_time_sec, decode_video_frame_rgba8, probe_video,
};
pub use crate::core::{Canvas, Fps, FrameIndex, FrameRange, Vec2};
pub use ease::Ease;
pub use encode_ffmpeg::{
    EncodeConfig, FfmpegEncoder, default_mp4_config, ensure_parent_dir, is_ffmpeg_on_path,
};
pub use error::{QuoteReelError, QuoteReelResult};
pub use eval::{Evaluator, FrameScript, MeasureSource, QuoteNode};
pub use model::{Background, DEFAULT_TEXT_WIDTH_FRAC, QuoteClip, Storyboard};
pub use render::compositor::CpuCompositor;
pub use render::pipeline::{
    RenderStats, RenderThreading, RenderToMp4Opts, render_frame, render_frame_with, render_frames,
    render_frames_with_stats, render_to_mp4, render_to_mp4_with_stats,
};
pub use render::{FrameRGBA, RenderSettings};
pub use sampler::{
    AnimationMode, AnimationSpec, FadeTiming, RenderInstruction, SampleCtx, sample,
};
pub use text::measure::{FixedAdvanceMeasure, TextMeasure};
pub use text::wrap::{TextBlock, block_size, wrap};
