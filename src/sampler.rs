use crate::{
    core::{Canvas, Vec2},
    ease::Ease,
    text::measure::TextMeasure,
    text::wrap::{TextBlock, block_size, wrap},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationMode {
    Static,
    FadeIn,
    Typewriter,
    Ascend,
    Shift,
}

/// Time base for the fade-in opacity ramp.
///
/// `FullClip` ramps linearly over the whole clip (the default policy).
/// `Window` ramps over the first `seconds` of the clip and then holds full
/// opacity, which matches the fixed-window behavior some productions prefer
/// for long clips.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeTiming {
    #[default]
    FullClip,
    Window {
        seconds: f64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnimationSpec {
    pub mode: AnimationMode,
    #[serde(default)]
    pub ease: Ease,
    #[serde(default)]
    pub fade: FadeTiming,
}

impl AnimationSpec {
    pub fn new(mode: AnimationMode) -> Self {
        Self {
            mode,
            ease: Ease::Linear,
            fade: FadeTiming::FullClip,
        }
    }
}

/// Per-sample context: where we are in the clip and what stage we play on.
#[derive(Clone, Copy, Debug)]
pub struct SampleCtx {
    /// Playback position within the clip in [0,1]. Out-of-range values from
    /// floating-point drift at clip boundaries are clamped, never rejected.
    pub elapsed: f64,
    /// Total clip duration in seconds (used by windowed fade timing).
    pub clip_duration_s: f64,
    pub canvas: Canvas,
    /// Extra pixels between successive lines, on top of the line height.
    pub line_gap_px: f64,
}

/// Pure-data output of the sampler: what to draw and how, before any pixels.
///
/// `offset` is the displacement of the whole block from its centered resting
/// position, so `(0,0)` always means "block centered on the canvas".
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RenderInstruction {
    pub lines: Vec<String>,
    pub opacity: f64,
    pub offset: Vec2,
}

/// Sample one animation mode at one instant.
///
/// A pure function of its arguments: identical inputs produce identical
/// instructions, so frames can be generated out of order or in parallel and
/// tests can assert on instructions without rasterizing anything.
pub fn sample(
    spec: AnimationSpec,
    block: &TextBlock,
    measure: &dyn TextMeasure,
    ctx: SampleCtx,
) -> RenderInstruction {
    let t = spec.ease.apply(ctx.elapsed.clamp(0.0, 1.0));

    match spec.mode {
        AnimationMode::Static => RenderInstruction {
            lines: block.wrapped(measure),
            opacity: 1.0,
            offset: Vec2::ZERO,
        },
        AnimationMode::FadeIn => {
            let opacity = match spec.fade {
                FadeTiming::FullClip => t,
                FadeTiming::Window { seconds } => {
                    if seconds > 0.0 {
                        ((t * ctx.clip_duration_s) / seconds).clamp(0.0, 1.0)
                    } else {
                        1.0
                    }
                }
            };
            RenderInstruction {
                lines: block.wrapped(measure),
                opacity,
                offset: Vec2::ZERO,
            }
        }
        AnimationMode::Typewriter => {
            // Reveal rate is per character of the raw text, spaces included,
            // and the revealed prefix is re-wrapped so words flow across
            // lines exactly as they will once fully visible.
            let total = block.char_count();
            let visible = ((total as f64) * t).floor() as usize;
            let prefix: String = block.text.chars().take(visible).collect();
            RenderInstruction {
                lines: wrap(&prefix, block.max_width_px, measure),
                opacity: 1.0,
                offset: Vec2::ZERO,
            }
        }
        AnimationMode::Ascend => {
            let lines = block.wrapped(measure);
            let (_, block_h) = block_size(&lines, measure, ctx.line_gap_px);
            // Top of block sits exactly at the bottom frame edge at t=0 and
            // at the centered resting position at t=1.
            let dy = (1.0 - t) * (f64::from(ctx.canvas.height) + block_h) / 2.0;
            RenderInstruction {
                lines,
                opacity: 1.0,
                offset: Vec2::new(0.0, dy),
            }
        }
        AnimationMode::Shift => {
            let lines = block.wrapped(measure);
            let (block_w, _) = block_size(&lines, measure, ctx.line_gap_px);
            // Horizontal analogue of Ascend: the block enters from the right
            // edge and slides to horizontal center.
            let dx = (1.0 - t) * (f64::from(ctx.canvas.width) + block_w) / 2.0;
            RenderInstruction {
                lines,
                opacity: 1.0,
                offset: Vec2::new(dx, 0.0),
            }
        }
    }
}
