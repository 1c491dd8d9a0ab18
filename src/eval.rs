use crate::{
    core::FrameIndex,
    error::{QuoteReelError, QuoteReelResult},
    model::{QuoteClip, Storyboard},
    sampler::{RenderInstruction, SampleCtx, sample},
    text::measure::TextMeasure,
    text::wrap::TextBlock,
};

/// Source of text metrics per quote clip.
///
/// In production this is [`crate::assets::PreparedAssets`] (Parley-backed);
/// tests substitute fixed-advance metrics so evaluation runs without fonts.
pub trait MeasureSource {
    fn measure_for(&self, clip: &QuoteClip) -> QuoteReelResult<&dyn TextMeasure>;
}

/// Everything the compositor needs to draw one frame, as pure data.
#[derive(Clone, Debug, serde::Serialize)]
pub struct FrameScript {
    pub frame: FrameIndex,
    pub nodes: Vec<QuoteNode>,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct QuoteNode {
    pub clip_id: String,
    pub elapsed: f64,
    pub size_px: f32,
    pub color_rgba8: [u8; 4],
    pub line_gap_px: f32,
    pub instruction: RenderInstruction,
}

pub struct Evaluator;

impl Evaluator {
    /// Evaluate which quotes are visible at `frame` and sample their
    /// animation state.
    ///
    /// Pure: depends only on the storyboard, the frame index, and the metrics
    /// source, so frames may be evaluated in any order or in parallel.
    #[tracing::instrument(skip(sb, measures))]
    pub fn eval_frame(
        sb: &Storyboard,
        frame: FrameIndex,
        measures: &dyn MeasureSource,
    ) -> QuoteReelResult<FrameScript> {
        sb.validate()?;
        if frame.0 >= sb.duration.0 {
            return Err(QuoteReelError::evaluation("frame is out of bounds"));
        }

        let mut nodes = Vec::new();
        for clip in &sb.quotes {
            if !clip.range.contains(frame) {
                continue;
            }

            let measure = measures.measure_for(clip)?;
            let elapsed = clip.range.progress(frame);
            let block = TextBlock::new(clip.text.clone(), clip.resolved_max_width_px(sb.canvas));
            let ctx = SampleCtx {
                elapsed,
                clip_duration_s: sb.fps.frames_to_secs(clip.range.len_frames()),
                canvas: sb.canvas,
                line_gap_px: f64::from(clip.line_gap_px),
            };

            nodes.push(QuoteNode {
                clip_id: clip.id.clone(),
                elapsed,
                size_px: clip.size_px,
                color_rgba8: clip.color_rgba8,
                line_gap_px: clip.line_gap_px,
                instruction: sample(clip.animation, &block, measure, ctx),
            });
        }

        Ok(FrameScript { frame, nodes })
    }
}
