use crate::{
    core::{Canvas, Fps, FrameIndex, FrameRange},
    error::{QuoteReelError, QuoteReelResult},
    sampler::{AnimationSpec, FadeTiming},
};

/// Fraction of the canvas width a quote may occupy when no explicit wrap
/// budget is set.
pub const DEFAULT_TEXT_WIDTH_FRAC: f64 = 0.9;

fn default_line_gap_px() -> f32 {
    8.0
}

fn default_playback_rate() -> f64 {
    1.0
}

/// Declarative description of one output video: a stage, a background, and a
/// list of timed quote clips.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Storyboard {
    pub fps: Fps,
    pub canvas: Canvas,
    pub duration: FrameIndex, // total frames
    pub background: Background,
    pub quotes: Vec<QuoteClip>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Background {
    Solid {
        rgba8: [u8; 4],
    },
    Image {
        source: String,
    },
    Video {
        source: String,
        #[serde(default)]
        trim_start_sec: f64,
        #[serde(default = "default_playback_rate")]
        playback_rate: f64,
    },
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct QuoteClip {
    pub id: String,
    pub text: String,
    pub font_source: String,
    pub size_px: f32,
    pub color_rgba8: [u8; 4],
    /// Wrap budget in pixels; defaults to 90% of the canvas width.
    #[serde(default)]
    pub max_width_px: Option<f32>,
    #[serde(default = "default_line_gap_px")]
    pub line_gap_px: f32,
    pub range: FrameRange, // timeline placement [start,end)
    pub animation: AnimationSpec,
}

impl QuoteClip {
    pub fn resolved_max_width_px(&self, canvas: Canvas) -> f64 {
        match self.max_width_px {
            Some(w) => f64::from(w),
            None => f64::from(canvas.width) * DEFAULT_TEXT_WIDTH_FRAC,
        }
    }
}

impl Storyboard {
    /// 9:16 portrait stage at 24 fps with a 5 second duration and a black
    /// background, matching the common short-form quote video shape.
    pub fn portrait_default() -> Self {
        Self {
            fps: Fps { num: 24, den: 1 },
            canvas: Canvas {
                width: 1080,
                height: 1920,
            },
            duration: FrameIndex(120),
            background: Background::Solid {
                rgba8: [0, 0, 0, 255],
            },
            quotes: Vec::new(),
        }
    }

    pub fn validate(&self) -> QuoteReelResult<()> {
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(QuoteReelError::validation("fps must have num>0 and den>0"));
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(QuoteReelError::validation(
                "canvas width/height must be > 0",
            ));
        }
        if self.duration.0 == 0 {
            return Err(QuoteReelError::validation("duration must be > 0 frames"));
        }

        match &self.background {
            Background::Solid { .. } => {}
            Background::Image { source } => {
                if source.trim().is_empty() {
                    return Err(QuoteReelError::validation(
                        "background image source must be non-empty",
                    ));
                }
            }
            Background::Video {
                source,
                trim_start_sec,
                playback_rate,
            } => {
                if source.trim().is_empty() {
                    return Err(QuoteReelError::validation(
                        "background video source must be non-empty",
                    ));
                }
                if !trim_start_sec.is_finite() || *trim_start_sec < 0.0 {
                    return Err(QuoteReelError::validation(
                        "background video trim_start_sec must be finite and >= 0",
                    ));
                }
                if !playback_rate.is_finite() || *playback_rate <= 0.0 {
                    return Err(QuoteReelError::validation(
                        "background video playback_rate must be finite and > 0",
                    ));
                }
            }
        }

        for clip in &self.quotes {
            if clip.id.trim().is_empty() {
                return Err(QuoteReelError::validation("quote clip id must be non-empty"));
            }
            if clip.font_source.trim().is_empty() {
                return Err(QuoteReelError::validation(format!(
                    "quote '{}' font_source must be non-empty",
                    clip.id
                )));
            }
            if !clip.size_px.is_finite() || clip.size_px <= 0.0 {
                return Err(QuoteReelError::validation(format!(
                    "quote '{}' size_px must be finite and > 0",
                    clip.id
                )));
            }
            if let Some(w) = clip.max_width_px
                && (!w.is_finite() || w <= 0.0)
            {
                return Err(QuoteReelError::validation(format!(
                    "quote '{}' max_width_px must be finite and > 0 when set",
                    clip.id
                )));
            }
            if !clip.line_gap_px.is_finite() || clip.line_gap_px < 0.0 {
                return Err(QuoteReelError::validation(format!(
                    "quote '{}' line_gap_px must be finite and >= 0",
                    clip.id
                )));
            }
            if clip.range.start.0 > clip.range.end.0 {
                return Err(QuoteReelError::validation(format!(
                    "quote '{}' has invalid range (start > end)",
                    clip.id
                )));
            }
            if clip.range.end.0 > self.duration.0 {
                return Err(QuoteReelError::validation(format!(
                    "quote '{}' range exceeds storyboard duration",
                    clip.id
                )));
            }
            if let FadeTiming::Window { seconds } = clip.animation.fade
                && (!seconds.is_finite() || seconds <= 0.0)
            {
                return Err(QuoteReelError::validation(format!(
                    "quote '{}' fade window seconds must be finite and > 0",
                    clip.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::AnimationMode;

    fn basic_storyboard() -> Storyboard {
        let mut sb = Storyboard::portrait_default();
        sb.quotes.push(QuoteClip {
            id: "q0".to_string(),
            text: "You are stronger than you think.".to_string(),
            font_source: "assets/DejaVuSans-Bold.ttf".to_string(),
            size_px: 80.0,
            color_rgba8: [255, 255, 255, 255],
            max_width_px: None,
            line_gap_px: default_line_gap_px(),
            range: FrameRange::new(FrameIndex(0), FrameIndex(120)).unwrap(),
            animation: AnimationSpec::new(AnimationMode::FadeIn),
        });
        sb
    }

    #[test]
    fn json_roundtrip() {
        let sb = basic_storyboard();
        let s = serde_json::to_string_pretty(&sb).unwrap();
        let de: Storyboard = serde_json::from_str(&s).unwrap();
        assert_eq!(de.canvas.width, 1080);
        assert_eq!(de.quotes.len(), 1);
        assert_eq!(de.quotes[0].animation.mode, AnimationMode::FadeIn);
    }

    #[test]
    fn animation_defaults_fill_in_on_deserialize() {
        let s = r#"{ "mode": "typewriter" }"#;
        let spec: AnimationSpec = serde_json::from_str(s).unwrap();
        assert_eq!(spec.mode, AnimationMode::Typewriter);
        assert_eq!(spec.ease, crate::ease::Ease::Linear);
        assert_eq!(spec.fade, FadeTiming::FullClip);
    }

    #[test]
    fn validate_accepts_basic_storyboard() {
        basic_storyboard().validate().unwrap();
    }

    #[test]
    fn validate_rejects_out_of_bounds_range() {
        let mut sb = basic_storyboard();
        sb.quotes[0].range = FrameRange {
            start: FrameIndex(0),
            end: FrameIndex(999),
        };
        assert!(sb.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let mut sb = basic_storyboard();
        sb.quotes[0].range = FrameRange {
            start: FrameIndex(50),
            end: FrameIndex(10),
        };
        assert!(sb.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_fps_and_canvas() {
        let mut sb = basic_storyboard();
        sb.fps = Fps { num: 24, den: 0 };
        assert!(sb.validate().is_err());

        let mut sb = basic_storyboard();
        sb.canvas = Canvas {
            width: 0,
            height: 1920,
        };
        assert!(sb.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_fade_window() {
        let mut sb = basic_storyboard();
        sb.quotes[0].animation.fade = FadeTiming::Window { seconds: 0.0 };
        assert!(sb.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_font_source() {
        let mut sb = basic_storyboard();
        sb.quotes[0].font_source = "  ".to_string();
        assert!(sb.validate().is_err());
    }

    #[test]
    fn resolved_max_width_defaults_to_canvas_fraction() {
        let sb = basic_storyboard();
        let w = sb.quotes[0].resolved_max_width_px(sb.canvas);
        assert_eq!(w, 1080.0 * DEFAULT_TEXT_WIDTH_FRAC);
    }
}
