use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::Context;

use crate::{
    assets::decode::PreparedImage,
    assets::media::VideoSourceInfo,
    error::{QuoteReelError, QuoteReelResult},
    model::{Background, QuoteClip, Storyboard},
    text::measure::TextMeasure,
};

pub mod decode;
pub mod media;

/// RGBA8 brush color carried through Parley text layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TextBrushRgba8 {
    pub fn from_rgba8(c: [u8; 4]) -> Self {
        Self {
            r: c[0],
            g: c[1],
            b: c[2],
            a: c[3],
        }
    }
}

#[derive(Clone)]
pub enum PreparedBackground {
    Solid {
        rgba8: [u8; 4],
    },
    Image(PreparedImage),
    Video {
        info: Arc<VideoSourceInfo>,
        trim_start_sec: f64,
        playback_rate: f64,
    },
}

impl std::fmt::Debug for PreparedBackground {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Solid { rgba8 } => f.debug_struct("Solid").field("rgba8", rgba8).finish(),
            Self::Image(img) => f
                .debug_struct("Image")
                .field("width", &img.width)
                .field("height", &img.height)
                .finish(),
            Self::Video { info, .. } => f
                .debug_struct("Video")
                .field("source", &info.source_path)
                .finish(),
        }
    }
}

/// Per-quote prepared state: font bytes plus shaping-backed metrics.
#[derive(Clone)]
pub struct PreparedQuote {
    pub font_bytes: Arc<Vec<u8>>,
    pub font_family: String,
    pub metrics: Arc<ParleyMetrics>,
}

impl std::fmt::Debug for PreparedQuote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedQuote")
            .field("font_bytes_len", &self.font_bytes.len())
            .field("font_family", &self.font_family)
            .finish()
    }
}

/// Immutable store of everything IO-dependent a storyboard needs.
///
/// All file reads, image decoding, and video probing happen here, up front,
/// so evaluation and rendering stay deterministic and IO-free.
#[derive(Debug)]
pub struct PreparedAssets {
    background: PreparedBackground,
    quotes_by_id: HashMap<String, PreparedQuote>,
}

impl PreparedAssets {
    /// Prepare all assets referenced by `sb`, resolving sources under `root`.
    #[tracing::instrument(skip(sb, root))]
    pub fn prepare(sb: &Storyboard, root: impl Into<PathBuf>) -> QuoteReelResult<Self> {
        let root = root.into();
        sb.validate()?;

        let background = match &sb.background {
            Background::Solid { rgba8 } => PreparedBackground::Solid { rgba8: *rgba8 },
            Background::Image { source } => {
                let bytes = read_bytes(&root, source)?;
                PreparedBackground::Image(decode::decode_image(&bytes)?)
            }
            Background::Video {
                source,
                trim_start_sec,
                playback_rate,
            } => {
                let norm = normalize_rel_path(source)?;
                let info = media::probe_video(&root.join(Path::new(&norm)))?;
                PreparedBackground::Video {
                    info: Arc::new(info),
                    trim_start_sec: *trim_start_sec,
                    playback_rate: *playback_rate,
                }
            }
        };

        let mut font_bytes_cache: HashMap<String, Arc<Vec<u8>>> = HashMap::new();
        let mut quotes_by_id = HashMap::new();
        for clip in &sb.quotes {
            let norm = normalize_rel_path(&clip.font_source)?;
            let font_bytes = match font_bytes_cache.get(&norm) {
                Some(bytes) => bytes.clone(),
                None => {
                    let bytes = Arc::new(read_bytes(&root, &clip.font_source)?);
                    font_bytes_cache.insert(norm, bytes.clone());
                    bytes
                }
            };

            let metrics = ParleyMetrics::new(font_bytes.as_slice(), clip.size_px)?;
            let font_family = metrics.family_name().to_string();
            tracing::debug!(clip = %clip.id, family = %font_family, "prepared quote font");
            quotes_by_id.insert(
                clip.id.clone(),
                PreparedQuote {
                    font_bytes,
                    font_family,
                    metrics: Arc::new(metrics),
                },
            );
        }

        Ok(Self {
            background,
            quotes_by_id,
        })
    }

    pub fn background(&self) -> &PreparedBackground {
        &self.background
    }

    pub fn quote(&self, clip_id: &str) -> QuoteReelResult<&PreparedQuote> {
        self.quotes_by_id.get(clip_id).ok_or_else(|| {
            QuoteReelError::evaluation(format!("no prepared assets for quote clip '{clip_id}'"))
        })
    }
}

impl crate::eval::MeasureSource for PreparedAssets {
    fn measure_for(&self, clip: &QuoteClip) -> QuoteReelResult<&dyn TextMeasure> {
        Ok(self.quote(&clip.id)?.metrics.as_ref())
    }
}

fn read_bytes(root: &Path, source: &str) -> QuoteReelResult<Vec<u8>> {
    let norm = normalize_rel_path(source)?;
    let path = root.join(Path::new(&norm));
    std::fs::read(&path)
        .with_context(|| format!("read asset bytes from '{}'", path.display()))
        .map_err(QuoteReelError::from)
}

/// Normalize a storyboard-relative source path, rejecting absolute paths and
/// parent-directory traversal.
pub fn normalize_rel_path(source: &str) -> QuoteReelResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(QuoteReelError::validation("asset paths must be relative"));
    }
    if s.is_empty() {
        return Err(QuoteReelError::validation("asset path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(QuoteReelError::validation(
                "asset paths must not contain '..'",
            ));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(QuoteReelError::validation(
            "asset path must contain a file name",
        ));
    }

    Ok(out.join("/"))
}

/// Stateful helper owning the Parley contexts needed to shape text.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
        }
    }

    /// Register raw font bytes and return the primary family name.
    pub fn register_font(&mut self, font_bytes: &[u8]) -> QuoteReelResult<String> {
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.to_vec()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            QuoteReelError::layout("no font families registered from font bytes")
        })?;

        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| QuoteReelError::layout("registered font family has no name"))?
            .to_string();
        Ok(family_name)
    }

    /// Shape a single pre-wrapped line (no further line breaking).
    pub fn layout_line(
        &mut self,
        text: &str,
        family_name: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> parley::Layout<TextBrushRgba8> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name.to_string())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }
}

/// Shaping-backed [`TextMeasure`] for one font at one size.
///
/// The Parley contexts sit behind a mutex so the metrics can be shared across
/// parallel frame-generation workers; measurement itself stays deterministic.
pub struct ParleyMetrics {
    engine: Mutex<TextLayoutEngine>,
    family_name: String,
    size_px: f32,
    line_height_px: f64,
}

impl ParleyMetrics {
    pub fn new(font_bytes: &[u8], size_px: f32) -> QuoteReelResult<Self> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(QuoteReelError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        let mut engine = TextLayoutEngine::new();
        let family_name = engine.register_font(font_bytes)?;

        // Probe the line height once from a reference layout.
        let probe = engine.layout_line("Mg", &family_name, size_px, TextBrushRgba8::default());
        let line_height_px = probe
            .lines()
            .next()
            .map(|line| {
                let m = line.metrics();
                f64::from(m.ascent + m.descent + m.leading)
            })
            .unwrap_or_else(|| f64::from(size_px) * 1.2);

        Ok(Self {
            engine: Mutex::new(engine),
            family_name,
            size_px,
            line_height_px,
        })
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }

    pub fn size_px(&self) -> f32 {
        self.size_px
    }

    /// Shape one pre-wrapped line for rendering with the registered font.
    pub fn shape_line(&self, text: &str, brush: TextBrushRgba8) -> parley::Layout<TextBrushRgba8> {
        let mut engine = self
            .engine
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        engine.layout_line(text, &self.family_name, self.size_px, brush)
    }
}

impl std::fmt::Debug for ParleyMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParleyMetrics")
            .field("family_name", &self.family_name)
            .field("size_px", &self.size_px)
            .field("line_height_px", &self.line_height_px)
            .finish()
    }
}

impl TextMeasure for ParleyMetrics {
    fn width_px(&self, text: &str) -> f64 {
        if text.is_empty() {
            return 0.0;
        }
        let mut engine = self
            .engine
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let layout =
            engine.layout_line(text, &self.family_name, self.size_px, TextBrushRgba8::default());
        let mut width = 0.0f64;
        for line in layout.lines() {
            width = width.max(f64::from(line.metrics().advance));
        }
        width
    }

    fn line_height_px(&self) -> f64 {
        self.line_height_px
    }
}
