use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::{
    assets::{PreparedAssets, PreparedBackground, PreparedQuote, TextBrushRgba8, media},
    core::Canvas,
    error::{QuoteReelError, QuoteReelResult},
    eval::{FrameScript, QuoteNode},
    render::{FrameRGBA, RenderSettings},
    text::measure::TextMeasure,
};

/// CPU rasterizer turning a [`FrameScript`] plus a prepared background into
/// premultiplied RGBA8 pixels.
///
/// Owns only caches (background paint, per-clip font data, decoded video
/// frames); all drawing decisions come from the script, so composing the same
/// script twice yields the same pixels.
pub struct CpuCompositor {
    canvas: Canvas,
    settings: RenderSettings,
    bg_paint: Option<vello_cpu::Image>,
    font_cache: HashMap<String, vello_cpu::peniko::FontData>,
    video_cache: Option<VideoFrameCache>,
}

impl CpuCompositor {
    pub fn new(canvas: Canvas, settings: RenderSettings) -> Self {
        Self {
            canvas,
            settings,
            bg_paint: None,
            font_cache: HashMap::new(),
            video_cache: None,
        }
    }

    /// Rasterize one frame. `frame_time_s` is the timeline instant, used to
    /// pick the background video frame.
    #[tracing::instrument(skip(self, script, assets), fields(frame = script.frame.0))]
    pub fn compose(
        &mut self,
        script: &FrameScript,
        assets: &PreparedAssets,
        frame_time_s: f64,
    ) -> QuoteReelResult<FrameRGBA> {
        let width_u16: u16 = self
            .canvas
            .width
            .try_into()
            .map_err(|_| QuoteReelError::evaluation("canvas width exceeds u16"))?;
        let height_u16: u16 = self
            .canvas
            .height
            .try_into()
            .map_err(|_| QuoteReelError::evaluation("canvas height exceeds u16"))?;

        let mut pixmap = vello_cpu::Pixmap::new(width_u16, height_u16);
        let mut ctx = vello_cpu::RenderContext::new(width_u16, height_u16);

        self.draw_background(&mut ctx, assets, frame_time_s)?;
        for node in &script.nodes {
            let prepared = assets.quote(&node.clip_id)?;
            self.draw_quote(&mut ctx, node, prepared)?;
        }

        ctx.flush();
        ctx.render_to_pixmap(&mut pixmap);

        Ok(FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn draw_background(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        assets: &PreparedAssets,
        frame_time_s: f64,
    ) -> QuoteReelResult<()> {
        let canvas_rect = vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(self.canvas.width),
            f64::from(self.canvas.height),
        );

        match assets.background() {
            PreparedBackground::Solid { rgba8 } => {
                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    rgba8[0], rgba8[1], rgba8[2], rgba8[3],
                ));
                ctx.fill_rect(&canvas_rect);
            }
            PreparedBackground::Image(img) => {
                let paint = match &self.bg_paint {
                    Some(paint) => paint.clone(),
                    None => {
                        let paint = image_from_premul_bytes(
                            img.rgba8_premul.as_slice(),
                            img.width,
                            img.height,
                        )?;
                        self.bg_paint = Some(paint.clone());
                        paint
                    }
                };
                self.draw_scaled_paint(ctx, paint, img.width, img.height);
            }
            PreparedBackground::Video {
                info,
                trim_start_sec,
                playback_rate,
            } => {
                let capacity = self.settings.video_cache_capacity;
                let prefetch = self.settings.video_prefetch_frames;
                let cache = self
                    .video_cache
                    .get_or_insert_with(|| VideoFrameCache::new(info.clone(), capacity, prefetch));
                let source_time = media::background_source_time_sec(
                    *trim_start_sec,
                    *playback_rate,
                    frame_time_s,
                    info.duration_sec,
                );
                let paint = cache.frame_at(source_time)?;
                let (w, h) = (info.width, info.height);
                self.draw_scaled_paint(ctx, paint, w, h);
            }
        }
        Ok(())
    }

    /// Stretch a source-sized paint to exactly cover the canvas.
    fn draw_scaled_paint(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        paint: vello_cpu::Image,
        src_w: u32,
        src_h: u32,
    ) {
        if src_w == 0 || src_h == 0 {
            return;
        }
        let sx = f64::from(self.canvas.width) / f64::from(src_w);
        let sy = f64::from(self.canvas.height) / f64::from(src_h);
        ctx.set_transform(vello_cpu::kurbo::Affine::scale_non_uniform(sx, sy));
        ctx.set_paint(paint);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(src_w),
            f64::from(src_h),
        ));
    }

    fn draw_quote(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        node: &QuoteNode,
        prepared: &PreparedQuote,
    ) -> QuoteReelResult<()> {
        let lines = &node.instruction.lines;
        let opacity = node.instruction.opacity.clamp(0.0, 1.0) as f32;
        if lines.is_empty() || opacity <= 0.0 {
            return Ok(());
        }

        let metrics = prepared.metrics.as_ref();
        let line_h = metrics.line_height_px();
        let gap = f64::from(node.line_gap_px);
        let pitch = line_h + gap;
        let block_h = (lines.len() as f64) * line_h + ((lines.len() - 1) as f64) * gap;

        // Block anchored at vertical center, displaced by the sampled offset.
        let top = (f64::from(self.canvas.height) - block_h) / 2.0 + node.instruction.offset.y;

        let font = self.font_for(node, prepared);
        let brush = TextBrushRgba8::from_rgba8(node.color_rgba8);

        if opacity < 1.0 {
            ctx.push_opacity_layer(opacity);
        }

        for (idx, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }

            let layout = prepared.metrics.shape_line(line, brush);
            let mut line_w = 0.0f64;
            for l in layout.lines() {
                line_w = line_w.max(f64::from(l.metrics().advance));
            }

            let x = (f64::from(self.canvas.width) - line_w) / 2.0 + node.instruction.offset.x;
            let y = top + (idx as f64) * pitch;
            ctx.set_transform(vello_cpu::kurbo::Affine::translate((x, y)));

            for l in layout.lines() {
                for item in l.items() {
                    let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                        continue;
                    };

                    let b = run.style().brush;
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(b.r, b.g, b.b, b.a));

                    let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                        id: g.id,
                        x: g.x,
                        y: g.y,
                    });
                    ctx.glyph_run(&font)
                        .font_size(run.run().font_size())
                        .fill_glyphs(glyphs);
                }
            }
        }

        if opacity < 1.0 {
            ctx.pop_layer();
        }

        Ok(())
    }

    fn font_for(
        &mut self,
        node: &QuoteNode,
        prepared: &PreparedQuote,
    ) -> vello_cpu::peniko::FontData {
        if let Some(font) = self.font_cache.get(&node.clip_id) {
            return font.clone();
        }
        let bytes = prepared.font_bytes.as_ref().clone();
        let font = vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), 0);
        self.font_cache.insert(node.clip_id.clone(), font.clone());
        font
    }
}

/// Small LRU of decoded background-video frames, keyed by millisecond.
///
/// Capacity and prefetch batch size come from [`RenderSettings`] rather than
/// the process environment.
struct VideoFrameCache {
    info: Arc<media::VideoSourceInfo>,
    frames: HashMap<u64, vello_cpu::Image>,
    lru: VecDeque<u64>,
    capacity: usize,
    prefetch_frames: u32,
}

impl VideoFrameCache {
    fn new(info: Arc<media::VideoSourceInfo>, capacity: usize, prefetch_frames: u32) -> Self {
        Self {
            info,
            frames: HashMap::new(),
            lru: VecDeque::new(),
            capacity: capacity.max(1),
            prefetch_frames: prefetch_frames.max(1),
        }
    }

    fn frame_at(&mut self, source_time_s: f64) -> QuoteReelResult<vello_cpu::Image> {
        let key = self.key_for_time(source_time_s);
        if let Some(img) = self.frames.get(&key).cloned() {
            self.touch(key);
            return Ok(img);
        }

        if self.prefetch_around(key).is_ok()
            && let Some(img) = self.frames.get(&key).cloned()
        {
            self.touch(key);
            return Ok(img);
        }

        // Sparse seek the batch did not cover; decode the single frame.
        let rgba = media::decode_video_frame_rgba8(&self.info, source_time_s)?;
        let image = image_from_premul_bytes(&rgba, self.info.width, self.info.height)?;
        self.insert(key, image.clone());
        Ok(image)
    }

    fn key_for_time(&self, source_time_s: f64) -> u64 {
        (source_time_s.max(0.0) * 1000.0).round() as u64
    }

    fn prefetch_around(&mut self, key_ms: u64) -> QuoteReelResult<()> {
        let source_fps = self.info.source_fps();
        let step_ms = if source_fps.is_finite() && source_fps > 0.0 {
            1000.0 / source_fps
        } else {
            1.0
        };
        let window_ms = (step_ms * f64::from(self.prefetch_frames)).max(step_ms);
        let bucket = (key_ms as f64 / window_ms).floor();
        let start_key_ms = (bucket * window_ms).round().max(0.0) as u64;
        let start_time_s = (start_key_ms as f64) / 1000.0;

        let frames =
            media::decode_video_frames_rgba8(&self.info, start_time_s, self.prefetch_frames)?;
        for (offset, rgba) in frames.iter().enumerate() {
            let key = ((start_key_ms as f64) + ((offset as f64) * step_ms)).round() as u64;
            if self.frames.contains_key(&key) {
                self.touch(key);
                continue;
            }
            let image = image_from_premul_bytes(rgba, self.info.width, self.info.height)?;
            self.insert(key, image);
        }
        Ok(())
    }

    fn insert(&mut self, key: u64, image: vello_cpu::Image) {
        self.frames.insert(key, image);
        self.touch(key);
        while self.lru.len() > self.capacity {
            if let Some(old) = self.lru.pop_front() {
                self.frames.remove(&old);
            }
        }
    }

    fn touch(&mut self, key: u64) {
        if let Some(pos) = self.lru.iter().position(|k| *k == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key);
    }
}

fn image_from_premul_bytes(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> QuoteReelResult<vello_cpu::Image> {
    let w: u16 = width
        .try_into()
        .map_err(|_| QuoteReelError::evaluation("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| QuoteReelError::evaluation("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(QuoteReelError::evaluation(
            "prepared image byte length mismatch",
        ));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities);
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FrameIndex;
    use crate::model::{Background, Storyboard};

    fn solid_storyboard(rgba: [u8; 4]) -> Storyboard {
        let mut sb = Storyboard::portrait_default();
        sb.canvas = Canvas {
            width: 64,
            height: 64,
        };
        sb.duration = FrameIndex(10);
        sb.background = Background::Solid { rgba8: rgba };
        sb
    }

    #[test]
    fn solid_background_fills_every_pixel() {
        let sb = solid_storyboard([10, 20, 30, 255]);
        let assets = PreparedAssets::prepare(&sb, std::env::temp_dir()).unwrap();
        let mut comp = CpuCompositor::new(sb.canvas, RenderSettings::default());

        let script = FrameScript {
            frame: FrameIndex(0),
            nodes: vec![],
        };
        let frame = comp.compose(&script, &assets, 0.0).unwrap();
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 64);
        assert_eq!(frame.data.len(), 64 * 64 * 4);
        assert!(frame.premultiplied);
        for px in frame.data.chunks_exact(4) {
            assert_eq!(px, &[10, 20, 30, 255]);
        }
    }

    #[test]
    fn composing_twice_is_bitwise_identical() {
        let sb = solid_storyboard([200, 100, 50, 255]);
        let assets = PreparedAssets::prepare(&sb, std::env::temp_dir()).unwrap();
        let mut comp = CpuCompositor::new(sb.canvas, RenderSettings::default());

        let script = FrameScript {
            frame: FrameIndex(3),
            nodes: vec![],
        };
        let a = comp.compose(&script, &assets, 0.125).unwrap();
        let b = comp.compose(&script, &assets, 0.125).unwrap();
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn image_from_premul_bytes_rejects_length_mismatch() {
        assert!(image_from_premul_bytes(&[0u8; 3], 1, 1).is_err());
    }
}
