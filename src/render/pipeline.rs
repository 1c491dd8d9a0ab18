use rayon::prelude::*;

use crate::{
    assets::PreparedAssets,
    core::{FrameIndex, FrameRange},
    error::{QuoteReelError, QuoteReelResult},
    eval::Evaluator,
    model::Storyboard,
    render::compositor::CpuCompositor,
    render::{FrameRGBA, RenderSettings},
};

/// Threading controls for multi-frame rendering.
///
/// Parallel rendering is sound because evaluation and sampling are pure
/// functions of their arguments; each worker gets its own compositor.
#[derive(Clone, Debug)]
pub struct RenderThreading {
    pub parallel: bool,
    /// Frames rendered (and held in memory) per batch when encoding.
    pub chunk_size: usize,
    /// Optional explicit worker thread count.
    pub threads: Option<usize>,
}

impl Default for RenderThreading {
    fn default() -> Self {
        Self {
            parallel: false,
            chunk_size: 64,
            threads: None,
        }
    }
}

/// Aggregated rendering counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames_total: u64,
    pub frames_rendered: u64,
}

/// Evaluate + compose a single frame with a throwaway compositor.
pub fn render_frame(
    sb: &Storyboard,
    frame: FrameIndex,
    assets: &PreparedAssets,
    settings: &RenderSettings,
) -> QuoteReelResult<FrameRGBA> {
    let mut compositor = CpuCompositor::new(sb.canvas, settings.clone());
    render_frame_with(sb, frame, assets, &mut compositor)
}

/// Evaluate + compose a single frame, reusing the caller's compositor (and
/// its background/font/video caches).
pub fn render_frame_with(
    sb: &Storyboard,
    frame: FrameIndex,
    assets: &PreparedAssets,
    compositor: &mut CpuCompositor,
) -> QuoteReelResult<FrameRGBA> {
    let script = Evaluator::eval_frame(sb, frame, assets)?;
    compositor.compose(&script, assets, sb.fps.frames_to_secs(frame.0))
}

/// Render a frame range (start inclusive, end exclusive) to memory.
pub fn render_frames(
    sb: &Storyboard,
    range: FrameRange,
    assets: &PreparedAssets,
    settings: &RenderSettings,
    threading: &RenderThreading,
) -> QuoteReelResult<Vec<FrameRGBA>> {
    render_frames_with_stats(sb, range, assets, settings, threading).map(|(frames, _)| frames)
}

/// Render a frame range and return both frames and counters.
#[tracing::instrument(skip(sb, assets, settings, threading))]
pub fn render_frames_with_stats(
    sb: &Storyboard,
    range: FrameRange,
    assets: &PreparedAssets,
    settings: &RenderSettings,
    threading: &RenderThreading,
) -> QuoteReelResult<(Vec<FrameRGBA>, RenderStats)> {
    if range.is_empty() {
        return Err(QuoteReelError::validation("render range must be non-empty"));
    }
    if range.end.0 > sb.duration.0 {
        return Err(QuoteReelError::validation(
            "render range must be within storyboard duration",
        ));
    }
    sb.validate()?;

    let frames = if threading.parallel {
        let pool = build_thread_pool(threading.threads)?;
        render_range_parallel(sb, range, assets, settings, &pool)?
    } else {
        let mut compositor = CpuCompositor::new(sb.canvas, settings.clone());
        let mut out = Vec::with_capacity(range.len_frames() as usize);
        for f in range.start.0..range.end.0 {
            out.push(render_frame_with(sb, FrameIndex(f), assets, &mut compositor)?);
        }
        out
    };

    let total = range.len_frames();
    Ok((
        frames,
        RenderStats {
            frames_total: total,
            frames_rendered: total,
        },
    ))
}

/// Options for [`render_to_mp4`].
#[derive(Clone, Debug)]
pub struct RenderToMp4Opts {
    /// Frame range to render (start inclusive, end exclusive).
    pub range: FrameRange,
    /// Whether to overwrite the output file if it already exists.
    pub overwrite: bool,
    pub settings: RenderSettings,
    pub threading: RenderThreading,
}

impl Default for RenderToMp4Opts {
    fn default() -> Self {
        Self {
            range: FrameRange {
                start: FrameIndex(0),
                end: FrameIndex(1),
            },
            overwrite: true,
            settings: RenderSettings::default(),
            threading: RenderThreading::default(),
        }
    }
}

/// Render a storyboard to an MP4 by streaming frames into the system
/// `ffmpeg` binary.
///
/// `ffmpeg` must be installed and on `PATH`; this is checked up front.
/// Requires integer fps (`fps.den == 1`) for the encoder's `-r` argument.
pub fn render_to_mp4(
    sb: &Storyboard,
    out_path: impl Into<std::path::PathBuf>,
    opts: RenderToMp4Opts,
    assets: &PreparedAssets,
) -> QuoteReelResult<()> {
    let _ = render_to_mp4_with_stats(sb, out_path, opts, assets)?;
    Ok(())
}

/// Render a storyboard to MP4 and return rendering counters.
#[tracing::instrument(skip_all)]
pub fn render_to_mp4_with_stats(
    sb: &Storyboard,
    out_path: impl Into<std::path::PathBuf>,
    opts: RenderToMp4Opts,
    assets: &PreparedAssets,
) -> QuoteReelResult<RenderStats> {
    sb.validate()?;
    if opts.range.is_empty() {
        return Err(QuoteReelError::validation(
            "render_to_mp4 range must be non-empty",
        ));
    }
    if opts.range.end.0 > sb.duration.0 {
        return Err(QuoteReelError::validation(
            "render_to_mp4 range must be within storyboard duration",
        ));
    }

    let fps = if sb.fps.den == 1 {
        sb.fps.num
    } else {
        return Err(QuoteReelError::validation(
            "render_to_mp4 requires integer fps (fps.den == 1)",
        ));
    };

    let cfg = crate::encode_ffmpeg::EncodeConfig {
        width: sb.canvas.width,
        height: sb.canvas.height,
        fps,
        out_path: out_path.into(),
        overwrite: opts.overwrite,
    };
    let mut encoder = crate::encode_ffmpeg::FfmpegEncoder::new(cfg, opts.settings.flatten_rgba)?;

    let chunk_size = (opts.threading.chunk_size.max(1)) as u64;
    let mut stats = RenderStats::default();

    let maybe_pool = if opts.threading.parallel {
        Some(build_thread_pool(opts.threading.threads)?)
    } else {
        None
    };
    let mut sequential_compositor = CpuCompositor::new(sb.canvas, opts.settings.clone());

    let mut chunk_start = opts.range.start.0;
    while chunk_start < opts.range.end.0 {
        let chunk_end = (chunk_start + chunk_size).min(opts.range.end.0);
        let chunk = FrameRange {
            start: FrameIndex(chunk_start),
            end: FrameIndex(chunk_end),
        };

        let frames = match &maybe_pool {
            Some(pool) => render_range_parallel(sb, chunk, assets, &opts.settings, pool)?,
            None => {
                let mut out = Vec::with_capacity(chunk.len_frames() as usize);
                for f in chunk.start.0..chunk.end.0 {
                    out.push(render_frame_with(
                        sb,
                        FrameIndex(f),
                        assets,
                        &mut sequential_compositor,
                    )?);
                }
                out
            }
        };

        for frame in &frames {
            encoder.encode_frame(frame)?;
        }
        stats.frames_total += chunk.len_frames();
        stats.frames_rendered += chunk.len_frames();
        chunk_start = chunk_end;
    }

    encoder.finish()?;
    tracing::info!(
        frames = stats.frames_rendered,
        "finished mp4 encode"
    );
    Ok(stats)
}

fn render_range_parallel(
    sb: &Storyboard,
    range: FrameRange,
    assets: &PreparedAssets,
    settings: &RenderSettings,
    pool: &rayon::ThreadPool,
) -> QuoteReelResult<Vec<FrameRGBA>> {
    let indices: Vec<u64> = (range.start.0..range.end.0).collect();
    let rendered = pool.install(|| {
        indices
            .par_iter()
            .map_init(
                || CpuCompositor::new(sb.canvas, settings.clone()),
                |compositor, f| render_frame_with(sb, FrameIndex(*f), assets, compositor),
            )
            .collect::<Vec<_>>()
    });

    let mut frames = Vec::with_capacity(rendered.len());
    for item in rendered {
        frames.push(item?);
    }
    Ok(frames)
}

fn build_thread_pool(threads: Option<usize>) -> QuoteReelResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(QuoteReelError::validation(
            "render threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| QuoteReelError::evaluation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Canvas, Fps};
    use crate::model::Background;

    fn small_solid_storyboard() -> Storyboard {
        let mut sb = Storyboard::portrait_default();
        sb.canvas = Canvas {
            width: 32,
            height: 32,
        };
        sb.duration = FrameIndex(6);
        sb.background = Background::Solid {
            rgba8: [5, 6, 7, 255],
        };
        sb
    }

    #[test]
    fn sequential_and_parallel_render_identical_frames() {
        let sb = small_solid_storyboard();
        let assets = PreparedAssets::prepare(&sb, std::env::temp_dir()).unwrap();
        let range = FrameRange::new(FrameIndex(0), FrameIndex(6)).unwrap();

        let seq = render_frames(
            &sb,
            range,
            &assets,
            &RenderSettings::default(),
            &RenderThreading::default(),
        )
        .unwrap();
        let par = render_frames(
            &sb,
            range,
            &assets,
            &RenderSettings::default(),
            &RenderThreading {
                parallel: true,
                threads: Some(2),
                ..RenderThreading::default()
            },
        )
        .unwrap();

        assert_eq!(seq.len(), 6);
        assert_eq!(par.len(), 6);
        for (a, b) in seq.iter().zip(&par) {
            assert_eq!(a.data, b.data);
        }
    }

    #[test]
    fn render_frames_rejects_bad_ranges() {
        let sb = small_solid_storyboard();
        let assets = PreparedAssets::prepare(&sb, std::env::temp_dir()).unwrap();

        let empty = FrameRange::new(FrameIndex(2), FrameIndex(2)).unwrap();
        assert!(
            render_frames(
                &sb,
                empty,
                &assets,
                &RenderSettings::default(),
                &RenderThreading::default()
            )
            .is_err()
        );

        let oob = FrameRange::new(FrameIndex(0), FrameIndex(99)).unwrap();
        assert!(
            render_frames(
                &sb,
                oob,
                &assets,
                &RenderSettings::default(),
                &RenderThreading::default()
            )
            .is_err()
        );
    }

    #[test]
    fn mp4_requires_integer_fps() {
        let mut sb = small_solid_storyboard();
        sb.fps = Fps {
            num: 30000,
            den: 1001,
        };
        let assets = PreparedAssets::prepare(&sb, std::env::temp_dir()).unwrap();

        let opts = RenderToMp4Opts {
            range: FrameRange::new(FrameIndex(0), FrameIndex(6)).unwrap(),
            ..RenderToMp4Opts::default()
        };
        let err = render_to_mp4(&sb, std::env::temp_dir().join("out.mp4"), opts, &assets);
        assert!(err.is_err());
    }

    #[test]
    fn zero_worker_threads_is_rejected() {
        assert!(build_thread_pool(Some(0)).is_err());
    }
}
