use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "quotereel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a single frame as a PNG.
    Frame(FrameArgs),
    /// Render an MP4 video (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Print the evaluated frame script as JSON (no rasterization).
    Eval(EvalArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input storyboard JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input storyboard JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Render frames on a rayon worker pool.
    #[arg(long)]
    parallel: bool,

    /// Worker thread count (requires --parallel).
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Parser, Debug)]
struct EvalArgs {
    /// Input storyboard JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame index (0-based).
    #[arg(long)]
    frame: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
        Command::Eval(args) => cmd_eval(args),
    }
}

fn read_storyboard(path: &Path) -> anyhow::Result<quotereel::Storyboard> {
    let f = File::open(path).with_context(|| format!("open storyboard '{}'", path.display()))?;
    let r = BufReader::new(f);
    let sb: quotereel::Storyboard =
        serde_json::from_reader(r).with_context(|| "parse storyboard JSON")?;
    Ok(sb)
}

fn assets_root(in_path: &Path) -> &Path {
    in_path.parent().unwrap_or_else(|| Path::new("."))
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let sb = read_storyboard(&args.in_path)?;
    sb.validate()?;

    let assets = quotereel::PreparedAssets::prepare(&sb, assets_root(&args.in_path))?;
    let frame = quotereel::render_frame(
        &sb,
        quotereel::FrameIndex(args.frame),
        &assets,
        &quotereel::RenderSettings::default(),
    )?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let sb = read_storyboard(&args.in_path)?;
    sb.validate()?;

    let assets = quotereel::PreparedAssets::prepare(&sb, assets_root(&args.in_path))?;

    let opts = quotereel::RenderToMp4Opts {
        range: quotereel::FrameRange::new(quotereel::FrameIndex(0), sb.duration)?,
        overwrite: true,
        settings: quotereel::RenderSettings::default(),
        threading: quotereel::RenderThreading {
            parallel: args.parallel,
            threads: args.threads,
            ..quotereel::RenderThreading::default()
        },
    };

    let stats = quotereel::render_to_mp4_with_stats(&sb, &args.out, opts, &assets)?;
    eprintln!(
        "wrote {} ({} frames)",
        args.out.display(),
        stats.frames_rendered
    );
    Ok(())
}

fn cmd_eval(args: EvalArgs) -> anyhow::Result<()> {
    let sb = read_storyboard(&args.in_path)?;
    sb.validate()?;

    let assets = quotereel::PreparedAssets::prepare(&sb, assets_root(&args.in_path))?;
    let script = quotereel::Evaluator::eval_frame(&sb, quotereel::FrameIndex(args.frame), &assets)?;
    println!("{}", serde_json::to_string_pretty(&script)?);
    Ok(())
}
