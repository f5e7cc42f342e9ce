use std::path::{Path, PathBuf};

use anyhow::Context as _;
use cadenza::{
    Animation, AnimationOpts, ArtifactId, CadenzaConfig, CadenzaResult, EncoderKind, EventLoop,
    ExportReport, Figure, Frames, FuncDrawer, Point, RasterSurface, Rect, Shape, Surface,
    TimerBackendKind,
};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "cadenza", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play a demo animation on the built-in event loop.
    Play(PlayArgs),
    /// Render a demo animation to a movie (requires `ffmpeg` or `mencoder` on PATH).
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct CommonArgs {
    /// Configuration JSON; command-line flags override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = DemoChoice::Line)]
    demo: DemoChoice,

    /// Frames in one pass of the demo.
    #[arg(long, default_value_t = 25)]
    frames: u64,

    /// Milliseconds between frames.
    #[arg(long)]
    interval_ms: Option<u32>,

    /// Redraw only the regions each frame touches.
    #[arg(long)]
    blit: bool,

    #[arg(long, default_value_t = 320)]
    width: u32,

    #[arg(long, default_value_t = 240)]
    height: u32,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// How long to run the event loop.
    #[arg(long, default_value_t = 5_000)]
    duration_ms: u64,

    /// Sleep in real time instead of jumping between timeouts.
    #[arg(long)]
    realtime: bool,

    /// Write the last displayed frame as a PNG.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Output movie path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long)]
    fps: Option<u32>,

    #[arg(long)]
    codec: Option<String>,

    #[arg(long, value_enum)]
    encoder: Option<EncoderChoice>,

    /// Keep the intermediate PNG files.
    #[arg(long)]
    keep_frames: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DemoChoice {
    /// A line growing point by point.
    Line,
    /// A block hopping across the figure.
    Blocks,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EncoderChoice {
    Ffmpeg,
    Mencoder,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Play(args) => cmd_play(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn load_config(common: &CommonArgs) -> anyhow::Result<CadenzaConfig> {
    let mut cfg = match &common.config {
        Some(path) => CadenzaConfig::from_path(path)?,
        None => CadenzaConfig::default(),
    };
    if let Some(ms) = common.interval_ms {
        cfg.animation.interval_ms = ms;
    }
    if common.blit {
        cfg.animation.blit = true;
    }
    // Nobody fires a manual timer from the CLI.
    if cfg.timer_backend == TimerBackendKind::Manual {
        cfg.timer_backend = TimerBackendKind::After;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn cmd_play(args: PlayArgs) -> anyhow::Result<()> {
    let cfg = load_config(&args.common)?;
    let host = if args.realtime {
        EventLoop::wall_clock()
    } else {
        EventLoop::virtual_time()
    };
    let fig = Figure::attached(
        RasterSurface::new(args.common.width, args.common.height, BACKGROUND)?,
        &host,
        cfg.timer_backend,
    );
    let demo = Demo::build(&fig, &args.common, cfg.animation.clone())?;
    fig.show();

    let stats = host.run_for(args.duration_ms)?;
    println!(
        "played {} frames in {} ms ({} ticks, {} full redraws, state {:?})",
        demo.steps(),
        args.duration_ms,
        stats.ticks,
        stats.redraws,
        demo.state()
    );

    if let Some(path) = args.snapshot {
        fig.surface_mut()
            .save_to_file(&path)
            .with_context(|| format!("write snapshot '{}'", path.display()))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let cfg = load_config(&args.common)?;
    let mut export = cfg.export.clone();
    if let Some(fps) = args.fps {
        export.fps = fps;
    }
    if let Some(codec) = args.codec {
        export.codec = codec;
    }
    if let Some(choice) = args.encoder {
        export.encoder = match choice {
            EncoderChoice::Ffmpeg => EncoderKind::Ffmpeg,
            EncoderChoice::Mencoder => EncoderKind::Mencoder,
        };
    }
    export.keep_frames |= args.keep_frames;

    // Play one pass on virtual time so the drawn frames are logged, then export them.
    let host = EventLoop::virtual_time();
    let fig = Figure::attached(
        RasterSurface::new(args.common.width, args.common.height, BACKGROUND)?,
        &host,
        cfg.timer_backend,
    );
    let opts = AnimationOpts {
        repeat: false,
        ..cfg.animation.clone()
    };
    let pass_ms = u64::from(opts.interval_ms) * (args.common.frames + 1);
    let demo = Demo::build(&fig, &args.common, opts)?;
    fig.show();
    host.run_for(pass_ms)?;

    let report = demo.save(&args.out, &export)?;
    println!(
        "wrote {} ({} frames at {} fps, {:?})",
        report.output.display(),
        report.frames,
        export.fps,
        export.encoder
    );
    for kept in &report.kept_frames {
        println!("kept {}", kept.display());
    }
    Ok(())
}

const BACKGROUND: [u8; 4] = [250, 250, 250, 255];
const AXES: [u8; 4] = [235, 238, 245, 255];
const INK: [u8; 4] = [200, 40, 40, 255];

enum Demo {
    Line(Animation<RasterSurface, u64>),
    Blocks(Animation<RasterSurface, Vec<ArtifactId>>),
}

impl Demo {
    fn build(
        fig: &Figure<RasterSurface>,
        common: &CommonArgs,
        opts: AnimationOpts,
    ) -> CadenzaResult<Self> {
        let frames = common.frames.max(1);
        let region = fig
            .surface_mut()
            .add_region(Rect::new(0.1, 0.1, 0.9, 0.9), AXES);
        match common.demo {
            DemoChoice::Line => {
                let line = fig
                    .surface_mut()
                    .add_artifact(region, Shape::Polyline(Vec::new()), INK)?;
                let points = wave(frames);
                let drawer = FuncDrawer::new(move |s: &mut RasterSurface, n: &u64| {
                    let upto = usize::try_from(*n).map_or(points.len(), |n| n + 1);
                    s.set_shape(line, Shape::Polyline(points[..upto.min(points.len())].to_vec()))?;
                    Ok(vec![line])
                })
                .with_init(move |s: &mut RasterSurface| {
                    s.set_shape(line, Shape::Polyline(Vec::new()))?;
                    Ok(vec![line])
                });
                Ok(Self::Line(Animation::new(fig, Frames::Count(frames), drawer, opts)?))
            }
            DemoChoice::Blocks => {
                let mut surface = fig.surface_mut();
                let width = 1.0 / frames as f64;
                let mut per_frame = Vec::new();
                for i in 0..frames {
                    let x0 = i as f64 * width;
                    let block = surface.add_artifact(
                        region,
                        Shape::Rect(Rect::new(x0, 0.35, x0 + width, 0.65)),
                        INK,
                    )?;
                    per_frame.push(vec![block]);
                }
                drop(surface);
                Ok(Self::Blocks(Animation::artists(fig, per_frame, opts)?))
            }
        }
    }

    fn steps(&self) -> u64 {
        match self {
            Self::Line(a) => a.steps(),
            Self::Blocks(a) => a.steps(),
        }
    }

    fn state(&self) -> cadenza::EngineState {
        match self {
            Self::Line(a) => a.state(),
            Self::Blocks(a) => a.state(),
        }
    }

    fn save(&self, out: &Path, opts: &cadenza::ExportOpts) -> CadenzaResult<ExportReport> {
        match self {
            Self::Line(a) => a.save(out, opts),
            Self::Blocks(a) => a.save(out, opts),
        }
    }
}

/// `n` points of a damped wave across the unit square.
fn wave(n: u64) -> Vec<Point> {
    let last = n.saturating_sub(1).max(1) as f64;
    (0..n)
        .map(|i| {
            let t = i as f64 / last;
            let y = 0.5 - 0.4 * (t * 12.0).sin() * (-2.0 * t).exp();
            Point::new(t, y)
        })
        .collect()
}
