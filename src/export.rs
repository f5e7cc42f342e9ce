use crate::foundation::error::{CadenzaError, CadenzaResult};
use anyhow::Context as _;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// External program that assembles the numbered stills into a movie.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    #[default]
    Ffmpeg,
    Mencoder,
}

impl EncoderKind {
    pub fn command(self) -> Box<dyn CommandBuilder> {
        match self {
            Self::Ffmpeg => Box::new(FfmpegCommand),
            Self::Mencoder => Box::new(MencoderCommand),
        }
    }
}

/// Movie export options.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ExportOpts {
    pub fps: u32,
    pub codec: String,
    /// Leave the intermediate PNG files on disk.
    pub keep_frames: bool,
    /// Intermediate files are named `<frame_prefix><index:04>.png`.
    pub frame_prefix: String,
    pub encoder: EncoderKind,
    /// Stop after this many frames; required to export an endless saved sequence.
    pub max_frames: Option<usize>,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            fps: 5,
            codec: "mpeg4".to_owned(),
            keep_frames: false,
            frame_prefix: "_tmp".to_owned(),
            encoder: EncoderKind::Ffmpeg,
            max_frames: None,
        }
    }
}

impl ExportOpts {
    pub fn validate(&self) -> CadenzaResult<()> {
        if self.fps == 0 {
            return Err(CadenzaError::validation("export fps must be non-zero"));
        }
        if self.codec.trim().is_empty() {
            return Err(CadenzaError::validation("export codec must be non-empty"));
        }
        if self.frame_prefix.is_empty() {
            return Err(CadenzaError::validation("frame prefix must be non-empty"));
        }
        Ok(())
    }
}

/// Everything an encoder command line is built from.
#[derive(Clone, Copy, Debug)]
pub struct EncodeRequest<'a> {
    pub output: &'a Path,
    pub fps: u32,
    pub codec: &'a str,
    pub frame_prefix: &'a str,
}

/// Builds the invocation of one external encoder.
pub trait CommandBuilder {
    fn program(&self) -> &str;
    fn args(&self, req: &EncodeRequest<'_>) -> Vec<OsString>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegCommand;

impl CommandBuilder for FfmpegCommand {
    fn program(&self) -> &str {
        "ffmpeg"
    }

    fn args(&self, req: &EncodeRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-y".to_owned(),
            "-r".to_owned(),
            req.fps.to_string(),
            "-b".to_owned(),
            "1800k".to_owned(),
            "-i".to_owned(),
            format!("{}%04d.png", req.frame_prefix),
            "-vcodec".to_owned(),
            req.codec.to_owned(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(req.output.as_os_str().to_owned());
        args
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MencoderCommand;

impl CommandBuilder for MencoderCommand {
    fn program(&self) -> &str {
        "mencoder"
    }

    fn args(&self, req: &EncodeRequest<'_>) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            format!("mf://{}*.png", req.frame_prefix),
            "-mf".to_owned(),
            format!("type=png:fps={}", req.fps),
            "-ovc".to_owned(),
            "lavc".to_owned(),
            "-lavcopts".to_owned(),
            format!("vcodec={}", req.codec),
            "-oac".to_owned(),
            "copy".to_owned(),
            "-o".to_owned(),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(req.output.as_os_str().to_owned());
        args
    }
}

/// Outcome of a successful export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportReport {
    pub output: PathBuf,
    pub frames: usize,
    /// Intermediate files still on disk (empty unless `keep_frames`).
    pub kept_frames: Vec<PathBuf>,
}

pub fn frame_path(prefix: &str, index: usize) -> PathBuf {
    PathBuf::from(format!("{prefix}{index:04}.png"))
}

/// Run the encoder to completion. A non-zero exit becomes [`CadenzaError::Encoder`].
pub fn run_encoder(builder: &dyn CommandBuilder, req: &EncodeRequest<'_>) -> CadenzaResult<()> {
    let program = builder.program();
    let output = Command::new(program)
        .args(builder.args(req))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to run encoder `{program}`"))?;

    if !output.status.success() {
        return Err(CadenzaError::Encoder {
            program: program.to_owned(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(())
}

/// Render `frames` to numbered stills, encode them, then clean up.
///
/// `render` draws one frame and writes it to the given path. Intermediate files are removed
/// unless `opts.keep_frames` is set, whether rendering or encoding succeeded or not.
#[tracing::instrument(
    skip_all,
    fields(dest = %dest.display(), fps = opts.fps, codec = %opts.codec)
)]
pub fn write_movie<I: Iterator>(
    dest: &Path,
    opts: &ExportOpts,
    builder: &dyn CommandBuilder,
    frames: I,
    mut render: impl FnMut(I::Item, &Path) -> CadenzaResult<()>,
) -> CadenzaResult<ExportReport> {
    opts.validate()?;
    ensure_parent_dir(dest)?;
    ensure_parent_dir(Path::new(&opts.frame_prefix))?;

    let limit = opts.max_frames.unwrap_or(usize::MAX);
    let mut written = Vec::new();
    let rendered = frames
        .take(limit)
        .enumerate()
        .try_for_each(|(idx, data)| {
            let path = frame_path(&opts.frame_prefix, idx);
            render(data, &path)?;
            written.push(path);
            Ok::<_, CadenzaError>(())
        });

    let encoded = rendered.and_then(|()| {
        tracing::info!(frames = written.len(), program = builder.program(), "encoding");
        run_encoder(
            builder,
            &EncodeRequest {
                output: dest,
                fps: opts.fps,
                codec: &opts.codec,
                frame_prefix: &opts.frame_prefix,
            },
        )
    });

    let frames = written.len();
    let kept_frames = if opts.keep_frames {
        written
    } else {
        remove_frames(&written);
        Vec::new()
    };

    match encoded {
        Ok(()) => Ok(ExportReport {
            output: dest.to_path_buf(),
            frames,
            kept_frames,
        }),
        Err(err) => {
            tracing::warn!(%err, "export failed");
            Err(err)
        }
    }
}

fn remove_frames(paths: &[PathBuf]) {
    for path in paths {
        if let Err(err) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), %err, "failed to remove intermediate frame");
        }
    }
}

fn ensure_parent_dir(path: &Path) -> CadenzaResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    Ok(())
}
