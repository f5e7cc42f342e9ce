//! Cadenza drives frame-by-frame animation of a drawing surface.
//!
//! - A [`Timer`] normalizes host event-loop timers into one periodic contract
//! - An [`Animation`] pulls frame data from a [`FrameProvider`], draws it through a
//!   [`FrameDrawer`], and flushes either the full surface or only the touched regions
//! - [`Animation::save`] renders the saved frame sequence to a movie through an external encoder
#![forbid(unsafe_code)]

mod foundation;

/// Background snapshots for partial redraws.
pub mod blit;
/// JSON configuration.
pub mod config;
pub mod engine;
/// Movie export through external encoders.
pub mod export;
/// Frame data sources.
pub mod frames;
pub mod host;
pub mod surface;
pub mod timer;

pub use crate::foundation::core::{ArtifactId, Point, Rect, RegionId};
pub use crate::foundation::error::{CadenzaError, CadenzaResult};

pub use crate::blit::BlitCache;
pub use crate::config::CadenzaConfig;
pub use crate::engine::animation::{Animation, AnimationOpts, EngineState};
pub use crate::engine::drawer::{ArtistDrawer, FrameDrawer, FuncDrawer};
pub use crate::export::{
    CommandBuilder, EncodeRequest, EncoderKind, ExportOpts, ExportReport, FfmpegCommand,
    MencoderCommand,
};
pub use crate::frames::{FrameDatum, FrameIter, FrameProvider, Frames};
pub use crate::host::event_loop::{EventLoop, RunStats};
pub use crate::host::figure::Figure;
pub use crate::host::signals::{SurfaceEvent, SurfaceEventKind};
pub use crate::surface::Surface;
pub use crate::surface::raster::{RasterSurface, Shape};
pub use crate::timer::backend::{TimerBackend, TimerBackendKind, TimerCaps};
pub use crate::timer::periodic::{TickHandle, Timer, TimerOpts};
pub use crate::timer::registry::{CallArgs, Callback, CallbackRegistry, Flow};
