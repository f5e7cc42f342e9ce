use crate::blit::BlitCache;
use crate::engine::drawer::{ArtistDrawer, FrameDrawer};
use crate::export::{CommandBuilder, ExportOpts, ExportReport, write_movie};
use crate::foundation::core::{ArtifactId, Rect, RegionId};
use crate::foundation::error::{CadenzaError, CadenzaResult};
use crate::frames::{FrameIter, FrameProvider};
use crate::host::figure::Figure;
use crate::host::signals::{ConnectionId, SurfaceEventKind};
use crate::surface::Surface;
use crate::timer::periodic::Timer;
use crate::timer::registry::{CallArgs, Callback, Flow};
use std::cell::{RefCell, RefMut};
use std::path::Path;
use std::rc::{Rc, Weak};

/// Playback options of an [`Animation`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnimationOpts {
    /// Milliseconds between frames.
    pub interval_ms: u32,
    /// Restart the frame sequence when it runs out.
    pub repeat: bool,
    /// Extra pause before each repeat; `None` or `0` repeats at the normal cadence.
    pub repeat_delay_ms: Option<u32>,
    /// Redraw only the regions touched by each frame.
    pub blit: bool,
    /// Upper bound on the drawn-frame log kept for export.
    pub save_count: Option<usize>,
}

impl Default for AnimationOpts {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            repeat: true,
            repeat_delay_ms: None,
            blit: false,
            save_count: None,
        }
    }
}

impl AnimationOpts {
    pub fn validate(&self) -> CadenzaResult<()> {
        if self.interval_ms == 0 {
            return Err(CadenzaError::validation("animation interval must be >= 1 ms"));
        }
        Ok(())
    }

    fn effective_repeat_delay(&self) -> Option<u32> {
        self.repeat_delay_ms.filter(|&ms| ms > 0)
    }
}

/// Lifecycle of an animation engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Clear state drawn; waiting for the surface's first full draw.
    Created,
    /// Subscribed to timer ticks.
    Running,
    /// Blitting engine waiting for the full redraw that follows a resize.
    ResizePause,
    /// The frame sequence ran out without repeat; no longer stepping.
    Finished,
    /// Torn down. Terminal.
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cadence {
    Stepping,
    RepeatDelay { restore_ms: u32 },
}

#[derive(Default)]
struct Connections {
    first_draw: Option<ConnectionId>,
    close: Option<ConnectionId>,
    resize: Option<ConnectionId>,
    end_redraw: Option<ConnectionId>,
}

impl Connections {
    fn drain(&mut self) -> Vec<ConnectionId> {
        [
            self.first_draw.take(),
            self.close.take(),
            self.resize.take(),
            self.end_redraw.take(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

struct Core<S: Surface, T> {
    drawer: Box<dyn FrameDrawer<S, T>>,
    frames: FrameProvider<T>,
    live: FrameIter<T>,
    pending: Option<T>,
    opts: AnimationOpts,
    state: EngineState,
    cadence: Cadence,
    drawn: Vec<ArtifactId>,
    cache: BlitCache<S::Snapshot>,
    conns: Connections,
    resume_after_redraw: bool,
    steps: u64,
    init_draws: u64,
}

struct Engine<S: Surface, T: 'static> {
    me: Weak<Engine<S, T>>,
    figure: Figure<S>,
    timer: Timer,
    step_cb: Callback,
    delay_cb: Callback,
    core: RefCell<Core<S, T>>,
}

/// A timed animation bound to one figure.
///
/// Construction draws the clear state right away; stepping starts on the figure's first full
/// draw and ends for good when the figure closes or the handle is dropped.
pub struct Animation<S: Surface, T: 'static> {
    engine: Rc<Engine<S, T>>,
}

impl<S: Surface, T: Clone + 'static> Animation<S, T> {
    /// An animation driven by its own timer, created through [`Figure::new_timer`].
    pub fn new(
        figure: &Figure<S>,
        frames: impl Into<FrameProvider<T>>,
        drawer: impl FrameDrawer<S, T> + 'static,
        opts: AnimationOpts,
    ) -> CadenzaResult<Self> {
        opts.validate()?;
        let timer = figure.new_timer(opts.interval_ms)?;
        Self::build(figure, timer, frames.into(), Box::new(drawer), opts)
    }

    /// An animation stepping on an existing timer, for keeping several figures in sync.
    ///
    /// The timer's cadence is left as is; `opts.interval_ms` is ignored.
    pub fn with_timer(
        figure: &Figure<S>,
        timer: &Timer,
        frames: impl Into<FrameProvider<T>>,
        drawer: impl FrameDrawer<S, T> + 'static,
        opts: AnimationOpts,
    ) -> CadenzaResult<Self> {
        opts.validate()?;
        Self::build(figure, timer.clone(), frames.into(), Box::new(drawer), opts)
    }

    fn build(
        figure: &Figure<S>,
        timer: Timer,
        mut frames: FrameProvider<T>,
        drawer: Box<dyn FrameDrawer<S, T>>,
        opts: AnimationOpts,
    ) -> CadenzaResult<Self> {
        if drawer.records_frames() {
            frames.enable_saved_log(opts.save_count);
        }
        let live = frames.new_sequence();
        let engine = Rc::new_cyclic(|me: &Weak<Engine<S, T>>| {
            let weak = me.clone();
            let step_cb = Callback::new("animation_step", move |_| match weak.upgrade() {
                Some(engine) => engine.step(),
                None => Ok(Flow::Stop),
            });
            let weak = me.clone();
            let delay_cb = Callback::new("animation_loop_delay", move |_| match weak.upgrade() {
                Some(engine) => engine.loop_delay(),
                None => Ok(Flow::Stop),
            });
            Engine {
                me: me.clone(),
                figure: figure.clone(),
                timer,
                step_cb,
                delay_cb,
                core: RefCell::new(Core {
                    drawer,
                    frames,
                    live,
                    pending: None,
                    opts,
                    state: EngineState::Created,
                    cadence: Cadence::Stepping,
                    drawn: Vec::new(),
                    cache: BlitCache::new(),
                    conns: Connections::default(),
                    resume_after_redraw: false,
                    steps: 0,
                    init_draws: 0,
                }),
            }
        });
        engine.setup()?;
        Ok(Self { engine })
    }

    /// Stop for good: disconnect from the figure and deregister from the timer.
    pub fn stop(&self) {
        self.engine.teardown();
    }

    pub fn state(&self) -> EngineState {
        self.engine.core.borrow().state
    }

    pub fn timer(&self) -> &Timer {
        &self.engine.timer
    }

    pub fn figure(&self) -> &Figure<S> {
        &self.engine.figure
    }

    pub fn opts(&self) -> AnimationOpts {
        self.engine.core.borrow().opts.clone()
    }

    /// `true` while the pause before a repeat is in progress.
    pub fn in_repeat_delay(&self) -> bool {
        matches!(
            self.engine.core.borrow().cadence,
            Cadence::RepeatDelay { .. }
        )
    }

    /// Frames drawn by timer ticks so far.
    pub fn steps(&self) -> u64 {
        self.engine.core.borrow().steps
    }

    /// Times the clear state was drawn, at construction and after each blitting resize.
    pub fn init_draws(&self) -> u64 {
        self.engine.core.borrow().init_draws
    }

    pub fn drawn_artifacts(&self) -> Vec<ArtifactId> {
        self.engine.core.borrow().drawn.clone()
    }

    /// Number of regions with a cached background.
    pub fn cached_regions(&self) -> usize {
        self.engine.core.borrow().cache.len()
    }

    pub fn is_region_cached(&self, region: RegionId) -> bool {
        self.engine.core.borrow().cache.contains(region)
    }

    pub fn saved_len(&self) -> usize {
        self.engine.core.borrow().frames.saved_len()
    }

    /// The frame data an export would render, in order.
    pub fn saved_frames(&self) -> Vec<T> {
        self.engine.core.borrow_mut().frames.new_saved_sequence().collect()
    }

    /// Render the saved frame sequence to `dest` with the encoder named in `opts`.
    pub fn save(&self, dest: &Path, opts: &ExportOpts) -> CadenzaResult<ExportReport> {
        let builder = opts.encoder.command();
        self.save_with(dest, opts, builder.as_ref())
    }

    /// Render the saved frame sequence to `dest` with a custom encoder command.
    ///
    /// Every frame is drawn without blitting and written as `<prefix><index:04>.png`. A failing
    /// encoder is reported as an error; intermediate files are removed either way unless
    /// `opts.keep_frames` is set.
    pub fn save_with(
        &self,
        dest: &Path,
        opts: &ExportOpts,
        builder: &dyn CommandBuilder,
    ) -> CadenzaResult<ExportReport> {
        let engine = &self.engine;
        let mut guard = engine.core()?;
        let core = &mut *guard;
        let saved = core.frames.new_saved_sequence();
        write_movie(dest, opts, builder, saved, |data, path| {
            engine.draw_next_frame(core, &data, false)?;
            engine.figure.surface_mut().save_to_file(path)
        })
    }
}

impl<S: Surface> Animation<S, Vec<ArtifactId>> {
    /// Flip through pre-built artifacts: frame `i` shows `frames[i]` and hides everything
    /// else that appears in any frame.
    pub fn artists(
        figure: &Figure<S>,
        frames: Vec<Vec<ArtifactId>>,
        opts: AnimationOpts,
    ) -> CadenzaResult<Self> {
        Self::new(figure, FrameProvider::fixed(frames), ArtistDrawer, opts)
    }
}

impl<S: Surface, T: 'static> Drop for Animation<S, T> {
    fn drop(&mut self) {
        self.engine.teardown();
    }
}

impl<S: Surface, T: 'static> Engine<S, T> {
    fn core(&self) -> CadenzaResult<RefMut<'_, Core<S, T>>> {
        self.core
            .try_borrow_mut()
            .map_err(|_| CadenzaError::config("animation re-entered while drawing a frame"))
    }

    fn teardown(&self) {
        let Ok(mut guard) = self.core.try_borrow_mut() else {
            tracing::warn!("animation teardown requested while drawing; ignored");
            return;
        };
        let core = &mut *guard;
        if core.state == EngineState::Stopped {
            return;
        }
        for id in core.conns.drain() {
            self.figure.disconnect(id);
        }
        self.timer.discard_callback(&self.step_cb);
        if let Cadence::RepeatDelay { restore_ms } = core.cadence {
            self.timer.discard_callback(&self.delay_cb);
            if let Err(err) = self.timer.set_interval(restore_ms) {
                tracing::warn!(%err, "could not restore timer interval");
            }
            core.cadence = Cadence::Stepping;
        }
        let paused_shared = std::mem::take(&mut core.resume_after_redraw);
        if self.timer.callback_count() == 0 {
            self.timer.stop();
        } else if paused_shared && !self.timer.is_active() {
            // Other subscribers lost their ticks to our resize pause.
            if let Err(err) = self.timer.start(None) {
                tracing::warn!(%err, "could not restart shared timer");
            }
        }
        core.state = EngineState::Stopped;
        tracing::info!(steps = core.steps, "animation stopped");
    }
}

impl<S: Surface, T: Clone + 'static> Engine<S, T> {
    fn setup(&self) -> CadenzaResult<()> {
        let mut guard = self.core()?;
        let core = &mut *guard;
        self.init_draw(core)?;

        let weak = self.me.clone();
        core.conns.first_draw = Some(self.figure.connect(SurfaceEventKind::Draw, move |_| {
            weak.upgrade().map_or(Ok(()), |e| e.on_first_draw())
        }));
        let weak = self.me.clone();
        core.conns.close = Some(self.figure.connect(SurfaceEventKind::Close, move |_| {
            if let Some(e) = weak.upgrade() {
                e.teardown();
            }
            Ok(())
        }));
        if core.opts.blit {
            core.conns.resize = Some(self.connect_resize());
        }
        tracing::debug!(blit = core.opts.blit, "animation created");
        Ok(())
    }

    fn connect_resize(&self) -> ConnectionId {
        let weak = self.me.clone();
        self.figure.connect(SurfaceEventKind::Resize, move |_| {
            weak.upgrade().map_or(Ok(()), |e| e.on_resize())
        })
    }

    fn init_draw(&self, core: &mut Core<S, T>) -> CadenzaResult<()> {
        let mut surface = self.figure.surface_mut();
        core.drawn = core.drawer.init_draw(&mut surface, &mut core.frames)?;
        surface.request_idle_redraw();
        core.init_draws += 1;
        Ok(())
    }

    fn on_first_draw(&self) -> CadenzaResult<()> {
        let mut guard = self.core()?;
        let core = &mut *guard;
        if core.state != EngineState::Created {
            return Ok(());
        }
        if let Some(id) = core.conns.first_draw.take() {
            self.figure.disconnect(id);
        }
        if core.opts.blit {
            // The first full draw is the earliest point with trustworthy backgrounds.
            let mut surface = self.figure.surface_mut();
            post_draw(&mut *surface, core, true)?;
        }
        self.timer.add_callback(self.step_cb.clone(), CallArgs::none());
        self.timer.start(None)?;
        core.state = EngineState::Running;
        tracing::info!(interval_ms = self.timer.interval_ms(), "animation started");
        Ok(())
    }

    fn step(&self) -> CadenzaResult<Flow> {
        let mut guard = self.core()?;
        let core = &mut *guard;
        if core.state == EngineState::ResizePause {
            return Ok(Flow::Continue);
        }
        let Some(data) = core.pending.take().or_else(|| core.live.next()) else {
            tracing::warn!("frame sequence is empty; stopping");
            core.state = EngineState::Finished;
            return Ok(Flow::Stop);
        };

        let blit = core.opts.blit;
        self.draw_next_frame(core, &data, blit)?;
        core.frames.record(&data);
        core.steps += 1;

        match core.live.next() {
            Some(next) => {
                core.pending = Some(next);
                Ok(Flow::Continue)
            }
            None => self.sequence_exhausted(core),
        }
    }

    fn sequence_exhausted(&self, core: &mut Core<S, T>) -> CadenzaResult<Flow> {
        if !core.opts.repeat {
            tracing::debug!(steps = core.steps, "frame sequence exhausted");
            core.state = EngineState::Finished;
            return Ok(Flow::Stop);
        }

        core.live = core.frames.new_sequence();
        core.pending = core.live.next();
        if core.pending.is_none() {
            tracing::warn!("restarted frame sequence is empty; stopping");
            core.state = EngineState::Finished;
            return Ok(Flow::Stop);
        }

        if let Some(delay_ms) = core.opts.effective_repeat_delay() {
            let restore_ms = self.timer.interval_ms();
            self.timer.replace_callback(&self.step_cb, self.delay_cb.clone())?;
            self.timer.set_interval(delay_ms)?;
            core.cadence = Cadence::RepeatDelay { restore_ms };
            tracing::debug!(delay_ms, restore_ms, "entering repeat delay");
        }
        Ok(Flow::Continue)
    }

    fn loop_delay(&self) -> CadenzaResult<Flow> {
        let mut guard = self.core()?;
        let core = &mut *guard;
        let Cadence::RepeatDelay { restore_ms } = core.cadence else {
            return Ok(Flow::Stop);
        };
        self.timer.replace_callback(&self.delay_cb, self.step_cb.clone())?;
        self.timer.set_interval(restore_ms)?;
        core.cadence = Cadence::Stepping;
        tracing::debug!(interval_ms = restore_ms, "repeat delay over");
        Ok(Flow::Continue)
    }

    fn draw_next_frame(&self, core: &mut Core<S, T>, data: &T, blit: bool) -> CadenzaResult<()> {
        let mut surface = self.figure.surface_mut();
        if blit {
            blit_clear(&mut *surface, &core.drawn, &core.cache);
        } else {
            core.drawer.clear_previous(&mut surface, &core.drawn)?;
        }
        core.drawn = core.drawer.draw_frame(&mut surface, data)?;
        post_draw(&mut *surface, core, blit)
    }

    fn on_resize(&self) -> CadenzaResult<()> {
        let mut guard = self.core()?;
        let core = &mut *guard;
        if let Some(id) = core.conns.resize.take() {
            self.figure.disconnect(id);
        }
        core.resume_after_redraw = core.state == EngineState::Running && self.timer.is_active();
        if core.resume_after_redraw {
            self.timer.stop();
        }
        core.cache.invalidate();
        self.init_draw(core)?;
        if core.state == EngineState::Running {
            core.state = EngineState::ResizePause;
        }

        let weak = self.me.clone();
        core.conns.end_redraw = Some(self.figure.connect(SurfaceEventKind::Draw, move |_| {
            weak.upgrade().map_or(Ok(()), |e| e.end_redraw())
        }));
        tracing::debug!(resume = core.resume_after_redraw, "paused for resize");
        Ok(())
    }

    fn end_redraw(&self) -> CadenzaResult<()> {
        let mut guard = self.core()?;
        let core = &mut *guard;
        if let Some(id) = core.conns.end_redraw.take() {
            self.figure.disconnect(id);
        }
        {
            let blit = core.opts.blit;
            let mut surface = self.figure.surface_mut();
            post_draw(&mut *surface, core, blit)?;
        }
        if core.state == EngineState::ResizePause {
            core.state = EngineState::Running;
        }
        if std::mem::take(&mut core.resume_after_redraw) {
            self.timer.start(None)?;
        }
        core.conns.resize = Some(self.connect_resize());
        tracing::debug!("resumed after resize");
        Ok(())
    }
}

fn post_draw<S: Surface, T>(
    surface: &mut S,
    core: &mut Core<S, T>,
    blit: bool,
) -> CadenzaResult<()> {
    if blit && !core.drawn.is_empty() {
        blit_draw(surface, &core.drawn, &mut core.cache)
    } else {
        surface.request_idle_redraw();
        Ok(())
    }
}

fn blit_draw<S: Surface>(
    surface: &mut S,
    artifacts: &[ArtifactId],
    cache: &mut BlitCache<S::Snapshot>,
) -> CadenzaResult<()> {
    let mut touched: Vec<(RegionId, Rect)> = Vec::new();
    for &artifact in artifacts {
        let (region, bbox) = region_with_bbox(surface, artifact)?;
        cache.capture_if_absent(region, || surface.capture_region(bbox));
        surface.draw_artifact(artifact)?;
        if !touched.iter().any(|(r, _)| *r == region) {
            touched.push((region, bbox));
        }
    }
    for (_, bbox) in touched {
        surface.flush_region(bbox);
    }
    Ok(())
}

fn blit_clear<S: Surface>(
    surface: &mut S,
    artifacts: &[ArtifactId],
    cache: &BlitCache<S::Snapshot>,
) {
    let mut restored: Vec<RegionId> = Vec::new();
    for &artifact in artifacts {
        let Some(region) = surface.region_of(artifact) else {
            continue;
        };
        if restored.contains(&region) {
            continue;
        }
        restored.push(region);
        if let (Some(bbox), Some(snapshot)) = (surface.region_bbox(region), cache.get(region)) {
            surface.restore_region(bbox, snapshot);
        }
    }
}

fn region_with_bbox<S: Surface>(
    surface: &S,
    artifact: ArtifactId,
) -> CadenzaResult<(RegionId, Rect)> {
    let region = surface
        .region_of(artifact)
        .ok_or_else(|| CadenzaError::render(format!("unknown artifact {artifact:?}")))?;
    let bbox = surface
        .region_bbox(region)
        .ok_or_else(|| CadenzaError::render(format!("unknown region {region:?}")))?;
    Ok((region, bbox))
}

#[cfg(test)]
#[path = "../../tests/unit/engine/animation.rs"]
mod tests;
