use crate::foundation::core::ArtifactId;
use crate::foundation::error::CadenzaResult;
use crate::frames::FrameProvider;
use crate::surface::Surface;

/// The animation-specific part of drawing a frame.
///
/// Every hook returns the artifacts it touched; the engine keeps the last such list to clear and
/// blit the next frame.
pub trait FrameDrawer<S: Surface, T> {
    /// Render the "clear" state shown before the first tick. Also re-run after every resize
    /// while blitting.
    fn init_draw(
        &mut self,
        surface: &mut S,
        frames: &mut FrameProvider<T>,
    ) -> CadenzaResult<Vec<ArtifactId>>;

    fn draw_frame(&mut self, surface: &mut S, data: &T) -> CadenzaResult<Vec<ArtifactId>>;

    /// Undo the previous frame when not blitting.
    fn clear_previous(&mut self, _surface: &mut S, _previous: &[ArtifactId]) -> CadenzaResult<()> {
        Ok(())
    }

    /// Whether drawn frame data should be logged for export.
    fn records_frames(&self) -> bool {
        false
    }
}

type DrawFn<S, T> = Box<dyn FnMut(&mut S, &T) -> CadenzaResult<Vec<ArtifactId>>>;
type InitFn<S> = Box<dyn FnMut(&mut S) -> CadenzaResult<Vec<ArtifactId>>>;

/// Draws each frame by calling a user function with the frame data.
///
/// Without an init function, the clear state is the first frame of a fresh sequence.
pub struct FuncDrawer<S, T> {
    func: DrawFn<S, T>,
    init: Option<InitFn<S>>,
}

impl<S: Surface, T> FuncDrawer<S, T> {
    pub fn new(
        func: impl FnMut(&mut S, &T) -> CadenzaResult<Vec<ArtifactId>> + 'static,
    ) -> Self {
        Self {
            func: Box::new(func),
            init: None,
        }
    }

    pub fn with_init(
        mut self,
        init: impl FnMut(&mut S) -> CadenzaResult<Vec<ArtifactId>> + 'static,
    ) -> Self {
        self.init = Some(Box::new(init));
        self
    }
}

impl<S: Surface, T: Clone + 'static> FrameDrawer<S, T> for FuncDrawer<S, T> {
    fn init_draw(
        &mut self,
        surface: &mut S,
        frames: &mut FrameProvider<T>,
    ) -> CadenzaResult<Vec<ArtifactId>> {
        if let Some(init) = self.init.as_mut() {
            return init(surface);
        }
        match frames.new_sequence().next() {
            Some(first) => (self.func)(surface, &first),
            None => Ok(Vec::new()),
        }
    }

    fn draw_frame(&mut self, surface: &mut S, data: &T) -> CadenzaResult<Vec<ArtifactId>> {
        (self.func)(surface, data)
    }

    fn records_frames(&self) -> bool {
        true
    }
}

/// Each frame is the list of pre-built artifacts visible during that frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArtistDrawer;

impl<S: Surface> FrameDrawer<S, Vec<ArtifactId>> for ArtistDrawer {
    fn init_draw(
        &mut self,
        surface: &mut S,
        frames: &mut FrameProvider<Vec<ArtifactId>>,
    ) -> CadenzaResult<Vec<ArtifactId>> {
        for frame in frames.new_sequence() {
            for artifact in frame {
                surface.set_visible(artifact, false)?;
            }
        }
        Ok(Vec::new())
    }

    fn draw_frame(
        &mut self,
        surface: &mut S,
        data: &Vec<ArtifactId>,
    ) -> CadenzaResult<Vec<ArtifactId>> {
        for &artifact in data {
            surface.set_visible(artifact, true)?;
        }
        Ok(data.clone())
    }

    fn clear_previous(&mut self, surface: &mut S, previous: &[ArtifactId]) -> CadenzaResult<()> {
        for &artifact in previous {
            surface.set_visible(artifact, false)?;
        }
        Ok(())
    }
}
