use std::collections::VecDeque;
use std::rc::Rc;

/// A lazily produced, possibly endless, run of frame data.
pub type FrameIter<T> = Box<dyn Iterator<Item = T>>;

/// Produces a fresh [`FrameIter`] each time it is called.
pub type GeneratorFactory<T> = Box<dyn FnMut() -> FrameIter<T>>;

/// Frame data that can stand in for a bare frame number.
///
/// Needed by [`Frames::Count`] (frame `i` is `from_index(i)`) and [`Frames::Endless`] (every
/// frame is `from_index(0)`).
pub trait FrameDatum: Clone + 'static {
    fn from_index(index: u64) -> Self;
}

// Frame numbers past the target's range saturate at its maximum.
macro_rules! frame_datum_int {
    ($($t:ty),*) => {
        $(impl FrameDatum for $t {
            fn from_index(index: u64) -> Self {
                <$t>::try_from(index).unwrap_or(<$t>::MAX)
            }
        })*
    };
}

macro_rules! frame_datum_float {
    ($($t:ty),*) => {
        $(impl FrameDatum for $t {
            fn from_index(index: u64) -> Self {
                index as $t
            }
        })*
    };
}

frame_datum_int!(u32, u64, usize, i32, i64);
frame_datum_float!(f32, f64);

/// Where an animation's frames come from.
pub enum Frames<T> {
    /// Frame numbers `0..n`.
    Count(u64),
    /// A fixed list, replayed from the start on every pass.
    Sequence(Vec<T>),
    /// A factory called once per pass.
    Generator(GeneratorFactory<T>),
    /// No frame data at all: an endless run of a constant, for purely procedural animations.
    Endless,
}

impl<T> Frames<T> {
    pub fn generator<I>(mut factory: impl FnMut() -> I + 'static) -> Self
    where
        I: Iterator<Item = T> + 'static,
    {
        Self::Generator(Box::new(move || Box::new(factory())))
    }
}

/// Source of the live frame sequence and of the saved sequence used for export.
pub struct FrameProvider<T> {
    factory: GeneratorFactory<T>,
    saved: Option<SavedLog<T>>,
}

struct SavedLog<T> {
    values: VecDeque<T>,
    limit: Option<usize>,
}

impl<T: Clone + 'static> FrameProvider<T> {
    pub fn fixed(values: Vec<T>) -> Self {
        let values: Rc<[T]> = values.into();
        Self::from_factory(Box::new(move || {
            let values = values.clone();
            Box::new((0..values.len()).map(move |i| values[i].clone()))
        }))
    }

    pub fn from_factory(factory: GeneratorFactory<T>) -> Self {
        Self {
            factory,
            saved: None,
        }
    }

    /// Keep a log of the frame data actually drawn; the saved sequence then replays it.
    ///
    /// With a `limit`, only the most recent values are kept.
    pub fn enable_saved_log(&mut self, limit: Option<usize>) {
        if self.saved.is_none() {
            self.saved = Some(SavedLog {
                values: VecDeque::new(),
                limit,
            });
        }
    }

    pub fn records_saved_log(&self) -> bool {
        self.saved.is_some()
    }

    /// A fresh live sequence, starting from the first frame.
    pub fn new_sequence(&mut self) -> FrameIter<T> {
        (self.factory)()
    }

    /// The sequence to export: the drawn-frame log when one is kept, else a fresh live sequence.
    ///
    /// A kept log is replayed as is, so nothing is exported before anything was drawn.
    pub fn new_saved_sequence(&mut self) -> FrameIter<T> {
        match &self.saved {
            Some(log) => Box::new(log.values.clone().into_iter()),
            None => self.new_sequence(),
        }
    }

    /// Note that `value` was drawn during live playback.
    pub fn record(&mut self, value: &T) {
        if let Some(log) = self.saved.as_mut() {
            if log.limit == Some(0) {
                return;
            }
            if log.limit.is_some_and(|n| log.values.len() >= n) {
                log.values.pop_front();
            }
            log.values.push_back(value.clone());
        }
    }

    pub fn saved_len(&self) -> usize {
        self.saved.as_ref().map_or(0, |log| log.values.len())
    }
}

impl<T: FrameDatum> From<Frames<T>> for FrameProvider<T> {
    fn from(frames: Frames<T>) -> Self {
        match frames {
            Frames::Count(n) => Self::from_factory(Box::new(move || {
                Box::new((0..n).map(T::from_index))
            })),
            Frames::Sequence(values) => Self::fixed(values),
            Frames::Generator(factory) => Self::from_factory(factory),
            Frames::Endless => Self::from_factory(Box::new(|| {
                Box::new(std::iter::repeat(T::from_index(0)))
            })),
        }
    }
}
