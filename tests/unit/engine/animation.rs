use super::*;
use crate::engine::drawer::FuncDrawer;
use crate::frames::Frames;
use crate::surface::raster::{RasterSurface, Shape};

const BG: [u8; 4] = [0, 0, 0, 255];
const AXES: [u8; 4] = [30, 30, 30, 255];
const RED: [u8; 4] = [255, 0, 0, 255];

type Seen = Rc<RefCell<Vec<u64>>>;

fn plain_figure() -> Figure<RasterSurface> {
    Figure::new(RasterSurface::new(40, 20, BG).unwrap())
}

fn recording_drawer(seen: &Seen) -> FuncDrawer<RasterSurface, u64> {
    let log = seen.clone();
    FuncDrawer::new(move |_s: &mut RasterSurface, v: &u64| {
        log.borrow_mut().push(*v);
        Ok(Vec::new())
    })
}

fn opts(interval_ms: u32, repeat: bool) -> AnimationOpts {
    AnimationOpts {
        interval_ms,
        repeat,
        ..AnimationOpts::default()
    }
}

/// One box artifact in a full-figure region; frame `v` puts it at `x = v/4 .. v/4 + 1/4`.
fn blit_setup() -> (Figure<RasterSurface>, RegionId, ArtifactId) {
    let mut surface = RasterSurface::new(40, 20, BG).unwrap();
    let region = surface.add_region(Rect::new(0.0, 0.0, 1.0, 1.0), AXES);
    let artifact = surface
        .add_artifact(region, Shape::Polyline(Vec::new()), RED)
        .unwrap();
    (Figure::new(surface), region, artifact)
}

fn box_drawer(artifact: ArtifactId) -> FuncDrawer<RasterSurface, u64> {
    FuncDrawer::new(move |s: &mut RasterSurface, v: &u64| {
        let x0 = *v as f64 * 0.25;
        s.set_shape(artifact, Shape::Rect(Rect::new(x0, 0.0, x0 + 0.25, 1.0)))?;
        Ok(vec![artifact])
    })
    .with_init(move |s: &mut RasterSurface| {
        s.set_shape(artifact, Shape::Polyline(Vec::new()))?;
        Ok(vec![artifact])
    })
}

#[test]
fn defaults() {
    let o = AnimationOpts::default();
    assert_eq!(o.interval_ms, 200);
    assert!(o.repeat);
    assert_eq!(o.repeat_delay_ms, None);
    assert!(!o.blit);
    assert!(
        AnimationOpts {
            interval_ms: 0,
            ..o
        }
        .validate()
        .is_err()
    );
}

#[test]
fn waits_for_first_draw_before_stepping() {
    let fig = plain_figure();
    let seen = Seen::default();
    let anim = Animation::new(&fig, Frames::Count(3), recording_drawer(&seen), opts(100, false))
        .unwrap();

    // Without an init function the clear state is the first frame.
    assert_eq!(*seen.borrow(), vec![0]);
    assert_eq!(anim.init_draws(), 1);
    assert_eq!(anim.state(), EngineState::Created);
    assert!(!anim.timer().is_active());
    assert!(fig.surface().redraw_pending());

    assert!(fig.flush_idle().unwrap());
    assert_eq!(anim.state(), EngineState::Running);
    assert!(anim.timer().is_active());
    assert_eq!(anim.timer().interval_ms(), 100);
    assert_eq!(fig.handler_count(SurfaceEventKind::Draw), 0);

    // Later full draws do not restart anything.
    fig.draw().unwrap();
    assert_eq!(anim.timer().callback_count(), 1);
}

#[test]
fn five_frame_list_draws_each_once_then_stops() {
    let fig = plain_figure();
    let seen = Seen::default();
    let anim = Animation::new(
        &fig,
        Frames::Sequence(vec![10, 20, 30, 40, 50]),
        recording_drawer(&seen),
        opts(100, false),
    )
    .unwrap();
    seen.borrow_mut().clear();
    fig.draw().unwrap();

    for _ in 0..4 {
        assert!(anim.timer().fire().unwrap());
    }
    assert!(!anim.timer().fire().unwrap());
    assert_eq!(*seen.borrow(), vec![10, 20, 30, 40, 50]);
    assert_eq!(anim.steps(), 5);
    assert_eq!(anim.timer().callback_count(), 0);
    assert!(!anim.timer().is_active());
    assert_eq!(anim.state(), EngineState::Finished);

    assert!(!anim.timer().fire().unwrap());
    assert_eq!(seen.borrow().len(), 5);
}

#[test]
fn repeat_without_delay_has_no_gap_tick() {
    let fig = plain_figure();
    let seen = Seen::default();
    let anim =
        Animation::new(&fig, Frames::Count(2), recording_drawer(&seen), opts(100, true)).unwrap();
    seen.borrow_mut().clear();
    fig.draw().unwrap();

    for _ in 0..5 {
        assert!(anim.timer().fire().unwrap());
    }
    assert_eq!(*seen.borrow(), vec![0, 1, 0, 1, 0]);
    assert_eq!(anim.timer().interval_ms(), 100);
    assert!(!anim.in_repeat_delay());
}

#[test]
fn repeat_delay_takes_exactly_one_tick_at_the_delay_interval() {
    let fig = plain_figure();
    let seen = Seen::default();
    let anim = Animation::new(
        &fig,
        Frames::Count(3),
        recording_drawer(&seen),
        AnimationOpts {
            interval_ms: 100,
            repeat: true,
            repeat_delay_ms: Some(500),
            ..AnimationOpts::default()
        },
    )
    .unwrap();
    seen.borrow_mut().clear();
    fig.draw().unwrap();

    for _ in 0..3 {
        assert!(anim.timer().fire().unwrap());
    }
    assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    assert!(anim.in_repeat_delay());
    assert_eq!(anim.timer().interval_ms(), 500);
    assert_eq!(anim.timer().callback_names(), vec!["animation_loop_delay"]);

    // The delay tick draws nothing and restores the cadence.
    assert!(anim.timer().fire().unwrap());
    assert_eq!(seen.borrow().len(), 3);
    assert_eq!(anim.timer().interval_ms(), 100);
    assert_eq!(anim.timer().callback_names(), vec!["animation_step"]);

    assert!(anim.timer().fire().unwrap());
    assert_eq!(*seen.borrow(), vec![0, 1, 2, 0]);
}

#[test]
fn zero_repeat_delay_means_no_delay() {
    let fig = plain_figure();
    let seen = Seen::default();
    let anim = Animation::new(
        &fig,
        Frames::Count(1),
        recording_drawer(&seen),
        AnimationOpts {
            interval_ms: 100,
            repeat_delay_ms: Some(0),
            ..AnimationOpts::default()
        },
    )
    .unwrap();
    fig.draw().unwrap();
    assert!(anim.timer().fire().unwrap());
    assert!(!anim.in_repeat_delay());
    assert_eq!(anim.timer().interval_ms(), 100);
}

#[test]
fn stop_is_idempotent_and_cancels_a_pending_delay() {
    let fig = plain_figure();
    let seen = Seen::default();
    let anim = Animation::new(
        &fig,
        Frames::Count(1),
        recording_drawer(&seen),
        AnimationOpts {
            interval_ms: 100,
            repeat_delay_ms: Some(750),
            ..AnimationOpts::default()
        },
    )
    .unwrap();
    fig.draw().unwrap();
    assert!(anim.timer().fire().unwrap());
    assert!(anim.in_repeat_delay());

    anim.stop();
    assert_eq!(anim.state(), EngineState::Stopped);
    assert_eq!(anim.timer().callback_count(), 0);
    assert_eq!(anim.timer().interval_ms(), 100);
    assert!(!anim.timer().is_active());
    assert!(!anim.in_repeat_delay());

    anim.stop();
    assert_eq!(anim.state(), EngineState::Stopped);
    assert_eq!(anim.timer().callback_count(), 0);
}

#[test]
fn close_disconnects_everything() {
    let (fig, _, artifact) = blit_setup();
    let anim = Animation::new(
        &fig,
        Frames::Count(4),
        box_drawer(artifact),
        AnimationOpts {
            blit: true,
            ..opts(50, true)
        },
    )
    .unwrap();
    fig.draw().unwrap();
    assert_eq!(fig.handler_count(SurfaceEventKind::Resize), 1);
    assert_eq!(fig.handler_count(SurfaceEventKind::Close), 1);

    fig.close().unwrap();
    assert_eq!(anim.state(), EngineState::Stopped);
    assert_eq!(fig.handler_count(SurfaceEventKind::Resize), 0);
    assert_eq!(fig.handler_count(SurfaceEventKind::Close), 0);
    assert_eq!(fig.handler_count(SurfaceEventKind::Draw), 0);
    assert!(!anim.timer().fire().unwrap());
    assert_eq!(anim.steps(), 0);
}

#[test]
fn dropping_the_animation_tears_it_down() {
    let fig = plain_figure();
    let seen = Seen::default();
    let timer = {
        let anim = Animation::new(&fig, Frames::Endless, recording_drawer(&seen), opts(10, true))
            .unwrap();
        fig.draw().unwrap();
        anim.timer().clone()
    };
    assert_eq!(timer.callback_count(), 0);
    assert!(!timer.fire().unwrap());
    assert_eq!(fig.handler_count(SurfaceEventKind::Close), 0);
}

#[test]
fn saved_sequence_replays_drawn_frames_in_order() {
    let fig = plain_figure();
    let seen = Seen::default();
    let anim = Animation::new(
        &fig,
        Frames::Sequence(vec![7, 3, 9, 1]),
        recording_drawer(&seen),
        opts(100, false),
    )
    .unwrap();
    assert_eq!(anim.saved_len(), 0);
    fig.draw().unwrap();
    while anim.timer().fire().unwrap() {}

    assert_eq!(anim.saved_frames(), vec![7, 3, 9, 1]);
}

#[test]
fn unplayed_endless_animation_has_nothing_saved() {
    let fig = plain_figure();
    let seen = Seen::default();
    let anim =
        Animation::new(&fig, Frames::Endless, recording_drawer(&seen), opts(100, true)).unwrap();
    assert_eq!(anim.state(), EngineState::Created);
    assert!(anim.saved_frames().is_empty());
}

#[test]
fn save_count_bounds_the_saved_log() {
    let fig = plain_figure();
    let seen = Seen::default();
    let anim = Animation::new(
        &fig,
        Frames::Count(5),
        recording_drawer(&seen),
        AnimationOpts {
            save_count: Some(2),
            ..opts(100, false)
        },
    )
    .unwrap();
    fig.draw().unwrap();
    while anim.timer().fire().unwrap() {}
    assert_eq!(anim.saved_frames(), vec![3, 4]);
}

#[test]
fn empty_sequence_stops_on_first_tick() {
    let fig = plain_figure();
    let seen = Seen::default();
    let anim = Animation::new(
        &fig,
        Frames::Sequence(Vec::new()),
        recording_drawer(&seen),
        opts(100, true),
    )
    .unwrap();
    fig.draw().unwrap();
    assert!(!anim.timer().fire().unwrap());
    assert!(seen.borrow().is_empty());
    assert_eq!(anim.state(), EngineState::Finished);
}

#[test]
fn draw_errors_abort_the_tick() {
    let fig = plain_figure();
    let drawer = FuncDrawer::new(|_s: &mut RasterSurface, v: &u64| {
        if *v == 1 {
            return Err(CadenzaError::render("bad frame"));
        }
        Ok(Vec::new())
    });
    let anim = Animation::new(&fig, Frames::Count(3), drawer, opts(100, false)).unwrap();
    fig.draw().unwrap();
    assert!(anim.timer().fire().unwrap());
    let err = anim.timer().fire().unwrap_err();
    assert!(matches!(err, CadenzaError::Render(_)));
    assert_eq!(anim.steps(), 1);
}

#[test]
fn artist_frames_toggle_visibility() {
    let mut surface = RasterSurface::new(30, 10, BG).unwrap();
    let region = surface.add_region(Rect::new(0.0, 0.0, 1.0, 1.0), AXES);
    let ids: Vec<ArtifactId> = (0..3)
        .map(|i| {
            let x0 = f64::from(i) / 3.0;
            surface
                .add_artifact(region, Shape::Rect(Rect::new(x0, 0.0, x0 + 0.3, 1.0)), RED)
                .unwrap()
        })
        .collect();
    let fig = Figure::new(surface);
    let frames = ids.iter().map(|&id| vec![id]).collect();
    let anim = Animation::artists(&fig, frames, opts(100, true)).unwrap();

    assert!(ids.iter().all(|&id| fig.surface().is_visible(id) == Some(false)));
    fig.draw().unwrap();

    assert!(anim.timer().fire().unwrap());
    assert_eq!(fig.surface().is_visible(ids[0]), Some(true));
    assert!(anim.timer().fire().unwrap());
    assert_eq!(fig.surface().is_visible(ids[0]), Some(false));
    assert_eq!(fig.surface().is_visible(ids[1]), Some(true));
    assert_eq!(anim.drawn_artifacts(), vec![ids[1]]);
}

#[test]
fn blit_erases_previous_frame_from_cached_background() {
    let (fig, region, artifact) = blit_setup();
    let anim = Animation::new(
        &fig,
        Frames::Sequence(vec![0, 2]),
        box_drawer(artifact),
        AnimationOpts {
            blit: true,
            ..opts(100, false)
        },
    )
    .unwrap();
    assert_eq!(anim.cached_regions(), 0);

    fig.draw().unwrap();
    assert!(anim.is_region_cached(region));
    let redraws = fig.surface().full_redraws();

    assert!(anim.timer().fire().unwrap());
    assert_eq!(fig.surface().pixel(5, 5), RED);

    assert!(!anim.timer().fire().unwrap());
    assert_eq!(fig.surface().pixel(5, 5), AXES);
    assert_eq!(fig.surface().pixel(25, 5), RED);

    assert_eq!(fig.surface().full_redraws(), redraws);
    assert!(!fig.surface().redraw_pending());
    assert_eq!(fig.surface().flushes(), 3);
}

#[test]
fn resize_pauses_clears_cache_and_resumes_after_redraw() {
    let (fig, region, artifact) = blit_setup();
    let anim = Animation::new(
        &fig,
        Frames::Count(4),
        box_drawer(artifact),
        AnimationOpts {
            blit: true,
            ..opts(100, true)
        },
    )
    .unwrap();
    fig.draw().unwrap();
    assert!(anim.timer().fire().unwrap());
    assert_eq!(anim.cached_regions(), 1);
    assert_eq!(anim.init_draws(), 1);

    fig.resize(60, 30).unwrap();
    assert_eq!(anim.cached_regions(), 0);
    assert_eq!(anim.init_draws(), 2);
    assert_eq!(anim.state(), EngineState::ResizePause);
    assert!(!anim.timer().is_active());
    assert_eq!(fig.handler_count(SurfaceEventKind::Resize), 0);

    // Nothing steps while paused.
    assert!(!anim.timer().fire().unwrap());
    assert_eq!(anim.steps(), 1);

    fig.draw().unwrap();
    assert_eq!(anim.state(), EngineState::Running);
    assert!(anim.timer().is_active());
    assert!(anim.is_region_cached(region));
    assert_eq!(anim.init_draws(), 2);
    assert_eq!(fig.handler_count(SurfaceEventKind::Resize), 1);
    assert_eq!(fig.handler_count(SurfaceEventKind::Draw), 0);

    assert!(anim.timer().fire().unwrap());
    assert_eq!(anim.steps(), 2);
    assert_eq!(fig.surface().pixel(20, 10), RED);
}

#[test]
fn resize_without_blit_is_ignored() {
    let fig = plain_figure();
    let seen = Seen::default();
    let anim =
        Animation::new(&fig, Frames::Count(3), recording_drawer(&seen), opts(100, true)).unwrap();
    fig.draw().unwrap();
    fig.resize(80, 40).unwrap();
    assert_eq!(anim.state(), EngineState::Running);
    assert!(anim.timer().is_active());
    assert_eq!(anim.init_draws(), 1);
}
