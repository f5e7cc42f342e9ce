use super::*;
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

struct RecordingBackend {
    log: Log,
    caps: TimerCaps,
}

impl TimerBackend for RecordingBackend {
    fn capabilities(&self) -> TimerCaps {
        self.caps
    }

    fn timer_start(&mut self, _tick: TickHandle, interval_ms: u32) {
        self.log.borrow_mut().push(format!("start {interval_ms}"));
    }

    fn timer_stop(&mut self) {
        self.log.borrow_mut().push("stop".to_owned());
    }

    fn timer_set_interval(&mut self, interval_ms: u32) {
        self.log.borrow_mut().push(format!("set {interval_ms}"));
    }
}

fn recording(live_interval: bool) -> (Timer, Log) {
    let log: Log = Rc::default();
    let backend = RecordingBackend {
        log: log.clone(),
        caps: TimerCaps {
            start_stop: true,
            live_interval,
        },
    };
    let timer = Timer::new(Box::new(backend), TimerOpts::default()).unwrap();
    (timer, log)
}

fn pushing(name: &'static str, calls: &Log, flow: Flow) -> Callback {
    let calls = calls.clone();
    Callback::new(name, move |_| {
        calls.borrow_mut().push(name.to_owned());
        Ok(flow)
    })
}

#[test]
fn backend_without_start_stop_is_rejected_at_construction() {
    let backend = RecordingBackend {
        log: Rc::default(),
        caps: TimerCaps {
            start_stop: false,
            live_interval: true,
        },
    };
    let err = Timer::new(Box::new(backend), TimerOpts::default())
        .err()
        .unwrap();
    assert!(matches!(err, CadenzaError::Config(_)));
}

#[test]
fn defaults_and_zero_interval() {
    let t = Timer::manual(1000).unwrap();
    assert_eq!(t.interval_ms(), 1000);
    assert!(!t.single_shot());
    assert!(!t.is_active());
    assert!(Timer::manual(0).is_err());
    assert!(t.set_interval(0).is_err());
    assert_eq!(t.interval_ms(), 1000);
}

#[test]
fn stop_is_idempotent_and_leaves_registry_alone() {
    let t = Timer::manual(10).unwrap();
    t.stop();
    let calls: Log = Rc::default();
    t.add_callback(pushing("a", &calls, Flow::Continue), CallArgs::none());
    t.start(None).unwrap();
    t.stop();
    assert_eq!(t.callback_count(), 1);
    t.stop();
    assert_eq!(t.callback_count(), 1);
    assert!(!t.is_active());
}

#[test]
fn start_with_override_sets_interval_first() {
    let (t, log) = recording(true);
    t.start(Some(40)).unwrap();
    assert_eq!(t.interval_ms(), 40);
    assert_eq!(log.borrow().last().map(String::as_str), Some("start 40"));
}

#[test]
fn callbacks_run_in_registration_order_and_stop_deregisters() {
    let t = Timer::manual(10).unwrap();
    let calls: Log = Rc::default();
    t.add_callback(pushing("a", &calls, Flow::Continue), CallArgs::none());
    t.add_callback(pushing("b", &calls, Flow::Stop), CallArgs::none());
    t.add_callback(pushing("c", &calls, Flow::Continue), CallArgs::none());
    t.start(None).unwrap();

    assert!(t.fire().unwrap());
    assert_eq!(*calls.borrow(), vec!["a", "b", "c"]);
    assert_eq!(t.callback_names(), vec!["a", "c"]);

    assert!(t.fire().unwrap());
    assert_eq!(*calls.borrow(), vec!["a", "b", "c", "a", "c"]);
}

#[test]
fn timer_stops_itself_when_registry_empties() {
    let t = Timer::manual(10).unwrap();
    let calls: Log = Rc::default();
    t.add_callback(pushing("only", &calls, Flow::Stop), CallArgs::none());
    t.start(None).unwrap();

    assert!(!t.fire().unwrap());
    assert!(!t.is_active());
    assert_eq!(t.callback_count(), 0);
    assert!(!t.fire().unwrap());
    assert_eq!(calls.borrow().len(), 1);
}

#[test]
fn callbacks_added_during_a_tick_wait_for_the_next_one() {
    let t = Timer::manual(10).unwrap();
    let calls: Log = Rc::default();
    let late = pushing("late", &calls, Flow::Continue);
    let adder = {
        let t = t.clone();
        let calls = calls.clone();
        let late = late.clone();
        Callback::new("adder", move |_| {
            calls.borrow_mut().push("adder".to_owned());
            t.add_callback(late.clone(), CallArgs::none());
            Ok(Flow::Stop)
        })
    };
    t.add_callback(adder, CallArgs::none());
    t.start(None).unwrap();

    t.fire().unwrap();
    assert_eq!(*calls.borrow(), vec!["adder"]);
    t.fire().unwrap();
    assert_eq!(*calls.borrow(), vec!["adder", "late"]);
}

#[test]
fn callbacks_removed_earlier_in_the_tick_are_skipped() {
    let t = Timer::manual(10).unwrap();
    let calls: Log = Rc::default();
    let victim = pushing("victim", &calls, Flow::Continue);
    let remover = {
        let t = t.clone();
        let victim = victim.clone();
        Callback::new("remover", move |_| {
            t.remove_callback(&victim, None)?;
            Ok(Flow::Continue)
        })
    };
    t.add_callback(remover, CallArgs::none());
    t.add_callback(victim, CallArgs::none());
    t.start(None).unwrap();

    t.fire().unwrap();
    assert!(calls.borrow().is_empty());
    assert_eq!(t.callback_names(), vec!["remover"]);
}

#[test]
fn single_shot_fires_once() {
    let t = Timer::manual(10).unwrap();
    t.set_single_shot(true);
    let calls: Log = Rc::default();
    t.add_callback(pushing("a", &calls, Flow::Continue), CallArgs::none());
    t.start(None).unwrap();

    assert!(!t.fire().unwrap());
    assert!(!t.fire().unwrap());
    assert_eq!(calls.borrow().len(), 1);
    assert_eq!(t.callback_count(), 1);
}

#[test]
fn interval_change_on_running_timer_uses_backend_capability() {
    let (live, live_log) = recording(true);
    live.start(None).unwrap();
    live.set_interval(250).unwrap();
    assert_eq!(*live_log.borrow(), vec!["start 1000", "set 250"]);

    let (restart, restart_log) = recording(false);
    restart.set_interval(300).unwrap();
    assert!(restart_log.borrow().is_empty());
    restart.start(None).unwrap();
    restart.set_interval(250).unwrap();
    assert_eq!(
        *restart_log.borrow(),
        vec!["start 300", "stop", "start 250"]
    );
}

#[test]
fn callback_error_aborts_the_tick() {
    let t = Timer::manual(10).unwrap();
    let calls: Log = Rc::default();
    t.add_callback(
        Callback::new("bad", |_| Err(CadenzaError::render("bad frame"))),
        CallArgs::none(),
    );
    t.add_callback(pushing("after", &calls, Flow::Continue), CallArgs::none());
    t.start(None).unwrap();

    let err = t.fire().unwrap_err();
    assert!(matches!(err, CadenzaError::Render(_)));
    assert!(calls.borrow().is_empty());
    assert!(t.is_active());
    assert_eq!(t.callback_count(), 2);
}

#[test]
fn callback_receives_its_bound_args() {
    let t = Timer::manual(10).unwrap();
    let seen: Rc<RefCell<Vec<CallArgs>>> = Rc::default();
    let f = {
        let seen = seen.clone();
        Callback::new("f", move |args| {
            seen.borrow_mut().push(args.clone());
            Ok(Flow::Continue)
        })
    };
    let args = CallArgs::positional([serde_json::json!(3)]).with_kwarg("k", serde_json::json!("v"));
    t.add_callback(f.clone(), args.clone());
    t.start(None).unwrap();
    t.fire().unwrap();

    assert_eq!(*seen.borrow(), vec![args.clone()]);
    t.remove_callback(&f, Some(&args)).unwrap();
    assert_eq!(t.callback_count(), 0);
}

#[test]
fn tick_handle_outliving_timer_is_inert() {
    let t = Timer::manual(10).unwrap();
    let tick = t.tick_handle();
    assert!(tick.is_alive());
    drop(t);
    assert!(!tick.is_alive());
    assert!(!tick.fire().unwrap());
}
