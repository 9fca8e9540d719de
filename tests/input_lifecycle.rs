use std::time::Duration;
use xr_stream_client::render::{GraphicsPlugin, NullGraphicsPlugin};
use xr_stream_client::vr::bindings::Control;
use xr_stream_client::vr::input::{Analog, Button};
use xr_stream_client::vr::null::{NullRuntime, RuntimeCall};
use xr_stream_client::vr::remote::{FrameMailbox, FramePublisher};
use xr_stream_client::vr::session::{LifecycleEvent, SessionState};
use xr_stream_client::vr::{DisplayTime, Hand};
use xr_stream_client::{ClientConfig, Engine, ExitReason, TickOutcome};

type MailboxEngine = Engine<NullRuntime, FrameMailbox, NullGraphicsPlugin>;

fn engine_with(runtime: NullRuntime) -> (MailboxEngine, FramePublisher) {
    let _ = env_logger::builder().is_test(true).try_init();
    let (mailbox, publisher) = FrameMailbox::new();
    let mut graphics = NullGraphicsPlugin::default();
    graphics.initialize_device().expect("device");
    let mut engine = Engine::new(runtime, mailbox, graphics, &ClientConfig::default());
    engine.configure_idle_backoff(Duration::ZERO);
    (engine, publisher)
}

fn a_pressed(publisher: &FramePublisher) -> bool {
    publisher
        .latest_tracking()
        .expect("tracking forwarded")
        .controller(Hand::Right)
        .is_pressed(Button::A)
}

#[test]
fn held_button_reports_only_its_rising_edge() {
    let (mut engine, publisher) = engine_with(NullRuntime::new());
    engine.runtime_mut().set_button(Control::A, Hand::Right, true);

    engine.tick().expect("tick");
    assert!(a_pressed(&publisher));
    for _ in 0..3 {
        engine.tick().expect("tick");
        assert!(!a_pressed(&publisher));
    }

    engine.runtime_mut().set_button(Control::A, Hand::Right, false);
    engine.tick().expect("tick");
    assert!(!a_pressed(&publisher));
    engine.runtime_mut().set_button(Control::A, Hand::Right, true);
    engine.tick().expect("tick");
    assert!(a_pressed(&publisher));
}

#[test]
fn back_button_exits_once_on_release() {
    let (mut engine, _publisher) = engine_with(NullRuntime::new());
    engine.runtime_mut().set_button(Control::Back, Hand::Left, true);

    assert!(matches!(engine.tick().expect("tick"), TickOutcome::Rendered(_)));
    assert!(matches!(engine.tick().expect("tick"), TickOutcome::Rendered(_)));

    engine.runtime_mut().set_button(Control::Back, Hand::Left, false);
    assert_eq!(
        engine.tick().expect("tick"),
        TickOutcome::Exit(ExitReason::BackButton)
    );
    // the release tick still rendered
    assert_eq!(engine.runtime().submissions().len(), 3);
    assert_eq!(engine.telemetry().exit_signals, 1);

    assert!(matches!(engine.tick().expect("tick"), TickOutcome::Rendered(_)));
    assert_eq!(engine.telemetry().exit_signals, 1);
}

#[test]
fn lost_tracking_forwards_the_last_good_pose() {
    let (mut engine, publisher) = engine_with(NullRuntime::new());
    engine.tick().expect("tick");
    let good = publisher.latest_pose().expect("pose forwarded");
    assert!(good.head.is_valid());
    assert_eq!(good.hands.len(), 2);

    engine.runtime_mut().set_tracking_lost(true);
    for _ in 0..3 {
        engine.tick().expect("tick");
        let forwarded = publisher.latest_pose().expect("pose forwarded");
        assert_eq!(forwarded.head, good.head);
        assert_eq!(forwarded.hands, good.hands);
    }
}

#[test]
fn analog_values_carry_over_when_a_control_goes_inactive() {
    let (mut engine, publisher) = engine_with(NullRuntime::new());
    engine
        .runtime_mut()
        .set_float(Control::Trigger, Hand::Left, Some(0.4));
    engine.tick().expect("tick");

    engine.runtime_mut().set_float(Control::Trigger, Hand::Left, None);
    engine.tick().expect("tick");
    let snapshot = publisher.latest_tracking().expect("tracking forwarded");
    assert_eq!(snapshot.controller(Hand::Left).analog(Analog::Trigger), 0.4);
}

#[test]
fn joystick_axes_reach_the_snapshot() {
    let (mut engine, publisher) = engine_with(NullRuntime::new());
    engine.runtime_mut().set_joystick(Hand::Right, Some((0.25, -0.75)));
    engine.tick().expect("tick");

    let snapshot = publisher.latest_tracking().expect("tracking forwarded");
    let right = snapshot.controller(Hand::Right);
    assert_eq!(right.analog(Analog::JoystickX), 0.25);
    assert_eq!(right.analog(Analog::JoystickY), -0.75);
    assert_eq!(snapshot.controller(Hand::Left).analog(Analog::JoystickX), 0.0);
}

#[test]
fn squeezing_grip_past_threshold_pulses_that_hand() {
    let (mut engine, _publisher) = engine_with(NullRuntime::new());
    engine
        .runtime_mut()
        .set_float(Control::Grip, Hand::Right, Some(0.95));
    engine
        .runtime_mut()
        .set_float(Control::Grip, Hand::Left, Some(0.5));
    engine.tick().expect("tick");

    let pulsed: Vec<_> = engine.runtime().vibrations().iter().map(|(hand, _)| *hand).collect();
    assert_eq!(pulsed, vec![Hand::Right]);
}

#[test]
fn quit_request_ends_the_session_without_restart() {
    let (mut engine, _publisher) = engine_with(NullRuntime::new());
    engine.tick().expect("tick");
    engine.runtime_mut().set_button(Control::Quit, Hand::Right, true);
    engine.configure_max_frames(8);

    let summary = engine.run().expect("run");
    assert_eq!(summary.reason, ExitReason::SessionExited);
    assert!(!summary.reason.wants_restart());

    let calls = engine.runtime().calls();
    let request = calls
        .iter()
        .position(|call| *call == RuntimeCall::RequestExitSession)
        .expect("exit requested");
    let end = calls
        .iter()
        .rposition(|call| *call == RuntimeCall::EndSession)
        .expect("session ended");
    assert!(request < end);
}

#[test]
fn instance_loss_requests_restart() {
    let mut runtime = NullRuntime::new();
    runtime.push_event(LifecycleEvent::InstanceLossPending {
        loss_time: DisplayTime(5_000),
    });
    let (mut engine, _publisher) = engine_with(runtime);

    assert_eq!(
        engine.tick().expect("tick"),
        TickOutcome::Exit(ExitReason::RestartRequested)
    );
}

#[test]
fn idle_session_never_touches_the_frame_loop() {
    let (mut engine, _publisher) = engine_with(NullRuntime::idle());
    engine.configure_max_frames(4);

    let summary = engine.run().expect("run");
    assert_eq!(summary.reason, ExitReason::FrameBudgetExhausted);
    assert_eq!(summary.final_state, SessionState::Unknown);
    assert!(
        !engine
            .runtime()
            .calls()
            .iter()
            .any(|call| matches!(call, RuntimeCall::WaitFrame | RuntimeCall::SyncActions))
    );
}
