use xr_stream_client::render::{GraphicsPlugin, NullGraphicsPlugin};
use xr_stream_client::vr::compositor::PoseSource;
use xr_stream_client::vr::null::{NullRuntime, RecordingSource, RuntimeCall};
use xr_stream_client::vr::remote::{FrameMailbox, FramePublisher, FrameTexture};
use xr_stream_client::vr::{Matrix34, Pose, PoseValidity, Vector3};
use xr_stream_client::{ClientConfig, Engine, TickOutcome};

type MailboxEngine = Engine<NullRuntime, FrameMailbox, NullGraphicsPlugin>;

fn mailbox_engine() -> (MailboxEngine, FramePublisher) {
    let (mailbox, publisher) = FrameMailbox::new();
    let mut graphics = NullGraphicsPlugin::default();
    graphics.initialize_device().expect("device");
    let engine = Engine::new(NullRuntime::new(), mailbox, graphics, &ClientConfig::default());
    (engine, publisher)
}

fn rendered(outcome: TickOutcome) -> xr_stream_client::vr::compositor::TickReport {
    match outcome {
        TickOutcome::Rendered(report) => report,
        other => panic!("expected a rendered tick, got {other:?}"),
    }
}

fn assert_pose_close(actual: &Pose, expected: &Pose) {
    let dp = (actual.position.x - expected.position.x).abs()
        + (actual.position.y - expected.position.y).abs()
        + (actual.position.z - expected.position.z).abs();
    let dq = (actual.orientation.x - expected.orientation.x).abs()
        + (actual.orientation.y - expected.orientation.y).abs()
        + (actual.orientation.z - expected.orientation.z).abs()
        + (actual.orientation.w - expected.orientation.w).abs();
    assert!(dp < 1e-4 && dq < 1e-4, "{actual:?} != {expected:?}");
}

fn submitted_view_poses(runtime: &NullRuntime) -> Vec<Pose> {
    let submission = runtime.submissions().last().expect("a submission");
    submission.layers[0].views.iter().map(|view| view.pose).collect()
}

#[test]
fn latched_frame_pose_is_stamped_on_both_eyes() {
    let (mut engine, publisher) = mailbox_engine();
    let remote = Pose::translation(Vector3::new(1.0, 2.0, 3.0));
    publisher
        .publish(Matrix34::from_pose(&remote), [FrameTexture(10), FrameTexture(11)])
        .expect("published");

    let report = rendered(engine.tick().expect("tick"));
    assert_eq!(report.pose_source, Some(PoseSource::Remote));

    let poses = submitted_view_poses(engine.runtime());
    assert_eq!(poses.len(), 2);
    for pose in &poses {
        assert_pose_close(pose, &remote);
    }

    let textures: Vec<_> = engine.graphics().draws().iter().map(|draw| draw.texture).collect();
    assert_eq!(textures, vec![Some(FrameTexture(10)), Some(FrameTexture(11))]);
    assert_eq!(publisher.take_released(), vec![FrameTexture(10), FrameTexture(11)]);
}

#[test]
fn runtime_view_poses_are_used_without_a_frame() {
    let (mut engine, _publisher) = mailbox_engine();

    let report = rendered(engine.tick().expect("tick"));
    assert_eq!(report.pose_source, Some(PoseSource::Local));
    assert!(report.latched.is_none());
    assert!(!report.released);

    let expected = engine.runtime().view_poses();
    let poses = submitted_view_poses(engine.runtime());
    for (pose, expected) in poses.iter().zip(expected.iter()) {
        assert_pose_close(pose, expected);
    }
    assert!(engine.graphics().draws().iter().all(|draw| draw.texture.is_none()));
}

#[test]
fn every_latch_is_released_before_end_frame() {
    let runtime = NullRuntime::new();
    let calls = runtime.call_log();
    let (mailbox, publisher) = FrameMailbox::new();
    let source = RecordingSource::new(mailbox, calls);
    let mut graphics = NullGraphicsPlugin::default();
    graphics.initialize_device().expect("device");
    let mut engine = Engine::new(runtime, source, graphics, &ClientConfig::default());

    for tick in 0..6u64 {
        if tick % 2 == 0 {
            publisher
                .publish(Matrix34::default(), [FrameTexture(tick * 2), FrameTexture(tick * 2 + 1)])
                .expect("published");
        }
        rendered(engine.tick().expect("tick"));
    }

    let mut latches = 0;
    let mut releases = 0;
    let mut releases_per_frame = Vec::new();
    for call in engine.runtime().calls() {
        match call {
            RuntimeCall::LatchFrame => latches += 1,
            RuntimeCall::ReleaseFrame => {
                assert_eq!(latches, 1, "release without a latch in this frame");
                releases += 1;
            }
            RuntimeCall::EndFrame => {
                assert_eq!(latches, 1, "exactly one latch attempt per rendered frame");
                releases_per_frame.push(releases);
                latches = 0;
                releases = 0;
            }
            _ => {}
        }
    }
    assert_eq!(releases_per_frame, vec![1, 0, 1, 0, 1, 0]);
    assert_eq!(engine.source().inner().stats().published, 3);
    assert_eq!(publisher.take_released().len(), 6);
}

#[test]
fn hundred_ticks_without_frames_still_submit() {
    let (mut engine, publisher) = mailbox_engine();
    for _ in 0..100 {
        let report = rendered(engine.tick().expect("tick"));
        assert_eq!(report.pose_source, Some(PoseSource::Local));
    }
    assert_eq!(engine.runtime().submissions().len(), 100);
    assert!(publisher.take_released().is_empty());
    assert_eq!(engine.telemetry().released_frames, 0);
    assert_eq!(engine.telemetry().local_fallback_frames, 100);
}

#[test]
fn alternating_availability_alternates_pose_source() {
    let (mut engine, publisher) = mailbox_engine();
    let mut sources = Vec::new();
    for tick in 0..8u64 {
        if tick % 2 == 0 {
            publisher
                .publish(
                    Matrix34::default(),
                    [FrameTexture(tick), FrameTexture(tick + 100)],
                )
                .expect("published");
        }
        let report = rendered(engine.tick().expect("tick"));
        assert_eq!(report.released, report.latched.is_some());
        sources.push(report.pose_source);
    }

    let expected: Vec<_> = (0..8)
        .map(|tick| {
            Some(if tick % 2 == 0 {
                PoseSource::Remote
            } else {
                PoseSource::Local
            })
        })
        .collect();
    assert_eq!(sources, expected);
    assert_eq!(engine.telemetry().latched_frames, 4);
    assert_eq!(engine.telemetry().released_frames, 4);
    assert_eq!(publisher.take_released().len(), 8);
}

#[test]
fn invalid_view_tracking_still_submits_a_frame() {
    let (mut engine, _publisher) = mailbox_engine();
    engine.runtime_mut().set_view_validity(PoseValidity::INVALID);
    engine.runtime_mut().set_tracking_lost(true);

    for _ in 0..3 {
        let report = rendered(engine.tick().expect("tick"));
        assert!(!report.views_valid);
    }
    assert_eq!(engine.runtime().submissions().len(), 3);
    assert!(
        engine
            .runtime()
            .submissions()
            .iter()
            .all(|submission| submission.layers.len() == 1)
    );
    assert_eq!(engine.telemetry().invalid_view_frames, 3);
}

#[test]
fn frame_not_rendered_when_compositor_declines() {
    let (mut engine, publisher) = mailbox_engine();
    engine.runtime_mut().set_should_render(false);
    publisher
        .publish(Matrix34::default(), [FrameTexture(1), FrameTexture(2)])
        .expect("published");

    let report = rendered(engine.tick().expect("tick"));
    assert!(!report.rendered);
    let submission = engine.runtime().submissions().last().expect("submission");
    assert!(submission.layers.is_empty());

    // the frame is still waiting for the next rendered tick
    engine.runtime_mut().set_should_render(true);
    let report = rendered(engine.tick().expect("tick"));
    assert_eq!(report.pose_source, Some(PoseSource::Remote));
}

#[test]
fn paused_source_accepts_no_frames() {
    let (mut engine, publisher) = mailbox_engine();
    engine.set_paused(true);
    assert!(publisher.publish(Matrix34::default(), [FrameTexture(1), FrameTexture(2)]).is_none());
    let report = rendered(engine.tick().expect("tick"));
    assert_eq!(report.pose_source, Some(PoseSource::Local));

    engine.set_paused(false);
    assert!(publisher.publish(Matrix34::default(), [FrameTexture(3), FrameTexture(4)]).is_some());
    let report = rendered(engine.tick().expect("tick"));
    assert_eq!(report.pose_source, Some(PoseSource::Remote));
}
