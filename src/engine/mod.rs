use crate::config::ClientConfig;
use crate::render::GraphicsPlugin;
use crate::telemetry::{FrameTelemetry, TelemetrySurface};
use crate::vr::compositor::{FrameCompositor, TickReport};
use crate::vr::input::InputRelay;
use crate::vr::remote::RemoteFrameSource;
use crate::vr::runtime::XrRuntime;
use crate::vr::sampler::PoseSampler;
use crate::vr::session::{SessionState, SessionStateMachine};
use crate::vr::bindings;
use crate::vr::{Hand, XrResult};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_IDLE_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitReason {
    /// Runtime moved the session to EXITING.
    SessionExited,
    /// Session or instance was lost; the caller should build a new runtime.
    RestartRequested,
    /// User released the back button.
    BackButton,
    FrameBudgetExhausted,
}

impl ExitReason {
    pub fn wants_restart(self) -> bool {
        self == ExitReason::RestartRequested
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Session not running; nothing was submitted.
    Idle,
    Rendered(TickReport),
    Exit(ExitReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub reason: ExitReason,
    pub final_state: SessionState,
    pub telemetry: FrameTelemetry,
}

/// Drives one runtime session: lifecycle, input, pose sync and composition,
/// all on the calling thread.
pub struct Engine<R, S, G> {
    runtime: R,
    source: S,
    graphics: G,
    session: SessionStateMachine,
    relay: InputRelay,
    sampler: PoseSampler,
    compositor: FrameCompositor,
    telemetry: FrameTelemetry,
    surface: TelemetrySurface,
    max_frames: Option<u64>,
    idle_backoff: Duration,
    source_ready: bool,
}

impl<R, S, G> Engine<R, S, G>
where
    R: XrRuntime,
    S: RemoteFrameSource,
    G: GraphicsPlugin,
{
    /// `graphics` must already have its device initialized.
    pub fn new(runtime: R, source: S, graphics: G, config: &ClientConfig) -> Self {
        let compositor = FrameCompositor::new(
            config.environment_blend_mode,
            runtime.swapchain_format(),
            config.swapchain_wait_timeout(),
        );
        Self {
            runtime,
            source,
            graphics,
            session: SessionStateMachine::new(),
            relay: InputRelay::with_haptic_threshold(config.haptic_threshold),
            sampler: PoseSampler::new(),
            compositor,
            telemetry: FrameTelemetry::default(),
            surface: TelemetrySurface::with_interval(config.telemetry_interval),
            max_frames: config.max_frames,
            idle_backoff: DEFAULT_IDLE_BACKOFF,
            source_ready: false,
        }
    }

    pub fn configure_max_frames(&mut self, frames: u64) {
        self.max_frames = Some(frames.max(1));
    }

    /// Sleep between polls while the session is not running.
    pub fn configure_idle_backoff(&mut self, backoff: Duration) {
        self.idle_backoff = backoff;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.source.set_paused(paused);
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn telemetry(&self) -> &FrameTelemetry {
        &self.telemetry
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn graphics(&self) -> &G {
        &self.graphics
    }

    pub fn into_parts(self) -> (R, S, G) {
        (self.runtime, self.source, self.graphics)
    }

    /// Hands the device description to the frame source. Called by the first
    /// `tick` if not called explicitly.
    pub fn initialize(&mut self) -> XrResult<()> {
        if self.source_ready {
            return Ok(());
        }
        let device = self.runtime.device_description();
        log::info!(
            "[engine] {} with {} views, graphics {}",
            self.runtime.label(),
            device.view_count,
            self.graphics.label()
        );
        self.source.initialize(&device)?;
        self.source_ready = true;
        Ok(())
    }

    pub fn tick(&mut self) -> XrResult<TickOutcome> {
        self.initialize()?;

        let poll = self.session.poll_events(&mut self.runtime)?;
        if poll.interaction_profile_changed {
            self.log_interaction_profiles()?;
        }
        if poll.exit_render_loop {
            let reason = if poll.request_restart {
                ExitReason::RestartRequested
            } else {
                ExitReason::SessionExited
            };
            return Ok(TickOutcome::Exit(reason));
        }
        if !self.session.is_running() {
            self.telemetry.record_tick(None);
            return Ok(TickOutcome::Idle);
        }

        let input = self.relay.poll(&mut self.runtime)?;
        for hand in Hand::BOTH {
            self.sampler.set_hand_active(hand, input.hand_active[hand.index()]);
        }
        self.source.set_tracking_state(&input.snapshot);

        let report = self.compositor.render_frame(
            &mut self.runtime,
            &mut self.sampler,
            &mut self.source,
            &mut self.graphics,
        )?;
        self.telemetry.record_tick(Some(&report));
        self.surface.record(self.telemetry);

        if input.exit_requested {
            self.telemetry.record_exit_signal();
            return Ok(TickOutcome::Exit(ExitReason::BackButton));
        }
        Ok(TickOutcome::Rendered(report))
    }

    pub fn run(&mut self) -> XrResult<RunSummary> {
        let mut iterations = 0u64;
        let reason = loop {
            if self.max_frames.is_some_and(|max| iterations >= max) {
                break ExitReason::FrameBudgetExhausted;
            }
            iterations += 1;

            match self.tick()? {
                TickOutcome::Exit(reason) => break reason,
                TickOutcome::Idle => {
                    if !self.idle_backoff.is_zero() {
                        std::thread::sleep(self.idle_backoff);
                    }
                }
                TickOutcome::Rendered(_) => {}
            }
        };

        log::info!(
            "[engine] render loop finished: {reason:?} after {} ticks, {} submitted",
            self.telemetry.ticks,
            self.telemetry.submitted_frames
        );
        Ok(RunSummary {
            reason,
            final_state: self.session.state(),
            telemetry: self.telemetry,
        })
    }

    /// Returns the profiles now active, left then right.
    fn log_interaction_profiles(&mut self) -> XrResult<Vec<String>> {
        let mut active = Vec::new();
        for hand in Hand::BOTH {
            let Some(profile) = self.runtime.current_interaction_profile(hand)? else {
                log::info!("[engine] {} hand has no active profile", hand.label());
                continue;
            };
            log::info!("[engine] {} hand profile: {profile}", hand.label());
            if !active.contains(&profile) && bindings::log_binding_summary(&profile).is_none() {
                log::warn!("[engine] no suggested bindings for {profile}");
            }
            active.push(profile);
        }
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::NullGraphicsPlugin;
    use crate::vr::bindings::Control;
    use crate::vr::null::NullRuntime;
    use crate::vr::remote::FrameMailbox;

    fn engine(runtime: NullRuntime) -> Engine<NullRuntime, FrameMailbox, NullGraphicsPlugin> {
        let (mailbox, _publisher) = FrameMailbox::new();
        let mut graphics = NullGraphicsPlugin::default();
        graphics.initialize_device().expect("device");
        let mut engine = Engine::new(runtime, mailbox, graphics, &ClientConfig::default());
        engine.configure_idle_backoff(Duration::ZERO);
        engine
    }

    #[test]
    fn first_tick_reaches_focused_and_submits() {
        let mut engine = engine(NullRuntime::new());
        let outcome = engine.tick().expect("tick");
        assert!(matches!(outcome, TickOutcome::Rendered(_)));
        assert_eq!(engine.session_state(), SessionState::Focused);
        assert_eq!(engine.runtime().submissions().len(), 1);
    }

    #[test]
    fn idle_session_submits_nothing() {
        let mut engine = engine(NullRuntime::idle());
        assert_eq!(engine.tick().expect("tick"), TickOutcome::Idle);
        assert!(engine.runtime().submissions().is_empty());
        assert_eq!(engine.telemetry().ticks, 1);
    }

    #[test]
    fn run_stops_at_frame_budget() {
        let mut engine = engine(NullRuntime::new());
        engine.configure_max_frames(5);
        let summary = engine.run().expect("run");
        assert_eq!(summary.reason, ExitReason::FrameBudgetExhausted);
        assert_eq!(summary.telemetry.submitted_frames, 5);
    }

    #[test]
    fn loss_pending_asks_for_restart() {
        let mut runtime = NullRuntime::new();
        runtime.push_state(SessionState::LossPending);
        let mut engine = engine(runtime);
        let summary = engine.run().expect("run");
        assert!(summary.reason.wants_restart());
    }

    #[test]
    fn quit_button_walks_session_to_exiting() {
        let mut engine = engine(NullRuntime::new());
        engine.tick().expect("focus");
        engine.runtime_mut().set_button(Control::Quit, Hand::Left, true);
        engine.configure_max_frames(10);
        let summary = engine.run().expect("run");
        assert_eq!(summary.reason, ExitReason::SessionExited);
        assert_eq!(summary.final_state, SessionState::Exiting);
        assert!(!engine.runtime().is_session_running());
    }

    #[test]
    fn profile_change_reports_active_profiles() {
        use crate::vr::runtime::SessionControl;
        use crate::vr::session::LifecycleEvent;

        let mut runtime = NullRuntime::new();
        let session = runtime.session_handle();
        runtime.push_event(LifecycleEvent::InteractionProfileChanged { session });
        let mut engine = engine(runtime);
        assert!(matches!(engine.tick().expect("tick"), TickOutcome::Rendered(_)));

        let profiles = engine.log_interaction_profiles().expect("profiles");
        assert_eq!(profiles.len(), 2);
        assert!(profiles.iter().all(|p| p == "/interaction_profiles/oculus/touch_controller"));
    }

    #[test]
    fn runtime_failure_is_fatal() {
        let mut runtime = NullRuntime::new();
        runtime.fail_operation("xrWaitFrame", -2);
        let mut engine = engine(runtime);
        let err = engine.run().unwrap_err();
        assert_eq!(err.to_string(), "xrWaitFrame failed with XrResult -2");
    }
}
