//! Headless runtime used when no OpenXR loader is available, and as a
//! scriptable stand-in in tests.

use crate::render::{NullGraphicsPlugin, SwapchainFormat};
use crate::vr::bindings::Control;
use crate::vr::input::TrackingSnapshot;
use crate::vr::remote::{DeviceDescription, LatchedFrame, RemoteFrameSource};
use crate::vr::runtime::{
    ActionSource, BooleanState, EventQueue, Extent2D, EyeView, FloatState, FrameLoop,
    FrameSubmission, FrameTiming, Fov, Haptics, HapticVibration, SessionControl, SpaceLocation,
    Swapchains, TrackedSpace, Tracking, Vector2State, ViewLocation, XrRuntime,
};
use crate::vr::session::{LifecycleEvent, SessionHandle, SessionState};
use crate::vr::{
    DisplayTime, Eye, Hand, Pose, PoseSample, PoseValidity, VIEW_COUNT, Vector3, XrError, XrResult,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const NULL_SESSION: SessionHandle = SessionHandle(1);
const SWAPCHAIN_LENGTH: u32 = 3;
const HEAD_HEIGHT: f32 = 1.6;
const INTERACTION_PROFILE: &str = "/interaction_profiles/oculus/touch_controller";
// XR_ERROR_CALL_ORDER_INVALID
const CALL_ORDER_INVALID: i32 = -37;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCall {
    BeginSession,
    EndSession,
    RequestExitSession,
    SyncActions,
    ApplyVibration(Hand),
    WaitFrame,
    BeginFrame,
    LocateViews,
    LocateSpace(TrackedSpace),
    AcquireImage(Eye),
    WaitImage(Eye),
    ReleaseImage(Eye),
    EndFrame,
    SetTrackingState,
    SetPoseState,
    LatchFrame,
    ReleaseFrame,
}

/// Shared, ordered record of calls made against the null runtime and any
/// [`RecordingSource`] attached to it.
pub type CallLog = Arc<Mutex<Vec<RuntimeCall>>>;

fn record(log: &CallLog, call: RuntimeCall) {
    log.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(call);
}

#[derive(Debug, Clone, Copy, Default)]
struct ButtonTrack {
    held: bool,
    synced: Option<bool>,
    changed: bool,
}

#[derive(Debug, Clone, Copy, Default)]
enum SwapchainStage {
    #[default]
    Released,
    Acquired,
    Waited,
}

pub struct NullRuntime {
    events: VecDeque<LifecycleEvent>,
    calls: CallLog,
    session_running: bool,
    frame_waited: bool,
    frame_begun: bool,
    display_time: DisplayTime,
    period: Duration,
    pace_frames: bool,
    should_render: bool,
    view_validity: PoseValidity,
    located_view_count: usize,
    graphics_state_index: i32,
    tracking_lost: bool,
    locations: HashMap<TrackedSpace, SpaceLocation>,
    swapchains: [SwapchainStage; VIEW_COUNT],
    next_image: [u32; VIEW_COUNT],
    device: DeviceDescription,
    buttons: HashMap<(Control, Hand), ButtonTrack>,
    floats: HashMap<(Control, Hand), f32>,
    sticks: HashMap<Hand, (f32, f32)>,
    pose_active: [bool; 2],
    vibrations: Vec<(Hand, HapticVibration)>,
    submissions: Vec<FrameSubmission>,
    failure: Option<(&'static str, i32)>,
}

impl NullRuntime {
    /// A runtime whose session walks to FOCUSED on the first poll.
    pub fn new() -> Self {
        let mut runtime = Self::idle();
        for state in [
            SessionState::Idle,
            SessionState::Ready,
            SessionState::Synchronized,
            SessionState::Visible,
            SessionState::Focused,
        ] {
            runtime.push_state(state);
        }
        runtime
    }

    /// A runtime with an empty event queue.
    pub fn idle() -> Self {
        let device = DeviceDescription::default();
        Self {
            events: VecDeque::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
            session_running: false,
            frame_waited: false,
            frame_begun: false,
            display_time: DisplayTime(0),
            period: Duration::from_secs_f32(1.0 / device.refresh_rate_hz),
            pace_frames: false,
            should_render: true,
            view_validity: PoseValidity::VALID,
            located_view_count: VIEW_COUNT,
            graphics_state_index: 0,
            tracking_lost: false,
            locations: HashMap::new(),
            swapchains: [SwapchainStage::Released; VIEW_COUNT],
            next_image: [0; VIEW_COUNT],
            device,
            buttons: HashMap::new(),
            floats: HashMap::new(),
            sticks: HashMap::new(),
            pose_active: [true, true],
            vibrations: Vec::new(),
            submissions: Vec::new(),
            failure: None,
        }
    }

    /// Sleep out the display period in `wait_frame`, like a real compositor.
    pub fn with_frame_pacing(mut self, pace: bool) -> Self {
        self.pace_frames = pace;
        self
    }

    pub fn push_event(&mut self, event: LifecycleEvent) {
        self.events.push_back(event);
    }

    pub fn push_state(&mut self, state: SessionState) {
        let time = self.display_time;
        self.push_event(LifecycleEvent::SessionStateChanged {
            session: NULL_SESSION,
            state,
            time,
        });
    }

    pub fn set_should_render(&mut self, should_render: bool) {
        self.should_render = should_render;
    }

    pub fn set_view_validity(&mut self, validity: PoseValidity) {
        self.view_validity = validity;
    }

    pub fn set_located_view_count(&mut self, count: usize) {
        self.located_view_count = count;
    }

    pub fn set_graphics_state_index(&mut self, index: i32) {
        self.graphics_state_index = index;
    }

    /// Every space query reports no valid pose while set.
    pub fn set_tracking_lost(&mut self, lost: bool) {
        self.tracking_lost = lost;
    }

    pub fn set_location(&mut self, space: TrackedSpace, location: SpaceLocation) {
        self.locations.insert(space, location);
    }

    /// Physical button state; edges are derived at the next sync.
    pub fn set_button(&mut self, control: Control, hand: Hand, held: bool) {
        self.buttons.entry((control, hand)).or_default().held = held;
    }

    /// `None` makes the control inactive.
    pub fn set_float(&mut self, control: Control, hand: Hand, value: Option<f32>) {
        match value {
            Some(value) => {
                self.floats.insert((control, hand), value);
            }
            None => {
                self.floats.remove(&(control, hand));
            }
        }
    }

    pub fn set_joystick(&mut self, hand: Hand, value: Option<(f32, f32)>) {
        match value {
            Some(value) => {
                self.sticks.insert(hand, value);
            }
            None => {
                self.sticks.remove(&hand);
            }
        }
    }

    pub fn set_pose_active(&mut self, hand: Hand, active: bool) {
        self.pose_active[hand.index()] = active;
    }

    /// The named runtime call fails with `code` until cleared.
    pub fn fail_operation(&mut self, operation: &'static str, code: i32) {
        self.failure = Some((operation, code));
    }

    pub fn clear_failure(&mut self) {
        self.failure = None;
    }

    pub fn submissions(&self) -> &[FrameSubmission] {
        &self.submissions
    }

    pub fn vibrations(&self) -> &[(Hand, HapticVibration)] {
        &self.vibrations
    }

    pub fn is_session_running(&self) -> bool {
        self.session_running
    }

    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Per-eye poses `locate_views` reports: the head pose shifted by half
    /// the IPD to each side.
    pub fn view_poses(&self) -> [Pose; VIEW_COUNT] {
        let head = self.head_location().pose;
        let half_ipd = self.device.ipd_meters * 0.5;
        Eye::BOTH.map(|eye| {
            let offset = if eye == Eye::Left { -half_ipd } else { half_ipd };
            Pose {
                orientation: head.orientation,
                position: Vector3::new(
                    head.position.x + offset,
                    head.position.y,
                    head.position.z,
                ),
            }
        })
    }

    fn head_location(&self) -> SpaceLocation {
        self.locations
            .get(&TrackedSpace::Head)
            .copied()
            .unwrap_or(SpaceLocation {
                pose: Pose::translation(Vector3::new(0.0, HEAD_HEIGHT, 0.0)),
                validity: PoseValidity::VALID,
                linear_velocity: Some(Vector3::ZERO),
                angular_velocity: Some(Vector3::ZERO),
            })
    }

    fn call(&mut self, call: RuntimeCall, operation: &'static str) -> XrResult<()> {
        record(&self.calls, call);
        match self.failure {
            Some((failing, code)) if failing == operation => Err(XrError::runtime(operation, code)),
            _ => Ok(()),
        }
    }
}

impl Default for NullRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue for NullRuntime {
    fn poll_event(&mut self) -> XrResult<Option<LifecycleEvent>> {
        Ok(self.events.pop_front())
    }
}

impl SessionControl for NullRuntime {
    fn session_handle(&self) -> SessionHandle {
        NULL_SESSION
    }

    fn begin_session(&mut self) -> XrResult<()> {
        self.call(RuntimeCall::BeginSession, "xrBeginSession")?;
        self.session_running = true;
        Ok(())
    }

    fn end_session(&mut self) -> XrResult<()> {
        self.call(RuntimeCall::EndSession, "xrEndSession")?;
        self.session_running = false;
        Ok(())
    }

    fn request_exit_session(&mut self) -> XrResult<()> {
        self.call(RuntimeCall::RequestExitSession, "xrRequestExitSession")?;
        if !self.session_running {
            // XR_ERROR_SESSION_NOT_RUNNING
            return Err(XrError::runtime("xrRequestExitSession", -16));
        }
        for state in [SessionState::Stopping, SessionState::Idle, SessionState::Exiting] {
            self.push_state(state);
        }
        Ok(())
    }
}

impl FrameLoop for NullRuntime {
    fn wait_frame(&mut self) -> XrResult<FrameTiming> {
        self.call(RuntimeCall::WaitFrame, "xrWaitFrame")?;
        if self.pace_frames {
            std::thread::sleep(self.period);
        }
        self.display_time = self
            .display_time
            .offset_nanos(self.period.as_nanos() as i64);
        self.frame_waited = true;
        Ok(FrameTiming {
            predicted_display_time: self.display_time,
            predicted_display_period: self.period,
            should_render: self.should_render,
        })
    }

    fn begin_frame(&mut self) -> XrResult<()> {
        self.call(RuntimeCall::BeginFrame, "xrBeginFrame")?;
        if !self.frame_waited {
            return Err(XrError::runtime("xrBeginFrame", CALL_ORDER_INVALID));
        }
        self.frame_waited = false;
        self.frame_begun = true;
        Ok(())
    }

    fn end_frame(&mut self, submission: &FrameSubmission) -> XrResult<()> {
        self.call(RuntimeCall::EndFrame, "xrEndFrame")?;
        if !self.frame_begun {
            return Err(XrError::runtime("xrEndFrame", CALL_ORDER_INVALID));
        }
        self.frame_begun = false;
        self.submissions.push(submission.clone());
        Ok(())
    }
}

impl Swapchains for NullRuntime {
    fn view_count(&self) -> usize {
        VIEW_COUNT
    }

    fn swapchain_format(&self) -> SwapchainFormat {
        NullGraphicsPlugin::FORMAT
    }

    fn extent(&self, _eye: Eye) -> Extent2D {
        self.device.per_eye_extent
    }

    fn acquire_image(&mut self, eye: Eye) -> XrResult<u32> {
        self.call(RuntimeCall::AcquireImage(eye), "xrAcquireSwapchainImage")?;
        let slot = eye.index();
        if !matches!(self.swapchains[slot], SwapchainStage::Released) {
            return Err(XrError::runtime("xrAcquireSwapchainImage", CALL_ORDER_INVALID));
        }
        self.swapchains[slot] = SwapchainStage::Acquired;
        let index = self.next_image[slot];
        self.next_image[slot] = (index + 1) % SWAPCHAIN_LENGTH;
        Ok(index)
    }

    fn wait_image(&mut self, eye: Eye, _timeout: Duration) -> XrResult<()> {
        self.call(RuntimeCall::WaitImage(eye), "xrWaitSwapchainImage")?;
        let slot = eye.index();
        if !matches!(self.swapchains[slot], SwapchainStage::Acquired) {
            return Err(XrError::runtime("xrWaitSwapchainImage", CALL_ORDER_INVALID));
        }
        self.swapchains[slot] = SwapchainStage::Waited;
        Ok(())
    }

    fn release_image(&mut self, eye: Eye) -> XrResult<()> {
        self.call(RuntimeCall::ReleaseImage(eye), "xrReleaseSwapchainImage")?;
        let slot = eye.index();
        if !matches!(self.swapchains[slot], SwapchainStage::Waited) {
            return Err(XrError::runtime("xrReleaseSwapchainImage", CALL_ORDER_INVALID));
        }
        self.swapchains[slot] = SwapchainStage::Released;
        Ok(())
    }
}

impl Tracking for NullRuntime {
    fn locate_views(&mut self, _time: DisplayTime) -> XrResult<ViewLocation> {
        self.call(RuntimeCall::LocateViews, "xrLocateViews")?;
        let fov = Fov::symmetric(0.785);
        let views = self
            .view_poses()
            .into_iter()
            .take(self.located_view_count)
            .map(|pose| EyeView { pose, fov })
            .collect();
        Ok(ViewLocation {
            validity: self.view_validity,
            views,
            graphics_state_index: self.graphics_state_index,
        })
    }

    fn locate_space(&mut self, space: TrackedSpace, _time: DisplayTime) -> XrResult<SpaceLocation> {
        self.call(RuntimeCall::LocateSpace(space), "xrLocateSpace")?;
        if self.tracking_lost {
            return Ok(SpaceLocation::untracked());
        }
        let location = match space {
            TrackedSpace::Head => self.head_location(),
            TrackedSpace::Aim(hand) => {
                let side = if hand == Hand::Left { -0.2 } else { 0.2 };
                self.locations.get(&space).copied().unwrap_or(SpaceLocation {
                    pose: Pose::translation(Vector3::new(side, HEAD_HEIGHT - 0.4, -0.3)),
                    validity: PoseValidity::VALID,
                    linear_velocity: None,
                    angular_velocity: None,
                })
            }
        };
        Ok(location)
    }
}

impl ActionSource for NullRuntime {
    fn sync_actions(&mut self) -> XrResult<()> {
        self.call(RuntimeCall::SyncActions, "xrSyncActions")?;
        for track in self.buttons.values_mut() {
            track.changed = track.synced.is_some_and(|last| last != track.held)
                || (track.synced.is_none() && track.held);
            track.synced = Some(track.held);
        }
        Ok(())
    }

    fn boolean_state(&mut self, control: Control, hand: Hand) -> XrResult<BooleanState> {
        Ok(match self.buttons.get(&(control, hand)) {
            Some(track) => BooleanState {
                current_state: track.synced.unwrap_or(false),
                changed_since_last_sync: track.changed,
                is_active: true,
            },
            None => BooleanState::default(),
        })
    }

    fn float_state(&mut self, control: Control, hand: Hand) -> XrResult<FloatState> {
        Ok(match self.floats.get(&(control, hand)) {
            Some(value) => FloatState {
                current_state: *value,
                is_active: true,
            },
            None => FloatState::default(),
        })
    }

    fn vector2_state(&mut self, _control: Control, hand: Hand) -> XrResult<Vector2State> {
        Ok(match self.sticks.get(&hand) {
            Some((x, y)) => Vector2State {
                x: *x,
                y: *y,
                is_active: true,
            },
            None => Vector2State::default(),
        })
    }

    fn pose_active(&mut self, hand: Hand) -> XrResult<bool> {
        Ok(self.pose_active[hand.index()])
    }
}

impl Haptics for NullRuntime {
    fn apply_vibration(&mut self, hand: Hand, vibration: HapticVibration) -> XrResult<()> {
        self.call(RuntimeCall::ApplyVibration(hand), "xrApplyHapticFeedback")?;
        self.vibrations.push((hand, vibration));
        Ok(())
    }
}

impl XrRuntime for NullRuntime {
    fn label(&self) -> &'static str {
        "Null Runtime"
    }

    fn device_description(&self) -> DeviceDescription {
        self.device
    }

    fn current_interaction_profile(&self, _hand: Hand) -> XrResult<Option<String>> {
        Ok(self
            .session_running
            .then(|| INTERACTION_PROFILE.to_string()))
    }
}

/// Frame source wrapper that appends its calls to a runtime's [`CallLog`],
/// so the relative order of runtime and frame-source calls can be checked.
pub struct RecordingSource<S> {
    inner: S,
    calls: CallLog,
}

impl<S: RemoteFrameSource> RecordingSource<S> {
    pub fn new(inner: S, calls: CallLog) -> Self {
        Self { inner, calls }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: RemoteFrameSource> RemoteFrameSource for RecordingSource<S> {
    fn initialize(&mut self, device: &DeviceDescription) -> XrResult<()> {
        self.inner.initialize(device)
    }

    fn set_paused(&mut self, paused: bool) {
        self.inner.set_paused(paused);
    }

    fn set_tracking_state(&mut self, snapshot: &TrackingSnapshot) {
        record(&self.calls, RuntimeCall::SetTrackingState);
        self.inner.set_tracking_state(snapshot);
    }

    fn set_pose_state(&mut self, head: &PoseSample, hands: &[(Hand, Pose)]) {
        record(&self.calls, RuntimeCall::SetPoseState);
        self.inner.set_pose_state(head, hands);
    }

    fn latch_frame(&mut self) -> Option<LatchedFrame> {
        record(&self.calls, RuntimeCall::LatchFrame);
        self.inner.latch_frame()
    }

    fn release_frame(&mut self, frame: LatchedFrame) {
        record(&self.calls, RuntimeCall::ReleaseFrame);
        self.inner.release_frame(frame);
    }
}
