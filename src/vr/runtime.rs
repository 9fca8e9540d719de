//! Boundary between the frame pipeline and the VR runtime.
//!
//! Handle creation and teardown live behind these traits; the pipeline only
//! ever sees typed events, timings, views, locations, action states and
//! swapchain images.

use crate::render::SwapchainFormat;
use crate::vr::bindings::Control;
use crate::vr::remote::DeviceDescription;
use crate::vr::session::{LifecycleEvent, SessionHandle};
use crate::vr::{DisplayTime, Eye, Hand, Pose, PoseValidity, Vector3, XrResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub trait EventQueue {
    /// Non-blocking; `None` once the queue is empty.
    fn poll_event(&mut self) -> XrResult<Option<LifecycleEvent>>;
}

pub trait SessionControl {
    fn session_handle(&self) -> SessionHandle;
    fn begin_session(&mut self) -> XrResult<()>;
    fn end_session(&mut self) -> XrResult<()>;
    fn request_exit_session(&mut self) -> XrResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    pub predicted_display_time: DisplayTime,
    pub predicted_display_period: Duration,
    pub should_render: bool,
}

pub trait FrameLoop {
    /// Blocks until the runtime grants the next display interval.
    fn wait_frame(&mut self) -> XrResult<FrameTiming>;
    fn begin_frame(&mut self) -> XrResult<()>;
    fn end_frame(&mut self, submission: &FrameSubmission) -> XrResult<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent2D {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rect2D {
    pub offset: [i32; 2],
    pub extent: Extent2D,
}

pub trait Swapchains {
    fn view_count(&self) -> usize;
    fn swapchain_format(&self) -> SwapchainFormat;
    /// Recommended per-eye image size the swapchain was created with.
    fn extent(&self, eye: Eye) -> Extent2D;
    fn acquire_image(&mut self, eye: Eye) -> XrResult<u32>;
    fn wait_image(&mut self, eye: Eye, timeout: Duration) -> XrResult<()>;
    fn release_image(&mut self, eye: Eye) -> XrResult<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

impl Fov {
    pub fn symmetric(half_angle: f32) -> Self {
        Self {
            angle_left: -half_angle,
            angle_right: half_angle,
            angle_up: half_angle,
            angle_down: -half_angle,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EyeView {
    pub pose: Pose,
    pub fov: Fov,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewLocation {
    pub validity: PoseValidity,
    pub views: Vec<EyeView>,
    /// Vendor graphics-state index reported with the views; echoed back at
    /// end-frame.
    pub graphics_state_index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedSpace {
    Head,
    Aim(Hand),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceLocation {
    pub pose: Pose,
    pub validity: PoseValidity,
    pub linear_velocity: Option<Vector3>,
    pub angular_velocity: Option<Vector3>,
}

impl SpaceLocation {
    pub fn untracked() -> Self {
        Self {
            pose: Pose::IDENTITY,
            validity: PoseValidity::INVALID,
            linear_velocity: None,
            angular_velocity: None,
        }
    }
}

pub trait Tracking {
    fn locate_views(&mut self, time: DisplayTime) -> XrResult<ViewLocation>;
    /// Locates `space` in the application reference space.
    fn locate_space(&mut self, space: TrackedSpace, time: DisplayTime) -> XrResult<SpaceLocation>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BooleanState {
    pub current_state: bool,
    pub changed_since_last_sync: bool,
    pub is_active: bool,
}

impl BooleanState {
    pub fn pressed_edge(self) -> bool {
        self.is_active && self.changed_since_last_sync && self.current_state
    }

    pub fn released_edge(self) -> bool {
        self.is_active && self.changed_since_last_sync && !self.current_state
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FloatState {
    pub current_state: f32,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vector2State {
    pub x: f32,
    pub y: f32,
    pub is_active: bool,
}

pub trait ActionSource {
    fn sync_actions(&mut self) -> XrResult<()>;
    fn boolean_state(&mut self, control: Control, hand: Hand) -> XrResult<BooleanState>;
    fn float_state(&mut self, control: Control, hand: Hand) -> XrResult<FloatState>;
    fn vector2_state(&mut self, control: Control, hand: Hand) -> XrResult<Vector2State>;
    fn pose_active(&mut self, hand: Hand) -> XrResult<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HapticVibration {
    pub amplitude: f32,
    /// Nanoseconds; [`HapticVibration::MIN_DURATION`] asks for the shortest
    /// pulse the device supports.
    pub duration: i64,
    /// Hertz; zero leaves the choice to the runtime.
    pub frequency: f32,
}

impl HapticVibration {
    pub const MIN_DURATION: i64 = -1;
    pub const FREQUENCY_UNSPECIFIED: f32 = 0.0;

    pub fn pulse(amplitude: f32) -> Self {
        Self {
            amplitude,
            duration: Self::MIN_DURATION,
            frequency: Self::FREQUENCY_UNSPECIFIED,
        }
    }
}

pub trait Haptics {
    fn apply_vibration(&mut self, hand: Hand, vibration: HapticVibration) -> XrResult<()>;
}

/// Parsed and serialized by name in [`crate::config`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EnvironmentBlendMode {
    #[default]
    Opaque,
    Additive,
    AlphaBlend,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubImage {
    pub eye: Eye,
    pub image_index: u32,
    pub image_rect: Rect2D,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectionView {
    pub pose: Pose,
    pub fov: Fov,
    pub sub_image: SubImage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionLayer {
    pub views: Vec<ProjectionView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSubmission {
    pub display_time: DisplayTime,
    pub blend_mode: EnvironmentBlendMode,
    pub layers: Vec<ProjectionLayer>,
    pub graphics_state_index: i32,
}

/// Everything the client loop needs from a VR runtime.
pub trait XrRuntime:
    EventQueue + SessionControl + FrameLoop + Swapchains + Tracking + ActionSource + Haptics
{
    fn label(&self) -> &'static str;
    /// Display properties handed to the frame source at startup.
    fn device_description(&self) -> DeviceDescription;

    /// Interaction profile currently bound to `hand`, for diagnostics.
    fn current_interaction_profile(&self, _hand: Hand) -> XrResult<Option<String>> {
        Ok(None)
    }
}
