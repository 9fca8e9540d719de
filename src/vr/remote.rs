//! Contract with the streaming service that produces remote frames, plus an
//! in-process latest-only mailbox implementation of it.

use crate::vr::input::TrackingSnapshot;
use crate::vr::runtime::Extent2D;
use crate::vr::{Hand, Matrix34, Pose, PoseSample, VIEW_COUNT, XrError, XrResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Opaque GPU texture handle owned by the frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameTexture(pub u64);

/// A remote stereo frame held by the render thread between latch and release.
#[derive(Debug, PartialEq)]
pub struct LatchedFrame {
    id: FrameId,
    pose_matrix: Matrix34,
    textures: [FrameTexture; VIEW_COUNT],
}

impl LatchedFrame {
    pub fn new(id: FrameId, pose_matrix: Matrix34, textures: [FrameTexture; VIEW_COUNT]) -> Self {
        Self {
            id,
            pose_matrix,
            textures,
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Head pose the remote renderer used for this frame.
    pub fn pose(&self) -> Pose {
        self.pose_matrix.to_pose()
    }

    pub fn texture(&self, eye_index: usize) -> Option<FrameTexture> {
        self.textures.get(eye_index).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescription {
    pub per_eye_extent: Extent2D,
    pub refresh_rate_hz: f32,
    pub ipd_meters: f32,
    pub view_count: usize,
}

impl Default for DeviceDescription {
    fn default() -> Self {
        Self {
            per_eye_extent: Extent2D {
                width: 1832,
                height: 1920,
            },
            refresh_rate_hz: 72.0,
            ipd_meters: 0.064,
            view_count: VIEW_COUNT,
        }
    }
}

/// Pose state forwarded to the streaming service each rendered tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseState {
    pub head: PoseSample,
    pub hands: Vec<(Hand, Pose)>,
}

pub trait RemoteFrameSource {
    fn initialize(&mut self, device: &DeviceDescription) -> XrResult<()>;
    fn set_paused(&mut self, paused: bool);
    /// Fire-and-forget.
    fn set_tracking_state(&mut self, snapshot: &TrackingSnapshot);
    /// Fire-and-forget.
    fn set_pose_state(&mut self, head: &PoseSample, hands: &[(Hand, Pose)]);
    /// Never blocks; `None` when no new frame is ready.
    fn latch_frame(&mut self) -> Option<LatchedFrame>;
    fn release_frame(&mut self, frame: LatchedFrame);
}

#[derive(Debug, Default)]
struct MailboxState {
    device: Option<DeviceDescription>,
    paused: bool,
    pending: Option<LatchedFrame>,
    next_id: u64,
    published: u64,
    dropped: u64,
    latest_tracking: Option<TrackingSnapshot>,
    latest_pose: Option<PoseState>,
    released: VecDeque<FrameTexture>,
    unclaimed_releases: u64,
}

/// Released textures kept for the producer before the oldest are dropped.
pub const RELEASE_BACKLOG: usize = 64;

impl MailboxState {
    fn push_released(&mut self, textures: [FrameTexture; VIEW_COUNT]) {
        for texture in textures {
            if self.released.len() == RELEASE_BACKLOG {
                self.released.pop_front();
                if self.unclaimed_releases == 0 {
                    log::warn!("[remote] producer is not draining released textures");
                }
                self.unclaimed_releases += 1;
            }
            self.released.push_back(texture);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MailboxStats {
    pub published: u64,
    pub dropped: u64,
    pub paused: bool,
    /// Released textures discarded because the producer never took them.
    pub unclaimed_releases: u64,
}

fn lock(state: &Mutex<MailboxState>) -> MutexGuard<'_, MailboxState> {
    // a panicking producer must not take the render thread down with it
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Consumer side of a single-slot frame handoff. A newer frame replaces an
/// unlatched older one; the replaced frame counts as dropped.
pub struct FrameMailbox {
    state: Arc<Mutex<MailboxState>>,
}

/// Producer side of a [`FrameMailbox`]; moved to the decoding thread.
#[derive(Clone)]
pub struct FramePublisher {
    state: Arc<Mutex<MailboxState>>,
}

impl FrameMailbox {
    pub fn new() -> (FrameMailbox, FramePublisher) {
        let state = Arc::new(Mutex::new(MailboxState::default()));
        (
            FrameMailbox {
                state: Arc::clone(&state),
            },
            FramePublisher { state },
        )
    }

    pub fn stats(&self) -> MailboxStats {
        let state = lock(&self.state);
        MailboxStats {
            published: state.published,
            dropped: state.dropped,
            paused: state.paused,
            unclaimed_releases: state.unclaimed_releases,
        }
    }
}

impl RemoteFrameSource for FrameMailbox {
    fn initialize(&mut self, device: &DeviceDescription) -> XrResult<()> {
        if device.view_count != VIEW_COUNT {
            return Err(XrError::Unsupported(format!(
                "{} views requested, only stereo streaming is available",
                device.view_count
            )));
        }
        let mut state = lock(&self.state);
        state.device = Some(*device);
        log::info!(
            "[remote] initialized for {}x{} per eye at {} Hz",
            device.per_eye_extent.width,
            device.per_eye_extent.height,
            device.refresh_rate_hz
        );
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        let mut state = lock(&self.state);
        if state.paused != paused {
            log::info!("[remote] {}", if paused { "paused" } else { "resumed" });
        }
        state.paused = paused;
    }

    fn set_tracking_state(&mut self, snapshot: &TrackingSnapshot) {
        lock(&self.state).latest_tracking = Some(*snapshot);
    }

    fn set_pose_state(&mut self, head: &PoseSample, hands: &[(Hand, Pose)]) {
        lock(&self.state).latest_pose = Some(PoseState {
            head: *head,
            hands: hands.to_vec(),
        });
    }

    fn latch_frame(&mut self) -> Option<LatchedFrame> {
        let frame = lock(&self.state).pending.take();
        if frame.is_none() {
            log::debug!("[remote] no frame available");
        }
        frame
    }

    fn release_frame(&mut self, frame: LatchedFrame) {
        let mut state = lock(&self.state);
        state.push_released(frame.textures);
    }
}

impl FramePublisher {
    /// Offers a decoded frame. Returns its id, or `None` while paused.
    pub fn publish(
        &self,
        pose_matrix: Matrix34,
        textures: [FrameTexture; VIEW_COUNT],
    ) -> Option<FrameId> {
        let mut state = lock(&self.state);
        if state.paused {
            return None;
        }
        state.next_id += 1;
        let id = FrameId(state.next_id);
        if let Some(stale) = state.pending.replace(LatchedFrame::new(id, pose_matrix, textures)) {
            state.dropped += 1;
            state.push_released(stale.textures);
        }
        state.published += 1;
        Some(id)
    }

    pub fn device(&self) -> Option<DeviceDescription> {
        lock(&self.state).device
    }

    pub fn latest_tracking(&self) -> Option<TrackingSnapshot> {
        lock(&self.state).latest_tracking
    }

    pub fn latest_pose(&self) -> Option<PoseState> {
        lock(&self.state).latest_pose.clone()
    }

    /// Textures the consumer is done with, in release order. The producer
    /// must drain this regularly; past [`RELEASE_BACKLOG`] entries the oldest
    /// are discarded and counted in [`MailboxStats::unclaimed_releases`].
    pub fn take_released(&self) -> Vec<FrameTexture> {
        lock(&self.state).released.drain(..).collect()
    }
}
