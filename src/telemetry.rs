use crate::vr::compositor::{PoseSource, TickReport};
use serde::Serialize;

/// Running counters for one client session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameTelemetry {
    pub ticks: u64,
    pub submitted_frames: u64,
    pub rendered_frames: u64,
    pub latched_frames: u64,
    pub released_frames: u64,
    pub local_fallback_frames: u64,
    pub invalid_view_frames: u64,
    pub exit_signals: u64,
}

impl FrameTelemetry {
    pub fn record_tick(&mut self, report: Option<&TickReport>) {
        self.ticks += 1;
        let Some(report) = report else {
            return;
        };
        self.submitted_frames += 1;
        if !report.rendered {
            return;
        }
        self.rendered_frames += 1;
        if report.latched.is_some() {
            self.latched_frames += 1;
        }
        if report.released {
            self.released_frames += 1;
        }
        if report.pose_source == Some(PoseSource::Local) {
            self.local_fallback_frames += 1;
        }
        if !report.views_valid {
            self.invalid_view_frames += 1;
        }
    }

    pub fn record_exit_signal(&mut self) {
        self.exit_signals += 1;
    }
}

#[derive(Default)]
pub struct TelemetrySurface {
    latest: Option<FrameTelemetry>,
    last_logged_frame: Option<u64>,
    interval: u64,
}

impl TelemetrySurface {
    pub fn with_interval(interval: u64) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Stores the counters and logs them as JSON every `interval` submitted
    /// frames. Returns whether a line was written.
    pub fn record(&mut self, telemetry: FrameTelemetry) -> bool {
        self.latest = Some(telemetry);
        let frame = telemetry.submitted_frames;
        if self.interval == 0 || frame == 0 || frame % self.interval != 0 {
            return false;
        }
        if self.last_logged_frame == Some(frame) {
            return false;
        }
        self.last_logged_frame = Some(frame);
        match serde_json::to_string(&telemetry) {
            Ok(json) => log::info!("[telemetry] {json}"),
            Err(err) => log::warn!("[telemetry] failed to encode counters: {err}"),
        }
        true
    }

    pub fn latest(&self) -> Option<&FrameTelemetry> {
        self.latest.as_ref()
    }
}
