use crate::render::{GraphicsPlugin, SwapchainFormat, ViewDraw};
use crate::vr::remote::{FrameId, LatchedFrame, RemoteFrameSource};
use crate::vr::runtime::{
    EnvironmentBlendMode, FrameLoop, FrameSubmission, ProjectionLayer, ProjectionView, Rect2D,
    SubImage, Swapchains, Tracking, ViewLocation,
};
use crate::vr::sampler::PoseSampler;
use crate::vr::{DisplayTime, Eye, Pose, VIEW_COUNT, XrError, XrResult};
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PoseSource {
    /// Pose the remote renderer used for the latched frame.
    Remote,
    /// Runtime's own per-eye prediction.
    Local,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub display_time: DisplayTime,
    pub rendered: bool,
    pub pose_source: Option<PoseSource>,
    pub view_poses: Vec<Pose>,
    pub latched: Option<FrameId>,
    /// The latched frame went back to the source this tick.
    pub released: bool,
    pub views_valid: bool,
}

impl TickReport {
    fn skipped(display_time: DisplayTime) -> Self {
        Self {
            display_time,
            rendered: false,
            pose_source: None,
            view_poses: Vec::new(),
            latched: None,
            released: false,
            views_valid: false,
        }
    }
}

/// Per-tick state threaded from view location to end-frame.
struct TickContext {
    display_time: DisplayTime,
    graphics_state_index: i32,
}

pub struct FrameCompositor {
    blend_mode: EnvironmentBlendMode,
    swapchain_format: SwapchainFormat,
    image_wait_timeout: Duration,
}

impl FrameCompositor {
    pub fn new(
        blend_mode: EnvironmentBlendMode,
        swapchain_format: SwapchainFormat,
        image_wait_timeout: Duration,
    ) -> Self {
        Self {
            blend_mode,
            swapchain_format,
            image_wait_timeout,
        }
    }

    /// Runs one frame: wait, begin, sample and forward poses, latch, draw
    /// both eyes, release, end. Only `wait_frame` blocks.
    pub fn render_frame<R, S, G>(
        &self,
        runtime: &mut R,
        sampler: &mut PoseSampler,
        source: &mut S,
        graphics: &mut G,
    ) -> XrResult<TickReport>
    where
        R: FrameLoop + Swapchains + Tracking + ?Sized,
        S: RemoteFrameSource + ?Sized,
        G: GraphicsPlugin + ?Sized,
    {
        let timing = runtime.wait_frame()?;
        runtime.begin_frame()?;

        let mut ctx = TickContext {
            display_time: timing.predicted_display_time,
            graphics_state_index: 0,
        };

        if !timing.should_render {
            self.end_frame(runtime, &ctx, Vec::new())?;
            return Ok(TickReport::skipped(ctx.display_time));
        }

        let location = runtime.locate_views(ctx.display_time)?;
        ctx.graphics_state_index = location.graphics_state_index;
        let expected = runtime.view_count();
        if location.views.len() != expected || expected != VIEW_COUNT {
            return Err(XrError::ViewCountMismatch {
                expected,
                got: location.views.len(),
            });
        }
        let views_valid = location.validity.is_valid();
        if !views_valid {
            log::debug!("[compositor] view poses not valid at {}", ctx.display_time);
        }

        let hands = sampler.sample_hands(runtime, ctx.display_time)?;
        let head = sampler.sample_head(runtime, ctx.display_time)?;
        let hand_poses: Vec<_> = hands.iter().map(|(hand, sample)| (*hand, sample.pose)).collect();
        source.set_pose_state(&head, &hand_poses);

        let latched = source.latch_frame();
        let latched_id = latched.as_ref().map(LatchedFrame::id);
        let (pose_source, view_poses) = stamp_view_poses(&location, latched.as_ref());

        let drawn = self.draw_views(runtime, graphics, &location, &view_poses, latched.as_ref());
        let released = match latched {
            Some(frame) => {
                source.release_frame(frame);
                true
            }
            None => false,
        };
        let projection_views = drawn?;

        self.end_frame(
            runtime,
            &ctx,
            vec![ProjectionLayer {
                views: projection_views,
            }],
        )?;

        Ok(TickReport {
            display_time: ctx.display_time,
            rendered: true,
            pose_source: Some(pose_source),
            view_poses: view_poses.to_vec(),
            latched: latched_id,
            released,
            views_valid,
        })
    }

    fn draw_views<R, G>(
        &self,
        runtime: &mut R,
        graphics: &mut G,
        location: &ViewLocation,
        view_poses: &[Pose; VIEW_COUNT],
        latched: Option<&LatchedFrame>,
    ) -> XrResult<Vec<ProjectionView>>
    where
        R: Swapchains + ?Sized,
        G: GraphicsPlugin + ?Sized,
    {
        let mut projection_views = Vec::with_capacity(VIEW_COUNT);
        for eye in Eye::BOTH {
            let slot = eye.index();
            let image_index = runtime.acquire_image(eye)?;
            runtime.wait_image(eye, self.image_wait_timeout)?;

            let view = ProjectionView {
                pose: view_poses[slot],
                fov: location.views[slot].fov,
                sub_image: SubImage {
                    eye,
                    image_index,
                    image_rect: Rect2D {
                        offset: [0, 0],
                        extent: runtime.extent(eye),
                    },
                },
            };

            graphics.render_view(&ViewDraw {
                eye,
                image_index,
                format: self.swapchain_format,
                view,
                texture: latched.and_then(|frame| frame.texture(slot)),
            })?;

            runtime.release_image(eye)?;
            projection_views.push(view);
        }
        Ok(projection_views)
    }

    fn end_frame<R>(
        &self,
        runtime: &mut R,
        ctx: &TickContext,
        layers: Vec<ProjectionLayer>,
    ) -> XrResult<()>
    where
        R: FrameLoop + ?Sized,
    {
        runtime.end_frame(&FrameSubmission {
            display_time: ctx.display_time,
            blend_mode: self.blend_mode,
            layers,
            graphics_state_index: ctx.graphics_state_index,
        })
    }
}

fn stamp_view_poses(
    location: &ViewLocation,
    latched: Option<&LatchedFrame>,
) -> (PoseSource, [Pose; VIEW_COUNT]) {
    match latched {
        Some(frame) => {
            let pose = frame.pose();
            (PoseSource::Remote, [pose; VIEW_COUNT])
        }
        None => (
            PoseSource::Local,
            [location.views[0].pose, location.views[1].pose],
        ),
    }
}
