//! OpenXR-backed [`XrRuntime`].
//!
//! The session is generic over the graphics binding; creating one needs the
//! graphics plugin's native handles, so [`OpenXrRuntime::new`] is unsafe in
//! the same way `xr::Instance::create_session` is.

use crate::config::{ClientConfig, FormFactor, ReferenceSpaceType};
use crate::render::{GraphicsPlugin, SwapchainFormat};
use crate::vr::bindings::{ActionKind, BINDING_PROFILES, Control};
use crate::vr::remote::DeviceDescription;
use crate::vr::runtime::{
    ActionSource, BooleanState, EnvironmentBlendMode, EventQueue, Extent2D, EyeView, FloatState,
    Fov, FrameLoop, FrameSubmission, FrameTiming, HapticVibration, Haptics, SessionControl,
    SpaceLocation, Swapchains, TrackedSpace, Tracking, Vector2State, ViewLocation, XrRuntime,
};
use crate::vr::session::{LifecycleEvent, SessionHandle, SessionState};
use crate::vr::{
    DisplayTime, Eye, Hand, Pose, PoseValidity, Quaternion, VIEW_COUNT, Vector3, XrError, XrResult,
};
use openxr as xr;
use std::collections::HashMap;
use std::time::Duration;

const VIEW_CONFIGURATION: xr::ViewConfigurationType = xr::ViewConfigurationType::PRIMARY_STEREO;

fn check<T>(operation: &'static str, result: Result<T, xr::sys::Result>) -> XrResult<T> {
    result.map_err(|code| {
        log::error!("[openxr] {operation} failed: {code:?}");
        XrError::runtime(operation, code.into_raw())
    })
}

fn to_xr_pose(pose: &Pose) -> xr::Posef {
    xr::Posef {
        orientation: xr::Quaternionf {
            x: pose.orientation.x,
            y: pose.orientation.y,
            z: pose.orientation.z,
            w: pose.orientation.w,
        },
        position: xr::Vector3f {
            x: pose.position.x,
            y: pose.position.y,
            z: pose.position.z,
        },
    }
}

fn from_xr_pose(pose: xr::Posef) -> Pose {
    Pose {
        orientation: Quaternion::new(
            pose.orientation.x,
            pose.orientation.y,
            pose.orientation.z,
            pose.orientation.w,
        ),
        position: Vector3::new(pose.position.x, pose.position.y, pose.position.z),
    }
}

fn from_xr_vector(v: xr::Vector3f) -> Vector3 {
    Vector3::new(v.x, v.y, v.z)
}

fn to_xr_duration(duration: Duration) -> xr::Duration {
    if duration == Duration::MAX {
        return xr::Duration::INFINITE;
    }
    xr::Duration::from_nanos(i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX))
}

/// Display refresh rate implied by a predicted display period.
fn refresh_rate_hz(period: Duration) -> Option<f32> {
    let seconds = period.as_secs_f32();
    (seconds > 0.0).then(|| 1.0 / seconds)
}

/// Distance between the two eye positions, when both are tracked.
fn ipd_meters(validity: PoseValidity, views: &[EyeView]) -> Option<f32> {
    let [left, right] = views else {
        return None;
    };
    if !validity.position {
        return None;
    }
    let dx = right.pose.position.x - left.pose.position.x;
    let dy = right.pose.position.y - left.pose.position.y;
    let dz = right.pose.position.z - left.pose.position.z;
    let distance = (dx * dx + dy * dy + dz * dz).sqrt();
    (distance > 0.0).then_some(distance)
}

fn location_validity(flags: xr::SpaceLocationFlags) -> PoseValidity {
    PoseValidity {
        position: flags.contains(xr::SpaceLocationFlags::POSITION_VALID),
        orientation: flags.contains(xr::SpaceLocationFlags::ORIENTATION_VALID),
    }
}

fn session_state(state: xr::SessionState) -> SessionState {
    match state {
        xr::SessionState::IDLE => SessionState::Idle,
        xr::SessionState::READY => SessionState::Ready,
        xr::SessionState::SYNCHRONIZED => SessionState::Synchronized,
        xr::SessionState::VISIBLE => SessionState::Visible,
        xr::SessionState::FOCUSED => SessionState::Focused,
        xr::SessionState::STOPPING => SessionState::Stopping,
        xr::SessionState::LOSS_PENDING => SessionState::LossPending,
        xr::SessionState::EXITING => SessionState::Exiting,
        _ => SessionState::Unknown,
    }
}

fn blend_mode(mode: EnvironmentBlendMode) -> xr::EnvironmentBlendMode {
    match mode {
        EnvironmentBlendMode::Opaque => xr::EnvironmentBlendMode::OPAQUE,
        EnvironmentBlendMode::Additive => xr::EnvironmentBlendMode::ADDITIVE,
        EnvironmentBlendMode::AlphaBlend => xr::EnvironmentBlendMode::ALPHA_BLEND,
    }
}

fn form_factor(form: FormFactor) -> xr::FormFactor {
    match form {
        FormFactor::Hmd => xr::FormFactor::HEAD_MOUNTED_DISPLAY,
        FormFactor::Handheld => xr::FormFactor::HANDHELD_DISPLAY,
    }
}

fn reference_space_type(space: ReferenceSpaceType) -> xr::ReferenceSpaceType {
    match space {
        ReferenceSpaceType::View => xr::ReferenceSpaceType::VIEW,
        ReferenceSpaceType::Local => xr::ReferenceSpaceType::LOCAL,
        ReferenceSpaceType::Stage => xr::ReferenceSpaceType::STAGE,
    }
}

/// Loader, instance and system, created before the graphics device.
pub struct OpenXrSystem {
    pub instance: xr::Instance,
    pub system: xr::SystemId,
}

impl OpenXrSystem {
    pub fn create(config: &ClientConfig, graphics: &dyn GraphicsPlugin) -> XrResult<Self> {
        // SAFETY: the loader library is only loaded here and the entry owns it
        // for as long as the instance lives.
        let entry = unsafe { xr::Entry::load() }
            .map_err(|err| XrError::Unsupported(format!("failed to load OpenXR loader: {err}")))?;
        let available = check(
            "xrEnumerateInstanceExtensionProperties",
            entry.enumerate_extensions(),
        )?;

        let mut extensions = xr::ExtensionSet::default();
        for name in graphics.instance_extensions() {
            match name {
                "XR_KHR_opengl_es_enable" if available.khr_opengl_es_enable => {
                    extensions.khr_opengl_es_enable = true;
                }
                "XR_KHR_vulkan_enable2" if available.khr_vulkan_enable2 => {
                    extensions.khr_vulkan_enable2 = true;
                }
                #[cfg(target_os = "android")]
                "XR_KHR_android_create_instance" if available.khr_android_create_instance => {
                    extensions.khr_android_create_instance = true;
                }
                other => {
                    return Err(XrError::Unsupported(format!(
                        "runtime does not offer required extension {other}"
                    )));
                }
            }
        }

        let app_info = xr::ApplicationInfo {
            application_name: "xr_stream_client",
            application_version: 1,
            engine_name: "xr_stream_client",
            engine_version: 1,
        };
        let instance = check(
            "xrCreateInstance",
            entry.create_instance(&app_info, &extensions, &[]),
        )?;
        let properties = check("xrGetInstanceProperties", instance.properties())?;
        log::info!(
            "[openxr] runtime {} {}",
            properties.runtime_name,
            properties.runtime_version
        );

        let system = check("xrGetSystem", instance.system(form_factor(config.form_factor)))?;
        log::info!("[openxr] using system {system:?} for form factor {}", config.form_factor);

        let blend_modes = check(
            "xrEnumerateEnvironmentBlendModes",
            instance.enumerate_environment_blend_modes(system, VIEW_CONFIGURATION),
        )?;
        let wanted = blend_mode(config.environment_blend_mode);
        if !blend_modes.contains(&wanted) {
            return Err(XrError::Unsupported(format!(
                "environment blend mode {}",
                config.environment_blend_mode
            )));
        }

        Ok(Self { instance, system })
    }
}

struct EyeSwapchain<G: xr::Graphics> {
    handle: xr::Swapchain<G>,
    extent: Extent2D,
}

struct ActionTable {
    set: xr::ActionSet,
    hand_paths: [xr::Path; 2],
    booleans: HashMap<Control, xr::Action<bool>>,
    floats: HashMap<Control, xr::Action<f32>>,
    vectors: HashMap<Control, xr::Action<xr::Vector2f>>,
    aim_pose: xr::Action<xr::Posef>,
    grip_pose: xr::Action<xr::Posef>,
    vibrate: xr::Action<xr::Haptic>,
}

impl ActionTable {
    fn create(instance: &xr::Instance) -> XrResult<Self> {
        let set = check(
            "xrCreateActionSet",
            instance.create_action_set("stream_client", "Stream Client", 0),
        )?;
        let hand_paths = [
            check("xrStringToPath", instance.string_to_path(Hand::Left.user_path()))?,
            check("xrStringToPath", instance.string_to_path(Hand::Right.user_path()))?,
        ];

        let mut booleans = HashMap::new();
        let mut floats = HashMap::new();
        let mut vectors = HashMap::new();
        let mut poses = HashMap::new();
        let mut vibrate = None;

        for control in Control::ALL {
            let name = control.action_name();
            let label = control.localized_name();
            match control.kind() {
                ActionKind::Boolean => {
                    let action = check(
                        "xrCreateAction",
                        set.create_action(name, label, &hand_paths),
                    )?;
                    booleans.insert(control, action);
                }
                ActionKind::Float => {
                    let action = check(
                        "xrCreateAction",
                        set.create_action(name, label, &hand_paths),
                    )?;
                    floats.insert(control, action);
                }
                ActionKind::Vector2 => {
                    let action = check(
                        "xrCreateAction",
                        set.create_action(name, label, &hand_paths),
                    )?;
                    vectors.insert(control, action);
                }
                ActionKind::Pose => {
                    let action = check(
                        "xrCreateAction",
                        set.create_action(name, label, &hand_paths),
                    )?;
                    poses.insert(control, action);
                }
                ActionKind::Vibration => {
                    let action = check(
                        "xrCreateAction",
                        set.create_action(name, label, &hand_paths),
                    )?;
                    vibrate = Some(action);
                }
            }
        }

        let missing = |what: &str| XrError::Config(format!("no {what} action declared"));
        Ok(Self {
            set,
            hand_paths,
            booleans,
            floats,
            vectors,
            aim_pose: poses.remove(&Control::AimPose).ok_or_else(|| missing("aim pose"))?,
            grip_pose: poses.remove(&Control::GripPose).ok_or_else(|| missing("grip pose"))?,
            vibrate: vibrate.ok_or_else(|| missing("vibration"))?,
        })
    }

    fn suggest_bindings(&self, instance: &xr::Instance) -> XrResult<()> {
        for profile in BINDING_PROFILES {
            let mut suggested = Vec::with_capacity(profile.bindings.len());
            for binding in profile.bindings {
                let path = check("xrStringToPath", instance.string_to_path(binding.path))?;
                let control = binding.control;
                let entry = match control.kind() {
                    ActionKind::Boolean => {
                        self.booleans.get(&control).map(|a| xr::Binding::new(a, path))
                    }
                    ActionKind::Float => {
                        self.floats.get(&control).map(|a| xr::Binding::new(a, path))
                    }
                    ActionKind::Vector2 => {
                        self.vectors.get(&control).map(|a| xr::Binding::new(a, path))
                    }
                    ActionKind::Pose if control == Control::AimPose => {
                        Some(xr::Binding::new(&self.aim_pose, path))
                    }
                    ActionKind::Pose => Some(xr::Binding::new(&self.grip_pose, path)),
                    ActionKind::Vibration => Some(xr::Binding::new(&self.vibrate, path)),
                };
                suggested.extend(entry);
            }

            let profile_path = check(
                "xrStringToPath",
                instance.string_to_path(profile.interaction_profile),
            )?;
            let suggestion =
                instance.suggest_interaction_profile_bindings(profile_path, &suggested);
            if let Err(err) = suggestion {
                log::warn!(
                    "[openxr] binding suggestion rejected for {}: {err:?}",
                    profile.interaction_profile
                );
            }
        }
        Ok(())
    }

    fn path(&self, hand: Hand) -> xr::Path {
        self.hand_paths[hand.index()]
    }
}

pub struct OpenXrRuntime<G: xr::Graphics> {
    instance: xr::Instance,
    session: xr::Session<G>,
    frame_waiter: xr::FrameWaiter,
    frame_stream: xr::FrameStream<G>,
    event_buffer: xr::EventDataBuffer,
    app_space: xr::Space,
    head_space: xr::Space,
    aim_spaces: [xr::Space; 2],
    actions: ActionTable,
    swapchains: Vec<EyeSwapchain<G>>,
    swapchain_format: SwapchainFormat,
    device: DeviceDescription,
}

impl<G: xr::Graphics> OpenXrRuntime<G> {
    /// Creates the session, reference spaces, action set and one swapchain
    /// per eye.
    ///
    /// # Safety
    /// `session_info` must reference live graphics handles from `graphics`,
    /// and they must outlive the returned runtime.
    pub unsafe fn new(
        system: OpenXrSystem,
        session_info: &G::SessionCreateInfo,
        config: &ClientConfig,
        graphics: &mut dyn GraphicsPlugin,
    ) -> XrResult<Self> {
        config.validate()?;
        let OpenXrSystem { instance, system } = system;

        // SAFETY: forwarded from the caller's contract.
        let (session, frame_waiter, frame_stream) = unsafe {
            check("xrCreateSession", instance.create_session::<G>(system, session_info))?
        };

        let actions = ActionTable::create(&instance)?;
        actions.suggest_bindings(&instance)?;
        check("xrAttachSessionActionSets", session.attach_action_sets(&[&actions.set]))?;

        let preset = config.app_space;
        let app_space = check(
            "xrCreateReferenceSpace",
            session.create_reference_space(
                reference_space_type(preset.space_type()),
                to_xr_pose(&preset.pose_in_space()),
            ),
        )?;
        let head_space = check(
            "xrCreateReferenceSpace",
            session.create_reference_space(xr::ReferenceSpaceType::VIEW, xr::Posef::IDENTITY),
        )?;
        let aim_spaces = [
            check(
                "xrCreateActionSpace",
                actions.aim_pose.create_space(
                    session.clone(),
                    actions.path(Hand::Left),
                    xr::Posef::IDENTITY,
                ),
            )?,
            check(
                "xrCreateActionSpace",
                actions.aim_pose.create_space(
                    session.clone(),
                    actions.path(Hand::Right),
                    xr::Posef::IDENTITY,
                ),
            )?,
        ];
        log::info!("[openxr] application space {preset}");

        let runtime_formats: Vec<SwapchainFormat> = check(
            "xrEnumerateSwapchainFormats",
            session.enumerate_swapchain_formats(),
        )?
        .into_iter()
        .map(|format| SwapchainFormat(G::lower_format(format)))
        .collect();
        let swapchain_format = graphics.select_swapchain_format(&runtime_formats)?;

        let view_configs = check(
            "xrEnumerateViewConfigurationViews",
            instance.enumerate_view_configuration_views(system, VIEW_CONFIGURATION),
        )?;
        if view_configs.len() != VIEW_COUNT {
            return Err(XrError::ViewCountMismatch {
                expected: VIEW_COUNT,
                got: view_configs.len(),
            });
        }

        let mut swapchains = Vec::with_capacity(VIEW_COUNT);
        for (eye, view) in Eye::BOTH.into_iter().zip(&view_configs) {
            let extent = Extent2D {
                width: view.recommended_image_rect_width,
                height: view.recommended_image_rect_height,
            };
            let handle = check(
                "xrCreateSwapchain",
                session.create_swapchain(&xr::SwapchainCreateInfo {
                    create_flags: xr::SwapchainCreateFlags::EMPTY,
                    usage_flags: xr::SwapchainUsageFlags::COLOR_ATTACHMENT
                        | xr::SwapchainUsageFlags::SAMPLED,
                    format: G::raise_format(swapchain_format.0),
                    sample_count: view.recommended_swapchain_sample_count,
                    width: extent.width,
                    height: extent.height,
                    face_count: 1,
                    array_size: 1,
                    mip_count: 1,
                }),
            )?;
            let images = check("xrEnumerateSwapchainImages", handle.enumerate_images())?;
            graphics.allocate_swapchain_images(eye, extent, images.len() as u32)?;
            log::info!(
                "[openxr] {eye:?} swapchain {}x{} with {} images",
                extent.width,
                extent.height,
                images.len()
            );
            swapchains.push(EyeSwapchain { handle, extent });
        }

        let device = DeviceDescription {
            per_eye_extent: swapchains[0].extent,
            view_count: VIEW_COUNT,
            ..DeviceDescription::default()
        };
        log::info!(
            "[openxr] refresh rate {} Hz and IPD {} m are nominal until measured",
            device.refresh_rate_hz,
            device.ipd_meters
        );

        Ok(Self {
            instance,
            session,
            frame_waiter,
            frame_stream,
            event_buffer: xr::EventDataBuffer::new(),
            app_space,
            head_space,
            aim_spaces,
            actions,
            swapchains,
            swapchain_format,
            device,
        })
    }

    fn swapchain(&mut self, eye: Eye) -> &mut EyeSwapchain<G> {
        &mut self.swapchains[eye.index()]
    }

    fn space(&self, space: TrackedSpace) -> &xr::Space {
        match space {
            TrackedSpace::Head => &self.head_space,
            TrackedSpace::Aim(hand) => &self.aim_spaces[hand.index()],
        }
    }
}

impl<G: xr::Graphics> EventQueue for OpenXrRuntime<G> {
    fn poll_event(&mut self) -> XrResult<Option<LifecycleEvent>> {
        let event = check("xrPollEvent", self.instance.poll_event(&mut self.event_buffer))?;
        let Some(event) = event else {
            return Ok(None);
        };
        let converted = match event {
            xr::Event::SessionStateChanged(e) => LifecycleEvent::SessionStateChanged {
                session: SessionHandle(e.session().into_raw()),
                state: session_state(e.state()),
                time: DisplayTime(e.time().as_nanos()),
            },
            xr::Event::InstanceLossPending(e) => LifecycleEvent::InstanceLossPending {
                loss_time: DisplayTime(e.loss_time().as_nanos()),
            },
            xr::Event::InteractionProfileChanged(e) => LifecycleEvent::InteractionProfileChanged {
                session: SessionHandle(e.session().into_raw()),
            },
            xr::Event::EventsLost(e) => LifecycleEvent::EventsLost {
                count: e.lost_event_count(),
            },
            xr::Event::ReferenceSpaceChangePending(_) => {
                LifecycleEvent::ReferenceSpaceChangePending
            }
            _ => LifecycleEvent::Unrecognized { type_code: 0 },
        };
        Ok(Some(converted))
    }
}

impl<G: xr::Graphics> SessionControl for OpenXrRuntime<G> {
    fn session_handle(&self) -> SessionHandle {
        SessionHandle(self.session.as_raw().into_raw())
    }

    fn begin_session(&mut self) -> XrResult<()> {
        check("xrBeginSession", self.session.begin(VIEW_CONFIGURATION))?;
        Ok(())
    }

    fn end_session(&mut self) -> XrResult<()> {
        check("xrEndSession", self.session.end())?;
        Ok(())
    }

    fn request_exit_session(&mut self) -> XrResult<()> {
        check("xrRequestExitSession", self.session.request_exit())
    }
}

impl<G: xr::Graphics> FrameLoop for OpenXrRuntime<G> {
    fn wait_frame(&mut self) -> XrResult<FrameTiming> {
        let state = check("xrWaitFrame", self.frame_waiter.wait())?;
        let period = Duration::from_nanos(state.predicted_display_period.as_nanos().max(0) as u64);
        if let Some(hz) = refresh_rate_hz(period) {
            if (hz - self.device.refresh_rate_hz).abs() > 0.5 {
                log::info!("[openxr] measured refresh rate {hz:.1} Hz");
            }
            self.device.refresh_rate_hz = hz;
        }
        Ok(FrameTiming {
            predicted_display_time: DisplayTime(state.predicted_display_time.as_nanos()),
            predicted_display_period: period,
            should_render: state.should_render,
        })
    }

    fn begin_frame(&mut self) -> XrResult<()> {
        check("xrBeginFrame", self.frame_stream.begin())
    }

    fn end_frame(&mut self, submission: &FrameSubmission) -> XrResult<()> {
        let display_time = xr::Time::from_nanos(submission.display_time.as_nanos());
        let mode = blend_mode(submission.blend_mode);

        let Some(layer) = submission.layers.first() else {
            return check("xrEndFrame", self.frame_stream.end(display_time, mode, &[]));
        };

        let views: Vec<xr::CompositionLayerProjectionView<'_, G>> = layer
            .views
            .iter()
            .map(|view| {
                let swapchain = &self.swapchains[view.sub_image.eye.index()].handle;
                let rect = view.sub_image.image_rect;
                xr::CompositionLayerProjectionView::new()
                    .pose(to_xr_pose(&view.pose))
                    .fov(xr::Fovf {
                        angle_left: view.fov.angle_left,
                        angle_right: view.fov.angle_right,
                        angle_up: view.fov.angle_up,
                        angle_down: view.fov.angle_down,
                    })
                    .sub_image(
                        xr::SwapchainSubImage::new()
                            .swapchain(swapchain)
                            .image_rect(xr::Rect2Di {
                                offset: xr::Offset2Di {
                                    x: rect.offset[0],
                                    y: rect.offset[1],
                                },
                                extent: xr::Extent2Di {
                                    width: rect.extent.width as i32,
                                    height: rect.extent.height as i32,
                                },
                            }),
                    )
            })
            .collect();
        let projection = xr::CompositionLayerProjection::new()
            .space(&self.app_space)
            .views(&views);

        let layers: [&xr::CompositionLayerBase<'_, G>; 1] = [&projection];
        check("xrEndFrame", self.frame_stream.end(display_time, mode, &layers))
    }
}

impl<G: xr::Graphics> Swapchains for OpenXrRuntime<G> {
    fn view_count(&self) -> usize {
        self.swapchains.len()
    }

    fn swapchain_format(&self) -> SwapchainFormat {
        self.swapchain_format
    }

    fn extent(&self, eye: Eye) -> Extent2D {
        self.swapchains[eye.index()].extent
    }

    fn acquire_image(&mut self, eye: Eye) -> XrResult<u32> {
        check("xrAcquireSwapchainImage", self.swapchain(eye).handle.acquire_image())
    }

    fn wait_image(&mut self, eye: Eye, timeout: Duration) -> XrResult<()> {
        let timeout = to_xr_duration(timeout);
        check("xrWaitSwapchainImage", self.swapchain(eye).handle.wait_image(timeout))
    }

    fn release_image(&mut self, eye: Eye) -> XrResult<()> {
        check("xrReleaseSwapchainImage", self.swapchain(eye).handle.release_image())
    }
}

impl<G: xr::Graphics> Tracking for OpenXrRuntime<G> {
    fn locate_views(&mut self, time: DisplayTime) -> XrResult<ViewLocation> {
        let (flags, views) = check(
            "xrLocateViews",
            self.session.locate_views(
                VIEW_CONFIGURATION,
                xr::Time::from_nanos(time.as_nanos()),
                &self.app_space,
            ),
        )?;
        let validity = PoseValidity {
            position: flags.contains(xr::ViewStateFlags::POSITION_VALID),
            orientation: flags.contains(xr::ViewStateFlags::ORIENTATION_VALID),
        };
        let views: Vec<EyeView> = views
            .into_iter()
            .map(|view| EyeView {
                pose: from_xr_pose(view.pose),
                fov: Fov {
                    angle_left: view.fov.angle_left,
                    angle_right: view.fov.angle_right,
                    angle_up: view.fov.angle_up,
                    angle_down: view.fov.angle_down,
                },
            })
            .collect();
        if let Some(ipd) = ipd_meters(validity, &views) {
            self.device.ipd_meters = ipd;
        }
        Ok(ViewLocation {
            validity,
            views,
            // vendor graphics-state extension is not exposed by the loader
            graphics_state_index: 0,
        })
    }

    fn locate_space(&mut self, space: TrackedSpace, time: DisplayTime) -> XrResult<SpaceLocation> {
        let time = xr::Time::from_nanos(time.as_nanos());
        let target = self.space(space);
        if space == TrackedSpace::Head {
            let (location, velocity) =
                check("xrLocateSpace", target.relate(&self.app_space, time))?;
            let linear = velocity
                .velocity_flags
                .contains(xr::SpaceVelocityFlags::LINEAR_VALID)
                .then(|| from_xr_vector(velocity.linear_velocity));
            let angular = velocity
                .velocity_flags
                .contains(xr::SpaceVelocityFlags::ANGULAR_VALID)
                .then(|| from_xr_vector(velocity.angular_velocity));
            return Ok(SpaceLocation {
                pose: from_xr_pose(location.pose),
                validity: location_validity(location.location_flags),
                linear_velocity: linear,
                angular_velocity: angular,
            });
        }

        let location = check("xrLocateSpace", target.locate(&self.app_space, time))?;
        Ok(SpaceLocation {
            pose: from_xr_pose(location.pose),
            validity: location_validity(location.location_flags),
            linear_velocity: None,
            angular_velocity: None,
        })
    }
}

impl<G: xr::Graphics> ActionSource for OpenXrRuntime<G> {
    fn sync_actions(&mut self) -> XrResult<()> {
        check(
            "xrSyncActions",
            self.session
                .sync_actions(&[xr::ActiveActionSet::new(&self.actions.set)]),
        )
    }

    fn boolean_state(&mut self, control: Control, hand: Hand) -> XrResult<BooleanState> {
        let Some(action) = self.actions.booleans.get(&control) else {
            return Ok(BooleanState::default());
        };
        let state = check(
            "xrGetActionStateBoolean",
            action.state(&self.session, self.actions.path(hand)),
        )?;
        Ok(BooleanState {
            current_state: state.current_state,
            changed_since_last_sync: state.changed_since_last_sync,
            is_active: state.is_active,
        })
    }

    fn float_state(&mut self, control: Control, hand: Hand) -> XrResult<FloatState> {
        let Some(action) = self.actions.floats.get(&control) else {
            return Ok(FloatState::default());
        };
        let state = check(
            "xrGetActionStateFloat",
            action.state(&self.session, self.actions.path(hand)),
        )?;
        Ok(FloatState {
            current_state: state.current_state,
            is_active: state.is_active,
        })
    }

    fn vector2_state(&mut self, control: Control, hand: Hand) -> XrResult<Vector2State> {
        let Some(action) = self.actions.vectors.get(&control) else {
            return Ok(Vector2State::default());
        };
        let state = check(
            "xrGetActionStateVector2f",
            action.state(&self.session, self.actions.path(hand)),
        )?;
        Ok(Vector2State {
            x: state.current_state.x,
            y: state.current_state.y,
            is_active: state.is_active,
        })
    }

    fn pose_active(&mut self, hand: Hand) -> XrResult<bool> {
        check(
            "xrGetActionStatePose",
            self.actions
                .grip_pose
                .is_active(&self.session, self.actions.path(hand)),
        )
    }
}

impl<G: xr::Graphics> Haptics for OpenXrRuntime<G> {
    fn apply_vibration(&mut self, hand: Hand, vibration: HapticVibration) -> XrResult<()> {
        let event = xr::HapticVibration::new()
            .amplitude(vibration.amplitude)
            .duration(xr::Duration::from_nanos(vibration.duration))
            .frequency(vibration.frequency);
        check(
            "xrApplyHapticFeedback",
            self.actions
                .vibrate
                .apply_feedback(&self.session, self.actions.path(hand), &event),
        )
    }
}

impl<G: xr::Graphics> XrRuntime for OpenXrRuntime<G> {
    fn label(&self) -> &'static str {
        "OpenXR"
    }

    fn device_description(&self) -> DeviceDescription {
        self.device
    }

    fn current_interaction_profile(&self, hand: Hand) -> XrResult<Option<String>> {
        let profile = check(
            "xrGetCurrentInteractionProfile",
            self.session.current_interaction_profile(self.actions.path(hand)),
        )?;
        if profile == xr::Path::NULL {
            return Ok(None);
        }
        let name = check("xrPathToString", self.instance.path_to_string(profile))?;
        Ok(Some(name))
    }
}
