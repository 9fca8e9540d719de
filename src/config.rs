use crate::render::GraphicsPluginKind;
use crate::vr::input::DEFAULT_HAPTIC_THRESHOLD;
use crate::vr::runtime::EnvironmentBlendMode;
use crate::vr::{Pose, Vector3, XrError, XrResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const GRAPHICS_PLUGIN_ENV: &str = "XR_GRAPHICS_PLUGIN";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FormFactor {
    #[default]
    Hmd,
    Handheld,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ViewConfiguration {
    Mono,
    #[default]
    Stereo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSpaceType {
    View,
    Local,
    Stage,
}

/// Named application spaces: a reference space plus the pose of the app
/// origin inside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReferenceSpacePreset {
    View,
    ViewFront,
    #[default]
    Local,
    Stage,
    StageLeft,
    StageRight,
    StageLeftRotated,
    StageRightRotated,
}

impl ReferenceSpacePreset {
    pub const ALL: [ReferenceSpacePreset; 8] = [
        ReferenceSpacePreset::View,
        ReferenceSpacePreset::ViewFront,
        ReferenceSpacePreset::Local,
        ReferenceSpacePreset::Stage,
        ReferenceSpacePreset::StageLeft,
        ReferenceSpacePreset::StageRight,
        ReferenceSpacePreset::StageLeftRotated,
        ReferenceSpacePreset::StageRightRotated,
    ];

    pub fn space_type(self) -> ReferenceSpaceType {
        match self {
            ReferenceSpacePreset::View | ReferenceSpacePreset::ViewFront => {
                ReferenceSpaceType::View
            }
            ReferenceSpacePreset::Local => ReferenceSpaceType::Local,
            _ => ReferenceSpaceType::Stage,
        }
    }

    pub fn pose_in_space(self) -> Pose {
        const SIXTY_DEGREES: f32 = std::f32::consts::FRAC_PI_3;
        match self {
            ReferenceSpacePreset::View
            | ReferenceSpacePreset::Local
            | ReferenceSpacePreset::Stage => Pose::IDENTITY,
            ReferenceSpacePreset::ViewFront => Pose::translation(Vector3::new(0.0, 0.0, -2.0)),
            ReferenceSpacePreset::StageLeft => {
                Pose::rotate_ccw_about_y(0.0, Vector3::new(-2.0, 0.0, -2.0))
            }
            ReferenceSpacePreset::StageRight => {
                Pose::rotate_ccw_about_y(0.0, Vector3::new(2.0, 0.0, -2.0))
            }
            ReferenceSpacePreset::StageLeftRotated => {
                Pose::rotate_ccw_about_y(SIXTY_DEGREES, Vector3::new(-2.0, 0.5, -2.0))
            }
            ReferenceSpacePreset::StageRightRotated => {
                Pose::rotate_ccw_about_y(-SIXTY_DEGREES, Vector3::new(2.0, 0.5, -2.0))
            }
        }
    }
}

macro_rules! named_kind {
    ($kind:ty, $what:literal, { $($variant:path => $name:literal),+ $(,)? }) => {
        impl $kind {
            pub fn name(self) -> &'static str {
                match self {
                    $($variant => $name,)+
                }
            }
        }

        impl FromStr for $kind {
            type Err = XrError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let value = value.trim();
                $(
                    if value.eq_ignore_ascii_case($name) {
                        return Ok($variant);
                    }
                )+
                Err(XrError::Config(format!(concat!("unknown ", $what, " '{}'"), value)))
            }
        }

        impl fmt::Display for $kind {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

named_kind!(FormFactor, "form factor", {
    FormFactor::Hmd => "Hmd",
    FormFactor::Handheld => "Handheld",
});

named_kind!(ViewConfiguration, "view configuration", {
    ViewConfiguration::Mono => "Mono",
    ViewConfiguration::Stereo => "Stereo",
});

named_kind!(EnvironmentBlendMode, "environment blend mode", {
    EnvironmentBlendMode::Opaque => "Opaque",
    EnvironmentBlendMode::Additive => "Additive",
    EnvironmentBlendMode::AlphaBlend => "AlphaBlend",
});

named_kind!(ReferenceSpacePreset, "reference space type", {
    ReferenceSpacePreset::View => "View",
    ReferenceSpacePreset::ViewFront => "ViewFront",
    ReferenceSpacePreset::Local => "Local",
    ReferenceSpacePreset::Stage => "Stage",
    ReferenceSpacePreset::StageLeft => "StageLeft",
    ReferenceSpacePreset::StageRight => "StageRight",
    ReferenceSpacePreset::StageLeftRotated => "StageLeftRotated",
    ReferenceSpacePreset::StageRightRotated => "StageRightRotated",
});

// Config files spell kinds by name, in any case.
macro_rules! serde_by_name {
    ($($kind:ty),+ $(,)?) => {
        $(
            impl Serialize for $kind {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.collect_str(self)
                }
            }

            impl<'de> Deserialize<'de> for $kind {
                fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                    let raw = String::deserialize(deserializer)?;
                    raw.parse().map_err(serde::de::Error::custom)
                }
            }
        )+
    };
}

serde_by_name!(
    GraphicsPluginKind,
    FormFactor,
    ViewConfiguration,
    EnvironmentBlendMode,
    ReferenceSpacePreset,
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub graphics_plugin: GraphicsPluginKind,
    pub form_factor: FormFactor,
    pub view_configuration: ViewConfiguration,
    pub environment_blend_mode: EnvironmentBlendMode,
    pub app_space: ReferenceSpacePreset,
    pub haptic_threshold: f32,
    /// `None` waits for swapchain images indefinitely.
    pub swapchain_wait_timeout_ms: Option<u64>,
    /// Submitted frames between telemetry log lines; zero disables them.
    pub telemetry_interval: u64,
    pub max_frames: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            graphics_plugin: GraphicsPluginKind::OpenGLES,
            form_factor: FormFactor::Hmd,
            view_configuration: ViewConfiguration::Stereo,
            environment_blend_mode: EnvironmentBlendMode::Opaque,
            app_space: ReferenceSpacePreset::Local,
            haptic_threshold: DEFAULT_HAPTIC_THRESHOLD,
            swapchain_wait_timeout_ms: None,
            telemetry_interval: 600,
            max_frames: None,
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(json: &str) -> XrResult<Self> {
        let config: ClientConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> XrResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_pretty(&self) -> XrResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> XrResult<()> {
        if self.view_configuration != ViewConfiguration::Stereo {
            return Err(XrError::Unsupported(format!(
                "{} view configuration; streaming needs Stereo",
                self.view_configuration
            )));
        }
        if !(0.0..=1.0).contains(&self.haptic_threshold) {
            return Err(XrError::Config(format!(
                "haptic threshold {} outside [0, 1]",
                self.haptic_threshold
            )));
        }
        Ok(())
    }

    /// Applies process environment overrides.
    pub fn apply_env_overrides(&mut self) -> XrResult<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> XrResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(GRAPHICS_PLUGIN_ENV).filter(|value| !value.trim().is_empty()) {
            let plugin: GraphicsPluginKind = value.parse()?;
            log::info!("[config] graphics plugin overridden to {plugin}");
            self.graphics_plugin = plugin;
        }
        Ok(())
    }

    pub fn swapchain_wait_timeout(&self) -> Duration {
        self.swapchain_wait_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(Duration::MAX)
    }
}
