use crate::vr::remote::FrameTexture;
use crate::vr::runtime::{Extent2D, ProjectionView};
use crate::vr::{Eye, XrError, XrResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GraphicsPluginKind {
    #[default]
    OpenGLES,
    Vulkan,
}

impl GraphicsPluginKind {
    pub fn label(self) -> &'static str {
        match self {
            GraphicsPluginKind::OpenGLES => "OpenGLES",
            GraphicsPluginKind::Vulkan => "Vulkan",
        }
    }
}

impl fmt::Display for GraphicsPluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for GraphicsPluginKind {
    type Err = XrError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "opengles" | "gles" => Ok(GraphicsPluginKind::OpenGLES),
            "vulkan" | "vulkan2" => Ok(GraphicsPluginKind::Vulkan),
            other => Err(XrError::Config(format!("unknown graphics plugin '{other}'"))),
        }
    }
}

/// Swapchain image format as the runtime enumerates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SwapchainFormat(pub i64);

/// One eye's draw for the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewDraw {
    pub eye: Eye,
    pub image_index: u32,
    pub format: SwapchainFormat,
    pub view: ProjectionView,
    /// Remote frame texture to blit; `None` clears to the fallback color.
    pub texture: Option<FrameTexture>,
}

/// Graphics API glue: device creation, swapchain images and per-eye drawing.
pub trait GraphicsPlugin {
    fn label(&self) -> &'static str;
    fn instance_extensions(&self) -> Vec<&'static str>;
    fn initialize_device(&mut self) -> XrResult<()>;
    /// Picks the preferred format out of what the runtime supports.
    fn select_swapchain_format(
        &self,
        runtime_formats: &[SwapchainFormat],
    ) -> XrResult<SwapchainFormat>;
    fn allocate_swapchain_images(
        &mut self,
        eye: Eye,
        extent: Extent2D,
        image_count: u32,
    ) -> XrResult<()>;
    fn render_view(&mut self, draw: &ViewDraw) -> XrResult<()>;
}

/// Headless plugin that records what it was asked to draw.
#[derive(Debug, Default)]
pub struct NullGraphicsPlugin {
    initialized: bool,
    images: [u32; 2],
    draws: Vec<ViewDraw>,
}

impl NullGraphicsPlugin {
    pub const FORMAT: SwapchainFormat = SwapchainFormat(0x8C43); // GL_SRGB8_ALPHA8

    pub fn draws(&self) -> &[ViewDraw] {
        &self.draws
    }

    pub fn image_count(&self, eye: Eye) -> u32 {
        self.images[eye.index()]
    }
}

impl GraphicsPlugin for NullGraphicsPlugin {
    fn label(&self) -> &'static str {
        "Null Graphics Plugin"
    }

    fn instance_extensions(&self) -> Vec<&'static str> {
        Vec::new()
    }

    fn initialize_device(&mut self) -> XrResult<()> {
        self.initialized = true;
        Ok(())
    }

    fn select_swapchain_format(
        &self,
        runtime_formats: &[SwapchainFormat],
    ) -> XrResult<SwapchainFormat> {
        if runtime_formats.is_empty() || runtime_formats.contains(&Self::FORMAT) {
            return Ok(Self::FORMAT);
        }
        runtime_formats
            .first()
            .copied()
            .ok_or_else(|| XrError::Unsupported("no swapchain formats".to_string()))
    }

    fn allocate_swapchain_images(
        &mut self,
        eye: Eye,
        _extent: Extent2D,
        image_count: u32,
    ) -> XrResult<()> {
        self.images[eye.index()] = image_count;
        Ok(())
    }

    fn render_view(&mut self, draw: &ViewDraw) -> XrResult<()> {
        if !self.initialized {
            return Err(XrError::Unsupported(
                "render_view called before initialize_device".to_string(),
            ));
        }
        self.draws.push(*draw);
        Ok(())
    }
}
