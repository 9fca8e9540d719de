pub mod bindings;
pub mod compositor;
pub mod input;
pub mod null;
#[cfg(feature = "vr-openxr")]
pub mod openxr;
pub mod pose;
pub mod remote;
pub mod runtime;
pub mod sampler;
pub mod session;

pub use pose::{DisplayTime, Matrix34, Pose, PoseSample, PoseValidity, Quaternion, Vector3};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stereo only; mono view configurations are rejected at startup.
pub const VIEW_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    pub fn index(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }

    /// Subaction path shared by every action bound on this hand.
    pub fn user_path(self) -> &'static str {
        match self {
            Hand::Left => "/user/hand/left",
            Hand::Right => "/user/hand/right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    pub const BOTH: [Eye; VIEW_COUNT] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum XrError {
    #[error("{operation} failed with XrResult {code}")]
    Runtime { operation: &'static str, code: i32 },
    #[error("runtime located {got} views but {expected} swapchains exist")]
    ViewCountMismatch { expected: usize, got: usize },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl XrError {
    pub fn runtime(operation: &'static str, code: i32) -> Self {
        XrError::Runtime { operation, code }
    }
}

pub type XrResult<T> = Result<T, XrError>;
