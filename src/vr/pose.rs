use serde::{Deserialize, Serialize};
use std::fmt;

/// Nanoseconds on the runtime's display clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DisplayTime(pub i64);

impl DisplayTime {
    pub fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn offset_nanos(self, nanos: i64) -> Self {
        DisplayTime(self.0.saturating_add(nanos))
    }
}

impl fmt::Display for DisplayTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Counter-clockwise rotation about +Y.
    pub fn from_yaw(radians: f32) -> Self {
        let half = radians * 0.5;
        Self::new(0.0, half.sin(), 0.0, half.cos())
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            return Self::IDENTITY;
        }
        Self::new(self.x / len, self.y / len, self.z / len, self.w / len)
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub orientation: Quaternion,
    pub position: Vector3,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        orientation: Quaternion::IDENTITY,
        position: Vector3::ZERO,
    };

    pub fn translation(position: Vector3) -> Self {
        Self {
            orientation: Quaternion::IDENTITY,
            position,
        }
    }

    pub fn rotate_ccw_about_y(radians: f32, position: Vector3) -> Self {
        Self {
            orientation: Quaternion::from_yaw(radians),
            position,
        }
    }
}

/// Row-major 3x4 rigid transform, the layout the streaming service uses for
/// the pose it rendered a frame with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix34 {
    pub m: [[f32; 4]; 3],
}

impl Matrix34 {
    pub const IDENTITY: Matrix34 = Matrix34 {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
        ],
    };

    pub fn from_pose(pose: &Pose) -> Self {
        let Quaternion { x, y, z, w } = pose.orientation.normalized();
        let p = pose.position;
        Self {
            m: [
                [
                    1.0 - 2.0 * (y * y + z * z),
                    2.0 * (x * y - z * w),
                    2.0 * (x * z + y * w),
                    p.x,
                ],
                [
                    2.0 * (x * y + z * w),
                    1.0 - 2.0 * (x * x + z * z),
                    2.0 * (y * z - x * w),
                    p.y,
                ],
                [
                    2.0 * (x * z - y * w),
                    2.0 * (y * z + x * w),
                    1.0 - 2.0 * (x * x + y * y),
                    p.z,
                ],
            ],
        }
    }

    pub fn translation(&self) -> Vector3 {
        Vector3::new(self.m[0][3], self.m[1][3], self.m[2][3])
    }

    pub fn orientation(&self) -> Quaternion {
        let m = &self.m;
        let trace = m[0][0] + m[1][1] + m[2][2];
        let q = if trace > 0.0 {
            let s = 0.5 / (trace + 1.0).sqrt();
            Quaternion::new(
                (m[2][1] - m[1][2]) * s,
                (m[0][2] - m[2][0]) * s,
                (m[1][0] - m[0][1]) * s,
                0.25 / s,
            )
        } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
            let s = 2.0 * (1.0 + m[0][0] - m[1][1] - m[2][2]).sqrt();
            Quaternion::new(
                0.25 * s,
                (m[0][1] + m[1][0]) / s,
                (m[0][2] + m[2][0]) / s,
                (m[2][1] - m[1][2]) / s,
            )
        } else if m[1][1] > m[2][2] {
            let s = 2.0 * (1.0 + m[1][1] - m[0][0] - m[2][2]).sqrt();
            Quaternion::new(
                (m[0][1] + m[1][0]) / s,
                0.25 * s,
                (m[1][2] + m[2][1]) / s,
                (m[0][2] - m[2][0]) / s,
            )
        } else {
            let s = 2.0 * (1.0 + m[2][2] - m[0][0] - m[1][1]).sqrt();
            Quaternion::new(
                (m[0][2] + m[2][0]) / s,
                (m[1][2] + m[2][1]) / s,
                0.25 * s,
                (m[1][0] - m[0][1]) / s,
            )
        };
        q.normalized()
    }

    pub fn to_pose(&self) -> Pose {
        Pose {
            orientation: self.orientation(),
            position: self.translation(),
        }
    }
}

impl Default for Matrix34 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoseValidity {
    pub position: bool,
    pub orientation: bool,
}

impl PoseValidity {
    pub const VALID: PoseValidity = PoseValidity {
        position: true,
        orientation: true,
    };

    pub const INVALID: PoseValidity = PoseValidity {
        position: false,
        orientation: false,
    };

    pub fn is_valid(self) -> bool {
        self.position && self.orientation
    }
}

/// One tracked entity's state at a predicted display time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    pub pose: Pose,
    pub linear_velocity: Vector3,
    pub angular_velocity: Vector3,
    pub time: DisplayTime,
    pub validity: PoseValidity,
}

impl PoseSample {
    pub fn neutral(time: DisplayTime) -> Self {
        Self {
            pose: Pose::IDENTITY,
            linear_velocity: Vector3::ZERO,
            angular_velocity: Vector3::ZERO,
            time,
            validity: PoseValidity::INVALID,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validity.is_valid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn assert_quat_close(a: Quaternion, b: Quaternion) {
        // q and -q describe the same rotation
        let dot = a.x * b.x + a.y * b.y + a.z * b.z + a.w * b.w;
        assert!(
            (dot.abs() - 1.0).abs() < 1e-4,
            "quaternions differ: {a:?} vs {b:?}"
        );
    }

    #[test]
    fn identity_matrix_yields_identity_pose() {
        let pose = Matrix34::IDENTITY.to_pose();
        assert_eq!(pose.position, Vector3::ZERO);
        assert_quat_close(pose.orientation, Quaternion::IDENTITY);
    }

    #[test]
    fn yaw_half_turn_takes_the_non_trace_branch() {
        let pose = Pose::rotate_ccw_about_y(std::f32::consts::PI, Vector3::new(1.0, 2.0, 3.0));
        let matrix = Matrix34::from_pose(&pose);
        assert!(matrix.m[0][0] + matrix.m[1][1] + matrix.m[2][2] < 0.0);

        let back = matrix.to_pose();
        assert_quat_close(back.orientation, pose.orientation);
        assert_eq!(back.position, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn neutral_sample_is_never_valid() {
        let sample = PoseSample::neutral(DisplayTime(42));
        assert!(!sample.is_valid());
        assert_eq!(sample.pose, Pose::IDENTITY);
        assert_eq!(sample.time, DisplayTime(42));
    }

    proptest! {
        #[test]
        fn matrix_conversion_preserves_rotation(
            x in -1.0f32..1.0,
            y in -1.0f32..1.0,
            z in -1.0f32..1.0,
            w in -1.0f32..1.0,
        ) {
            let q = Quaternion::new(x, y, z, w);
            prop_assume!(q.length() > 0.1);
            let pose = Pose { orientation: q.normalized(), position: Vector3::new(x, y, z) };
            let back = Matrix34::from_pose(&pose).to_pose();
            let a = back.orientation;
            let b = pose.orientation;
            let dot = a.x * b.x + a.y * b.y + a.z * b.z + a.w * b.w;
            prop_assert!((dot.abs() - 1.0).abs() < 1e-3);
            prop_assert_eq!(back.position, pose.position);
        }
    }
}
