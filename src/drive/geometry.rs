//! Planar geometry used by odometry and kinematics.
//!
//! All lengths are meters, all angles are radians unless a method name says
//! otherwise. Rotations are counter-clockwise positive.

use std::fmt;
use std::ops::{Add, Neg, Sub};

/// A rotation in the plane, stored with its cosine and sine.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rotation2d {
    value: f64,
    cos: f64,
    sin: f64,
}

impl Default for Rotation2d {
    fn default() -> Self {
        Self::from_radians(0.0)
    }
}

impl Rotation2d {
    pub fn from_radians(value: f64) -> Self {
        Self {
            value,
            cos: value.cos(),
            sin: value.sin(),
        }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::from_radians(degrees.to_radians())
    }

    /// Builds a rotation from an (x, y) direction. A zero vector yields zero.
    pub fn from_xy(x: f64, y: f64) -> Self {
        let magnitude = x.hypot(y);
        if magnitude > 1e-6 {
            let (cos, sin) = (x / magnitude, y / magnitude);
            Self {
                value: sin.atan2(cos),
                cos,
                sin,
            }
        } else {
            Self::default()
        }
    }

    pub fn radians(&self) -> f64 {
        self.value
    }

    pub fn degrees(&self) -> f64 {
        self.value.to_degrees()
    }

    pub fn cos(&self) -> f64 {
        self.cos
    }

    pub fn sin(&self) -> f64 {
        self.sin
    }

    /// Adds two rotations using the angle-sum identities, so the result is
    /// wrapped to (-pi, pi].
    pub fn rotate_by(&self, other: &Rotation2d) -> Rotation2d {
        Rotation2d::from_xy(
            self.cos * other.cos - self.sin * other.sin,
            self.cos * other.sin + self.sin * other.cos,
        )
    }
}

impl Add for Rotation2d {
    type Output = Rotation2d;

    fn add(self, other: Rotation2d) -> Rotation2d {
        self.rotate_by(&other)
    }
}

impl Neg for Rotation2d {
    type Output = Rotation2d;

    fn neg(self) -> Rotation2d {
        Rotation2d::from_radians(-self.value)
    }
}

impl Sub for Rotation2d {
    type Output = Rotation2d;

    fn sub(self, other: Rotation2d) -> Rotation2d {
        self.rotate_by(&-other)
    }
}

impl fmt::Display for Rotation2d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rotation2d(Rads: {:.2}, Deg: {:.2})",
            self.value,
            self.degrees()
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Translation2d {
    pub x: f64,
    pub y: f64,
}

impl Translation2d {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn rotate_by(&self, rotation: &Rotation2d) -> Translation2d {
        Translation2d::new(
            self.x * rotation.cos() - self.y * rotation.sin(),
            self.x * rotation.sin() + self.y * rotation.cos(),
        )
    }
}

impl Add for Translation2d {
    type Output = Translation2d;

    fn add(self, other: Translation2d) -> Translation2d {
        Translation2d::new(self.x + other.x, self.y + other.y)
    }
}

/// A change in pose along an arc, expressed in the robot frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Twist2d {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

/// Position and heading of the robot on the field.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose2d {
    pub translation: Translation2d,
    pub rotation: Rotation2d,
}

impl Pose2d {
    pub fn new(x: f64, y: f64, rotation: Rotation2d) -> Self {
        Self {
            translation: Translation2d::new(x, y),
            rotation,
        }
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    /// Applies a twist to this pose (the SE(2) exponential map).
    ///
    /// The twist is interpreted in the robot frame, so a twist of
    /// `(d, 0, 0)` moves `d` meters along the current heading. When the
    /// heading change is tiny a series expansion keeps the result stable.
    pub fn exp(&self, twist: &Twist2d) -> Pose2d {
        let Twist2d { dx, dy, dtheta } = *twist;
        let sin_theta = dtheta.sin();
        let cos_theta = dtheta.cos();

        let (s, c) = if dtheta.abs() < 1e-9 {
            (1.0 - dtheta * dtheta / 6.0, 0.5 * dtheta)
        } else {
            (sin_theta / dtheta, (1.0 - cos_theta) / dtheta)
        };

        let local = Translation2d::new(dx * s - dy * c, dx * c + dy * s);
        let delta_rotation = Rotation2d::from_xy(cos_theta, sin_theta);

        Pose2d {
            translation: self.translation + local.rotate_by(&self.rotation),
            rotation: self.rotation + delta_rotation,
        }
    }
}
