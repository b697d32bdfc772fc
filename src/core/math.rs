use serde::{Deserialize, Serialize};

/// 3D vector used on the wire and at the kernel boundary
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn zero() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    pub const fn one() -> Self {
        Self { x: 1.0, y: 1.0, z: 1.0 }
    }

    pub fn from_slice(s: &[f32]) -> Self {
        Self::new(s[0], s[1], s[2])
    }

    pub fn length(&self) -> f32 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn dot(&self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, o: Vec3) -> Self {
        Self {
            x: self.y * o.z - self.z * o.y,
            y: self.z * o.x - self.x * o.z,
            z: self.x * o.y - self.y * o.x,
        }
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0001 {
            *self * (1.0 / len)
        } else {
            Self::zero()
        }
    }

    /// Component-wise product
    pub fn scale(&self, s: Vec3) -> Self {
        Self::new(self.x * s.x, self.y * s.y, self.z * s.z)
    }

    pub fn max_component(&self) -> f32 {
        self.x.max(self.y).max(self.z)
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y, z: self.z + rhs.z }
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, y: self.y - rhs.y, z: self.z - rhs.z }
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self { x: -self.x, y: -self.y, z: -self.z }
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self { x: self.x * rhs, y: self.y * rhs, z: self.z * rhs }
    }
}

/// Rotation quaternion, (x, y, z, w) order to match the wire layout
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quat {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub const fn identity() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }

    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let axis = axis.normalize();
        let (s, c) = (angle * 0.5).sin_cos();
        Self::new(axis.x * s, axis.y * s, axis.z * s, c)
    }

    /// Yaw (Y), pitch (X), roll (Z)
    pub fn from_euler_ypr(yaw: f32, pitch: f32, roll: f32) -> Self {
        let (sy, cy) = (yaw * 0.5).sin_cos();
        let (sp, cp) = (pitch * 0.5).sin_cos();
        let (sr, cr) = (roll * 0.5).sin_cos();
        Self::new(
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
            sr * cp * cy - cr * sp * sy,
            cr * cp * cy + sr * sp * sy,
        )
    }

    /// Rotation applied as Z, then Y, then X
    pub fn from_euler_zyx(yaw_z: f32, pitch_y: f32, roll_x: f32) -> Self {
        let (sy, cy) = (yaw_z * 0.5).sin_cos();
        let (sp, cp) = (pitch_y * 0.5).sin_cos();
        let (sr, cr) = (roll_x * 0.5).sin_cos();
        Self::new(
            sr * cp * cy - cr * sp * sy,
            cr * sp * cy + sr * cp * sy,
            cr * cp * sy - sr * sp * cy,
            cr * cp * cy + sr * sp * sy,
        )
    }

    pub fn normalize(&self) -> Self {
        let len = (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt();
        if len > 0.0001 {
            Self::new(self.x / len, self.y / len, self.z / len, self.w / len)
        } else {
            Self::identity()
        }
    }

    pub fn rotate(&self, v: Vec3) -> Vec3 {
        let q = Vec3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }
}

impl std::ops::Mul for Quat {
    type Output = Self;
    fn mul(self, r: Self) -> Self {
        Self {
            x: self.w * r.x + self.x * r.w + self.y * r.z - self.z * r.y,
            y: self.w * r.y + self.y * r.w + self.z * r.x - self.x * r.z,
            z: self.w * r.z + self.z * r.w + self.x * r.y - self.y * r.x,
            w: self.w * r.w - self.x * r.x - self.y * r.y - self.z * r.z,
        }
    }
}

/// Rigid transform: rotation then translation
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Transform {
    pub origin: Vec3,
    pub rotation: Quat,
}

impl Transform {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn new(origin: Vec3, rotation: Quat) -> Self {
        Self { origin, rotation }
    }

    pub fn apply(&self, local: Vec3) -> Vec3 {
        self.origin + self.rotation.rotate(local)
    }
}
