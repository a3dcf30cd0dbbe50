use crate::math::Vec3;

use super::CameraPose;

/// A predefined stage viewpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraAngle {
    pub name: &'static str,
    pub category: u8,
    pub location: Vec3,
    /// Pitch, yaw and roll in degrees.
    pub rotation: Vec3,
}

impl CameraAngle {
    const fn new(name: &'static str, category: u8, location: [f32; 3], rotation: [f32; 3]) -> Self {
        Self {
            name,
            category,
            location: Vec3::new(location[0], location[1], location[2]),
            rotation: Vec3::new(rotation[0], rotation[1], rotation[2]),
        }
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose {
            location: self.location,
            rotation: Vec3::new(
                self.rotation.x.to_radians(),
                self.rotation.y.to_radians(),
                self.rotation.z.to_radians(),
            ),
            ..CameraPose::default()
        }
    }
}

pub const ANGLES: [CameraAngle; 12] = [
    CameraAngle::new("1A", 1, [-2.0, 92.0, 134.0], [18.44, 180.0, 0.0]),
    CameraAngle::new("1B", 1, [60.0, 92.0, 124.0], [18.5, 204.4, 0.0]),
    CameraAngle::new("1C", 1, [-59.5, 90.8, 94.4], [23.9, 153.6, 0.0]),
    CameraAngle::new("2A", 2, [0.0, 71.8, 44.5], [15.7, 224.9, 0.0]),
    CameraAngle::new("2B", 2, [-35.0, 76.4, 33.6], [55.8, 198.5, 0.0]),
    CameraAngle::new("3A", 3, [-0.2, 61.6, 38.6], [15.5, 180.0, 0.0]),
    CameraAngle::new("3B", 3, [-19.6, 78.7, 3.8], [27.7, 163.8, 0.0]),
    CameraAngle::new("4A", 4, [0.2, 81.1, 32.2], [21.0, 131.8, -0.5]),
    CameraAngle::new("4B", 4, [35.0, 25.4, -19.0], [-50.0, 119.0, -2.5]),
    CameraAngle::new("5", 5, [5.0, 432.0, 24.0], [82.875, 180.0, 0.0]),
    CameraAngle::new("6A", 6, [17.0, 30.5, 42.9], [-6.7, 144.3, 0.0]),
    CameraAngle::new("6B", 6, [38.8, 58.8, 23.5], [126.394, -36.383, 0.172]),
];

pub const CATEGORY_COUNT: u8 = 6;

/// The home angle every camera starts from.
pub fn default_angle() -> &'static CameraAngle {
    &ANGLES[0]
}

/// Angles of `category`, in cycling order.
pub fn category(category: u8) -> impl Iterator<Item = &'static CameraAngle> {
    ANGLES.iter().filter(move |angle| angle.category == category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_angles() {
        for id in 1..=CATEGORY_COUNT {
            assert!(category(id).count() >= 1, "category {id}");
        }
        assert_eq!(category(1).count(), 3);
        assert_eq!(category(5).count(), 1);
    }

    #[test]
    fn home_angle_looks_at_the_stage() {
        let pose = default_angle().pose();
        assert!((pose.rotation.y - std::f32::consts::PI).abs() < 1e-5);
        assert_eq!(pose.location, Vec3::new(-2.0, 92.0, 134.0));
    }
}
