// Orbit camera
//
// Yaw/pitch/radius around a target on the ground plane. The eye never
// dips below the ground, whatever the zoom or pitch.

use glam::{Mat4, Vec3};

const PITCH_LIMIT: f32 = 89.0 * std::f32::consts::PI / 180.0;
const RADIUS_MIN: f32 = 0.5;
const RADIUS_MAX: f32 = 500.0;

pub struct OrbitCamera {
    /// Radians; yaw about +Y, pitch about +X
    pub yaw: f32,
    pub pitch: f32,
    /// Distance from target
    pub radius: f32,
    pub target: Vec3,
    // Ground constraints
    pub ground_y: f32,
    pub min_eye_height: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 25f32.to_radians(),
            radius: 8.0,
            target: Vec3::ZERO,
            ground_y: 0.0,
            min_eye_height: 0.5,
        }
    }
}

impl OrbitCamera {
    /// Eye position on the orbit sphere, clamped above the ground.
    pub fn eye(&self) -> Vec3 {
        let (sp, cp) = self.pitch.sin_cos();
        let (sy, cy) = self.yaw.sin_cos();
        let mut eye = self.target + Vec3::new(sy * cp, sp, cy * cp) * self.radius;
        let floor = self.ground_y + self.min_eye_height;
        if eye.y < floor {
            eye.y = floor;
        }
        eye
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    /// Rotate from a mouse drag, in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32, speed: f32) {
        self.yaw -= dx * speed;
        self.pitch -= dy * speed;
        self.constrain();
    }

    /// Pan the target on the ground plane along camera-local right/forward.
    /// Pitch is ignored to keep the motion planar.
    pub fn pan(&mut self, dx: f32, dz: f32) {
        let (sy, cy) = self.yaw.sin_cos();
        let right = Vec3::new(cy, 0.0, -sy);
        let forward = Vec3::new(sy, 0.0, cy);
        self.target += right * dx + forward * dz;
        self.target.y = 0.0;
    }

    /// Exponential zoom; positive notches move closer.
    pub fn zoom(&mut self, notches: f32, step: f32) {
        self.radius /= step.powf(notches);
        self.radius = self.radius.clamp(RADIUS_MIN, RADIUS_MAX);
    }

    pub fn constrain(&mut self) {
        self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_is_clamped() {
        let mut cam = OrbitCamera::default();
        cam.rotate(0.0, -10_000.0, 0.005);
        assert!(cam.pitch <= PITCH_LIMIT);
        cam.rotate(0.0, 10_000.0, 0.005);
        assert!(cam.pitch >= -PITCH_LIMIT);
    }

    #[test]
    fn eye_stays_above_ground() {
        let mut cam = OrbitCamera::default();
        cam.pitch = -PITCH_LIMIT; // looking from below
        cam.constrain();
        assert!(cam.eye().y >= cam.ground_y + cam.min_eye_height);
    }

    #[test]
    fn zoom_is_clamped_both_ways() {
        let mut cam = OrbitCamera::default();
        cam.zoom(1_000.0, 1.1);
        assert_eq!(cam.radius, RADIUS_MIN);
        cam.zoom(-1_000.0, 1.1);
        assert_eq!(cam.radius, RADIUS_MAX);
    }

    #[test]
    fn pan_keeps_target_on_the_ground() {
        let mut cam = OrbitCamera::default();
        cam.yaw = 1.3;
        cam.pan(3.0, -2.0);
        assert_eq!(cam.target.y, 0.0);
        assert!(cam.target.length() > 0.0);
    }

    #[test]
    fn panning_forward_follows_yaw() {
        let mut cam = OrbitCamera::default();
        // yaw 0: forward is +Z
        cam.pan(0.0, 1.0);
        assert!((cam.target.z - 1.0).abs() < 1e-6);
        assert!(cam.target.x.abs() < 1e-6);
    }
}
