//! First-person free camera.
//!
//! The scene lives in a left-handed, Y-up world: with zero yaw and pitch the camera
//! looks down +Z and +X is to its right. [`FreeCamera`] holds both the camera pose and
//! its controller state (bound keys, held keys, pointer attachment). The uniform types
//! at the bottom of the module carry it to the GPU.

use std::collections::HashSet;

use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Rad, Transform, Vector3};
use instant::Duration;
use wgpu::util::DeviceExt;
use winit::keyboard::KeyCode;

use crate::{
    collision::{self, CollisionMesh},
    config::CameraConfig,
    physics::MAX_STEP,
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Flips Z, mapping the left-handed scene into the right-handed frame cgmath expects.
#[rustfmt::skip]
const HANDEDNESS_FLIP: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, -1.0, 0.0,
    0.0, 0.0, 0.0, 1.0,
);

const SAFE_FRAC_PI_2: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

/// Reference frame rate the camera speed is expressed in.
const TICKS_PER_SECOND: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
}

/// Keys per movement direction. Any bound key triggers its movement.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBindings {
    pub forward: Vec<KeyCode>,
    pub back: Vec<KeyCode>,
    pub left: Vec<KeyCode>,
    pub right: Vec<KeyCode>,
    pub up: Vec<KeyCode>,
    pub down: Vec<KeyCode>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            forward: vec![KeyCode::ArrowUp],
            back: vec![KeyCode::ArrowDown],
            left: vec![KeyCode::ArrowLeft],
            right: vec![KeyCode::ArrowRight],
            up: vec![KeyCode::PageUp],
            down: vec![KeyCode::PageDown],
        }
    }
}

impl KeyBindings {
    /// Add W/A/S/D and Q (down) / E (up) next to the existing bindings.
    pub fn append_wasdqe(&mut self) {
        self.forward.push(KeyCode::KeyW);
        self.left.push(KeyCode::KeyA);
        self.back.push(KeyCode::KeyS);
        self.right.push(KeyCode::KeyD);
        self.down.push(KeyCode::KeyQ);
        self.up.push(KeyCode::KeyE);
    }

    pub fn movement(&self, key: KeyCode) -> Option<Movement> {
        [
            (&self.forward, Movement::Forward),
            (&self.back, Movement::Back),
            (&self.left, Movement::Left),
            (&self.right, Movement::Right),
            (&self.up, Movement::Up),
            (&self.down, Movement::Down),
        ]
        .into_iter()
        .find(|(keys, _)| keys.contains(&key))
        .map(|(_, movement)| movement)
    }
}

#[derive(Debug, Clone)]
pub struct FreeCamera {
    pub position: Point3<f32>,
    pub yaw: Rad<f32>,
    pub pitch: Rad<f32>,
    /// Units moved per 60 Hz tick.
    pub speed: f32,
    pub angular_sensibility: f32,
    pub min_z: f32,
    pub max_z: f32,
    pub fov_y: Rad<f32>,
    pub ellipsoid: Vector3<f32>,
    pub apply_gravity: bool,
    pub check_collisions: bool,
    pub keys: KeyBindings,
    attached: bool,
    held: HashSet<Movement>,
}

/// Build the scene camera from its config and attach it to input.
pub fn create_controller(config: &CameraConfig) -> FreeCamera {
    let mut keys = KeyBindings::default();
    keys.append_wasdqe();
    let mut camera = FreeCamera {
        position: Point3::from(config.position),
        yaw: Rad(0.0),
        pitch: Rad(0.0),
        speed: config.speed,
        angular_sensibility: config.angular_sensibility,
        min_z: config.min_z,
        max_z: config.max_z,
        fov_y: Rad(config.fov_y),
        ellipsoid: Vector3::from(config.ellipsoid),
        apply_gravity: config.apply_gravity,
        check_collisions: config.check_collisions,
        keys,
        attached: false,
        held: HashSet::new(),
    };
    camera.attach_control();
    camera
}

impl FreeCamera {
    pub fn attach_control(&mut self) {
        self.attached = true;
    }

    pub fn detach_control(&mut self) {
        self.attached = false;
        self.release_keys();
    }

    /// Forget every held key, for when key-up events can no longer arrive.
    pub fn release_keys(&mut self) {
        self.held.clear();
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Track a key press or release. Returns whether the key is bound.
    pub fn process_keyboard(&mut self, key: KeyCode, pressed: bool) -> bool {
        if !self.attached {
            return false;
        }
        let Some(movement) = self.keys.movement(key) else {
            return false;
        };
        if pressed {
            self.held.insert(movement);
        } else {
            self.held.remove(&movement);
        }
        true
    }

    /// Rotate by a pointer delta in pixels.
    pub fn process_pointer_delta(&mut self, dx: f64, dy: f64) {
        if !self.attached || self.angular_sensibility <= 0.0 {
            return;
        }
        self.yaw += Rad(dx as f32 / self.angular_sensibility);
        self.pitch += Rad(dy as f32 / self.angular_sensibility);
        self.pitch = Rad(self.pitch.0.clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2));
    }

    pub fn forward(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        Vector3::new(sin_yaw * cos_pitch, -sin_pitch, cos_yaw * cos_pitch)
    }

    pub fn right(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        Vector3::new(cos_yaw, 0.0, -sin_yaw)
    }

    pub fn up(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.0.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.0.sin_cos();
        Vector3::new(sin_yaw * sin_pitch, cos_pitch, cos_yaw * sin_pitch)
    }

    /// Held keys as a camera-local direction: x right, y up, z forward.
    fn local_direction(&self) -> Vector3<f32> {
        self.held.iter().fold(Vector3::new(0.0, 0.0, 0.0), |acc, m| {
            acc + match m {
                Movement::Forward => Vector3::new(0.0, 0.0, 1.0),
                Movement::Back => Vector3::new(0.0, 0.0, -1.0),
                Movement::Right => Vector3::new(1.0, 0.0, 0.0),
                Movement::Left => Vector3::new(-1.0, 0.0, 0.0),
                Movement::Up => Vector3::new(0.0, 1.0, 0.0),
                Movement::Down => Vector3::new(0.0, -1.0, 0.0),
            }
        })
    }

    /// Displacement requested for this frame, before collisions. Frames longer than
    /// [`MAX_STEP`] move the camera as far as a [`MAX_STEP`] frame.
    pub fn displacement(&self, dt: Duration, gravity_per_frame: Vector3<f32>) -> Vector3<f32> {
        let ticks = dt.as_secs_f32().min(MAX_STEP) * TICKS_PER_SECOND;
        let local = self.local_direction();
        let mut displacement =
            (self.right() * local.x + self.up() * local.y + self.forward() * local.z) * (self.speed * ticks);
        if self.apply_gravity {
            displacement += gravity_per_frame * ticks;
        }
        displacement
    }

    /// Move for one frame.
    ///
    /// When both the camera and the scene check collisions, the ellipsoid, which hangs
    /// below the eye by its vertical radius, is swept against `colliders`.
    pub fn update<'a>(
        &mut self,
        dt: Duration,
        gravity_per_frame: Vector3<f32>,
        scene_collisions: bool,
        colliders: impl IntoIterator<Item = &'a CollisionMesh> + Clone,
    ) {
        let displacement = self.displacement(dt, gravity_per_frame);
        if displacement.magnitude2() == 0.0 {
            return;
        }
        if self.check_collisions && scene_collisions {
            let offset = Vector3::new(0.0, self.ellipsoid.y, 0.0);
            let eye = Vector3::new(self.position.x, self.position.y, self.position.z);
            let center = collision::sweep(eye - offset, displacement, self.ellipsoid, colliders);
            self.position = Point3::from_vec(center + offset);
        } else {
            self.position += displacement;
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        let eye = HANDEDNESS_FLIP.transform_point(self.position);
        let dir = HANDEDNESS_FLIP.transform_vector(self.forward());
        Matrix4::look_to_rh(eye, dir, Vector3::unit_y()) * HANDEDNESS_FLIP
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width.max(1) as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn for_camera(width: u32, height: u32, camera: &FreeCamera) -> Self {
        Self::new(width, height, camera.fov_y, camera.min_z, camera.max_z)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * cgmath::perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &FreeCamera, projection: &Projection) {
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = (projection.calc_matrix() * camera.view_matrix()).into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct CameraResources {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl CameraResources {
    pub fn new(device: &wgpu::Device, uniform: CameraUniform) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        Self {
            buffer,
            bind_group,
            bind_group_layout,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue, uniform: &CameraUniform) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[*uniform]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn camera() -> FreeCamera {
        create_controller(&CameraConfig::default())
    }

    #[test]
    fn controller_matches_the_config() {
        let camera = camera();
        assert_eq!(camera.position, Point3::new(13.6, 1.0, -5.0));
        assert_eq!(camera.ellipsoid, Vector3::new(0.1, 0.1, 0.1));
        assert_eq!(camera.min_z, 0.1);
        assert_eq!(camera.speed, 0.1);
        assert_eq!(camera.angular_sensibility, 2000.0);
        assert!(!camera.apply_gravity);
        assert!(camera.check_collisions);
        assert!(camera.is_attached());
    }

    #[test]
    fn long_frames_move_no_further_than_the_step_cap() {
        let mut camera = camera();
        camera.process_keyboard(KeyCode::KeyW, true);
        let capped = camera.displacement(Duration::from_secs_f32(MAX_STEP), Vector3::new(0.0, 0.0, 0.0));
        let stalled = camera.displacement(Duration::from_secs(10), Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(capped, stalled);
        assert_abs_diff_eq!(stalled.z, 0.6, epsilon = 1e-5);
    }

    #[test]
    fn released_keys_stop_the_camera() {
        let mut camera = camera();
        camera.process_keyboard(KeyCode::KeyW, true);
        camera.release_keys();
        camera.update(Duration::from_secs_f32(1.0 / 60.0), Vector3::new(0.0, 0.0, 0.0), true, []);
        assert_eq!(camera.position, Point3::new(13.6, 1.0, -5.0));
        assert!(camera.is_attached());
    }

    #[test]
    fn wasdqe_extend_the_default_keys() {
        let keys = camera().keys;
        assert_eq!(keys.forward, vec![KeyCode::ArrowUp, KeyCode::KeyW]);
        assert_eq!(keys.left, vec![KeyCode::ArrowLeft, KeyCode::KeyA]);
        assert_eq!(keys.back, vec![KeyCode::ArrowDown, KeyCode::KeyS]);
        assert_eq!(keys.right, vec![KeyCode::ArrowRight, KeyCode::KeyD]);
        assert_eq!(keys.down, vec![KeyCode::PageDown, KeyCode::KeyQ]);
        assert_eq!(keys.up, vec![KeyCode::PageUp, KeyCode::KeyE]);
        assert_eq!(keys.movement(KeyCode::KeyZ), None);
    }

    #[test]
    fn one_tick_of_w_moves_speed_units_forward() {
        let mut camera = camera();
        camera.process_keyboard(KeyCode::KeyW, true);
        camera.update(Duration::from_secs_f32(1.0 / 60.0), Vector3::new(0.0, 0.0, 0.0), true, []);
        assert_abs_diff_eq!(camera.position.z, -4.9, epsilon = 1e-5);
        assert_abs_diff_eq!(camera.position.x, 13.6, epsilon = 1e-5);

        camera.process_keyboard(KeyCode::KeyW, false);
        camera.update(Duration::from_secs_f32(1.0 / 60.0), Vector3::new(0.0, 0.0, 0.0), true, []);
        assert_abs_diff_eq!(camera.position.z, -4.9, epsilon = 1e-5);
    }

    #[test]
    fn pointer_delta_is_divided_by_sensibility() {
        let mut camera = camera();
        camera.process_pointer_delta(200.0, 0.0);
        assert_abs_diff_eq!(camera.yaw.0, 0.1, epsilon = 1e-6);
        camera.process_pointer_delta(0.0, 1.0e7);
        assert!(camera.pitch.0 < std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn positive_yaw_turns_right() {
        let mut camera = camera();
        camera.yaw = Rad(std::f32::consts::FRAC_PI_2);
        let f = camera.forward();
        assert_abs_diff_eq!(f.x, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(f.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn gravity_only_applies_when_enabled() {
        let mut camera = camera();
        let g = Vector3::new(0.0, -9.81 / 60.0, 0.0);
        camera.update(Duration::from_secs_f32(1.0 / 60.0), g, false, []);
        assert_eq!(camera.position.y, 1.0);

        camera.apply_gravity = true;
        camera.update(Duration::from_secs_f32(1.0 / 60.0), g, false, []);
        assert_abs_diff_eq!(camera.position.y, 1.0 - 9.81 / 60.0, epsilon = 1e-5);
    }

    #[test]
    fn detached_camera_ignores_input() {
        let mut camera = camera();
        camera.detach_control();
        assert!(!camera.process_keyboard(KeyCode::KeyW, true));
        camera.process_pointer_delta(100.0, 100.0);
        assert_eq!(camera.yaw, Rad(0.0));
    }

    #[test]
    fn camera_sees_what_is_in_front_of_it() {
        let camera = camera();
        let projection = Projection::for_camera(800, 600, &camera);
        let view_proj = projection.calc_matrix() * camera.view_matrix();
        let ahead = view_proj * cgmath::Vector4::new(13.6, 1.0, 5.0, 1.0);
        let behind = view_proj * cgmath::Vector4::new(13.6, 1.0, -15.0, 1.0);
        assert!(ahead.w > 0.0);
        assert!(behind.w < 0.0);
        assert_abs_diff_eq!(ahead.x / ahead.w, 0.0, epsilon = 1e-5);
    }
}
