use cgmath::{Matrix4, Point3, SquareMatrix, Vector3};
use std::f32::consts::FRAC_PI_2;
use winit::{
  event::{ElementState, KeyEvent, WindowEvent},
  keyboard::{KeyCode, PhysicalKey},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

const MAX_PITCH: f32 = FRAC_PI_2 - 0.05;
const MIN_DISTANCE: f32 = 0.5;

/// Orbit camera looking at `target` from `distance`, with yaw around +y and pitch above
/// the horizon.
pub struct Camera {
  pub target: Point3<f32>,
  pub distance: f32,
  pub yaw: f32,
  pub pitch: f32,
  pub aspect: f32,
  pub fovy: f32,
  pub znear: f32,
  pub zfar: f32,
}

impl Camera {
  /// Framing for a cloth spanning `[-1, 1]`, seen from the front.
  #[must_use]
  pub fn framing_cloth(aspect: f32) -> Self {
    Self {
      target: Point3::new(0.0, 0.0, 0.0),
      distance: 4.5,
      yaw: 0.0,
      pitch: 0.25,
      aspect,
      fovy: 45.0,
      znear: 0.1,
      zfar: 100.0,
    }
  }

  pub fn eye(&self) -> Point3<f32> {
    let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
    let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
    self.target
      + Vector3::new(sin_yaw * cos_pitch, sin_pitch, cos_yaw * cos_pitch) * self.distance
  }

  pub fn view_matrix(&self) -> Matrix4<f32> {
    Matrix4::look_at_rh(self.eye(), self.target, Vector3::unit_y())
  }

  pub fn projection_matrix(&self) -> Matrix4<f32> {
    let proj = cgmath::perspective(cgmath::Deg(self.fovy), self.aspect, self.znear, self.zfar);
    OPENGL_TO_WGPU_MATRIX * proj
  }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
  view: [[f32; 4]; 4],
  proj: [[f32; 4]; 4],
  eye: [f32; 4],
}

impl CameraUniform {
  pub fn new() -> Self {
    Self {
      view: Matrix4::identity().into(),
      proj: Matrix4::identity().into(),
      eye: [0.0, 0.0, 0.0, 1.0],
    }
  }

  pub fn update(&mut self, camera: &Camera) {
    let eye = camera.eye();
    self.view = camera.view_matrix().into();
    self.proj = camera.projection_matrix().into();
    self.eye = [eye.x, eye.y, eye.z, 1.0];
  }
}

impl Default for CameraUniform {
  fn default() -> Self {
    Self::new()
  }
}

/// Arrow keys / WASD orbit, Q and E zoom.
pub struct CameraController {
  speed: f32,
  rotation_speed: f32,
  is_up_pressed: bool,
  is_down_pressed: bool,
  is_left_pressed: bool,
  is_right_pressed: bool,
  is_zoom_in_pressed: bool,
  is_zoom_out_pressed: bool,
}

impl CameraController {
  pub fn init(speed: f32, rotation_speed: f32) -> Self {
    Self {
      speed,
      rotation_speed,
      is_up_pressed: false,
      is_down_pressed: false,
      is_left_pressed: false,
      is_right_pressed: false,
      is_zoom_in_pressed: false,
      is_zoom_out_pressed: false,
    }
  }

  pub fn process_events(&mut self, event: &WindowEvent) -> bool {
    match event {
      WindowEvent::KeyboardInput {
        event:
          KeyEvent {
            state,
            physical_key: PhysicalKey::Code(keycode),
            ..
          },
        ..
      } => self.process_key(*keycode, *state == ElementState::Pressed),
      _ => false,
    }
  }

  fn process_key(&mut self, keycode: KeyCode, is_pressed: bool) -> bool {
    let flag = match keycode {
      KeyCode::KeyW | KeyCode::ArrowUp => &mut self.is_up_pressed,
      KeyCode::KeyS | KeyCode::ArrowDown => &mut self.is_down_pressed,
      KeyCode::KeyA | KeyCode::ArrowLeft => &mut self.is_left_pressed,
      KeyCode::KeyD | KeyCode::ArrowRight => &mut self.is_right_pressed,
      KeyCode::KeyQ => &mut self.is_zoom_in_pressed,
      KeyCode::KeyE => &mut self.is_zoom_out_pressed,
      _ => return false,
    };
    *flag = is_pressed;
    true
  }

  pub fn update_camera(&self, camera: &mut Camera) {
    if self.is_left_pressed {
      camera.yaw -= self.rotation_speed;
    }
    if self.is_right_pressed {
      camera.yaw += self.rotation_speed;
    }
    if self.is_up_pressed {
      camera.pitch += self.rotation_speed;
    }
    if self.is_down_pressed {
      camera.pitch -= self.rotation_speed;
    }
    camera.pitch = camera.pitch.clamp(-MAX_PITCH, MAX_PITCH);

    if self.is_zoom_in_pressed {
      camera.distance = (camera.distance - self.speed).max(MIN_DISTANCE);
    }
    if self.is_zoom_out_pressed {
      camera.distance += self.speed;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use cgmath::{InnerSpace, MetricSpace};

  #[test]
  fn eye_sits_at_orbit_distance() {
    let mut camera = Camera::framing_cloth(1.0);
    camera.yaw = 1.1;
    camera.pitch = -0.4;
    assert!((camera.eye().distance(camera.target) - camera.distance).abs() < 1e-5);
  }

  #[test]
  fn front_view_looks_down_negative_z() {
    let mut camera = Camera::framing_cloth(1.0);
    camera.pitch = 0.0;
    let eye = camera.eye();
    assert!((eye.z - camera.distance).abs() < 1e-6);
    let forward = (camera.target - eye).normalize();
    assert!((forward.z + 1.0).abs() < 1e-6);
  }

  #[test]
  fn controller_clamps_pitch_and_zoom() {
    let mut camera = Camera::framing_cloth(1.0);
    let mut controller = CameraController::init(10.0, 1.0);
    assert!(controller.process_key(KeyCode::KeyW, true));
    assert!(controller.process_key(KeyCode::KeyQ, true));
    assert!(!controller.process_key(KeyCode::KeyZ, true));
    for _ in 0..5 {
      controller.update_camera(&mut camera);
    }
    assert!(camera.pitch <= MAX_PITCH);
    assert_eq!(camera.distance, MIN_DISTANCE);
  }
}
