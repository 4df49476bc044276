use std::fmt;

/// Errors raised while building a simulation. A failed construction leaves nothing behind.
#[derive(Debug, Clone, PartialEq)]
pub enum ClothError {
  GridTooSmall { width: u32, height: u32 },
  InvalidTimeStep(f32),
  InvalidSpring(&'static str),
  Allocation(usize),
}

impl fmt::Display for ClothError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ClothError::GridTooSmall { width, height } => {
        write!(f, "grid {width}x{height} is too small (need width >= 2, height >= 1)")
      }
      ClothError::InvalidTimeStep(dt) => write!(f, "time step {dt} must be positive and finite"),
      ClothError::InvalidSpring(name) => {
        write!(f, "{name} spring needs finite, non-negative stiffness and damping")
      }
      ClothError::Allocation(cells) => write!(f, "failed to allocate buffers for {cells} cells"),
    }
  }
}

impl std::error::Error for ClothError {}

/// Errors from the host side: window, surface, device and signal setup.
#[derive(Debug)]
pub enum AppError {
  Cloth(ClothError),
  EventLoop(winit::error::EventLoopError),
  Window(winit::error::OsError),
  Surface(wgpu::CreateSurfaceError),
  NoAdapter,
  NoSurfaceConfig,
  Device(wgpu::RequestDeviceError),
  Signal(ctrlc::Error),
}

impl fmt::Display for AppError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AppError::Cloth(e) => write!(f, "simulation setup failed: {e}"),
      AppError::EventLoop(e) => write!(f, "event loop error: {e}"),
      AppError::Window(e) => write!(f, "window creation failed: {e}"),
      AppError::Surface(e) => write!(f, "surface creation failed: {e}"),
      AppError::NoAdapter => write!(f, "no compatible GPU adapter found"),
      AppError::NoSurfaceConfig => write!(f, "surface is not supported by the adapter"),
      AppError::Device(e) => write!(f, "device request failed: {e}"),
      AppError::Signal(e) => write!(f, "could not install Ctrl-C handler: {e}"),
    }
  }
}

impl std::error::Error for AppError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      AppError::Cloth(e) => Some(e),
      AppError::EventLoop(e) => Some(e),
      AppError::Window(e) => Some(e),
      AppError::Surface(e) => Some(e),
      AppError::Device(e) => Some(e),
      AppError::Signal(e) => Some(e),
      AppError::NoAdapter | AppError::NoSurfaceConfig => None,
    }
  }
}

impl From<ClothError> for AppError {
  fn from(e: ClothError) -> Self {
    AppError::Cloth(e)
  }
}

impl From<winit::error::EventLoopError> for AppError {
  fn from(e: winit::error::EventLoopError) -> Self {
    AppError::EventLoop(e)
  }
}

impl From<winit::error::OsError> for AppError {
  fn from(e: winit::error::OsError) -> Self {
    AppError::Window(e)
  }
}

impl From<wgpu::CreateSurfaceError> for AppError {
  fn from(e: wgpu::CreateSurfaceError) -> Self {
    AppError::Surface(e)
  }
}

impl From<wgpu::RequestDeviceError> for AppError {
  fn from(e: wgpu::RequestDeviceError) -> Self {
    AppError::Device(e)
  }
}

impl From<ctrlc::Error> for AppError {
  fn from(e: ctrlc::Error) -> Self {
    AppError::Signal(e)
  }
}
