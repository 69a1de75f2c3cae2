pub mod config;
pub mod error;
pub mod feedback;
pub mod handlers;
pub mod registry;

pub use config::ServiceConfig;
pub use error::{AppError, Result};
pub use registry::{DeviceRegistry, InMemoryDeviceRegistry};
