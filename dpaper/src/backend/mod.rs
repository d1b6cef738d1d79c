//! Remote Content Service implementations.

pub mod device;

pub use device::DeviceClient;
