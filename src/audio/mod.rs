//! Audio subsystem module

pub mod buffer;
pub mod capture;
pub mod device;

pub use buffer::{AudioBuffer, FrameAccumulator};
pub use capture::CpalSource;
pub use device::{list_input_devices, AudioBackend, AudioSource, CpalBackend, DeviceIndex, InputDeviceInfo};
