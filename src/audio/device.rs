//! Input device enumeration and the audio backend seam
//!
//! The engine never talks to cpal directly. It is handed an [`AudioBackend`]
//! that can look up an input device by name fragment and open it as an
//! [`AudioSource`]. [`CpalBackend`] is the real implementation; tests inject
//! fakes.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::audio::buffer::AudioBuffer;
use crate::audio::capture::CpalSource;
use crate::config::AudioFormat;
use crate::error::{Result, StreamError};

/// Position of a device in the backend's input device list
pub type DeviceIndex = usize;

/// Description of an available input device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    pub index: DeviceIndex,
    pub name: String,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// An opened capture stream.
///
/// Dropping the source stops and releases the underlying device stream.
pub trait AudioSource {
    /// Block until one full buffer is available
    fn read_buffer(&mut self) -> Result<AudioBuffer>;

    /// Throw away audio queued while nobody was reading
    fn discard_pending(&mut self) {}

    fn device_name(&self) -> &str;
}

/// Device lookup and stream opening
pub trait AudioBackend: Send + 'static {
    fn input_devices(&self) -> Result<Vec<InputDeviceInfo>>;

    /// First input device whose name contains `name_fragment`
    fn find_input_device_index(&self, name_fragment: &str) -> Result<DeviceIndex> {
        self.input_devices()?
            .into_iter()
            .find(|device| device.name.contains(name_fragment))
            .map(|device| device.index)
            .ok_or_else(|| StreamError::DeviceNotFound {
                name: name_fragment.to_string(),
            })
    }

    fn open_input(&self, index: DeviceIndex, format: &AudioFormat) -> Result<Box<dyn AudioSource>>;
}

/// Backend over the platform's default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    fn input_devices(&self) -> Result<Vec<InputDeviceInfo>> {
        list_input_devices()
    }

    fn open_input(&self, index: DeviceIndex, format: &AudioFormat) -> Result<Box<dyn AudioSource>> {
        let host = cpal::default_host();
        let device = host
            .input_devices()
            .map_err(|e| StreamError::device_open(format!("#{}", index), e))?
            .nth(index)
            .ok_or_else(|| StreamError::DeviceNotFound {
                name: format!("input device #{}", index),
            })?;

        let source = CpalSource::open(device, format)?;
        Ok(Box::new(source))
    }
}

/// List all input devices on the default host
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let devices = host
        .input_devices()
        .map_err(|e| StreamError::device_open("input devices", e))?;

    let mut infos = Vec::new();
    for (index, device) in devices.enumerate() {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let (sample_rates, channels) = get_device_capabilities(&device);
        infos.push(InputDeviceInfo {
            index,
            is_default: default_name.as_ref() == Some(&name),
            name,
            sample_rates,
            channels,
        });
    }

    Ok(infos)
}

/// Common sample rates and channel counts the device can capture
fn get_device_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    if let Ok(configs) = device.supported_input_configs() {
        for config in configs {
            for rate_val in [44100u32, 48000, 88200, 96000] {
                let rate = cpal::SampleRate(rate_val);
                if rate >= config.min_sample_rate()
                    && rate <= config.max_sample_rate()
                    && !sample_rates.contains(&rate_val)
                {
                    sample_rates.push(rate_val);
                }
            }

            let ch = config.channels();
            if !channels.contains(&ch) {
                channels.push(ch);
            }
        }
    }

    sample_rates.sort_unstable();
    channels.sort_unstable();

    (sample_rates, channels)
}
