//! Audio output stream for the signal graph

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig, SupportedStreamConfig};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum AudioOutputError {
    #[error("No default audio output device")]
    NoDevices,
    #[error("No output device matching '{0}'")]
    DeviceNotFound(String),
    #[error("Failed to enumerate output devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),
    #[error("Failed to query output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("Failed to build output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("Failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// Names of all output devices on the default host
pub fn list_output_devices() -> Result<Vec<String>, AudioOutputError> {
    let devices = cpal::default_host().output_devices()?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Case-insensitive substring match against device names; `None` picks the default
fn find_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device, AudioOutputError> {
    let Some(wanted) = name else {
        return host.default_output_device().ok_or(AudioOutputError::NoDevices);
    };
    let needle = wanted.to_lowercase();
    host.output_devices()?
        .find(|d| d.name().is_ok_and(|n| n.to_lowercase().contains(&needle)))
        .ok_or_else(|| AudioOutputError::DeviceNotFound(wanted.to_string()))
}

/// An opened output device whose rate and layout are known but which is not
/// pulling audio yet. The graph is built against these before `start`.
pub struct PendingOutput {
    device: cpal::Device,
    name: String,
    config: StreamConfig,
    pub sample_rate: u32,
    pub channels: u16,
}

impl PendingOutput {
    pub fn open(device_name: Option<&str>) -> Result<Self, AudioOutputError> {
        let host = cpal::default_host();
        let device = find_device(&host, device_name)?;
        let supported: SupportedStreamConfig = device.default_output_config()?;
        if supported.sample_format() != SampleFormat::F32 {
            warn!(format = ?supported.sample_format(), "Device prefers a non-float format, requesting f32");
        }

        let config: StreamConfig = supported.into();
        Ok(Self {
            name: device.name().unwrap_or_default(),
            sample_rate: config.sample_rate.0,
            channels: config.channels,
            device,
            config,
        })
    }

    /// Hand `fill` every interleaved f32 buffer the device asks for
    pub fn start<F>(self, mut fill: F) -> Result<RealtimeOutputStream, AudioOutputError>
    where
        F: FnMut(&mut [f32], u32, u16) + Send + 'static,
    {
        let Self { device, name, config, sample_rate, channels } = self;
        let muted = Arc::new(AtomicBool::new(false));
        let muted_cb = muted.clone();

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if muted_cb.load(Ordering::Acquire) {
                    data.fill(0.0);
                } else {
                    fill(data, sample_rate, channels);
                }
            },
            |err| error!(error = %err, "Output stream error"),
            None,
        )?;
        stream.play()?;

        info!(device = %name, sample_rate, channels, "Output stream started");
        Ok(RealtimeOutputStream { muted, sample_rate, channels, _stream: stream })
    }
}

/// Running output; dropping it closes the device
pub struct RealtimeOutputStream {
    muted: Arc<AtomicBool>,
    sample_rate: u32,
    channels: u16,
    _stream: cpal::Stream,
}

impl RealtimeOutputStream {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Silence the output without closing the device
    pub fn stop(&self) {
        self.muted.store(true, Ordering::Release);
    }
}
