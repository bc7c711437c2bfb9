//! Microphone capture using cpal
//!
//! cpal streams are not `Send`, so each granted microphone owns a dedicated
//! thread that builds the input stream and keeps it alive until the track
//! ends. Device ids are device names; cpal exposes no stable identifiers.

use super::traits::{AudioDeviceInfo, MediaConstraints, MediaDevices};
use crate::media::{AudioFormat, AudioTrackWriter, MediaStream, MediaTrack};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Microphones of the default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalMediaDevices;

impl CpalMediaDevices {
    pub fn new() -> Self {
        Self
    }

    /// List the available input devices
    pub fn enumerate_devices() -> Vec<AudioDeviceInfo> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let devices = match host.input_devices() {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!("Failed to enumerate input devices: {}", e);
                return Vec::new();
            }
        };

        devices
            .filter_map(|device| device.name().ok())
            .map(|name| AudioDeviceInfo {
                id: name.clone(),
                is_default: default_name.as_deref() == Some(name.as_str()),
                is_input: true,
                name,
            })
            .collect()
    }
}

#[async_trait]
impl MediaDevices for CpalMediaDevices {
    async fn get_user_media(&self, constraints: MediaConstraints) -> CaptureResult<MediaStream> {
        if constraints.video {
            return Err(CaptureError::Unsupported(
                "video capture devices".to_string(),
            ));
        }
        if !constraints.audio {
            return Err(CaptureError::InvalidConfig(
                "device request asks for no media".to_string(),
            ));
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let device_id = constraints.device_id;
        std::thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || run_input_stream(device_id, ready_tx))?;

        let track = ready_rx.await.map_err(|_| {
            CaptureError::Platform("microphone thread exited before reporting".to_string())
        })??;
        Ok(MediaStream::new(vec![track]))
    }
}

fn find_device(device_id: Option<&str>) -> CaptureResult<Device> {
    let host = cpal::default_host();
    match device_id {
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceNotFound("no default input device".to_string())),
        Some(id) => host
            .input_devices()
            .map_err(|e| {
                CaptureError::Platform(format!("Failed to enumerate input devices: {}", e))
            })?
            .find(|d| d.name().map(|n| n == id).unwrap_or(false))
            .ok_or_else(|| CaptureError::DeviceNotFound(format!("input device {}", id))),
    }
}

fn run_input_stream(device_id: Option<String>, ready: oneshot::Sender<CaptureResult<MediaTrack>>) {
    let device = match find_device(device_id.as_deref()) {
        Ok(device) => device,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported = match device.default_input_config() {
        Ok(config) => config,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::Platform(format!(
                "Failed to get input config for {}: {}",
                name, e
            ))));
            return;
        }
    };

    let format = AudioFormat::new(supported.sample_rate().0, supported.channels());
    let (track, writer) = MediaTrack::audio(name.clone(), format);

    let is_running = Arc::new(AtomicBool::new(true));
    {
        let is_running = is_running.clone();
        track.on_ended(move || is_running.store(false, Ordering::SeqCst));
    }

    let config = supported.config();
    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, writer, |s| s),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, writer, i16_to_f32),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, writer, u16_to_f32),
        other => {
            let _ = ready.send(Err(CaptureError::Unsupported(format!(
                "sample format {:?}",
                other
            ))));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(CaptureError::PermissionDenied(format!(
                "Failed to open {}: {}",
                name, e
            ))));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(CaptureError::Platform(format!(
            "Failed to start {}: {}",
            name, e
        ))));
        return;
    }

    tracing::info!(
        "Microphone {} started ({}Hz, {}ch)",
        name,
        format.sample_rate,
        format.channels
    );
    if ready.send(Ok(track.clone())).is_err() {
        // Requester gave up waiting
        track.stop();
    }

    while is_running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
    }

    drop(stream);
    tracing::info!("Microphone {} stopped", name);
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    writer: AudioTrackWriter,
    convert: fn(T) -> f32,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample + 'static,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<f32> = data.iter().map(|&s| convert(s)).collect();
            writer.push(&samples);
        },
        |err| tracing::error!("Microphone stream error: {}", err),
        None,
    )
}

fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

fn u16_to_f32(sample: u16) -> f32 {
    (sample as f32 - 32768.0) / 32768.0
}
