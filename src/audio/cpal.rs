// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{error, info, span, Level};

use super::{AudioError, Clip, Playback};
use crate::playsync::CancelHandle;

/// The name that selects the host's default output device.
const DEFAULT_DEVICE: &str = "default";

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn super::Device>>, AudioError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn super::Device> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices with at least one output channel.
    fn list_cpal_devices() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let max_channels = match device.supported_output_configs() {
                    Ok(configs) => configs.map(|config| config.channels()).max().unwrap_or(0),
                    Err(_) => continue,
                };

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name()?,
                        max_channels,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. "default" picks the default output of the default host.
    pub fn get(name: &str) -> Result<Device, AudioError> {
        if name == DEFAULT_DEVICE {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| AudioError::NoDevice(name.to_string()))?;
            let max_channels = device
                .supported_output_configs()
                .map(|configs| configs.map(|config| config.channels()).max().unwrap_or(0))
                .unwrap_or(0);
            return Ok(Device {
                name: device.name()?,
                max_channels,
                host_id: host.id(),
                device,
            });
        }

        Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| AudioError::NoDevice(name.to_string()))
    }
}

impl super::Device for Device {
    fn open(&self) -> Result<Arc<dyn super::Output>, AudioError> {
        Ok(Arc::new(Output::start(self.name.clone(), self.device.clone())?))
    }
}

/// The clip currently being rendered by the stream callback.
struct Voice {
    clip: Clip,
    /// Position in frames.
    position: usize,
    cancel_handle: CancelHandle,
    finished: Option<oneshot::Sender<()>>,
}

impl Voice {
    /// Renders the next output frame into `frame`. Returns false once the clip is exhausted.
    fn render_frame(&mut self, frame: &mut [f32]) -> bool {
        if self.position >= self.clip.frames() {
            return false;
        }

        let clip_channels = self.clip.channel_count() as usize;
        let start = self.position * clip_channels;
        let source = &self.clip.samples()[start..start + clip_channels];
        for (channel, sample) in frame.iter_mut().enumerate() {
            // Mono clips go to every output channel, wider clips map channel for channel.
            *sample = if clip_channels == 1 {
                source[0]
            } else {
                source.get(channel).copied().unwrap_or(0.0)
            };
        }

        self.position += 1;
        true
    }
}

type VoiceSlot = Arc<Mutex<Option<Voice>>>;

/// An open cpal output stream. The stream lives on its own thread because cpal streams are not
/// Send; dropping the output shuts that thread down and closes the stream.
pub struct Output {
    name: String,
    sample_rate: u32,
    voice: VoiceSlot,
    /// Dropping this closes the stream thread.
    _shutdown_tx: crossbeam_channel::Sender<()>,
}

impl Output {
    fn start(name: String, device: cpal::Device) -> Result<Output, AudioError> {
        let span = span!(Level::INFO, "cpal output");
        let _enter = span.enter();

        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.config();
        let sample_rate = config.sample_rate;
        let channels = config.channels as usize;

        let voice: VoiceSlot = Arc::new(Mutex::new(None));
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);

        {
            let voice = voice.clone();
            thread::spawn(move || {
                let stream = match sample_format {
                    cpal::SampleFormat::I16 => {
                        build_stream::<i16>(&device, &config, channels, voice)
                    }
                    cpal::SampleFormat::I32 => {
                        build_stream::<i32>(&device, &config, channels, voice)
                    }
                    cpal::SampleFormat::U16 => {
                        build_stream::<u16>(&device, &config, channels, voice)
                    }
                    _ => build_stream::<f32>(&device, &config, channels, voice),
                };

                let stream = match stream.and_then(|stream| {
                    stream.play()?;
                    Ok(stream)
                }) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until the output is dropped.
                let _ = shutdown_rx.recv();
                drop(stream);
                info!("Output stream closed.");
            });
        }

        ready_rx
            .recv()
            .map_err(|_| AudioError::Stream("output thread exited early".to_string()))??;

        info!(
            device = name,
            sample_rate = sample_rate,
            channels = channels,
            "Output stream started."
        );

        Ok(Output {
            name,
            sample_rate,
            voice,
            _shutdown_tx: shutdown_tx,
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    voice: VoiceSlot,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut frame = vec![0.0f32; channels];
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let mut slot = voice.lock();
            for out_frame in data.chunks_mut(channels) {
                frame.fill(0.0);

                // Cancelled clips go silent without reporting completion.
                if slot
                    .as_ref()
                    .is_some_and(|voice| voice.cancel_handle.is_cancelled())
                {
                    slot.take();
                }

                let done = match slot.as_mut() {
                    Some(voice) => !voice.render_frame(&mut frame),
                    None => false,
                };
                if done {
                    if let Some(mut voice) = slot.take() {
                        if let Some(finished) = voice.finished.take() {
                            let _ = finished.send(());
                        }
                    }
                }

                for (dst, src) in out_frame.iter_mut().zip(frame.iter()) {
                    *dst = T::from_sample(*src);
                }
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )?;
    Ok(stream)
}

impl super::Output for Output {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&self, clip: &Clip) -> Result<Playback, AudioError> {
        let (finished_tx, finished_rx) = oneshot::channel();
        let cancel_handle = CancelHandle::new();

        // Replacing the voice drops any previous completion sender.
        *self.voice.lock() = Some(Voice {
            clip: clip.clone(),
            position: 0,
            cancel_handle: cancel_handle.clone(),
            finished: Some(finished_tx),
        });

        Ok(Playback::new(finished_rx, cancel_handle))
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} Hz)", self.name, self.sample_rate)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_voice_maps_mono_to_all_channels() {
        let clip = Clip::new(vec![0.25, 0.5], 1, 44100);
        let mut voice = Voice {
            clip,
            position: 0,
            cancel_handle: CancelHandle::new(),
            finished: None,
        };

        let mut frame = [0.0f32; 2];
        assert!(voice.render_frame(&mut frame));
        assert_eq!([0.25, 0.25], frame);
        assert!(voice.render_frame(&mut frame));
        assert_eq!([0.5, 0.5], frame);
        assert!(!voice.render_frame(&mut frame));
    }

    #[test]
    fn test_voice_maps_stereo_to_wider_output() {
        let clip = Clip::new(vec![0.1, 0.2], 2, 44100);
        let mut voice = Voice {
            clip,
            position: 0,
            cancel_handle: CancelHandle::new(),
            finished: None,
        };

        let mut frame = [1.0f32; 4];
        assert!(voice.render_frame(&mut frame));
        assert_eq!([0.1, 0.2, 0.0, 0.0], frame);
    }
}
