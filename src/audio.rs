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

//! The boundary between the chain and the host audio system.
//!
//! A [`Device`] opens an [`Output`], the audio output context for one session. The output
//! decodes fetched bytes into [`Clip`]s at its own sample rate and starts playback of a clip,
//! handing back a [`Playback`] whose completion can be awaited exactly once.

use std::{fmt, sync::Arc, time::Duration};

use tokio::sync::oneshot;

use crate::config;
use crate::playsync::CancelHandle;

pub mod cpal;
pub mod decode;
mod error;
pub mod mock;

pub use error::AudioError;

/// Something that can open an audio output.
pub trait Device: fmt::Display + Send + Sync {
    /// Opens a new output context. Dropping the returned output releases it.
    fn open(&self) -> Result<Arc<dyn Output>, AudioError>;
}

/// An open audio output context.
pub trait Output: fmt::Display + Send + Sync {
    /// The rate clips must be decoded at.
    fn sample_rate(&self) -> u32;

    /// Decodes a compressed buffer into a clip playable on this output.
    fn decode(&self, bytes: &[u8], extension: Option<&str>) -> Result<Clip, AudioError> {
        decode::decode(bytes, extension, self.sample_rate())
    }

    /// Starts playing the clip, replacing anything still sounding. Outputs that keep the clip
    /// past this call clone it, which shares the samples.
    fn play(&self, clip: &Clip) -> Result<Playback, AudioError>;
}

/// Decoded, interleaved audio held in memory.
#[derive(Clone)]
pub struct Clip {
    samples: Arc<Vec<f32>>,
    channel_count: u16,
    sample_rate: u32,
}

impl Clip {
    pub fn new(samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> Clip {
        Clip {
            samples: Arc::new(samples),
            channel_count,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channel_count == 0 {
            return 0;
        }
        self.samples.len() / self.channel_count as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// True if there is nothing to play.
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("frames", &self.frames())
            .field("channel_count", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// One clip currently sounding. Dropping the handle silences it.
pub struct Playback {
    finished: oneshot::Receiver<()>,
    cancel_handle: CancelHandle,
}

impl Playback {
    /// Creates a playback handle. The output fires `finished` when the clip ends and must stop
    /// sounding once `cancel_handle` is cancelled.
    pub fn new(finished: oneshot::Receiver<()>, cancel_handle: CancelHandle) -> Playback {
        Playback {
            finished,
            cancel_handle,
        }
    }

    /// Waits until the clip has played to the end.
    pub async fn finished(&mut self) -> Result<(), AudioError> {
        (&mut self.finished)
            .await
            .map_err(|_| AudioError::PlaybackLost)
    }

    /// Silences the clip.
    pub fn stop(&self) {
        self.cancel_handle.cancel();
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.cancel_handle.cancel();
    }
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, AudioError> {
    cpal::Device::list()
}

/// Gets a device from the audio configuration. Names starting with "mock" get a mock device.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(device)?))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clip_metrics() {
        let clip = Clip::new(vec![0.0; 44100 * 2], 2, 44100);
        assert_eq!(44100, clip.frames());
        assert_eq!(Duration::from_secs(1), clip.duration());
        assert!(!clip.is_empty());

        assert!(Clip::new(vec![], 1, 44100).is_empty());
        assert!(Clip::new(vec![0.5; 10], 0, 44100).is_empty());
    }

    #[tokio::test]
    async fn test_playback_lost_when_output_goes_away() {
        let (finished_tx, finished_rx) = oneshot::channel();
        let cancel_handle = CancelHandle::new();
        let mut playback = Playback::new(finished_rx, cancel_handle.clone());

        drop(finished_tx);
        assert!(matches!(
            playback.finished().await,
            Err(AudioError::PlaybackLost)
        ));

        drop(playback);
        assert!(cancel_handle.is_cancelled());
    }

    #[test]
    fn test_get_mock_device() {
        let device = get_device(&config::Audio::new("mock-device")).expect("mock device");
        assert_eq!("mock-device (Mock)", device.to_string());
    }
}
