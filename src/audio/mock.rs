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
use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{info, span, Level};

use super::{AudioError, Clip, Playback};
use crate::playsync::CancelHandle;

/// The sample rate mock outputs decode at.
pub const MOCK_SAMPLE_RATE: u32 = 44100;

/// How a mock output decides a clip is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    /// Sleeps for the duration of the clip.
    Timed,
    /// Waits for a test to complete the clip.
    #[cfg_attr(not(test), allow(dead_code))]
    Manual,
}

/// Bookkeeping shared between a mock device and the outputs it opened.
#[derive(Default)]
struct Shared {
    /// Number of outputs opened over the device's lifetime.
    opened: AtomicUsize,
    /// Number of outputs currently open.
    live: AtomicUsize,
    /// Frame counts of every clip played, in order.
    played: Mutex<Vec<usize>>,
    /// Completion senders waiting on a manual trigger.
    pending: Mutex<Vec<(CancelHandle, oneshot::Sender<()>)>>,
}

/// A mock device. Doesn't actually play anything.
#[derive(Clone)]
pub struct Device {
    name: String,
    mode: Mode,
    shared: Arc<Shared>,
}

impl Device {
    /// Gets the given mock device. Clips "play" for their real duration.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            mode: Mode::Timed,
            shared: Arc::new(Shared::default()),
        }
    }

    /// Gets a mock device whose clips only finish when [`Device::complete`] is called.
    #[cfg(test)]
    pub fn manual(name: &str) -> Device {
        Device {
            mode: Mode::Manual,
            ..Device::get(name)
        }
    }

    /// Finishes every clip waiting on a manual trigger, cancelled or not, and returns how many
    /// completion signals were delivered to a listener.
    #[cfg(test)]
    pub fn complete(&self) -> usize {
        let pending: Vec<_> = self.shared.pending.lock().drain(..).collect();
        pending
            .into_iter()
            .filter_map(|(_, finished)| finished.send(()).ok())
            .count()
    }

    /// Drops every clip waiting on a manual trigger without finishing it, as a failed output
    /// would. Returns how many were dropped.
    #[cfg(test)]
    pub fn lose(&self) -> usize {
        self.shared.pending.lock().drain(..).count()
    }

    /// Number of clips waiting on a manual trigger that have not been cancelled.
    #[cfg(test)]
    pub fn sounding(&self) -> usize {
        self.shared
            .pending
            .lock()
            .iter()
            .filter(|(cancel_handle, _)| !cancel_handle.is_cancelled())
            .count()
    }

    /// Frame counts of every clip played so far.
    #[cfg(test)]
    pub fn played(&self) -> Vec<usize> {
        self.shared.played.lock().clone()
    }

    /// Number of outputs currently open.
    #[cfg(test)]
    pub fn live_outputs(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Number of outputs ever opened.
    #[cfg(test)]
    pub fn opened_outputs(&self) -> usize {
        self.shared.opened.load(Ordering::Acquire)
    }
}

impl super::Device for Device {
    fn open(&self) -> Result<Arc<dyn super::Output>, AudioError> {
        let span = span!(Level::INFO, "open output (mock)");
        let _enter = span.enter();

        self.shared.opened.fetch_add(1, Ordering::AcqRel);
        self.shared.live.fetch_add(1, Ordering::AcqRel);
        info!(device = self.name, "Opened output.");

        Ok(Arc::new(Output {
            name: self.name.clone(),
            mode: self.mode,
            shared: self.shared.clone(),
        }))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

/// An output opened on a mock device.
pub struct Output {
    name: String,
    mode: Mode,
    shared: Arc<Shared>,
}

impl super::Output for Output {
    fn sample_rate(&self) -> u32 {
        MOCK_SAMPLE_RATE
    }

    fn play(&self, clip: &Clip) -> Result<Playback, AudioError> {
        let (finished_tx, finished_rx) = oneshot::channel();
        let cancel_handle = CancelHandle::new();

        info!(
            device = self.name,
            frames = clip.frames(),
            duration = format!("{:?}", clip.duration()),
            "Playing clip."
        );
        self.shared.played.lock().push(clip.frames());

        match self.mode {
            Mode::Timed => {
                let cancel_handle = cancel_handle.clone();
                let duration = clip.duration();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = cancel_handle.cancelled() => {}
                        _ = tokio::time::sleep(duration) => {
                            let _ = finished_tx.send(());
                        }
                    }
                });
            }
            Mode::Manual => self
                .shared
                .pending
                .lock()
                .push((cancel_handle.clone(), finished_tx)),
        }

        Ok(Playback::new(finished_rx, cancel_handle))
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::AcqRel);
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock, {} Hz)", self.name, MOCK_SAMPLE_RATE)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::audio::Device as _;

    #[tokio::test]
    async fn test_timed_playback_finishes() -> Result<(), AudioError> {
        let device = Device::get("mock-device");
        let output = device.open()?;
        let clip = Clip::new(vec![0.0; 441], 1, MOCK_SAMPLE_RATE);

        let mut playback = output.play(&clip)?;
        tokio::time::timeout(Duration::from_secs(1), playback.finished())
            .await
            .expect("clip should finish")?;
        assert_eq!(vec![441], device.played());
        Ok(())
    }

    #[tokio::test]
    async fn test_manual_playback_and_release() -> Result<(), AudioError> {
        let device = Device::manual("mock-device");
        let output = device.open()?;
        assert_eq!(1, device.live_outputs());

        let mut playback = output.play(&Clip::new(vec![0.0; 10], 1, 44100))?;
        assert_eq!(1, device.sounding());
        assert_eq!(1, device.complete());
        playback.finished().await?;

        let playback = output.play(&Clip::new(vec![0.0; 20], 1, 44100))?;
        playback.stop();
        assert_eq!(0, device.sounding());

        drop(output);
        assert_eq!(0, device.live_outputs());
        assert_eq!(1, device.opened_outputs());
        assert_eq!(vec![10, 20], device.played());
        Ok(())
    }
}
