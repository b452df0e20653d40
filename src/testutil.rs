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
    collections::{HashMap, HashSet},
    error::Error,
    f32::consts::PI,
    fmt,
    io::Cursor,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use reqwest::StatusCode;

use crate::assets::{AssetFetcher, FetchError};
use crate::state::State;

/// Wait for the given async predicate to return true or fail.
#[inline]
pub async fn eventually_async<F, Fut>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate().await {
            return;
        }
        tokio::time::sleep(tick).await;
    }
}

/// Writes a mono 16 bit WAV file with a 440 Hz tone into memory.
pub fn wav_bytes(frames: usize, sample_rate: u32) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        )?;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * PI * 440.0 * t).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Frame count of the test clip for a state. Each state gets a distinct length so tests can
/// tell from the mock output which clip was played.
pub fn clip_frames(state: State) -> usize {
    441 * (state.index() + 1)
}

/// Serves asset paths from memory.
#[derive(Default)]
pub struct StaticFetcher {
    files: HashMap<String, Vec<u8>>,
    failing: Mutex<HashSet<String>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    /// A fetcher holding a 44.1 kHz WAV clip for every state.
    pub fn with_all_clips(format: &str) -> Result<StaticFetcher, Box<dyn Error>> {
        let mut fetcher = StaticFetcher::default();
        for state in State::ALL {
            fetcher.insert(
                &format!("/audio/{}.{}", state.audio_name(), format),
                wav_bytes(clip_frames(state), 44100)?,
            );
        }
        Ok(fetcher)
    }

    pub fn insert(&mut self, path: &str, bytes: Vec<u8>) {
        self.files.insert(path.to_string(), bytes);
    }

    pub fn remove(&mut self, path: &str) {
        self.files.remove(path);
    }

    /// Makes every later fetch of the path fail.
    pub fn fail(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    /// Every path fetched so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl AssetFetcher for StaticFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.requests.lock().push(path.to_string());
        if self.failing.lock().contains(path) {
            return Err(FetchError::Status(StatusCode::INTERNAL_SERVER_ERROR));
        }
        self.files
            .get(path)
            .cloned()
            .ok_or(FetchError::Status(StatusCode::NOT_FOUND))
    }
}

impl fmt::Display for StaticFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "static ({} files)", self.files.len())
    }
}
