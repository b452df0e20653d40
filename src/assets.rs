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

//! Loading and caching of the per-state clips.
//!
//! Clips are fetched, decoded for the current output and kept in memory for the whole session.
//! The cache only ever holds a complete set.

use std::{fmt, sync::Arc, time::Duration};

use tracing::{debug, info, span, warn, Level, Span};

use crate::audio::{Clip, Output};
use crate::config;
use crate::state::State;

mod error;
mod fetch;

pub use error::{AssetErrorKind, AssetLoadError};
pub use fetch::{AssetFetcher, DirectoryFetcher, FetchError, HttpFetcher};

/// Maps states to the paths of their clips.
#[derive(Clone, Debug)]
pub struct AssetCatalog {
    /// The container format, also used as the file extension.
    format: String,
}

impl AssetCatalog {
    pub fn new(format: &str) -> AssetCatalog {
        AssetCatalog {
            format: format.trim_start_matches('.').to_string(),
        }
    }

    /// The path of a state's clip relative to the asset root, e.g. /audio/beat.mp3.
    pub fn path(&self, state: State) -> String {
        format!("/audio/{}.{}", state.audio_name(), self.format)
    }

    pub fn format(&self) -> &str {
        &self.format
    }
}

impl Default for AssetCatalog {
    fn default() -> Self {
        AssetCatalog::new("mp3")
    }
}

/// A decoded clip and where it came from.
#[derive(Clone, Debug)]
pub struct AudioAsset {
    state: State,
    path: String,
    clip: Clip,
}

impl AudioAsset {
    pub fn state(&self) -> State {
        self.state
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn clip(&self) -> &Clip {
        &self.clip
    }
}

/// One clip for every state.
#[derive(Debug)]
pub struct AssetSet {
    /// Indexed by State::index.
    assets: Vec<AudioAsset>,
}

impl AssetSet {
    /// Returns the asset for a state.
    pub fn get(&self, state: State) -> &AudioAsset {
        &self.assets[state.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioAsset> {
        self.assets.iter()
    }

    /// Total playing time of all clips.
    pub fn total_duration(&self) -> Duration {
        self.assets.iter().map(|asset| asset.clip.duration()).sum()
    }
}

/// Fetches, decodes and caches the clips.
pub struct AssetStore {
    fetcher: Arc<dyn AssetFetcher>,
    catalog: AssetCatalog,
    cache: Option<Arc<AssetSet>>,
    span: Span,
}

impl AssetStore {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, catalog: AssetCatalog) -> AssetStore {
        AssetStore {
            fetcher,
            catalog,
            cache: None,
            span: span!(Level::INFO, "asset store"),
        }
    }

    /// Builds a store from the asset configuration.
    pub fn from_config(assets: &config::Assets) -> Result<AssetStore, Box<dyn std::error::Error>> {
        let fetcher: Arc<dyn AssetFetcher> = match assets.source()? {
            config::assets::Source::Origin(origin) => Arc::new(HttpFetcher::new(origin)?),
            config::assets::Source::Directory(directory) => {
                Arc::new(DirectoryFetcher::new(directory))
            }
        };
        Ok(AssetStore::new(fetcher, AssetCatalog::new(assets.format())))
    }

    /// Loads every clip in state order, decoding for the given output.
    ///
    /// The previous cache is dropped before anything is fetched, and the new set is only
    /// published once all clips loaded. Any failure leaves the cache empty.
    pub async fn load_all(&mut self, output: &dyn Output) -> Result<Arc<AssetSet>, AssetLoadError> {
        self.cache = None;

        let assets = self.load_each(output).await?;
        let set = Arc::new(AssetSet { assets });

        let _enter = self.span.enter();
        info!(
            clips = set.assets.len(),
            total_duration = format!("{:?}", set.total_duration()),
            output = %output,
            "Loaded all clips."
        );
        self.cache = Some(set.clone());
        Ok(set)
    }

    async fn load_each(&self, output: &dyn Output) -> Result<Vec<AudioAsset>, AssetLoadError> {
        let mut assets = Vec::with_capacity(State::ALL.len());
        for state in State::ALL {
            let path = self.catalog.path(state);
            match self.load_one(output, &path).await {
                Ok(clip) => {
                    debug!(
                        parent: &self.span,
                        state = %state,
                        path = path,
                        frames = clip.frames(),
                        "Loaded clip."
                    );
                    assets.push(AudioAsset {
                        state,
                        path,
                        clip,
                    });
                }
                Err(kind) => {
                    warn!(parent: &self.span, path = path, err = %kind, "Failed to load clip.");
                    return Err(AssetLoadError::new(path, kind));
                }
            }
        }
        Ok(assets)
    }

    async fn load_one(&self, output: &dyn Output, path: &str) -> Result<Clip, AssetErrorKind> {
        let bytes = self.fetcher.fetch(path).await?;
        let clip = output.decode(&bytes, Some(self.catalog.format()))?;
        if clip.is_empty() {
            return Err(AssetErrorKind::Empty);
        }
        Ok(clip)
    }

    /// The last complete set, if any.
    pub fn cached(&self) -> Option<Arc<AssetSet>> {
        self.cache.clone()
    }

    /// Drops the cached set.
    pub fn clear(&mut self) {
        self.cache = None;
    }
}

impl fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetStore")
            .field("fetcher", &self.fetcher.to_string())
            .field("catalog", &self.catalog)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;

    use super::*;
    use crate::audio::{mock, Device as _};
    use crate::testutil::{clip_frames, StaticFetcher};

    #[test]
    fn test_catalog_paths() {
        let catalog = AssetCatalog::default();
        assert_eq!("/audio/beat.mp3", catalog.path(State::Beat));
        assert_eq!("/audio/no-1.mp3", catalog.path(State::No));
        assert_eq!("/audio/ko-1.mp3", catalog.path(State::Ko));
        assert_eq!("/audio/n.wav", AssetCatalog::new(".wav").path(State::N));
    }

    #[tokio::test]
    async fn test_load_all() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-device");
        let output = device.open()?;
        let fetcher = Arc::new(StaticFetcher::with_all_clips("wav")?);
        let mut store = AssetStore::new(fetcher.clone(), AssetCatalog::new("wav"));

        let set = store.load_all(output.as_ref()).await?;
        for state in State::ALL {
            let asset = set.get(state);
            assert_eq!(state, asset.state());
            assert_eq!(format!("/audio/{}.wav", state.audio_name()), asset.path());
            assert_eq!(clip_frames(state), asset.clip().frames());
        }

        // Fetched in state order.
        let expected: Vec<String> = State::ALL
            .iter()
            .map(|state| format!("/audio/{}.wav", state.audio_name()))
            .collect();
        assert_eq!(expected, fetcher.requests());
        assert!(store.cached().is_some());

        store.clear();
        assert!(store.cached().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_one_failure_fails_everything() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-device");
        let output = device.open()?;
        let mut fetcher = StaticFetcher::with_all_clips("wav")?;
        fetcher.remove("/audio/ko-1.wav");
        let mut store = AssetStore::new(Arc::new(fetcher), AssetCatalog::new("wav"));

        let err = store
            .load_all(output.as_ref())
            .await
            .expect_err("load should fail");
        assert_eq!("/audio/ko-1.wav", err.path());
        assert!(matches!(err.kind(), AssetErrorKind::Fetch(_)));
        assert!(store.cached().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_failure_invalidates_previous_cache() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-device");
        let output = device.open()?;
        let fetcher = Arc::new(StaticFetcher::with_all_clips("wav")?);
        let mut store = AssetStore::new(fetcher.clone(), AssetCatalog::new("wav"));
        store.load_all(output.as_ref()).await?;
        assert!(store.cached().is_some());

        fetcher.fail("/audio/n.wav");
        assert!(store.load_all(output.as_ref()).await.is_err());
        assert!(store.cached().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_undecodable_and_empty_clips() -> Result<(), Box<dyn Error>> {
        let device = mock::Device::get("mock-device");
        let output = device.open()?;

        let mut fetcher = StaticFetcher::with_all_clips("wav")?;
        fetcher.insert("/audio/shi.wav", crate::testutil::wav_bytes(0, 44100)?);
        let mut store = AssetStore::new(Arc::new(fetcher), AssetCatalog::new("wav"));
        let err = store.load_all(output.as_ref()).await.expect_err("empty clip");
        assert_eq!("/audio/shi.wav", err.path());
        assert!(matches!(
            err.kind(),
            AssetErrorKind::Empty | AssetErrorKind::Decode(_)
        ));

        let mut fetcher = StaticFetcher::with_all_clips("wav")?;
        fetcher.insert("/audio/tan.wav", b"definitely not audio".to_vec());
        let mut store = AssetStore::new(Arc::new(fetcher), AssetCatalog::new("wav"));
        let err = store.load_all(output.as_ref()).await.expect_err("bad clip");
        assert_eq!("/audio/tan.wav", err.path());
        assert!(store.cached().is_none());
        Ok(())
    }
}
