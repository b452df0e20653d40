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
use crate::audio::AudioError;

use super::fetch::FetchError;

/// Why a single clip could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum AssetErrorKind {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("decode failed: {0}")]
    Decode(#[from] AudioError),

    #[error("clip contains no audio")]
    Empty,
}

/// A clip failed to load, which fails the whole set.
#[derive(Debug, thiserror::Error)]
#[error("Failed to load {path}: {kind}")]
pub struct AssetLoadError {
    path: String,
    #[source]
    kind: AssetErrorKind,
}

impl AssetLoadError {
    pub fn new(path: String, kind: AssetErrorKind) -> AssetLoadError {
        AssetLoadError { path, kind }
    }

    /// The asset path that failed.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> &AssetErrorKind {
        &self.kind
    }
}
