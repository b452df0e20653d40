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
use std::time::Duration;

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::chain::MarkovSampler;

const DEFAULT_CLIP_GAP: Duration = Duration::ZERO;

/// A YAML representation of the chain configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Chain {
    /// Seeds the random source so a walk can be replayed.
    seed: Option<u64>,
    /// Controls how long to wait after a clip ends before advancing.
    clip_gap: Option<String>,
}

impl Chain {
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = Some(seed);
    }

    /// Returns the pause between clips.
    pub fn clip_gap(&self) -> Result<Duration, ConfigError> {
        match &self.clip_gap {
            Some(clip_gap) => Ok(DurationString::from_string(clip_gap.clone())
                .map_err(|e| ConfigError::Duration(clip_gap.clone(), e.to_string()))?
                .into()),
            None => Ok(DEFAULT_CLIP_GAP),
        }
    }

    /// Builds the sampler this configuration describes.
    pub fn sampler(&self) -> MarkovSampler {
        match self.seed {
            Some(seed) => MarkovSampler::seeded(seed),
            None => MarkovSampler::from_entropy(),
        }
    }
}
