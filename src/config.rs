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
use std::path::Path;

use config::{Config, Environment, File};
use serde::Deserialize;

pub mod assets;
pub mod audio;
pub mod chain;
pub mod error;

pub use self::assets::Assets;
pub use self::audio::Audio;
pub use self::chain::Chain;
pub use self::error::ConfigError;

/// The prefix for environment variable overrides, e.g. MARKOVBEAT_AUDIO__DEVICE=mock.
const ENV_PREFIX: &str = "MARKOVBEAT";

/// The configuration for the player.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Player {
    /// The audio output configuration.
    #[serde(default)]
    audio: Audio,
    /// Where the clips come from.
    #[serde(default)]
    assets: Assets,
    /// Chain behavior.
    #[serde(default)]
    chain: Chain,
}

impl Player {
    /// Loads the configuration from an optional file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Player, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        Ok(builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Player>()?)
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut Audio {
        &mut self.audio
    }

    pub fn assets(&self) -> &Assets {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut Assets {
        &mut self.assets
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut Chain {
        &mut self.chain
    }
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs, time::Duration};

    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_load_yaml() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("player.yaml");
        fs::write(
            &path,
            r#"
audio:
  device: mock-device
assets:
  origin: http://localhost:5173
  format: ogg
chain:
  seed: 42
  clip_gap: 250ms
"#,
        )?;

        let player = Player::load(Some(&path))?;
        assert_eq!("mock-device", player.audio().device());
        assert_eq!(Some("http://localhost:5173"), player.assets().origin());
        assert_eq!("ogg", player.assets().format());
        assert_eq!(Some(42), player.chain().seed());
        assert_eq!(Duration::from_millis(250), player.chain().clip_gap()?);
        Ok(())
    }

    #[test]
    #[serial]
    fn test_defaults() -> Result<(), Box<dyn Error>> {
        let player = Player::load(None)?;
        assert_eq!("default", player.audio().device());
        assert_eq!("mp3", player.assets().format());
        assert_eq!(None, player.chain().seed());
        assert_eq!(Duration::ZERO, player.chain().clip_gap()?);
        Ok(())
    }

    #[test]
    #[serial]
    fn test_environment_overrides() -> Result<(), Box<dyn Error>> {
        std::env::set_var("MARKOVBEAT_AUDIO__DEVICE", "mock-env");
        std::env::set_var("MARKOVBEAT_CHAIN__SEED", "9");
        let player = Player::load(None);
        std::env::remove_var("MARKOVBEAT_AUDIO__DEVICE");
        std::env::remove_var("MARKOVBEAT_CHAIN__SEED");

        let player = player?;
        assert_eq!("mock-env", player.audio().device());
        assert_eq!(Some(9), player.chain().seed());
        Ok(())
    }
}
