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
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_FORMAT: &str = "mp3";

/// Where the clips are fetched from.
#[derive(Debug, PartialEq, Eq)]
pub enum Source<'a> {
    /// An HTTP origin such as http://localhost:5173.
    Origin(&'a str),
    /// A directory on disk laid out like the web root.
    Directory(&'a str),
}

/// A YAML representation of the asset configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Assets {
    /// The HTTP origin serving /audio/<name>.<format>.
    origin: Option<String>,
    /// A local directory containing audio/<name>.<format>.
    directory: Option<String>,
    /// The container format / file extension of the clips (default: mp3).
    format: Option<String>,
}

impl Assets {
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn directory(&self) -> Option<&str> {
        self.directory.as_deref()
    }

    /// Returns the clip format (default: mp3).
    pub fn format(&self) -> &str {
        self.format.as_deref().unwrap_or(DEFAULT_FORMAT)
    }

    pub fn set_origin(&mut self, origin: String) {
        self.origin = Some(origin);
        self.directory = None;
    }

    pub fn set_directory(&mut self, directory: String) {
        self.directory = Some(directory);
        self.origin = None;
    }

    pub fn set_format(&mut self, format: String) {
        self.format = Some(format);
    }

    /// Returns the single configured source.
    pub fn source(&self) -> Result<Source<'_>, ConfigError> {
        match (self.origin(), self.directory()) {
            (Some(origin), None) => Ok(Source::Origin(origin)),
            (None, Some(directory)) => Ok(Source::Directory(directory)),
            (Some(_), Some(_)) => Err(ConfigError::ConflictingAssetSource),
            (None, None) => Err(ConfigError::MissingAssetSource),
        }
    }
}
