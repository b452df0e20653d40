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
/// Error types for audio output and decoding
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Audio decode error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("No audio track found")]
    NoTrack,

    #[error("Sample rate not specified")]
    UnknownSampleRate,

    #[error("No device found with name {0}")]
    NoDevice(String),

    #[error("Audio host error: {0}")]
    Host(String),

    #[error("Output stream error: {0}")]
    Stream(String),

    #[error("Playback ended without a completion signal")]
    PlaybackLost,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for AudioError {
    fn from(e: cpal::DevicesError) -> Self {
        AudioError::Host(e.to_string())
    }
}

impl From<cpal::HostUnavailable> for AudioError {
    fn from(e: cpal::HostUnavailable) -> Self {
        AudioError::Host(e.to_string())
    }
}

impl From<cpal::DeviceNameError> for AudioError {
    fn from(e: cpal::DeviceNameError) -> Self {
        AudioError::Host(e.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        AudioError::Stream(e.to_string())
    }
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(e: cpal::BuildStreamError) -> Self {
        AudioError::Stream(e.to_string())
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(e: cpal::PlayStreamError) -> Self {
        AudioError::Stream(e.to_string())
    }
}
