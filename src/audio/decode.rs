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

//! Decoding of whole clips into memory.
//!
//! Clips are short, so they are decoded in one go with symphonia and resampled to the output
//! rate up front. Nothing is decoded during playback.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, warn};

use super::{AudioError, Clip};

/// Decodes an in-memory audio file (MP3, WAV, FLAC, OGG, ...) into a clip at `target_rate`.
pub fn decode(bytes: &[u8], extension: Option<&str>, target_rate: u32) -> Result<Clip, AudioError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    // Give the probe a hint from the extension.
    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = probed.format;

    let params = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| (t.id, t.codec_params.clone()))
        .ok_or(AudioError::NoTrack)?;
    let (track_id, params) = params;

    let source_rate = params.sample_rate.ok_or(AudioError::UnknownSampleRate)?;
    let mut decoder = get_codecs().make(&params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    let mut channel_count = params.channels.map(|c| c.count() as u16).unwrap_or(0);

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt frame in the middle of a clip is skipped rather than failing the clip.
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        channel_count = spec.channels.count() as u16;
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    let samples = if source_rate != target_rate && channel_count > 0 {
        debug!(
            source_rate = source_rate,
            target_rate = target_rate,
            "Resampling clip"
        );
        resample(&samples, channel_count, source_rate, target_rate)
    } else {
        samples
    };

    Ok(Clip::new(samples, channel_count, target_rate))
}

/// Resamples interleaved samples using linear interpolation. Clips are short one-shots, so this
/// is good enough and avoids pulling in a full resampler. A trailing partial frame is dropped.
pub fn resample(samples: &[f32], channel_count: u16, source_rate: u32, target_rate: u32) -> Vec<f32> {
    let channels = channel_count as usize;
    if channels == 0 || source_rate == 0 {
        return Vec::new();
    }
    let frames: Vec<&[f32]> = samples.chunks_exact(channels).collect();
    let Some(&last) = frames.last() else {
        return Vec::new();
    };

    let step = source_rate as f64 / target_rate as f64;
    let target_frames =
        (frames.len() as u64 * target_rate as u64).div_ceil(source_rate as u64) as usize;

    (0..target_frames)
        .flat_map(|frame| {
            let position = frame as f64 * step;
            let index = position as usize;
            let weight = position.fract() as f32;
            // The final frame holds its value rather than fading towards silence.
            let current = frames.get(index).copied().unwrap_or(last);
            let next = frames.get(index + 1).copied().unwrap_or(last);
            current
                .iter()
                .zip(next.iter())
                .map(move |(from, to)| from + (to - from) * weight)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::wav_bytes;

    #[test]
    fn test_resample_doubling_interpolates() {
        let doubled = resample(&[0.0, 1.0], 1, 44100, 88200);
        assert_eq!(vec![0.0, 0.5, 1.0, 1.0], doubled);

        // Halving again lands back on the original frames.
        assert_eq!(vec![0.0, 1.0], resample(&doubled, 1, 88200, 44100));
    }

    #[test]
    fn test_resample_same_rate_keeps_samples() {
        let samples = vec![0.25, -0.5, 0.75];
        assert_eq!(samples, resample(&samples, 1, 44100, 44100));
    }

    #[test]
    fn test_resample_stereo_interpolates_per_channel() {
        let stereo = [0.0, 1.0, 1.0, 0.0];
        assert_eq!(
            vec![0.0, 1.0, 0.5, 0.5, 1.0, 0.0, 1.0, 0.0],
            resample(&stereo, 2, 44100, 88200)
        );
    }

    #[test]
    fn test_resample_nothing_to_resample() {
        assert!(resample(&[], 1, 44100, 88200).is_empty());
        assert!(resample(&[0.5], 2, 44100, 88200).is_empty());
        assert!(resample(&[0.5, 0.5], 0, 44100, 88200).is_empty());
    }

    #[test]
    fn test_decode_wav() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = wav_bytes(4410, 44100)?;
        let clip = decode(&bytes, Some("wav"), 44100)?;

        assert_eq!(1, clip.channel_count());
        assert_eq!(44100, clip.sample_rate());
        assert_eq!(4410, clip.frames());
        Ok(())
    }

    #[test]
    fn test_decode_resamples_to_target() -> Result<(), Box<dyn std::error::Error>> {
        let bytes = wav_bytes(4410, 44100)?;
        let clip = decode(&bytes, Some("wav"), 88200)?;

        assert_eq!(88200, clip.sample_rate());
        assert_eq!(8820, clip.frames());
        Ok(())
    }

    #[test]
    fn test_decode_garbage_fails() {
        let garbage = vec![0x42u8; 512];
        let decoded = decode(&garbage, Some("mp3"), 44100);
        assert!(decoded.map(|clip| clip.is_empty()).unwrap_or(true));
    }
}
