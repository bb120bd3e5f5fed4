//! Audio segments and their concatenation
//!
//! Backends hand back encoded audio (WAV from most servers, sometimes MP3).
//! Everything is decoded into an [`AudioSegment`] that keeps the original
//! sample format, so stitching WAV segments is lossless.

use std::io::{Cursor, Seek, Write};
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::debug;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{NarrateError, Result};

// 10 minutes of 48 kHz stereo
const MAX_SILENCE_SAMPLES: usize = 10 * 60 * 48_000 * 2;

/// Interleaved samples in the segment's native representation
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    Int(Vec<i32>),
    Float(Vec<f32>),
}

impl SampleData {
    pub fn len(&self) -> usize {
        match self {
            SampleData::Int(samples) => samples.len(),
            SampleData::Float(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn format(&self) -> SampleFormat {
        match self {
            SampleData::Int(_) => SampleFormat::Int,
            SampleData::Float(_) => SampleFormat::Float,
        }
    }
}

/// Decoded waveform plus the format it was produced in
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    spec: WavSpec,
    data: SampleData,
}

impl AudioSegment {
    /// Build a segment from interleaved samples
    pub fn from_samples(spec: WavSpec, data: SampleData) -> Result<Self> {
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(NarrateError::Backend(format!(
                "Invalid audio format: {} channels at {} Hz",
                spec.channels, spec.sample_rate
            )));
        }
        if spec.sample_format != data.format() {
            return Err(NarrateError::Backend(
                "Sample data does not match the declared sample format".to_string(),
            ));
        }
        if data.len() % spec.channels as usize != 0 {
            return Err(NarrateError::Backend(format!(
                "{} samples cannot be split into {} channels",
                data.len(),
                spec.channels
            )));
        }

        Ok(Self { spec, data })
    }

    /// Silence in the given format. Rounded to the nearest whole frame.
    pub fn silence(spec: WavSpec, duration_ms: u64) -> Result<Self> {
        let frames = (duration_ms as u128 * spec.sample_rate as u128 + 500) / 1000;
        let len = u128::from(spec.channels)
            .checked_mul(frames)
            .and_then(|len| usize::try_from(len).ok())
            .filter(|&len| len <= MAX_SILENCE_SAMPLES)
            .ok_or_else(|| {
                NarrateError::Concatenation(format!("pause of {} ms is too long to render", duration_ms))
            })?;

        let data = match spec.sample_format {
            SampleFormat::Int => SampleData::Int(vec![0; len]),
            SampleFormat::Float => SampleData::Float(vec![0.0; len]),
        };
        Ok(Self { spec, data })
    }

    /// Decode whatever a backend returned: WAV directly, anything else through symphonia
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(NarrateError::Backend("Backend returned an empty audio payload".to_string()));
        }

        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            Self::from_wav_bytes(bytes)
        } else {
            Self::decode_compressed(bytes)
        }
    }

    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self> {
        let reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let data = match spec.sample_format {
            SampleFormat::Int => SampleData::Int(
                reader
                    .into_samples::<i32>()
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
            SampleFormat::Float => SampleData::Float(
                reader
                    .into_samples::<f32>()
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
        };

        Self::from_samples(spec, data)
    }

    /// MP3/AAC/... into interleaved 32-bit float PCM
    fn decode_compressed(bytes: &[u8]) -> Result<Self> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

        let probed = symphonia::default::get_probe()
            .format(&Hint::new(), mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| NarrateError::Backend(format!("Unrecognised audio format: {}", e)))?;

        let mut format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| NarrateError::Backend("No audio track in backend output".to_string()))?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| NarrateError::Backend(format!("Unsupported codec: {}", e)))?;

        let mut spec: Option<WavSpec> = None;
        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(e) => {
                    end_of_stream(e)?;
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(e) => {
                    end_of_stream(e)?;
                    break;
                }
            };

            let signal = *decoded.spec();
            spec.get_or_insert(WavSpec {
                channels: signal.channels.count() as u16,
                sample_rate: signal.rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            });

            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, signal);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }

        let spec = spec.ok_or_else(|| NarrateError::Backend("Backend output contained no audio".to_string()))?;
        debug!("Decoded {} compressed samples at {} Hz", samples.len(), spec.sample_rate);
        Self::from_samples(spec, SampleData::Float(samples))
    }

    pub fn spec(&self) -> WavSpec {
        self.spec
    }

    pub fn samples(&self) -> &SampleData {
        &self.data
    }

    /// Number of sample frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.data.len() / self.spec.channels as usize
    }

    pub fn duration(&self) -> Duration {
        let nanos = self.frames() as u128 * 1_000_000_000 / self.spec.sample_rate as u128;
        Duration::from_nanos(nanos as u64)
    }

    /// Append another segment; formats must match exactly
    pub fn append(&mut self, other: &AudioSegment) -> Result<()> {
        if other.spec != self.spec {
            return Err(NarrateError::Concatenation(format!(
                "segment format {:?} does not match {:?}",
                other.spec, self.spec
            )));
        }

        match (&mut self.data, &other.data) {
            (SampleData::Int(ours), SampleData::Int(theirs)) => ours.extend_from_slice(theirs),
            (SampleData::Float(ours), SampleData::Float(theirs)) => ours.extend_from_slice(theirs),
            _ => {
                return Err(NarrateError::Concatenation(
                    "segments mix integer and float samples".to_string(),
                ))
            }
        }

        Ok(())
    }

    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, self.spec)?;
            self.write_samples(&mut writer)?;
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    fn write_samples<W: Write + Seek>(&self, writer: &mut WavWriter<W>) -> Result<()> {
        match &self.data {
            SampleData::Int(samples) => {
                for &sample in samples {
                    writer.write_sample(sample)?;
                }
            }
            SampleData::Float(samples) => {
                for &sample in samples {
                    writer.write_sample(sample)?;
                }
            }
        }
        Ok(())
    }
}

/// Ok for a clean end of stream; a corrupt packet fails the whole payload
fn end_of_stream(err: SymphoniaError) -> Result<()> {
    match err {
        SymphoniaError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(()),
        SymphoniaError::DecodeError(reason) => Err(NarrateError::Backend(format!(
            "Corrupt audio packet in backend output: {}",
            reason
        ))),
        other => Err(NarrateError::Backend(format!("Audio decoding failed: {}", other))),
    }
}

/// Склеивает сегменты, вставляя между ними паузу.
///
/// The first segment's format is authoritative. One segment comes back
/// unchanged, with no leading or trailing pause.
pub fn concat_with_pause(segments: Vec<AudioSegment>, pause_ms: u64) -> Result<AudioSegment> {
    let mut segments = segments.into_iter().peekable();
    let mut output = segments
        .next()
        .ok_or_else(|| NarrateError::Concatenation("no segments to concatenate".to_string()))?;

    if segments.peek().is_none() {
        return Ok(output);
    }

    let silence = AudioSegment::silence(output.spec, pause_ms)?;

    for segment in segments {
        output.append(&silence)?;
        output.append(&segment)?;
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono16(sample_rate: u32) -> WavSpec {
        WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    fn tone(spec: WavSpec, frames: usize, value: i32) -> AudioSegment {
        let len = frames * spec.channels as usize;
        AudioSegment::from_samples(spec, SampleData::Int(vec![value; len])).unwrap()
    }

    #[test]
    fn test_silence_duration() {
        let silence = AudioSegment::silence(mono16(16000), 120).unwrap();
        assert_eq!(silence.frames(), 1920);
        assert_eq!(silence.duration(), Duration::from_millis(120));

        let stereo = WavSpec { channels: 2, ..mono16(22050) };
        let silence = AudioSegment::silence(stereo, 10).unwrap();
        // 220.5 frames rounds to 221
        assert_eq!(silence.frames(), 221);
        assert_eq!(silence.samples().len(), 442);
    }

    #[test]
    fn test_single_segment_has_no_pause() {
        let segment = tone(mono16(24000), 4800, 100);
        let output = concat_with_pause(vec![segment.clone()], 500).unwrap();
        assert_eq!(output, segment);
        assert_eq!(output.duration(), Duration::from_millis(200));
    }

    #[test]
    fn test_huge_pause_is_an_error() {
        assert!(matches!(
            AudioSegment::silence(mono16(16000), u64::MAX / 16),
            Err(NarrateError::Concatenation(_))
        ));
        assert!(matches!(
            AudioSegment::silence(mono16(48000), 1_000_000_000),
            Err(NarrateError::Concatenation(_))
        ));

        let spec = mono16(16000);
        let result = concat_with_pause(vec![tone(spec, 10, 1), tone(spec, 10, 2)], u64::MAX / 16);
        assert!(matches!(result, Err(NarrateError::Concatenation(_))));
    }

    #[test]
    fn test_single_segment_ignores_huge_pause() {
        let segment = tone(mono16(16000), 10, 1);
        let output = concat_with_pause(vec![segment.clone()], u64::MAX / 16).unwrap();
        assert_eq!(output, segment);
    }

    #[test]
    fn test_pause_count_invariant() {
        let spec = mono16(16000);
        let segments = vec![tone(spec, 1600, 1), tone(spec, 3200, 2), tone(spec, 800, 3)];
        let expected_frames: usize = segments.iter().map(AudioSegment::frames).sum::<usize>() + 2 * 1920;

        let output = concat_with_pause(segments, 120).unwrap();
        assert_eq!(output.frames(), expected_frames);

        // order: segment 1, pause, segment 2, pause, segment 3
        let SampleData::Int(samples) = output.samples() else { panic!("expected int samples") };
        assert_eq!(samples[0], 1);
        assert_eq!(samples[1600], 0);
        assert_eq!(samples[1600 + 1920], 2);
        assert_eq!(samples[1600 + 1920 + 3200 + 1920], 3);
    }

    #[test]
    fn test_zero_pause_concatenates_back_to_back() {
        let spec = mono16(8000);
        let output = concat_with_pause(vec![tone(spec, 10, 1), tone(spec, 10, 2)], 0).unwrap();
        assert_eq!(output.frames(), 20);
    }

    #[test]
    fn test_format_mismatch_is_concatenation_error() {
        let result = concat_with_pause(vec![tone(mono16(16000), 10, 1), tone(mono16(24000), 10, 1)], 120);
        assert!(matches!(result, Err(NarrateError::Concatenation(_))));
    }

    #[test]
    fn test_empty_input_is_concatenation_error() {
        assert!(matches!(concat_with_pause(Vec::new(), 120), Err(NarrateError::Concatenation(_))));
    }

    #[test]
    fn test_wav_bytes_preserve_format() {
        let spec = WavSpec { channels: 2, ..mono16(22050) };
        let segment =
            AudioSegment::from_samples(spec, SampleData::Int(vec![-32768, 32767, 0, 1234])).unwrap();

        let decoded = AudioSegment::decode(&segment.to_wav_bytes().unwrap()).unwrap();
        assert_eq!(decoded, segment);
        assert_eq!(decoded.frames(), 2);
    }

    #[test]
    fn test_float_wav_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let segment = AudioSegment::from_samples(spec, SampleData::Float(vec![0.5, -0.25, 0.0])).unwrap();
        std::fs::write(&path, segment.to_wav_bytes().unwrap()).unwrap();

        let decoded = AudioSegment::decode(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(decoded, segment);
    }

    #[test]
    fn test_garbage_payload_rejected() {
        assert!(AudioSegment::decode(b"").is_err());
        assert!(AudioSegment::decode(b"definitely not audio at all").is_err());
    }

    #[test]
    fn test_corrupt_packet_fails_decoding() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "end of stream");
        assert!(end_of_stream(SymphoniaError::IoError(eof)).is_ok());

        let err = end_of_stream(SymphoniaError::DecodeError("mp3: invalid main_data_begin")).unwrap_err();
        assert!(matches!(err, NarrateError::Backend(_)));
        assert!(err.to_string().contains("Corrupt audio packet"));

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(end_of_stream(SymphoniaError::IoError(reset)).is_err());
    }

    #[test]
    fn test_corrupted_compressed_payload_rejected() {
        // ID3 tag header followed by bytes that are no audio frame at all
        let mut payload = b"ID3\x04\x00\x00\x00\x00\x00\x00".to_vec();
        payload.extend(std::iter::repeat(0x5a).take(512));
        assert!(AudioSegment::decode(&payload).is_err());
    }

    #[test]
    fn test_from_samples_checks_channel_alignment() {
        let spec = WavSpec { channels: 2, ..mono16(16000) };
        assert!(AudioSegment::from_samples(spec, SampleData::Int(vec![1, 2, 3])).is_err());
        assert!(AudioSegment::from_samples(spec, SampleData::Float(vec![0.0, 0.0])).is_err());
    }
}
