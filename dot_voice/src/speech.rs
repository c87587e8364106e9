//! Real microphone capture and HTTP transcription (`speech` feature).
//!
//! [`CpalMicrophone`] records from the default input device, using an
//! energy threshold measured during calibration to find where a phrase
//! starts and ends.  [`HttpTranscriber`] uploads the phrase as WAV to a
//! scribble-compatible server (`POST /v1/transcribe?output=json`) and joins
//! the returned segment texts.

use std::io::Cursor;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use dot_signal::CancelFlag;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{ListenError, MicError, Microphone, TranscribeError, Transcriber};

/// Floor for the speech threshold, so a silent room still needs real speech.
const MIN_THRESHOLD:  f32      = 0.01;
/// Speech must be this much louder than the calibrated background.
const NOISE_FACTOR:   f32      = 1.5;
/// Quiet time that ends a phrase.
const PHRASE_PAUSE:   Duration = Duration::from_millis(800);
const CHUNK_WAIT:     Duration = Duration::from_millis(100);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Mono samples in `[-1.0, 1.0]`.
#[derive(Clone, Debug, Default)]
pub struct Audio {
    pub samples:     Vec<f32>,
    pub sample_rate: u32,
}

impl Audio {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

fn device_error(e: impl std::fmt::Display) -> MicError {
    MicError::Device(e.to_string())
}

/// Average interleaved frames of any sample type into mono `f32`.
fn downmix<T>(data: &[T], channels: usize) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    data.chunks(channels.max(1))
        .map(|frame| frame.iter().map(|&s| s.to_sample::<f32>()).sum::<f32>() / frame.len() as f32)
        .collect()
}

fn build_stream<T>(
    device:   &cpal::Device,
    config:   &cpal::StreamConfig,
    channels: usize,
    tx:       Sender<Vec<f32>>,
) -> Result<cpal::Stream, MicError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let _ = tx.send(downmix(data, channels));
            },
            |err| warn!(error = %err, "input stream error"),
            None,
        )
        .map_err(device_error)
}

// ════════════════════════════════════════════════════════════════════════════
// CpalMicrophone
// ════════════════════════════════════════════════════════════════════════════

/// Default input device, downmixed to mono.
///
/// The cpal stream is not `Send`; open this on the thread that listens.
pub struct CpalMicrophone {
    _stream:     cpal::Stream,
    chunks:      Receiver<Vec<f32>>,
    sample_rate: u32,
    threshold:   f32,
    cancel:      CancelFlag,
}

impl CpalMicrophone {
    /// `cancel` cuts a phrase recording short during shutdown.
    pub fn open(cancel: CancelFlag) -> Result<Self, MicError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(MicError::NotFound)?;
        let supported = device.default_input_config().map_err(device_error)?;
        let format = supported.sample_format();
        let channels = (supported.channels() as usize).max(1);
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, tx)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, tx)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, tx)?,
            SampleFormat::I32 => build_stream::<i32>(&device, &config, channels, tx)?,
            other => {
                return Err(MicError::Device(format!("unsupported sample format {other:?}")))
            }
        };
        stream.play().map_err(device_error)?;

        if let Ok(name) = device.name() {
            debug!(device = %name, sample_rate, ?format, "input stream opened");
        }
        Ok(CpalMicrophone {
            _stream: stream,
            chunks: rx,
            sample_rate,
            threshold: MIN_THRESHOLD,
            cancel,
        })
    }

    fn discard_stale(&self) {
        while self.chunks.try_recv().is_ok() {}
    }

    fn next_chunk(&self, wait: Duration) -> Result<Option<Vec<f32>>, ListenError> {
        match self.chunks.recv_timeout(wait) {
            Ok(chunk) => Ok(Some(chunk)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ListenError::Device("input stream stopped".into()))
            }
        }
    }
}

impl Microphone for CpalMicrophone {
    type Audio = Audio;

    fn calibrate(&mut self, duration: Duration) -> Result<(), MicError> {
        self.discard_stale();
        let deadline = Instant::now() + duration;
        let mut background = Vec::new();
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match self.chunks.recv_timeout(remaining) {
                Ok(chunk) => background.extend(chunk),
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(MicError::Device("input stream stopped".into()))
                }
            }
        }
        self.threshold = (rms(&background) * NOISE_FACTOR).max(MIN_THRESHOLD);
        debug!(threshold = self.threshold, "ambient noise calibrated");
        Ok(())
    }

    fn listen(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<Audio, ListenError> {
        self.discard_stale();

        // ── wait for speech onset ─────────────────────────────────────────
        let onset_deadline = Instant::now() + timeout;
        let mut samples = loop {
            if self.cancel.is_cancelled() {
                return Err(ListenError::Timeout);
            }
            let Some(remaining) = onset_deadline.checked_duration_since(Instant::now()) else {
                return Err(ListenError::Timeout);
            };
            if let Some(chunk) = self.next_chunk(remaining.min(CHUNK_WAIT))? {
                if rms(&chunk) > self.threshold {
                    break chunk;
                }
            }
        };

        // ── record until a pause or the phrase limit ──────────────────────
        let started = Instant::now();
        let mut quiet = Duration::ZERO;
        while started.elapsed() < phrase_limit && !self.cancel.is_cancelled() {
            let Some(chunk) = self.next_chunk(CHUNK_WAIT)? else { continue };
            if rms(&chunk) > self.threshold {
                quiet = Duration::ZERO;
            } else {
                quiet += Duration::from_secs_f64(chunk.len() as f64 / self.sample_rate.max(1) as f64);
            }
            samples.extend(chunk);
            if quiet >= PHRASE_PAUSE {
                break;
            }
        }

        Ok(Audio { samples, sample_rate: self.sample_rate })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HttpTranscriber
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct Segment {
    text: String,
}

/// Client for a scribble-compatible transcription endpoint.
pub struct HttpTranscriber {
    client: reqwest::blocking::Client,
    url:    String,
}

impl HttpTranscriber {
    /// `url` is the full transcribe endpoint, e.g.
    /// `http://127.0.0.1:8080/v1/transcribe`.
    pub fn new(url: impl Into<String>) -> Result<Self, TranscribeError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(service_error)?;
        Ok(HttpTranscriber { client, url: url.into() })
    }
}

fn service_error(e: impl std::fmt::Display) -> TranscribeError {
    TranscribeError::Service(e.to_string())
}

impl Transcriber<Audio> for HttpTranscriber {
    fn transcribe(&mut self, audio: &Audio) -> Result<String, TranscribeError> {
        let wav = encode_wav(audio).map_err(service_error)?;
        debug!(secs = audio.duration().as_secs_f32(), bytes = wav.len(), "uploading phrase");

        let body = self
            .client
            .post(format!("{}?output=json", self.url))
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(wav)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(service_error)?;

        let segments: Vec<Segment> = serde_json::from_str(&body).map_err(service_error)?;
        join_segments(&segments)
    }
}

fn join_segments(segments: &[Segment]) -> Result<String, TranscribeError> {
    let text = segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        return Err(TranscribeError::Unrecognized);
    }
    Ok(text.to_lowercase())
}

/// 16-bit PCM mono WAV, in memory.
fn encode_wav(audio: &Audio) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels:        1,
        sample_rate:     audio.sample_rate,
        bits_per_sample: 16,
        sample_format:   hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in &audio.samples {
            writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0.0; 64]), 0.0);
    }

    #[test]
    fn rms_of_constant_signal_is_its_magnitude() {
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn stereo_float_frames_are_averaged() {
        assert_eq!(downmix(&[0.5f32, -0.5, 1.0, 0.0], 2), [0.0, 0.5]);
    }

    #[test]
    fn integer_formats_downmix_to_unit_range() {
        let loud = downmix(&[i16::MAX, i16::MAX, 0, 0], 2);
        assert_eq!(loud.len(), 2);
        assert!((loud[0] - 1.0).abs() < 1e-3);
        assert_eq!(loud[1], 0.0);

        // Unsigned formats are centred on the midpoint.
        let centred = downmix(&[32_768u16, 32_768], 1);
        assert!(centred.iter().all(|s| s.abs() < 1e-3));
        assert!(downmix(&[u16::MIN], 1)[0] <= -0.99);
    }

    #[test]
    fn integer_input_clears_the_noise_floor() {
        let speech = downmix(&[8_000i16, -8_000, 8_000, -8_000], 1);
        assert!(rms(&speech) > MIN_THRESHOLD);
    }

    #[test]
    fn wav_is_readable_back() {
        let audio = Audio { samples: vec![0.0, 0.5, -0.5, 1.0], sample_rate: 16_000 };
        let bytes = encode_wav(&audio).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn segments_join_into_one_phrase() {
        let segments: Vec<Segment> =
            serde_json::from_str(r#"[{"text":" Make it "},{"text":""},{"text":"Bigger."}]"#).unwrap();
        assert_eq!(join_segments(&segments).as_deref(), Ok("make it bigger."));
    }

    #[test]
    fn empty_transcript_is_unrecognized() {
        assert_eq!(join_segments(&[]), Err(TranscribeError::Unrecognized));
    }
}
