//! Audio endpoints: raw PCM readers for capture, PCM writers for playback
//!
//! Capture and playback devices are outside the process; audio enters and
//! leaves as raw little-endian 16-bit mono PCM (stdin/stdout or files), so
//! `arecord`/`aplay` style tools can sit on either side.

use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::VoiceError;
use super::pcm::{decode_pcm16, encode_pcm16};

/// Samples per captured frame
pub const FRAME_SAMPLES: usize = 4096;

/// Microphone side of a session
pub trait AudioSource: Send {
    /// Begin capture; frames arrive until the input ends or the receiver is dropped
    fn start(&mut self) -> Result<mpsc::UnboundedReceiver<Vec<f32>>, VoiceError>;
}

/// Speaker side of a session
pub trait AudioSink: Send + Sync {
    /// Current time on the output clock in seconds
    fn now(&self) -> f64;

    /// Queue `samples` to begin at `start`
    fn play(&mut self, start: f64, samples: &[f32]) -> Result<(), VoiceError>;
}

enum Input {
    Path(PathBuf),
    Reader(Box<dyn AsyncRead + Send + Unpin>),
    Started,
}

/// Reads 16-bit PCM and hands it out in frames of [`FRAME_SAMPLES`]
pub struct PcmReaderSource {
    input: Input,
}

impl PcmReaderSource {
    pub fn stdin() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    /// File opened when capture starts
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            input: Input::Path(path.into()),
        }
    }

    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            input: Input::Reader(Box::new(reader)),
        }
    }
}

impl AudioSource for PcmReaderSource {
    fn start(&mut self) -> Result<mpsc::UnboundedReceiver<Vec<f32>>, VoiceError> {
        debug!("PcmReaderSource::start: called");
        let mut reader: Box<dyn AsyncRead + Send + Unpin> = match std::mem::replace(&mut self.input, Input::Started) {
            Input::Path(path) => {
                let file = std::fs::File::open(&path)
                    .map_err(|e| VoiceError::Audio(format!("cannot open {}: {}", path.display(), e)))?;
                Box::new(tokio::fs::File::from_std(file))
            }
            Input::Reader(reader) => reader,
            Input::Started => return Err(VoiceError::Audio("capture already started".to_string())),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut buf = vec![0u8; FRAME_SAMPLES * 2];
            let mut filled = 0;
            loop {
                match reader.read(&mut buf[filled..]).await {
                    Ok(0) => break,
                    Ok(n) => {
                        filled += n;
                        if filled == buf.len() {
                            if tx.send(decode_pcm16(&buf)).is_err() {
                                return;
                            }
                            filled = 0;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Audio input read failed");
                        break;
                    }
                }
            }
            if filled >= 2 {
                let _ = tx.send(decode_pcm16(&buf[..filled]));
            }
            info!("Audio input ended");
        });
        Ok(rx)
    }
}

/// Writes scheduled audio as a continuous 16-bit PCM stream
///
/// Gaps between chunks are filled with silence so the stream keeps the
/// timing the scheduler asked for.
pub struct PcmWriterSink<W: Write + Send> {
    writer: W,
    rate: u32,
    clock: Instant,
    written: f64,
}

impl<W: Write + Send> PcmWriterSink<W> {
    pub fn new(writer: W, rate: u32) -> Self {
        Self {
            writer,
            rate,
            clock: Instant::now(),
            written: 0.0,
        }
    }

    /// Seconds of audio written so far, silence included
    pub fn written(&self) -> f64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl PcmWriterSink<std::io::Stdout> {
    pub fn stdout(rate: u32) -> Self {
        Self::new(std::io::stdout(), rate)
    }
}

impl PcmWriterSink<std::io::BufWriter<std::fs::File>> {
    pub fn create(path: impl Into<PathBuf>, rate: u32) -> Result<Self, VoiceError> {
        let path = path.into();
        let file = std::fs::File::create(&path)
            .map_err(|e| VoiceError::Audio(format!("cannot create {}: {}", path.display(), e)))?;
        Ok(Self::new(std::io::BufWriter::new(file), rate))
    }
}

impl<W: Write + Send + Sync> AudioSink for PcmWriterSink<W> {
    fn now(&self) -> f64 {
        self.clock.elapsed().as_secs_f64()
    }

    fn play(&mut self, start: f64, samples: &[f32]) -> Result<(), VoiceError> {
        debug!(%start, samples = samples.len(), "PcmWriterSink::play: called");
        let rate = f64::from(self.rate);
        if start > self.written {
            let gap = ((start - self.written) * rate).round() as usize;
            self.writer
                .write_all(&vec![0u8; gap * 2])
                .map_err(|e| VoiceError::Audio(e.to_string()))?;
            self.written += gap as f64 / rate;
        }
        self.writer
            .write_all(&encode_pcm16(samples))
            .and_then(|_| self.writer.flush())
            .map_err(|e| VoiceError::Audio(e.to_string()))?;
        self.written += samples.len() as f64 / rate;
        Ok(())
    }
}
