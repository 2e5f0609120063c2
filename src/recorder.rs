//! Recording of outbound telemetry.
//!
//! A recording is a sequence of frames, each a big-endian `u32` length followed by the
//! postcard encoding of a [RecordedFrame].

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, info};
use postcard::{from_bytes, to_stdvec};
use serde::{Deserialize, Serialize};

use crate::HilError;
use crate::clock::SimClock;
use crate::protocol::OutboundEnvelope;
use crate::transport::{InboundSender, MessageTransport};

/// Upper bound on a single frame. Anything larger is treated as a corrupt recording.
const MAX_FRAME_LEN: usize = 64 * 1024;

/// One recorded message, stamped with the simulated time it was sent at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub time_us: u64,
    pub envelope: OutboundEnvelope,
}

/// Writes length-prefixed frames to any [Write] sink.
pub struct TelemetryRecorder<W: Write> {
    writer: W,
    frames: u64,
}

impl TelemetryRecorder<BufWriter<File>> {
    /// Creates (or truncates) a recording file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, HilError> {
        let file = File::create(path.as_ref())?;
        info!(target: "hil_bridge::recorder", "recording telemetry to {}", path.as_ref().display());
        Ok(TelemetryRecorder::new(BufWriter::new(file)))
    }
}

impl<W: Write> TelemetryRecorder<W> {
    pub fn new(writer: W) -> Self {
        TelemetryRecorder { writer, frames: 0 }
    }

    pub fn record(&mut self, time_us: u64, envelope: &OutboundEnvelope) -> Result<(), HilError> {
        let frame = RecordedFrame {
            time_us,
            envelope: envelope.clone(),
        };
        let frame_bytes = to_stdvec(&frame)?;
        let length_bytes = (frame_bytes.len() as u32).to_be_bytes();

        self.writer.write_all(&length_bytes)?;
        self.writer.write_all(&frame_bytes)?;
        self.frames += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), HilError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Frames written so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Flushes and hands back the underlying writer.
    pub fn into_inner(mut self) -> Result<W, HilError> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Reads frames back from a recording.
///
/// Iteration ends cleanly at end of input; a truncated or undecodable frame yields an
/// error and ends iteration.
pub struct RecordingReader<R: Read> {
    reader: R,
    finished: bool,
}

impl RecordingReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HilError> {
        Ok(RecordingReader::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> RecordingReader<R> {
    pub fn new(reader: R) -> Self {
        RecordingReader {
            reader,
            finished: false,
        }
    }

    fn read_frame(&mut self) -> Result<Option<RecordedFrame>, HilError> {
        let mut length_buffer = [0u8; 4];
        match self.reader.read_exact(&mut length_buffer) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let frame_length = u32::from_be_bytes(length_buffer) as usize;
        if frame_length > MAX_FRAME_LEN {
            return Err(HilError::Decode(format!(
                "frame length {} exceeds {}",
                frame_length, MAX_FRAME_LEN
            )));
        }

        let mut buffer = vec![0u8; frame_length];
        self.reader.read_exact(&mut buffer)?;
        Ok(Some(from_bytes(&buffer)?))
    }
}

impl<R: Read> Iterator for RecordingReader<R> {
    type Item = Result<RecordedFrame, HilError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Wraps a transport and records every message it sends.
///
/// Messages are recorded whether or not the inner send succeeds; a recording failure
/// is logged and does not affect delivery.
pub struct RecordingTransport<T: MessageTransport, W: Write + Send> {
    inner: T,
    recorder: Mutex<TelemetryRecorder<W>>,
    clock: Arc<SimClock>,
}

impl<T: MessageTransport, W: Write + Send> RecordingTransport<T, W> {
    pub fn new(inner: T, recorder: TelemetryRecorder<W>, clock: Arc<SimClock>) -> Self {
        RecordingTransport {
            inner,
            recorder: Mutex::new(recorder),
            clock,
        }
    }

    /// Flushes pending frames to the sink.
    pub fn flush(&self) -> Result<(), HilError> {
        match self.recorder.lock() {
            Ok(mut recorder) => recorder.flush(),
            Err(_) => Err(io::Error::other("recorder lock poisoned").into()),
        }
    }
}

impl<T: MessageTransport, W: Write + Send> MessageTransport for RecordingTransport<T, W> {
    fn attach(&mut self, inbound: InboundSender) -> Result<(), HilError> {
        self.inner.attach(inbound)
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn send(&self, envelope: OutboundEnvelope) -> Result<(), HilError> {
        if let Ok(mut recorder) = self.recorder.lock() {
            if let Err(e) = recorder.record(self.clock.now_us(), &envelope) {
                debug!(target: "hil_bridge::recorder", "failed to record {}: {}", envelope.message.name(), e);
            }
        }
        self.inner.send(envelope)
    }
}

impl<T: MessageTransport, W: Write + Send> Drop for RecordingTransport<T, W> {
    fn drop(&mut self) {
        if let Ok(mut recorder) = self.recorder.lock() {
            let frames = recorder.frame_count();
            if let Err(e) = recorder.flush() {
                debug!(target: "hil_bridge::recorder", "failed to flush recording: {}", e);
            }
            info!(target: "hil_bridge::recorder", "recorded {} frames", frames);
        }
    }
}
