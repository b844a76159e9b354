use std::time::Duration;

use super::roi::jpeg_data_uri;

/// One cropped, JPEG-encoded sample.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedFrame {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Position of the sample relative to the start of the capture.
    pub offset: Duration,
}

impl EncodedFrame {
    pub fn data_uri(&self) -> String {
        jpeg_data_uri(&self.jpeg)
    }
}

/// Temporally ordered, bounded sequence of encoded samples.
///
/// Consumed by value so a buffer is handed to the diagnosis step exactly once.
#[derive(Clone, Debug)]
pub struct FrameBuffer {
    frames: Vec<EncodedFrame>,
    capacity: usize,
}

impl FrameBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: Vec::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    /// Appends `frame`. Returns `false` when the buffer is full or the frame
    /// would break temporal order; the frame is dropped in both cases.
    pub fn push(&mut self, frame: EncodedFrame) -> bool {
        if self.is_full() {
            return false;
        }
        if let Some(last) = self.frames.last() {
            if frame.offset < last.offset {
                log::warn!(
                    "dropping out-of-order frame at {:?} (last was {:?})",
                    frame.offset,
                    last.offset
                );
                return false;
            }
        }
        self.frames.push(frame);
        true
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn frames(&self) -> &[EncodedFrame] {
        &self.frames
    }

    /// Time covered from the first to the last sample.
    pub fn span(&self) -> Duration {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.offset.saturating_sub(first.offset),
            _ => Duration::ZERO,
        }
    }

    pub fn into_frames(self) -> Vec<EncodedFrame> {
        self.frames
    }
}
