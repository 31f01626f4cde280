//! Record-then-read acquisition.
//!
//! Capture happens in two phases. `record` fills the device buffer of one
//! channel and returns once the frames are committed. `read` then fetches
//! single frames by index, in any order. The image and black channels have
//! separate buffers; recording one never touches the other.

use tracing::{debug, info, warn};

use crate::channel::{CaptureChannel, CaptureRequest, ControlChannel};
use crate::error::{ControlError, ControlResult};
use crate::frame::Frame;
use crate::outcome::Outcome;
use crate::timing::TimingConfig;

/// A completed recording as acknowledged by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recording {
    /// Channel that was recorded.
    pub channel: CaptureChannel,
    /// Geometry and frame count that were requested.
    pub request: CaptureRequest,
    /// Frames the device reports as committed. May be lower than requested
    /// when the buffer cannot hold them all.
    pub frames: u32,
}

impl Recording {
    /// Frame width in samples.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.request.width
    }

    /// Frame height in samples.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.request.height
    }

    /// Whether the device committed fewer frames than requested.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.frames < self.request.frames
    }
}

/// Acquisition view over a borrowed channel.
pub struct AcquisitionPipeline<'a, C: ?Sized> {
    channel: &'a mut C,
}

impl<'a, C: ControlChannel + ?Sized> AcquisitionPipeline<'a, C> {
    /// Create a pipeline view.
    pub fn new(channel: &'a mut C) -> Self {
        Self { channel }
    }

    /// Record frames into the device buffer of `channel`.
    ///
    /// A rejected record leaves no usable frames. Earlier recordings on the
    /// same channel must be considered overwritten either way.
    pub async fn record(
        &mut self,
        channel: CaptureChannel,
        request: CaptureRequest,
    ) -> ControlResult<Outcome<Recording>> {
        debug!(
            %channel,
            width = request.width,
            height = request.height,
            frames = request.frames,
            "recording"
        );
        let outcome = self.channel.record(channel, request).await?;
        let Outcome::Accepted(frames) = outcome else {
            warn!(%channel, ?request, "record rejected");
            return Ok(Outcome::Rejected);
        };

        let recording = Recording {
            channel,
            request,
            frames,
        };
        if recording.is_truncated() {
            warn!(
                %channel,
                requested = request.frames,
                committed = frames,
                "device buffer holds fewer frames than requested"
            );
        } else {
            info!(%channel, frames, "recording committed");
        }
        Ok(Outcome::Accepted(recording))
    }

    /// Fetch one frame as raw bytes.
    pub async fn read(
        &mut self,
        channel: CaptureChannel,
        index: u32,
    ) -> ControlResult<Outcome<Vec<u8>>> {
        let outcome = self.channel.read(channel, index).await?;
        debug!(
            %channel,
            index,
            bytes = ?outcome.as_ref().value().map(Vec::len),
            "frame read"
        );
        Ok(outcome)
    }

    /// Fetch one frame of `recording` and check it against the recorded
    /// geometry. A buffer of the wrong length is a malformed response.
    pub async fn read_frame(
        &mut self,
        recording: &Recording,
        index: u32,
    ) -> ControlResult<Outcome<Frame>> {
        let operation = recording.channel.read_operation();
        let Outcome::Accepted(data) = self.read(recording.channel, index).await? else {
            return Ok(Outcome::Rejected);
        };
        let frame = Frame::from_bytes(
            recording.channel,
            index,
            recording.width(),
            recording.height(),
            data,
        )
        .map_err(|e| ControlError::malformed(operation, e.to_string()))?;
        Ok(Outcome::Accepted(frame))
    }

    /// Record, then read every committed frame in order.
    ///
    /// All or nothing: if the record or any read is rejected, no frames are
    /// returned.
    pub async fn record_all(
        &mut self,
        channel: CaptureChannel,
        request: CaptureRequest,
    ) -> ControlResult<Outcome<Vec<Frame>>> {
        let Outcome::Accepted(recording) = self.record(channel, request).await? else {
            return Ok(Outcome::Rejected);
        };

        let mut frames = Vec::with_capacity(recording.frames as usize);
        for index in 0..recording.frames {
            match self.read_frame(&recording, index).await? {
                Outcome::Accepted(frame) => frames.push(frame),
                Outcome::Rejected => {
                    warn!(%channel, index, "frame read rejected, discarding recording");
                    return Ok(Outcome::Rejected);
                }
            }
        }
        Ok(Outcome::Accepted(frames))
    }

    /// Program the timing generator, then record.
    ///
    /// Nothing is recorded when the timing configuration is rejected.
    pub async fn record_with_timing(
        &mut self,
        timing: TimingConfig,
        channel: CaptureChannel,
        request: CaptureRequest,
    ) -> ControlResult<Outcome<Recording>> {
        if self.channel.set_timing_generator(timing).await?.is_rejected() {
            warn!(?timing, %channel, "timing generator rejected, recording aborted");
            return Ok(Outcome::Rejected);
        }
        self.record(channel, request).await
    }
}
