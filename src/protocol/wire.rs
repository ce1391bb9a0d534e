//! Wire format of a stream message
//!
//! All integers are little-endian.
//!
//! ```text
//! offset            size        field
//! 0                 5           "VIDEO"
//! 5                 4           video_len   (index + width + height + image)
//! 9                 4           frame index
//! 13                4           width
//! 17                4           height
//! 21                video_len-12  encoded image
//! 9+video_len       5           "AUDIO"
//! 14+video_len      4           audio_len
//! 18+video_len      audio_len   pcm16le
//! ```
//!
//! The parser reads this table and nothing else; offsets are never derived
//! ad hoc in the code below.

use bytes::{BufMut, Bytes, BytesMut};

use super::{AudioChunk, VideoFrame};
use crate::error::ProtocolError;

/// A fixed-size field at a known offset from the start of its block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: usize,
    pub len: usize,
}

impl Field {
    const fn new(name: &'static str, offset: usize, len: usize) -> Self {
        Self { name, offset, len }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    fn slice<'a>(&self, buf: &'a [u8], base: usize) -> Result<&'a [u8], ProtocolError> {
        let start = base + self.offset;
        let end = start + self.len;
        buf.get(start..end).ok_or(ProtocolError::LengthOutOfBounds {
            field: self.name,
            end,
            len: buf.len(),
        })
    }

    fn read_u32(&self, buf: &[u8], base: usize) -> Result<u32, ProtocolError> {
        let bytes = self.slice(buf, base)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

pub const TAG_LEN: usize = 5;
pub const VIDEO_TAG: &[u8; TAG_LEN] = b"VIDEO";
pub const AUDIO_TAG: &[u8; TAG_LEN] = b"AUDIO";

/// Video block, relative to the start of the message
pub const VIDEO_TAG_FIELD: Field = Field::new("video tag", 0, TAG_LEN);
pub const VIDEO_LEN: Field = Field::new("video length", 5, 4);
pub const FRAME_INDEX: Field = Field::new("frame index", 9, 4);
pub const FRAME_WIDTH: Field = Field::new("frame width", 13, 4);
pub const FRAME_HEIGHT: Field = Field::new("frame height", 17, 4);

/// `video_len` is counted from here
pub const VIDEO_BODY_START: usize = VIDEO_LEN.end();
/// Index, width and height precede the image inside `video_len`
pub const FRAME_HEADER_LEN: usize = FRAME_HEIGHT.end() - VIDEO_BODY_START;
pub const IMAGE_START: usize = FRAME_HEIGHT.end();

/// Audio block, relative to the end of the video block
pub const AUDIO_TAG_FIELD: Field = Field::new("audio tag", 0, TAG_LEN);
pub const AUDIO_LEN: Field = Field::new("audio length", 5, 4);
pub const AUDIO_BODY_START: usize = AUDIO_LEN.end();

/// Smallest possible message: both headers with empty payloads
pub const MIN_MESSAGE_LEN: usize = IMAGE_START + AUDIO_BODY_START;

/// Split one message into its video frame and audio chunk.
///
/// Fails if the message is shorter than the headers, if a length field points
/// past the end of the message, or if the frame has a zero dimension. A tag
/// mismatch is only logged.
pub fn demux(message: Bytes) -> Result<(VideoFrame, AudioChunk), ProtocolError> {
    let buf = message.as_ref();
    if buf.len() < MIN_MESSAGE_LEN {
        return Err(ProtocolError::Truncated {
            needed: MIN_MESSAGE_LEN,
            len: buf.len(),
        });
    }

    check_tag(VIDEO_TAG_FIELD.slice(buf, 0)?, VIDEO_TAG);
    let video_len = VIDEO_LEN.read_u32(buf, 0)?;
    if (video_len as usize) < FRAME_HEADER_LEN {
        return Err(ProtocolError::VideoLengthTooShort(video_len));
    }
    let index = FRAME_INDEX.read_u32(buf, 0)?;
    let width = FRAME_WIDTH.read_u32(buf, 0)?;
    let height = FRAME_HEIGHT.read_u32(buf, 0)?;
    if width == 0 || height == 0 {
        return Err(ProtocolError::InvalidDimensions { width, height });
    }

    let image_end = body_end(VIDEO_BODY_START, video_len as usize, "encoded image", buf.len())?;

    let audio_base = image_end;
    check_tag(AUDIO_TAG_FIELD.slice(buf, audio_base)?, AUDIO_TAG);
    let audio_len = AUDIO_LEN.read_u32(buf, audio_base)? as usize;
    let audio_start = audio_base + AUDIO_BODY_START;
    let audio_end = body_end(audio_start, audio_len, "audio payload", buf.len())?;

    let frame = VideoFrame::new(index, width, height, message.slice(IMAGE_START..image_end));
    let audio = AudioChunk::from_payload(&buf[audio_start..audio_end]);
    Ok((frame, audio))
}

/// End of a body of `len` bytes starting at `start`, if it fits in the message.
/// Lengths come off the wire, so the addition itself may overflow.
fn body_end(
    start: usize,
    len: usize,
    field: &'static str,
    message_len: usize,
) -> Result<usize, ProtocolError> {
    match start.checked_add(len) {
        Some(end) if end <= message_len => Ok(end),
        end => Err(ProtocolError::LengthOutOfBounds {
            field,
            end: end.unwrap_or(usize::MAX),
            len: message_len,
        }),
    }
}

fn check_tag(found: &[u8], expected: &[u8; TAG_LEN]) {
    if found != expected {
        tracing::warn!(
            "Unexpected tag {:?}, expected {:?}",
            String::from_utf8_lossy(found),
            String::from_utf8_lossy(expected)
        );
    }
}

/// Encode a frame and audio chunk into one message using the layout above
pub fn encode(frame: &VideoFrame, audio: &AudioChunk) -> Bytes {
    let image = &frame.encoded_image;
    let pcm = audio.pcm();
    let mut buf = BytesMut::with_capacity(MIN_MESSAGE_LEN + image.len() + pcm.len());

    buf.put_slice(VIDEO_TAG);
    buf.put_u32_le((FRAME_HEADER_LEN + image.len()) as u32);
    buf.put_u32_le(frame.index);
    buf.put_u32_le(frame.width);
    buf.put_u32_le(frame.height);
    buf.put_slice(image);

    buf.put_slice(AUDIO_TAG);
    buf.put_u32_le(pcm.len() as u32);
    buf.put_slice(pcm);

    buf.freeze()
}
