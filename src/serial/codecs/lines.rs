use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::serial::error::SerialPortError;

/// Splits incoming bytes on a delimiter character.
///
/// Anything after the last delimiter stays in the source buffer
/// until more bytes arrive.
#[derive(Debug, Clone)]
pub struct LinesCodec {
    /// How far we have looked for a newline into the buffer
    cursor: usize,

    /// How to delimit incoming byte streams.
    /// This delimiter is not included in the yielded frames.
    read_delimiter: u8,

    /// How many bytes we hold on to while waiting for a delimiter.
    max_length: usize,
}

impl LinesCodec {
    /// Create a new codec.
    pub fn new(read_delimiter: u8, max_length: usize) -> Self {
        Self {
            cursor: 0,
            read_delimiter,
            max_length,
        }
    }

    /// Newline delimited, giving up on lines longer than `max_length`.
    pub fn with_max_length(max_length: usize) -> Self {
        Self::new(b'\n', max_length)
    }
}

impl Default for LinesCodec {
    fn default() -> Self {
        Self::with_max_length(4096)
    }
}

impl Decoder for LinesCodec {
    type Item = Vec<u8>;
    type Error = SerialPortError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let read_to = src.len();

        let look_at = &src[self.cursor..read_to];

        if let Some(position) = look_at.iter().position(|&byte| byte == self.read_delimiter) {
            // Since we might "start late" in the buffer (from the cursor),
            // the "global" position within the buffer has to be calculated.
            let actual_position = self.cursor + position;

            // Next time we need to start over.
            self.cursor = 0;

            // Split at the delimiter, getting a slice of the bytes before it.
            let line = src.split_to(actual_position);

            // Discard the newline by advancing the source buffer beyond it.
            src.advance(1);

            Ok(Some(line[..].to_vec()))
        } else if read_to > self.max_length {
            // The device is not sending lines, or we lost sync.
            // Drop what we have and start fresh.
            src.clear();
            self.cursor = 0;

            Err(SerialPortError::LineTooLong(self.max_length))
        } else {
            // Since our job is to find the delimiter, we don't need to re-read the bytes we have already looked at.
            self.cursor = read_to;

            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn decode_all(codec: &mut LinesCodec, src: &mut BytesMut) -> Vec<Vec<u8>> {
        let mut lines = vec![];
        while let Some(line) = codec.decode(src).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn splits_on_newline() {
        let mut codec = LinesCodec::default();
        let mut src = BytesMut::from(&b"one\ntwo\nthr"[..]);

        let lines = decode_all(&mut codec, &mut src);

        assert_eq!(lines, vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(&src[..], b"thr");
    }

    #[test]
    fn partial_line_completes_later() {
        let mut codec = LinesCodec::default();
        let mut src = BytesMut::from(&b"Fan A sp"[..]);

        assert!(codec.decode(&mut src).unwrap().is_none());

        src.extend_from_slice(b"eed 5\r\nFan");

        assert_eq!(
            codec.decode(&mut src).unwrap(),
            Some(b"Fan A speed 5\r".to_vec())
        );
        assert!(codec.decode(&mut src).unwrap().is_none());
        assert_eq!(&src[..], b"Fan");
    }

    #[test]
    fn empty_lines_are_still_frames() {
        let mut codec = LinesCodec::default();
        let mut src = BytesMut::from(&b"\n\nx\n"[..]);

        let lines = decode_all(&mut codec, &mut src);

        assert_eq!(lines, vec![vec![], vec![], b"x".to_vec()]);
    }

    #[test]
    fn too_long_is_discarded_and_recovers() {
        let mut codec = LinesCodec::with_max_length(8);
        let mut src = BytesMut::from(&b"0123456789"[..]);

        assert!(matches!(
            codec.decode(&mut src),
            Err(SerialPortError::LineTooLong(8))
        ));
        assert!(src.is_empty());

        src.extend_from_slice(b"ok\n");
        assert_eq!(codec.decode(&mut src).unwrap(), Some(b"ok".to_vec()));
    }
}
