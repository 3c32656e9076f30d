//! Incremental UTF-8 decoding of network chunks.

use std::borrow::Cow;

/// Converts byte chunks to text without splitting multi-byte characters.
///
/// Bytes that could still start a valid sequence are held back until the next
/// chunk. Invalid sequences are replaced with U+FFFD, both mid-stream and in
/// [`Utf8ChunkDecoder::finish`]; nothing is dropped silently.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    /// Decodes one chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let joined: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            let mut buf = std::mem::take(&mut self.pending);
            buf.extend_from_slice(chunk);
            Cow::Owned(buf)
        };

        let mut out = String::with_capacity(joined.len());
        let mut rest: &[u8] = &joined;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes held-back bytes at end of stream.
    ///
    /// A truncated trailing sequence becomes a single U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    /// Number of bytes currently held back.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_in_pieces(bytes: &[u8], split: usize) -> String {
        let mut decoder = Utf8ChunkDecoder::default();
        let mut out = decoder.decode(&bytes[..split]);
        out.push_str(&decoder.decode(&bytes[split..]));
        out.push_str(&decoder.finish());
        out
    }

    #[test]
    fn holds_back_split_multibyte_characters() {
        let text = "面试题：自我介绍 ✓";
        let bytes = text.as_bytes();
        for split in 0..=bytes.len() {
            assert_eq!(decode_in_pieces(bytes, split), text, "split at {split}");
        }
    }

    #[test]
    fn retains_only_the_incomplete_tail() {
        let mut decoder = Utf8ChunkDecoder::default();
        let bytes = "ok好".as_bytes();
        assert_eq!(decoder.decode(&bytes[..3]), "ok");
        assert_eq!(decoder.pending_len(), 1);
        assert_eq!(decoder.decode(&bytes[3..]), "好");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn truncated_tail_is_substituted_on_finish() {
        let mut decoder = Utf8ChunkDecoder::default();
        assert_eq!(decoder.decode(b"end\xE5\xA5"), "end");
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn invalid_bytes_mid_stream_are_substituted() {
        let bytes = b"a\xFFb\xE5\xA5c";
        let whole = {
            let mut decoder = Utf8ChunkDecoder::default();
            let mut out = decoder.decode(bytes);
            out.push_str(&decoder.finish());
            out
        };
        assert_eq!(whole, "a\u{FFFD}b\u{FFFD}c");
        for split in 0..=bytes.len() {
            assert_eq!(decode_in_pieces(bytes, split), whole, "split at {split}");
        }
    }
}
