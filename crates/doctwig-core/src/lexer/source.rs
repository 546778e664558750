//! Streaming character source with late charset selection
//!
//! Bytes are held back until a charset is committed. While the lexer is
//! still inside a leading `<?xml ...?>` declaration, bytes are handed out
//! one at a time as Latin-1 characters so the declaration can be read
//! before the decoder exists. Once [`CharSource::commit`] picks the
//! charset, all remaining bytes go through an `encoding_rs` decoder.

use std::io::{self, Read};

use encoding_rs::{CoderResult, Decoder, Encoding};

const CHUNK: usize = 8 * 1024;

pub(crate) struct CharSource<R> {
    reader: R,
    buf: String,
    raw: Vec<u8>,
    raw_pos: usize,
    decoder: Option<Decoder>,
    encoding: Option<&'static Encoding>,
    eof: bool,
    chunk: Vec<u8>,
}

impl<R: Read> CharSource<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            buf: String::new(),
            raw: Vec::new(),
            raw_pos: 0,
            decoder: None,
            encoding: None,
            eof: false,
            chunk: vec![0; CHUNK],
        }
    }

    /// Undecoded bytes at the start of the input, at least `n` unless the
    /// input is shorter
    pub(crate) fn sniff(&mut self, n: usize) -> io::Result<&[u8]> {
        while self.raw.len() - self.raw_pos < n && !self.eof {
            let read = self.read_chunk()?;
            if read == 0 {
                self.eof = true;
            }
        }
        Ok(&self.raw[self.raw_pos..])
    }

    /// Fix the charset of the remaining input; later calls are ignored
    pub(crate) fn commit(&mut self, encoding: &'static Encoding) {
        if self.decoder.is_some() {
            return;
        }
        tracing::debug!(charset = encoding.name(), "charset committed");
        let mut decoder = encoding.new_decoder_without_bom_handling();
        let pending = std::mem::take(&mut self.raw);
        decode_into(&mut decoder, &pending[self.raw_pos..], &mut self.buf, self.eof);
        self.raw_pos = 0;
        self.decoder = Some(decoder);
        self.encoding = Some(encoding);
    }

    pub(crate) fn is_committed(&self) -> bool {
        self.decoder.is_some()
    }

    pub(crate) fn encoding(&self) -> Option<&'static Encoding> {
        self.encoding
    }

    /// Decoded characters so far
    pub(crate) fn buffer(&self) -> &str {
        &self.buf
    }

    pub(crate) fn into_buffer(self) -> String {
        self.buf
    }

    /// Make sure byte `index` of the decoded buffer exists; false at end of input
    pub(crate) fn ensure(&mut self, index: usize) -> io::Result<bool> {
        while self.buf.len() <= index {
            if !self.fill()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Byte at `index` of the decoded buffer, reading more input as needed
    pub(crate) fn byte_at(&mut self, index: usize) -> io::Result<Option<u8>> {
        if self.ensure(index)? {
            Ok(Some(self.buf.as_bytes()[index]))
        } else {
            Ok(None)
        }
    }

    /// Character starting at byte `index`
    pub(crate) fn char_at(&mut self, index: usize) -> io::Result<Option<char>> {
        // A UTF-8 sequence is at most four bytes; pull them all in first
        for i in index..index + 4 {
            if !self.ensure(i)? {
                break;
            }
        }
        Ok(self.buf.get(index..).and_then(|s| s.chars().next()))
    }

    fn fill(&mut self) -> io::Result<bool> {
        let Some(decoder) = self.decoder.as_mut() else {
            if self.raw_pos >= self.raw.len() && (self.eof || self.read_chunk()? == 0) {
                self.eof = true;
                return Ok(false);
            }
            let byte = self.raw[self.raw_pos];
            self.raw_pos += 1;
            self.buf.push(char::from(byte));
            return Ok(true);
        };
        if self.eof {
            return Ok(false);
        }
        let read = loop {
            match self.reader.read(&mut self.chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        if read == 0 {
            self.eof = true;
            let before = self.buf.len();
            decode_into(decoder, &[], &mut self.buf, true);
            return Ok(self.buf.len() > before);
        }
        decode_into(decoder, &self.chunk[..read], &mut self.buf, false);
        Ok(true)
    }

    fn read_chunk(&mut self) -> io::Result<usize> {
        let read = loop {
            match self.reader.read(&mut self.chunk) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        if self.raw_pos > 0 && self.raw_pos == self.raw.len() {
            self.raw.clear();
            self.raw_pos = 0;
        }
        self.raw.extend_from_slice(&self.chunk[..read]);
        Ok(read)
    }
}

fn decode_into(decoder: &mut Decoder, mut src: &[u8], dst: &mut String, last: bool) {
    loop {
        let needed = decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or(src.len() * 3 + 16);
        dst.reserve(needed);
        let (result, read, _) = decoder.decode_to_string(src, dst, last);
        src = &src[read..];
        match result {
            CoderResult::InputEmpty => break,
            CoderResult::OutputFull => continue,
        }
    }
}
