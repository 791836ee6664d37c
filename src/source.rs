use std::io::{self, BufRead, Seek, SeekFrom};
use std::sync::Arc;

use memmap2::Mmap;
use stdcsv_core::{LineReader, LineResult};

use crate::record::RawText;

/// A supplier of physical lines.
pub(crate) trait LineSource {
    /// Replace `raw` with the next line. Returns `false` at the end of input.
    fn next_line(&mut self, raw: &mut RawText) -> io::Result<bool>;

    /// Extend `raw` with a line break followed by the next line.
    ///
    /// Returns the offset in `raw` at which the new line begins, or `None`
    /// at the end of input.
    fn append_continuation(
        &mut self,
        raw: &mut RawText,
    ) -> io::Result<Option<usize>>;

    /// Go back to the start of input.
    fn rewind(&mut self) -> io::Result<()>;

    /// Whether `rewind` is possible.
    fn is_rewindable(&self) -> bool;
}

/// Lines copied out of a buffered reader.
pub(crate) struct StreamSource<R> {
    rdr: R,
    core: LineReader,
    rewindable: bool,
}

impl<R: BufRead + Seek> StreamSource<R> {
    pub(crate) fn new(rdr: R, rewindable: bool) -> StreamSource<R> {
        StreamSource { rdr, core: LineReader::new(), rewindable }
    }

    /// Read one line into `buf` starting at `len`, growing `buf` as needed.
    ///
    /// Returns the new length of the text in `buf`.
    fn read_into(
        &mut self,
        buf: &mut Vec<u8>,
        mut len: usize,
    ) -> io::Result<Option<usize>> {
        loop {
            let (res, nin, nout) = {
                let input = match self.rdr.fill_buf() {
                    Ok(input) => input,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                self.core.read_line(input, &mut buf[len..])
            };
            self.rdr.consume(nin);
            len += nout;
            match res {
                LineResult::InputEmpty => continue,
                LineResult::OutputFull => grow(buf),
                LineResult::Line => return Ok(Some(len)),
                LineResult::End => return Ok(None),
            }
        }
    }
}

impl<R: BufRead + Seek> LineSource for StreamSource<R> {
    fn next_line(&mut self, raw: &mut RawText) -> io::Result<bool> {
        let (buf, len) = raw.owned_parts();
        *len = 0;
        match self.read_into(buf, 0)? {
            Some(n) => {
                *len = n;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn append_continuation(
        &mut self,
        raw: &mut RawText,
    ) -> io::Result<Option<usize>> {
        let (buf, len) = raw.owned_parts();
        if buf.len() <= *len {
            grow(buf);
        }
        buf[*len] = b'\n';
        let start = *len + 1;
        match self.read_into(buf, start)? {
            Some(n) => {
                *len = n;
                Ok(Some(start))
            }
            None => Ok(None),
        }
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.rdr.seek(SeekFrom::Start(0))?;
        self.core.reset();
        Ok(())
    }

    fn is_rewindable(&self) -> bool {
        self.rewindable
    }
}

fn grow(buf: &mut Vec<u8>) {
    let new_len = (buf.len() * 2).max(128);
    buf.resize(new_len, 0);
}

/// Adapts a reader that can't seek, like stdin or a pipe.
pub(crate) struct NoSeek<R>(pub(crate) R);

impl<R: io::Read> io::Read for NoSeek<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R: BufRead> BufRead for NoSeek<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.0.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.0.consume(amt)
    }
}

impl<R> Seek for NoSeek<R> {
    fn seek(&mut self, _: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "input cannot be rewound",
        ))
    }
}

/// Lines borrowed from a memory mapped file.
///
/// Only `\n` ends a line; a `\r` right before it is dropped from the line.
pub(crate) struct MmapSource {
    /// `None` for an empty file, which can't be mapped everywhere.
    map: Option<Arc<Mmap>>,
    pos: usize,
}

impl MmapSource {
    pub(crate) fn new(map: Option<Mmap>) -> MmapSource {
        MmapSource { map: map.map(Arc::new), pos: 0 }
    }

    /// Find the line starting at `from`, returning the end of its content
    /// and the start of the line after it.
    fn line_at(map: &[u8], from: usize) -> (usize, usize) {
        let (mut end, next) = match memchr::memchr(b'\n', &map[from..]) {
            Some(i) => (from + i, from + i + 1),
            None => (map.len(), map.len()),
        };
        if end > from && map[end - 1] == b'\r' {
            end -= 1;
        }
        (end, next)
    }
}

impl LineSource for MmapSource {
    fn next_line(&mut self, raw: &mut RawText) -> io::Result<bool> {
        let map = match self.map {
            Some(ref map) if self.pos < map.len() => map,
            _ => return Ok(false),
        };
        let (end, next) = MmapSource::line_at(map, self.pos);
        *raw = RawText::Mapped { map: Arc::clone(map), start: self.pos, end };
        self.pos = next;
        Ok(true)
    }

    fn append_continuation(
        &mut self,
        raw: &mut RawText,
    ) -> io::Result<Option<usize>> {
        let map = match self.map {
            Some(ref map) if self.pos < map.len() => map,
            _ => return Ok(None),
        };
        let (start, end) = match *raw {
            RawText::Mapped { start, ref mut end, .. } => (start, end),
            RawText::Owned { .. } => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "record text does not belong to this map",
                ));
            }
        };
        let (line_end, next) = MmapSource::line_at(map, self.pos);
        let offset = self.pos - start;
        *end = line_end;
        self.pos = next;
        Ok(Some(offset))
    }

    fn rewind(&mut self) -> io::Result<()> {
        self.pos = 0;
        Ok(())
    }

    fn is_rewindable(&self) -> bool {
        true
    }
}

/// A source with no lines at all, for readers that only `parse`.
pub(crate) struct EmptySource;

impl LineSource for EmptySource {
    fn next_line(&mut self, _: &mut RawText) -> io::Result<bool> {
        Ok(false)
    }

    fn append_continuation(
        &mut self,
        _: &mut RawText,
    ) -> io::Result<Option<usize>> {
        Ok(None)
    }

    fn rewind(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn is_rewindable(&self) -> bool {
        false
    }
}
