/// The result of splitting at most one line from input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineResult {
    /// The caller provided input was exhausted before the end of a line was
    /// found. Call again with more input.
    InputEmpty,
    /// The caller provided output buffer was filled before the entire line
    /// could be copied into it. Grow the buffer and call again with the
    /// remaining input.
    OutputFull,
    /// The end of a line was found. The terminator is not copied.
    Line,
    /// All input has been read.
    ///
    /// This is only returned when an empty input buffer is given and no
    /// partial line is pending.
    End,
}

/// A pull based line splitter.
///
/// `\n`, `\r` and `\r\n` are each treated as a single line terminator, even
/// when the `\r` and `\n` of a CRLF pair arrive in different input buffers.
///
/// An empty input buffer signals the end of input. A final line without a
/// terminator is still reported as a line, but a document that ends with a
/// terminator does not produce an extra empty line.
///
/// ```
/// use stdcsv_core::{LineReader, LineResult};
///
/// let mut rdr = LineReader::new();
/// let mut out = [0; 16];
/// let input = b"a,b\r\nc,d";
///
/// let (res, nin, nout) = rdr.read_line(input, &mut out);
/// assert_eq!((res, nin, &out[..nout]), (LineResult::Line, 5, &b"a,b"[..]));
///
/// let (res, nin2, nout) = rdr.read_line(&input[nin..], &mut out);
/// assert_eq!((res, &out[..nout]), (LineResult::InputEmpty, &b"c,d"[..]));
/// assert_eq!(nin + nin2, input.len());
///
/// assert_eq!(rdr.read_line(b"", &mut out[3..]), (LineResult::Line, 0, 0));
/// assert_eq!(rdr.read_line(b"", &mut out), (LineResult::End, 0, 0));
/// ```
#[derive(Clone, Debug, Default)]
pub struct LineReader {
    /// Set after a line ended in `\r`, so that an immediately following
    /// `\n` is swallowed.
    pending_cr: bool,
    /// Whether some bytes of the current line have been seen.
    in_line: bool,
    /// The number of complete lines read so far.
    line: u64,
}

impl LineReader {
    /// Create a new line splitter.
    pub fn new() -> LineReader {
        LineReader::default()
    }

    /// Reset the splitter to its initial state.
    ///
    /// Call this after rewinding the underlying input.
    pub fn reset(&mut self) {
        *self = LineReader::default();
    }

    /// The number of lines returned so far.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// Copy bytes of the current line from `input` to `output`.
    ///
    /// Returns the result along with the number of bytes read from `input`
    /// and written to `output`. Output for a single line accumulates across
    /// calls that return `InputEmpty` or `OutputFull`, so callers should
    /// pass the unwritten tail of their buffer each time.
    pub fn read_line(
        &mut self,
        input: &[u8],
        output: &mut [u8],
    ) -> (LineResult, usize, usize) {
        if input.is_empty() {
            self.pending_cr = false;
            if self.in_line {
                self.in_line = false;
                self.line += 1;
                return (LineResult::Line, 0, 0);
            }
            return (LineResult::End, 0, 0);
        }

        let mut nin = 0;
        if self.pending_cr {
            self.pending_cr = false;
            if input[0] == b'\n' {
                nin = 1;
            }
        }
        let rest = &input[nin..];
        match memchr::memchr2(b'\n', b'\r', rest) {
            Some(i) if i <= output.len() => {
                output[..i].copy_from_slice(&rest[..i]);
                let mut used = i + 1;
                if rest[i] == b'\r' {
                    match rest.get(used) {
                        Some(&b'\n') => used += 1,
                        Some(_) => {}
                        None => self.pending_cr = true,
                    }
                }
                self.in_line = false;
                self.line += 1;
                (LineResult::Line, nin + used, i)
            }
            found => {
                let avail = found.unwrap_or(rest.len());
                let n = avail.min(output.len());
                output[..n].copy_from_slice(&rest[..n]);
                if n > 0 {
                    self.in_line = true;
                }
                if n < avail {
                    (LineResult::OutputFull, nin + n, n)
                } else {
                    (LineResult::InputEmpty, nin + n, n)
                }
            }
        }
    }
}
