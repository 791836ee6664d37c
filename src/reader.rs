use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;

use memmap2::Mmap;
use stdcsv_core::{
    sniff_delimiter, Delimiter, FieldRules, Quotes, Scan, ScannerSet,
};

use crate::context::Context;
use crate::error::{Error, IoResultExt, Result};
use crate::record::Record;
use crate::source::{EmptySource, LineSource, MmapSource, NoSeek, StreamSource};

/// The default maximum number of extra lines a single quoted field may
/// span.
pub const DEFAULT_MAX_CONTINUATIONS: usize = 40;

/// How to make records the same length.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Normalize {
    /// Records keep however many fields they have.
    Off,
    /// Every record is padded with empty fields or truncated to exactly
    /// this many fields.
    Fixed(usize),
    /// The first record of each document sets the length for the rest of
    /// that document.
    FirstRecord,
}

impl Default for Normalize {
    fn default() -> Normalize {
        Normalize::Off
    }
}

/// Everything that can be configured on a reader.
///
/// Most callers should use [`ReaderBuilder`], which starts from
/// `ReaderConfig::default()`.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReaderConfig {
    /// The field delimiter. When absent, one is sniffed from the first
    /// line of each document.
    pub delimiter: Option<Vec<u8>>,
    /// The quoting convention to start with.
    pub quotes: Quotes,
    /// What a line break inside a quoted field is replaced with.
    pub embedded_break: Vec<u8>,
    /// Whether and how records are made the same length.
    pub normalize: Normalize,
    /// Whether leading and trailing whitespace is removed from fields.
    pub trim: bool,
    /// Whether to fall back to a more lenient quoting convention and start
    /// over when the input breaks the current one.
    pub failsafe: bool,
    /// How many extra lines a single quoted field may span.
    pub max_continuations: usize,
}

impl Default for ReaderConfig {
    fn default() -> ReaderConfig {
        ReaderConfig {
            delimiter: None,
            quotes: Quotes::Rfc4180,
            embedded_break: b"\n".to_vec(),
            normalize: Normalize::Off,
            trim: false,
            failsafe: false,
            max_continuations: DEFAULT_MAX_CONTINUATIONS,
        }
    }
}

/// Builds a reader with various configuration knobs.
///
/// This builder can be used to tweak the delimiter, the quoting convention
/// and more. Once a reader is built, its configuration cannot be changed,
/// except for the delimiter and the embedded break text.
#[derive(Debug, Default)]
pub struct ReaderBuilder {
    config: ReaderConfig,
    ctx: Option<Context>,
}

impl ReaderBuilder {
    /// Create a new builder for configuring readers.
    ///
    /// To convert a builder into a reader, call one of the methods starting
    /// with `from_`, or `build` for a reader that only parses text given to
    /// it directly.
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Create a builder from a complete configuration.
    ///
    /// An empty delimiter is rejected with `Error::InvalidOperation`.
    pub fn from_config(config: ReaderConfig) -> Result<ReaderBuilder> {
        if config.delimiter.as_ref().map_or(false, |d| d.is_empty()) {
            return Err(Error::InvalidOperation("empty delimiter"));
        }
        Ok(ReaderBuilder { config, ctx: None })
    }

    /// The field delimiter to use when parsing.
    ///
    /// Delimiters may be longer than one byte. When no delimiter is given,
    /// the first line of the input is used to pick one of `,`, `|`, `\t`,
    /// `;` or `:`.
    ///
    /// # Panics
    ///
    /// When `delimiter` is empty.
    pub fn delimiter(&mut self, delimiter: &[u8]) -> &mut ReaderBuilder {
        assert!(!delimiter.is_empty(), "delimiter must not be empty");
        self.config.delimiter = Some(delimiter.to_vec());
        self
    }

    /// The quoting convention to start reading with.
    ///
    /// This is `Quotes::Rfc4180` by default.
    pub fn quotes(&mut self, quotes: Quotes) -> &mut ReaderBuilder {
        self.config.quotes = quotes;
        self
    }

    /// The text that replaces a line break inside a quoted field.
    ///
    /// This is `\n` by default.
    pub fn embedded_break(&mut self, text: &[u8]) -> &mut ReaderBuilder {
        self.config.embedded_break = text.to_vec();
        self
    }

    /// Make every record the same length.
    ///
    /// This is `Normalize::Off` by default.
    pub fn normalize(&mut self, normalize: Normalize) -> &mut ReaderBuilder {
        self.config.normalize = normalize;
        self
    }

    /// Remove leading and trailing ASCII whitespace from every field.
    ///
    /// Whitespace inside quotes is removed as well. This is disabled by
    /// default.
    pub fn trim(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.config.trim = yes;
        self
    }

    /// Recover from input that breaks the quoting convention.
    ///
    /// When enabled and the input can be rewound, a violation makes the
    /// reader switch to the next more lenient convention (`Rfc4180` to
    /// `Weak` to `None`) and start over from the first line. The caller is
    /// told through `ReadResult::Restart` and should discard every record
    /// it has seen so far.
    ///
    /// This is disabled by default.
    pub fn failsafe(&mut self, yes: bool) -> &mut ReaderBuilder {
        self.config.failsafe = yes;
        self
    }

    /// The maximum number of extra lines a quoted field may span.
    ///
    /// This is 40 by default.
    pub fn max_continuations(&mut self, max: usize) -> &mut ReaderBuilder {
        self.config.max_continuations = max;
        self
    }

    /// The context that receives diagnostics.
    ///
    /// By default, every reader gets a context of its own.
    pub fn context(&mut self, ctx: Context) -> &mut ReaderBuilder {
        self.ctx = Some(ctx);
        self
    }

    /// Build a reader with no input, for use with [`Reader::parse`].
    pub fn build(&self) -> Reader {
        self.reader(Box::new(EmptySource), "<text>".to_string())
    }

    /// Build a reader over the file at the given path.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Reader> {
        let path = path.as_ref();
        let file = self.open(path)?;
        log::debug!("reading {}", path.display());
        let src = StreamSource::new(BufReader::new(file), true);
        Ok(self.reader(Box::new(src), path.display().to_string()))
    }

    /// Build a reader over a memory map of the file at the given path.
    ///
    /// Lines are read without copying. Only `\n` ends a line in this mode
    /// (a `\r` right before it is dropped).
    pub fn from_path_mmap<P: AsRef<Path>>(&self, path: P) -> Result<Reader> {
        let path = path.as_ref();
        let file = self.open(path)?;
        let len = file
            .metadata()
            .with_context(|| format!("stat {}", path.display()))
            .map_err(|err| self.report(err))?
            .len();
        let map = if len == 0 {
            None
        } else {
            // SAFETY: the map is only ever read. Like any reader of a
            // file, we assume nobody truncates it while we hold it.
            let map = unsafe { Mmap::map(&file) }
                .with_context(|| format!("mmap {}", path.display()))
                .map_err(|err| self.report(err))?;
            Some(map)
        };
        log::debug!("mapped {} ({} bytes)", path.display(), len);
        let src = MmapSource::new(map);
        Ok(self.reader(Box::new(src), path.display().to_string()))
    }

    /// Build a reader over any `io::Read`.
    ///
    /// The input is buffered for you. It is assumed not to be seekable, so
    /// `failsafe` has no effect.
    pub fn from_reader<R: Read + 'static>(&self, rdr: R) -> Reader {
        let src = StreamSource::new(NoSeek(BufReader::new(rdr)), false);
        self.reader(Box::new(src), "<reader>".to_string())
    }

    /// Build a reader over an input that can be rewound.
    pub fn from_seekable<R: Read + Seek + 'static>(&self, rdr: R) -> Reader {
        let src = StreamSource::new(BufReader::new(rdr), true);
        self.reader(Box::new(src), "<reader>".to_string())
    }

    /// Build a reader over stdin.
    pub fn from_stdin(&self) -> Reader {
        let src = StreamSource::new(NoSeek(io::stdin().lock()), false);
        self.reader(Box::new(src), "<stdin>".to_string())
    }

    fn open(&self, path: &Path) -> Result<File> {
        File::open(path)
            .with_context(|| format!("open {}", path.display()))
            .map_err(|err| self.report(err))
    }

    /// Fatal errors while opening go to the context the reader would have
    /// used, when one was given.
    fn report(&self, err: Error) -> Error {
        if let Some(ref ctx) = self.ctx {
            ctx.push_diagnostic(err.to_string());
        }
        err
    }

    fn reader(&self, source: Box<dyn LineSource>, name: String) -> Reader {
        let config = self.config.clone();
        let delimiter = match config.delimiter {
            Some(ref d) => Delimiter::new(d),
            None => Delimiter::default(),
        };
        Reader {
            core: RecordScanner {
                rules: FieldRules { delimiter, trim: config.trim },
                sniff: config.delimiter.is_none(),
                quotes: config.quotes,
                normalize: config.normalize,
                scanners: ScannerSet::new(),
                embedded_break: config.embedded_break.clone(),
                max_continuations: config.max_continuations,
                rows: 0,
                embedded_breaks: 0,
            },
            config,
            source,
            ctx: self.ctx.clone().unwrap_or_default(),
            name,
        }
    }
}

/// What `Reader::read_record` found.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadResult {
    /// A record was read.
    Record,
    /// The input broke the quoting convention, and the reader is starting
    /// over from the first line with the convention given. Every record
    /// read so far should be discarded.
    Restart(Quotes),
    /// There are no more records.
    End,
}

/// A reader of delimited text.
///
/// Records are read one at a time into a caller supplied [`Record`], which
/// is reused to avoid allocation.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use stdcsv::{ReadResult, ReaderBuilder, Record};
///
/// let data = "name|note\nwidget|\"says \"\"hi\"\"\"\n";
/// let mut rdr = ReaderBuilder::new().from_seekable(Cursor::new(data));
/// let mut rec = Record::new();
///
/// assert_eq!(rdr.read_record(&mut rec)?, ReadResult::Record);
/// assert_eq!(rec, vec!["name", "note"]);
/// assert_eq!(rdr.delimiter(), Some(&b"|"[..]));
///
/// assert_eq!(rdr.read_record(&mut rec)?, ReadResult::Record);
/// assert_eq!(rec, vec!["widget", "says \"hi\""]);
///
/// assert_eq!(rdr.read_record(&mut rec)?, ReadResult::End);
/// assert_eq!(rdr.row_count(), 2);
/// # Ok::<(), stdcsv::Error>(())
/// ```
pub struct Reader {
    core: RecordScanner,
    config: ReaderConfig,
    source: Box<dyn LineSource>,
    ctx: Context,
    name: String,
}

impl Reader {
    /// Read the next record into `rec`.
    ///
    /// Returns `ReadResult::End` once the input is exhausted. At that point
    /// the normalization setting is restored, so reading another document
    /// after `reset` locks its own record length.
    ///
    /// When the input breaks the quoting rules, the outcome depends on the
    /// `failsafe` setting. If it is enabled and the input can be rewound,
    /// `ReadResult::Restart` is returned and the next call reads the first
    /// record again. Otherwise a diagnostic is pushed to the context and the
    /// error is returned.
    pub fn read_record(&mut self, rec: &mut Record) -> Result<ReadResult> {
        let more = match self.source.next_line(&mut rec.raw) {
            Ok(more) => more,
            Err(err) => {
                let err = Error::io(format!("read {}", self.name), err);
                return Err(self.fatal(err));
            }
        };
        if !more {
            rec.clear();
            self.core.normalize = self.config.normalize;
            return Ok(ReadResult::End);
        }
        match self.core.scan(rec, usize::MAX, usize::MAX, &mut *self.source) {
            Ok(()) => Ok(ReadResult::Record),
            Err(err) if err.is_violation() => self.lower_standard(err),
            Err(err) => Err(self.fatal(err)),
        }
    }

    /// Parse a single record from `text`.
    ///
    /// `text` should not contain a line terminator; any `\n` or `\r` in it
    /// is treated as ordinary data. Since there is no further input, a
    /// quoted field that isn't closed by the end of `text` is an error.
    ///
    /// ```
    /// use stdcsv::{Quotes, ReaderBuilder, Record};
    ///
    /// let mut rdr = ReaderBuilder::new().build();
    /// let mut rec = Record::new();
    /// rdr.parse(b"abc,\"d,ef\",\"ghi\"", &mut rec)?;
    /// assert_eq!(rec, vec!["abc", "d,ef", "ghi"]);
    ///
    /// let mut rdr = ReaderBuilder::new().quotes(Quotes::None).build();
    /// rdr.parse(b"abc,\"d,ef\",\"ghi\"", &mut rec)?;
    /// assert_eq!(rec, vec!["abc", "\"d", "ef\"", "\"ghi\""]);
    /// # Ok::<(), stdcsv::Error>(())
    /// ```
    pub fn parse(&mut self, text: &[u8], rec: &mut Record) -> Result<()> {
        self.parse_with_limits(text, None, None, rec)
    }

    /// Parse a single record from at most the first `byte_limit` bytes of
    /// `text`, stopping after `field_limit` fields.
    pub fn parse_with_limits(
        &mut self,
        text: &[u8],
        byte_limit: Option<usize>,
        field_limit: Option<usize>,
        rec: &mut Record,
    ) -> Result<()> {
        rec.raw.set(text);
        let byte_limit = byte_limit.unwrap_or(usize::MAX);
        let field_limit = field_limit.unwrap_or(usize::MAX);
        match self.core.scan(rec, byte_limit, field_limit, &mut EmptySource) {
            Ok(()) => Ok(()),
            Err(err) => {
                if err.is_violation() {
                    self.ctx.push_diagnostic(format!(
                        "Line {}: {} Qualifier issue.",
                        self.core.line(),
                        self.core.quotes.for_reading(),
                    ));
                } else {
                    self.ctx.push_diagnostic(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Go back to the start of the input.
    ///
    /// The row and embedded break counts go back to zero, normalization is
    /// restored and a sniffed delimiter is forgotten (an explicitly set
    /// delimiter is kept). The quoting convention is left as it is.
    ///
    /// Inputs that can't be rewound, like stdin, keep their position but
    /// everything else is still reset.
    pub fn reset(&mut self) -> Result<()> {
        self.core.clear_counts();
        self.core.normalize = self.config.normalize;
        if self.config.delimiter.is_none() {
            self.core.sniff = true;
        }
        if self.source.is_rewindable() {
            if let Err(err) = self.source.rewind() {
                let err = Error::io(format!("rewind {}", self.name), err);
                return Err(self.fatal(err));
            }
        }
        Ok(())
    }

    /// Use `delimiter` from now on, instead of sniffing one.
    ///
    /// # Panics
    ///
    /// When `delimiter` is empty.
    pub fn set_delimiter(&mut self, delimiter: &[u8]) {
        self.config.delimiter = Some(delimiter.to_vec());
        self.core.rules.delimiter = Delimiter::new(delimiter);
        self.core.sniff = false;
    }

    /// Replace line breaks inside quoted fields with `text` from now on.
    pub fn set_embedded_break(&mut self, text: &[u8]) {
        self.config.embedded_break = text.to_vec();
        self.core.embedded_break = text.to_vec();
    }

    /// The number of records read since the start of the document.
    pub fn row_count(&self) -> u64 {
        self.core.rows
    }

    /// The number of line breaks found inside quoted fields since the start
    /// of the document.
    pub fn embedded_breaks(&self) -> u64 {
        self.core.embedded_breaks
    }

    /// The quoting convention currently in use.
    pub fn quotes(&self) -> Quotes {
        self.core.quotes
    }

    /// The delimiter currently in use, or `None` if it has yet to be
    /// sniffed.
    pub fn delimiter(&self) -> Option<&[u8]> {
        if self.core.sniff {
            None
        } else {
            Some(self.core.rules.delimiter.as_bytes())
        }
    }

    /// The configuration this reader was built with, including any later
    /// changes to the delimiter or embedded break text.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// The context receiving this reader's diagnostics.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Give up on the current quoting convention, if allowed.
    fn lower_standard(&mut self, err: Error) -> Result<ReadResult> {
        let line = self.core.line();
        let current = self.core.quotes;
        let rewindable = self.source.is_rewindable();
        let next = match current.downgrade() {
            Some(next) if self.config.failsafe && rewindable => next,
            _ => {
                self.ctx.push_diagnostic(format!(
                    "Line {}: {} Qualifier issue.",
                    line,
                    current.for_reading()
                ));
                return Err(err);
            }
        };

        self.ctx.push_diagnostic(format!(
            "Line {}: Qualifier issue. {} quotes disabled.",
            line,
            current.for_reading()
        ));
        log::warn!(
            "{}: line {}: falling back from {} to {} quotes",
            self.name,
            line,
            current,
            next
        );

        self.core.quotes = next;
        self.core.clear_counts();
        self.core.normalize = self.config.normalize;
        if let Err(err) = self.source.rewind() {
            let err = Error::io(format!("rewind {}", self.name), err);
            return Err(self.fatal(err));
        }
        Ok(ReadResult::Restart(next))
    }

    fn fatal(&self, err: Error) -> Error {
        self.ctx.push_diagnostic(err.to_string());
        err
    }
}

impl std::fmt::Debug for Reader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("quotes", &self.core.quotes)
            .field("rows", &self.core.rows)
            .finish()
    }
}

/// The per document state of a reader, and the loop that turns a line into
/// a record.
#[derive(Debug)]
struct RecordScanner {
    rules: FieldRules,
    /// Set until the delimiter has been sniffed.
    sniff: bool,
    quotes: Quotes,
    /// The active normalization. `FirstRecord` becomes `Fixed` once the
    /// first record has been read.
    normalize: Normalize,
    scanners: ScannerSet,
    embedded_break: Vec<u8>,
    max_continuations: usize,
    rows: u64,
    embedded_breaks: u64,
}

impl RecordScanner {
    /// The 1-based line on which the next record starts.
    fn line(&self) -> u64 {
        1 + self.rows + self.embedded_breaks
    }

    fn clear_counts(&mut self) {
        self.rows = 0;
        self.embedded_breaks = 0;
    }

    /// Split the text in `rec` into fields, pulling more lines from `source`
    /// while a quoted field is open.
    fn scan(
        &mut self,
        rec: &mut Record,
        byte_limit: usize,
        field_limit: usize,
        source: &mut dyn LineSource,
    ) -> Result<()> {
        if self.sniff {
            let text = rec.raw.as_bytes();
            let head = &text[..text.len().min(byte_limit)];
            let delimiter = sniff_delimiter(head);
            log::debug!("sniffed delimiter {:?}", delimiter as char);
            self.rules.delimiter = Delimiter::new(&[delimiter]);
            self.sniff = false;
        }

        let line = self.line();
        rec.len = 0;
        let mut pos = 0;
        let mut delimited = false;
        loop {
            let limit = rec.raw.as_bytes().len().min(byte_limit);
            if pos >= limit || rec.len >= field_limit {
                break;
            }
            let i = rec.push_slot();
            let first = rec.raw.as_bytes()[pos];
            let scanner = self.scanners.select(self.quotes, first);
            let mut breaks: usize = 0;
            let end = loop {
                let limit = rec.raw.as_bytes().len().min(byte_limit);
                let text = &rec.raw.as_bytes()[..limit];
                let slot = &mut rec.slots[i];
                let owned = &mut slot.owned;
                if let Scan::Field(end) =
                    scanner.scan_field(&self.rules, text, pos, owned)
                {
                    break end;
                }
                if breaks >= self.max_continuations {
                    return Err(Error::ContinuationLimitExceeded {
                        line,
                        quotes: self.quotes,
                        limit: self.max_continuations,
                    });
                }
                let next = source
                    .append_continuation(&mut rec.raw)
                    .context("read continuation line")?;
                match next {
                    Some(start) => {
                        slot.owned.extend_from_slice(&self.embedded_break);
                        pos = start;
                        breaks += 1;
                    }
                    None => {
                        return Err(Error::QuoteViolation {
                            line,
                            quotes: self.quotes,
                        });
                    }
                }
            };
            let slot = &mut rec.slots[i];
            match end.span {
                Some(span) => slot.span = span,
                None => slot.is_owned = true,
            }
            self.embedded_breaks += breaks as u64;
            pos = end.next;
            delimited = end.delimited;
        }
        if delimited && rec.len < field_limit {
            rec.push_slot();
        }

        match self.normalize {
            Normalize::Off => {}
            Normalize::Fixed(n) => rec.normalize(n),
            Normalize::FirstRecord => {
                self.normalize = Normalize::Fixed(rec.len);
            }
        }
        self.rows += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use stdcsv_core::Quotes;

    use crate::error::Error;
    use crate::record::Record;

    use super::{Normalize, ReadResult, Reader, ReaderBuilder, ReaderConfig};

    fn read_all(rdr: &mut Reader) -> Vec<Vec<String>> {
        let mut rec = Record::new();
        let mut rows = vec![];
        loop {
            match rdr.read_record(&mut rec).unwrap() {
                ReadResult::Record => rows.push(
                    rec.iter()
                        .map(|f| String::from_utf8(f.to_vec()).unwrap())
                        .collect(),
                ),
                ReadResult::Restart(_) => rows.clear(),
                ReadResult::End => return rows,
            }
        }
    }

    fn parse(b: &ReaderBuilder, text: &str) -> Vec<String> {
        let mut rdr = b.build();
        let mut rec = Record::new();
        rdr.parse(text.as_bytes(), &mut rec).unwrap();
        rec.iter().map(|f| String::from_utf8(f.to_vec()).unwrap()).collect()
    }

    macro_rules! parses_to {
        ($name:ident, $data:expr, $expected:expr) => {
            parses_to!($name, $data, $expected, |_: &mut ReaderBuilder| {});
        };
        ($name:ident, $data:expr, $expected:expr, $config:expr) => {
            #[test]
            fn $name() {
                let mut builder = ReaderBuilder::new();
                $config(&mut builder);
                let expected: Vec<&str> = $expected;
                assert_eq!(expected, parse(&builder, $data));
            }
        };
    }

    fn none(b: &mut ReaderBuilder) {
        b.quotes(Quotes::None);
    }

    fn weak(b: &mut ReaderBuilder) {
        b.quotes(Quotes::Weak);
    }

    fn multi(b: &mut ReaderBuilder) {
        b.delimiter(b"~^_");
    }

    parses_to!(
        trailing_delimiters,
        "123,456,789,,",
        vec!["123", "456", "789", "", ""]
    );
    parses_to!(
        quoted,
        "\"abc\",\"d,ef\",\"ghi\",\"\"",
        vec!["abc", "d,ef", "ghi", ""]
    );
    parses_to!(
        newline_in_text,
        "abc,\"de\nf\",ghi,",
        vec!["abc", "de\nf", "ghi", ""]
    );
    parses_to!(
        doubled_quote,
        "abc,\"de\"\"f\",ghi,",
        vec!["abc", "de\"f", "ghi", ""]
    );
    parses_to!(empty_text, "", vec![]);
    parses_to!(single_delimiter, ",", vec!["", ""]);
    parses_to!(
        weak_doubled,
        "abc,\"de\"\"f\",ghi,",
        vec!["abc", "de\"\"f", "ghi", ""],
        weak
    );
    parses_to!(
        none_quoted,
        "abc,\"d,ef\",\"ghi\"",
        vec!["abc", "\"d", "ef\"", "\"ghi\""],
        none
    );
    parses_to!(
        multi_rfc,
        "123~^_456~^_789~^_~^_",
        vec!["123", "456", "789", "", ""],
        multi
    );
    parses_to!(
        multi_weak,
        "abc~^_\"de\nf\"~^_ghi~^_",
        vec!["abc", "de\nf", "ghi", ""],
        |b: &mut ReaderBuilder| {
            b.delimiter(b"~^_").quotes(Quotes::Weak);
        }
    );
    parses_to!(sniff_pipe, "a|b|c,d", vec!["a", "b", "c,d"]);
    parses_to!(
        trims,
        " a ,\" b \" ,c",
        vec!["a", "b", "c"],
        |b: &mut ReaderBuilder| {
            b.trim(true);
        }
    );
    parses_to!(
        pads,
        "a,b",
        vec!["a", "b", "", ""],
        |b: &mut ReaderBuilder| {
            b.normalize(Normalize::Fixed(4));
        }
    );
    parses_to!(
        truncates,
        "a,b,c,d",
        vec!["a", "b"],
        |b: &mut ReaderBuilder| {
            b.normalize(Normalize::Fixed(2));
        }
    );

    #[test]
    fn parse_counts_rows() {
        let mut rdr = ReaderBuilder::new().build();
        let mut rec = Record::new();
        for text in &["123,456,789,,", "\"abc\"", "abc,\"de\nf\",ghi,"] {
            rdr.parse(text.as_bytes(), &mut rec).unwrap();
        }
        assert_eq!(rdr.row_count(), 3);
        assert_eq!(rdr.embedded_breaks(), 0);
    }

    #[test]
    fn parse_limits() {
        let mut rdr = ReaderBuilder::new().build();
        let mut rec = Record::new();
        rdr.parse_with_limits(b"a,b,c,d", Some(3), None, &mut rec).unwrap();
        assert_eq!(rec, vec!["a", "b"]);
        rdr.parse_with_limits(b"a,b,c,d", None, Some(2), &mut rec).unwrap();
        assert_eq!(rec, vec!["a", "b"]);
        rdr.parse_with_limits(b"a,b,", None, Some(2), &mut rec).unwrap();
        assert_eq!(rec, vec!["a", "b"]);
    }

    #[test]
    fn sniff_respects_byte_limit() {
        let mut rdr = ReaderBuilder::new().build();
        let mut rec = Record::new();
        rdr.parse_with_limits(b"a;b|c|d|e", Some(3), None, &mut rec).unwrap();
        assert_eq!(rdr.delimiter(), Some(&b";"[..]));
        assert_eq!(rec, vec!["a", "b"]);
    }

    #[test]
    fn parse_unterminated_is_violation() {
        let mut rdr = ReaderBuilder::new().failsafe(true).build();
        let mut rec = Record::new();
        let err = rdr.parse(b"abc,\"def", &mut rec).unwrap_err();
        match err {
            Error::QuoteViolation { line: 1, quotes: Quotes::Rfc4180 } => {}
            err => panic!("unexpected error: {:?}", err),
        }
        assert_eq!(rdr.quotes(), Quotes::Rfc4180);
        assert_eq!(
            rdr.context().drain_diagnostics(),
            vec!["Line 1: RFC4180 Qualifier issue."]
        );
    }

    #[test]
    fn continuation_lines() {
        let data = "a,\"multi\nline\r\nfield\",b\nnext,row\n";
        let mut rdr = ReaderBuilder::new()
            .embedded_break(b"<br>")
            .from_seekable(Cursor::new(data));
        assert_eq!(
            read_all(&mut rdr),
            vec![vec!["a", "multi<br>line<br>field", "b"], vec!["next", "row"]]
        );
        assert_eq!(rdr.row_count(), 2);
        assert_eq!(rdr.embedded_breaks(), 2);
    }

    #[test]
    fn continuation_limit() {
        let mut data = String::from("\"open\n");
        for _ in 0..3 {
            data.push_str("more\n");
        }
        let mut rdr = ReaderBuilder::new()
            .max_continuations(2)
            .from_seekable(Cursor::new(data));
        let mut rec = Record::new();
        match rdr.read_record(&mut rec) {
            Err(Error::ContinuationLimitExceeded {
                line: 1, limit: 2, ..
            }) => {}
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[test]
    fn downgrade_and_restart() {
        let data = "id,text\n1,\"5\" screen\"\n2,ok\n";
        let mut rdr = ReaderBuilder::new()
            .failsafe(true)
            .from_seekable(Cursor::new(data));
        let mut rec = Record::new();

        assert_eq!(rdr.read_record(&mut rec).unwrap(), ReadResult::Record);
        assert_eq!(
            rdr.read_record(&mut rec).unwrap(),
            ReadResult::Restart(Quotes::Weak)
        );
        assert_eq!(rdr.quotes(), Quotes::Weak);
        assert_eq!(rdr.row_count(), 0);
        assert_eq!(
            rdr.context().diagnostics(),
            vec!["Line 2: Qualifier issue. RFC4180 quotes disabled."]
        );

        assert_eq!(
            read_all(&mut rdr),
            vec![vec!["id", "text"], vec!["1", "5\" screen"], vec!["2", "ok"]]
        );
    }

    #[test]
    fn downgrade_twice() {
        let data = "\"a,b\n";
        let mut rdr = ReaderBuilder::new()
            .failsafe(true)
            .from_seekable(Cursor::new(data));
        assert_eq!(read_all(&mut rdr), vec![vec!["\"a", "b"]]);
        assert_eq!(rdr.quotes(), Quotes::None);
        assert_eq!(
            rdr.context().drain_diagnostics(),
            vec![
                "Line 1: Qualifier issue. RFC4180 quotes disabled.",
                "Line 1: Qualifier issue. WEAK quotes disabled.",
            ]
        );
    }

    #[test]
    fn no_failsafe_on_unseekable() {
        let mut rdr = ReaderBuilder::new()
            .failsafe(true)
            .quotes(Quotes::Weak)
            .from_reader(Cursor::new("ok\n\"bad\n"));
        let mut rec = Record::new();
        assert_eq!(rdr.read_record(&mut rec).unwrap(), ReadResult::Record);
        assert!(rdr.read_record(&mut rec).is_err());
        assert_eq!(
            rdr.context().drain_diagnostics(),
            vec!["Line 2: WEAK Qualifier issue."]
        );
    }

    #[test]
    fn first_record_locks_length() {
        let data = "a,b,c\n1\n1,2,3,4\n";
        let mut rdr = ReaderBuilder::new()
            .normalize(Normalize::FirstRecord)
            .from_seekable(Cursor::new(data));
        let expected = vec![
            vec!["a", "b", "c"],
            vec!["1", "", ""],
            vec!["1", "2", "3"],
        ];
        assert_eq!(read_all(&mut rdr), expected);

        rdr.reset().unwrap();
        assert_eq!(read_all(&mut rdr), expected);
    }

    #[test]
    fn reset_forgets_sniffed_delimiter() {
        let mut rdr = ReaderBuilder::new().from_seekable(Cursor::new("a;b\n"));
        assert_eq!(read_all(&mut rdr), vec![vec!["a", "b"]]);
        assert_eq!(rdr.delimiter(), Some(&b";"[..]));
        rdr.reset().unwrap();
        assert_eq!(rdr.delimiter(), None);
        assert_eq!(rdr.row_count(), 0);

        rdr.set_delimiter(b"|");
        rdr.reset().unwrap();
        assert_eq!(rdr.delimiter(), Some(&b"|"[..]));
        assert_eq!(read_all(&mut rdr), vec![vec!["a;b"]]);
    }

    #[test]
    fn empty_lines_have_no_fields() {
        let mut rdr =
            ReaderBuilder::new().from_seekable(Cursor::new("a\n\nb"));
        let expected: Vec<Vec<&str>> = vec![vec!["a"], vec![], vec!["b"]];
        assert_eq!(read_all(&mut rdr), expected);
    }

    #[test]
    fn config_with_empty_delimiter() {
        let config = ReaderConfig {
            delimiter: Some(vec![]),
            ..ReaderConfig::default()
        };
        match ReaderBuilder::from_config(config) {
            Err(Error::InvalidOperation(_)) => {}
            other => panic!("unexpected: {:?}", other),
        }

        let config = ReaderConfig {
            delimiter: Some(b"~^".to_vec()),
            ..ReaderConfig::default()
        };
        let mut rdr = ReaderBuilder::from_config(config).unwrap().build();
        let mut rec = Record::new();
        rdr.parse(b"a~^b", &mut rec).unwrap();
        assert_eq!(rec, vec!["a", "b"]);
    }
}
