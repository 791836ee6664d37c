use std::fmt;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use stdcsv_core::{Delimiter, Encoder, EncoderBuilder, Quotes, Terminator};
use tempfile::NamedTempFile;

use crate::context::{Context, Registration};
use crate::error::{Error, IoResultExt, Result};

/// The prefix of every temporary file a writer stages its output in.
pub const TEMP_PREFIX: &str = "csv_";

/// Everything that can be configured on a writer.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WriterConfig {
    /// The field delimiter.
    pub delimiter: Vec<u8>,
    /// The record terminator.
    pub terminator: Terminator,
    /// The quoting convention.
    pub quotes: Quotes,
}

impl Default for WriterConfig {
    fn default() -> WriterConfig {
        WriterConfig {
            delimiter: b",".to_vec(),
            terminator: Terminator::LF,
            quotes: Quotes::Rfc4180,
        }
    }
}

/// Builds a writer with various configuration knobs.
///
/// Writers for files never write to the file's path directly. Output goes
/// to a temporary file next to it, which replaces the destination in one
/// step when the writer is closed.
#[derive(Debug, Default)]
pub struct WriterBuilder {
    config: WriterConfig,
    ctx: Option<Context>,
}

impl WriterBuilder {
    /// Create a new builder for configuring writers.
    pub fn new() -> WriterBuilder {
        WriterBuilder::default()
    }

    /// Create a builder from a complete configuration.
    ///
    /// An empty delimiter is rejected with `Error::InvalidOperation`.
    pub fn from_config(config: WriterConfig) -> Result<WriterBuilder> {
        if config.delimiter.is_empty() {
            return Err(Error::InvalidOperation("empty delimiter"));
        }
        Ok(WriterBuilder { config, ctx: None })
    }

    /// The field delimiter to write.
    ///
    /// The default is `b","`.
    ///
    /// # Panics
    ///
    /// When `delimiter` is empty.
    pub fn delimiter(&mut self, delimiter: &[u8]) -> &mut WriterBuilder {
        assert!(!delimiter.is_empty(), "delimiter must not be empty");
        self.config.delimiter = delimiter.to_vec();
        self
    }

    /// The record terminator to write.
    ///
    /// The default is `Terminator::LF`.
    pub fn terminator(&mut self, term: Terminator) -> &mut WriterBuilder {
        self.config.terminator = term;
        self
    }

    /// The quoting convention to write fields with.
    ///
    /// The default is `Quotes::Rfc4180`, which only quotes fields when
    /// necessary.
    pub fn quotes(&mut self, quotes: Quotes) -> &mut WriterBuilder {
        self.config.quotes = quotes;
        self
    }

    /// The context that tracks this writer's temporary file and receives
    /// its diagnostics.
    ///
    /// By default, every writer gets a context of its own.
    pub fn context(&mut self, ctx: Context) -> &mut WriterBuilder {
        self.ctx = Some(ctx);
        self
    }

    /// Build a writer whose output replaces the file at `path` on `close`.
    ///
    /// The temporary file is created in the same directory as `path`, so
    /// that committing it is a rename within one file system.
    pub fn to_path<P: AsRef<Path>>(&self, path: P) -> Result<Writer> {
        let dest = path.as_ref();
        let dir = match dest.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(dir)
            .with_context(|| {
                format!("create temporary file in {}", dir.display())
            });
        self.staged(tmp, Some(dest.to_path_buf()))
    }

    /// Build a writer whose output is staged in a temporary file and copied
    /// to stdout on `close`.
    ///
    /// Unlike [`WriterBuilder::to_stdout`], this writer can be reset.
    pub fn to_stdout_staged(&self) -> Result<Writer> {
        let tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile()
            .context("create temporary file");
        self.staged(tmp, None)
    }

    /// Build a writer that writes straight to stdout.
    ///
    /// Output can't be taken back, so this writer can't be reset.
    pub fn to_stdout(&self) -> Writer {
        self.to_writer(io::stdout())
    }

    /// Build a writer that writes straight to `wtr`.
    ///
    /// Like a writer for stdout, this writer can't be reset.
    pub fn to_writer<W: Write + 'static>(&self, wtr: W) -> Writer {
        let wtr: Box<dyn Write> = Box::new(wtr);
        self.writer(Sink::Direct(BufWriter::new(wtr)))
    }

    fn staged(
        &self,
        tmp: Result<NamedTempFile>,
        dest: Option<PathBuf>,
    ) -> Result<Writer> {
        let ctx = self.ctx.clone().unwrap_or_default();
        let tmp = match tmp {
            Ok(tmp) => tmp,
            Err(err) => {
                ctx.push_diagnostic(err.to_string());
                return Err(err);
            }
        };
        let target = match dest {
            Some(ref p) => p.display().to_string(),
            None => "<stdout>".to_string(),
        };
        log::debug!(
            "staging output for {} in {}",
            target,
            tmp.path().display()
        );
        let registration = ctx.register(tmp.path());
        let sink = Sink::Staged(Staged {
            file: BufWriter::new(tmp),
            dest,
            _registration: registration,
        });
        let mut wtr = self.writer(sink);
        wtr.ctx = ctx;
        Ok(wtr)
    }

    fn writer(&self, sink: Sink) -> Writer {
        let enc = EncoderBuilder::new()
            .delimiter(Delimiter::new(&self.config.delimiter))
            .terminator(self.config.terminator)
            .quotes(self.config.quotes)
            .build();
        Writer {
            enc,
            sink,
            buf: vec![],
            bytes: 0,
            ctx: self.ctx.clone().unwrap_or_default(),
        }
    }
}

enum Sink {
    Direct(BufWriter<Box<dyn Write>>),
    Staged(Staged),
}

struct Staged {
    file: BufWriter<NamedTempFile>,
    /// `None` means stdout.
    dest: Option<PathBuf>,
    _registration: Registration,
}

/// A writer of delimited text.
///
/// # Example
///
/// ```
/// use stdcsv::WriterBuilder;
///
/// let dir = tempfile::tempdir()?;
/// let path = dir.path().join("out.csv");
///
/// let mut wtr = WriterBuilder::new().to_path(&path)?;
/// wtr.write_record(&["name", "note"])?;
/// wtr.write_record(&["widget", "says \"hi\""])?;
/// assert!(!path.exists());
///
/// wtr.close()?;
/// assert_eq!(
///     std::fs::read_to_string(&path)?,
///     "name,note\nwidget,\"says \"\"hi\"\"\"\n",
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Writer {
    enc: Encoder,
    sink: Sink,
    buf: Vec<u8>,
    bytes: u64,
    ctx: Context,
}

impl Writer {
    /// Write a single record.
    ///
    /// Returns the number of bytes written, including delimiters, quotes
    /// and the terminator.
    pub fn write_record<I, T>(&mut self, fields: I) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.buf.clear();
        let n = self.enc.encode_record(fields, &mut self.buf);
        let res = match self.sink {
            Sink::Direct(ref mut w) => w.write_all(&self.buf),
            Sink::Staged(ref mut s) => s.file.write_all(&self.buf),
        };
        if let Err(err) = res {
            return Err(self.fatal(Error::io("write record", err)));
        }
        self.bytes += n as u64;
        Ok(n)
    }

    /// Write records with `delimiter` from now on.
    ///
    /// # Panics
    ///
    /// When `delimiter` is empty.
    pub fn set_delimiter(&mut self, delimiter: &[u8]) {
        self.enc.set_delimiter(Delimiter::new(delimiter));
    }

    /// End records with `term` from now on.
    pub fn set_terminator(&mut self, term: Terminator) {
        self.enc.set_terminator(term);
    }

    /// Throw away everything written so far.
    ///
    /// Only writers that stage their output can be reset. The temporary
    /// file is truncated and reused.
    pub fn reset(&mut self) -> Result<()> {
        let staged = match self.sink {
            Sink::Direct(_) => {
                let err = Error::InvalidOperation(
                    "cannot reset a writer that writes directly to its output",
                );
                return Err(self.fatal(err));
            }
            Sink::Staged(ref mut s) => s,
        };
        let res = staged.file.flush().and_then(|()| {
            let tmp = staged.file.get_mut();
            tmp.as_file().set_len(0)?;
            tmp.seek(SeekFrom::Start(0))?;
            Ok(())
        });
        if let Err(err) = res {
            return Err(self.fatal(Error::io("truncate temporary file", err)));
        }
        log::debug!("writer reset, {} bytes discarded", self.bytes);
        self.bytes = 0;
        Ok(())
    }

    /// Finish writing.
    ///
    /// For a writer created with [`WriterBuilder::to_path`], the temporary
    /// file replaces the destination. For one created with
    /// [`WriterBuilder::to_stdout_staged`], the temporary file is copied to
    /// stdout and removed.
    pub fn close(self) -> Result<()> {
        let has_dest = match self.sink {
            Sink::Staged(ref s) => s.dest.is_some(),
            Sink::Direct(_) => true,
        };
        if !has_dest {
            let stdout = io::stdout();
            let lock = stdout.lock();
            return self.close_into(lock);
        }

        let Writer { sink, ctx, bytes, .. } = self;
        let res = match sink {
            Sink::Direct(mut w) => w.flush().context("flush output"),
            Sink::Staged(staged) => commit(staged, bytes),
        };
        res.map_err(|err| {
            ctx.push_diagnostic(err.to_string());
            err
        })
    }

    /// Finish writing by copying the staged output to `out`.
    ///
    /// This is only possible for writers created with
    /// [`WriterBuilder::to_stdout_staged`].
    pub fn close_into<W: Write>(self, mut out: W) -> Result<()> {
        let Writer { sink, ctx, .. } = self;
        let staged = match sink {
            Sink::Staged(staged) if staged.dest.is_none() => staged,
            _ => {
                let err = Error::InvalidOperation(
                    "only a writer staged for stdout can be closed into \
                     another output",
                );
                ctx.push_diagnostic(err.to_string());
                return Err(err);
            }
        };
        copy_out(staged.file, &mut out).map_err(|err| {
            ctx.push_diagnostic(err.to_string());
            err
        })
    }

    /// The number of bytes written since the writer was created or last
    /// reset.
    pub fn bytes_written(&self) -> u64 {
        self.bytes
    }

    /// The temporary file output is being staged in, if any.
    pub fn temp_path(&self) -> Option<&Path> {
        match self.sink {
            Sink::Staged(ref s) => Some(s.file.get_ref().path()),
            Sink::Direct(_) => None,
        }
    }

    /// The context tracking this writer.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    fn fatal(&self, err: Error) -> Error {
        self.ctx.push_diagnostic(err.to_string());
        err
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("encoder", &self.enc)
            .field("temp_path", &self.temp_path())
            .field("bytes", &self.bytes)
            .finish()
    }
}

/// Copy a staged file to `out`. The file is removed when it goes out of
/// scope.
fn copy_out<W: Write>(
    file: BufWriter<NamedTempFile>,
    out: &mut W,
) -> Result<()> {
    let mut tmp = file
        .into_inner()
        .map_err(|err| err.into_error())
        .context("flush temporary file")?;
    tmp.seek(SeekFrom::Start(0)).context("rewind temporary file")?;
    io::copy(&mut tmp, out).context("copy staged output")?;
    out.flush().context("flush output")?;
    Ok(())
}

/// Move a staged file over its destination.
fn commit(staged: Staged, bytes: u64) -> Result<()> {
    let Staged { file, dest, _registration: registration } = staged;
    let dest = match dest {
        Some(dest) => dest,
        None => return Err(Error::InvalidOperation("no destination")),
    };
    let tmp = file
        .into_inner()
        .map_err(|err| err.into_error())
        .context("flush temporary file")?;
    set_permissions(tmp.path())?;
    tmp.persist(&dest).map_err(|err| {
        Error::io(format!("rename to {}", dest.display()), err.error)
    })?;
    log::info!("wrote {} bytes to {}", bytes, dest.display());
    drop(registration);
    Ok(())
}

#[cfg(unix)]
fn set_permissions(path: &Path) -> Result<()> {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
        .with_context(|| format!("chmod {}", path.display()))
}

#[cfg(not(unix))]
fn set_permissions(_: &Path) -> Result<()> {
    Ok(())
}
