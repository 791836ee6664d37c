use crate::error::Result;
use crate::reader::{ReadResult, Reader};
use crate::record::Record;
use crate::writer::Writer;

/// Copy every record from `rdr` to `wtr`.
///
/// When the reader starts the document over under a more lenient quoting
/// convention, everything written so far is discarded with
/// [`Writer::reset`]. A writer that can't be reset makes that an error, so
/// pair a failsafe reader with a staged writer.
///
/// Returns the number of records in the final output.
///
/// ```
/// use std::io::Cursor;
/// use stdcsv::{transcode, Quotes, ReaderBuilder, WriterBuilder};
///
/// let data = "a;b\n\"x;y\";z\n";
/// let mut rdr = ReaderBuilder::new().from_seekable(Cursor::new(data));
/// let mut wtr = WriterBuilder::new()
///     .delimiter(b"|")
///     .quotes(Quotes::All)
///     .to_stdout_staged()?;
/// assert_eq!(transcode(&mut rdr, &mut wtr)?, 2);
///
/// let mut out = vec![];
/// wtr.close_into(&mut out)?;
/// assert_eq!(out, b"\"a\"|\"b\"\n\"x;y\"|\"z\"\n");
/// # Ok::<(), stdcsv::Error>(())
/// ```
pub fn transcode(rdr: &mut Reader, wtr: &mut Writer) -> Result<u64> {
    let mut rec = Record::new();
    let mut count = 0;
    loop {
        match rdr.read_record(&mut rec)? {
            ReadResult::Record => {
                wtr.write_record(&rec)?;
                count += 1;
            }
            ReadResult::Restart(quotes) => {
                log::debug!(
                    "discarding {} records, reading again with {} quotes",
                    count,
                    quotes
                );
                wtr.reset()?;
                count = 0;
            }
            ReadResult::End => return Ok(count),
        }
    }
}
