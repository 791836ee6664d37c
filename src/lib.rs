/*!
The `stdcsv` crate reads and writes delimited text in several dialects.

Readers understand three quoting conventions:

* `Quotes::Rfc4180`, the default, where quoted fields may contain the
  delimiter, line breaks and doubled quotes.
* `Quotes::Weak`, where a quoted field simply runs until a quote followed by
  the delimiter. Quotes inside are kept as they are.
* `Quotes::None`, where quotes mean nothing and every field is split on the
  delimiter.

When no delimiter is configured, one is picked from the first line of the
input. Quoted fields may span several lines; the line breaks inside them are
replaced with configurable text.

Real input often claims to be RFC 4180 and isn't. A reader built with
`failsafe(true)` deals with that by falling back to the next more lenient
convention and starting over from the first line. The caller finds out
through [`ReadResult::Restart`], and should throw away what it has read so
far. [`transcode`] does this for you when copying records to a [`Writer`].

Writers never leave a half written file behind. Output for a path is staged
in a temporary file in the same directory and renamed over the destination
when the writer is closed. Temporary files that are still pending are
tracked by a [`Context`], which can also remove them when the process is
interrupted.

# Example

```
use std::io::Cursor;
use stdcsv::{ReadResult, ReaderBuilder, Record};

let data = "\
city;country;note
Boston;United States;\"first line
second line\"
Concord;United States;
";
let mut rdr = ReaderBuilder::new()
    .embedded_break(b" / ")
    .from_seekable(Cursor::new(data));
let mut rec = Record::new();
let mut notes = vec![];
while rdr.read_record(&mut rec)? == ReadResult::Record {
    notes.push(String::from_utf8_lossy(&rec[2]).into_owned());
}
assert_eq!(notes, vec!["note", "first line / second line", ""]);
# Ok::<(), stdcsv::Error>(())
```
*/

#![deny(missing_docs)]

pub use stdcsv_core::{Quotes, Terminator};

pub use crate::context::Context;
pub use crate::error::{Error, Result};
pub use crate::reader::{
    Normalize, ReadResult, Reader, ReaderBuilder, ReaderConfig,
    DEFAULT_MAX_CONTINUATIONS,
};
pub use crate::record::{Record, RecordIter};
pub use crate::transcode::transcode;
pub use crate::writer::{Writer, WriterBuilder, WriterConfig, TEMP_PREFIX};

mod context;
mod error;
mod reader;
mod record;
mod source;
mod transcode;
mod writer;
