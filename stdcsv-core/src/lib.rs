/*!
`stdcsv-core` provides the I/O free pieces of the `stdcsv` engine.

Everything in this crate works on caller provided byte slices:

* [`LineReader`] splits a stream of bytes into physical lines, treating
  `\n`, `\r` and `\r\n` as a single terminator. Like other push parsers it
  never allocates; when the caller's output buffer is too small it says so
  and the caller grows the buffer and tries again.
* [`sniff_delimiter`] picks a delimiter from the first line of a document.
* [`NoneScanner`], [`WeakScanner`] and [`Rfc4180Scanner`] each consume one
  field under one quoting convention. They share the [`ScanField`] trait so
  that a reader can pick a scanner per field.
* [`Encoder`] quotes and escapes fields for output.

# Example

Scanning a record by hand:

```
use stdcsv_core::{Delimiter, FieldRules, Quotes, Scan, ScannerSet};

let rules = FieldRules::new(Delimiter::new(b","));
let mut scanners = ScannerSet::new();
let text = b"abc,\"d,ef\",\"ghi\"";

let mut fields = vec![];
let mut pos = 0;
let mut owned = vec![];
while pos < text.len() {
    owned.clear();
    let scanner = scanners.select(Quotes::Rfc4180, text[pos]);
    match scanner.scan_field(&rules, text, pos, &mut owned) {
        Scan::Field(end) => {
            match end.span {
                Some(ref span) => fields.push(text[span.clone()].to_vec()),
                None => fields.push(owned.clone()),
            }
            pos = end.next;
        }
        Scan::Open => unreachable!("all quotes are closed"),
    }
}
assert_eq!(fields, vec![b"abc".to_vec(), b"d,ef".to_vec(), b"ghi".to_vec()]);
```
*/

#![deny(missing_docs)]

pub use crate::dialect::{
    sniff_delimiter, Delimiter, Quotes, Terminator, DELIMITER_CANDIDATES,
    QUOTE,
};
pub use crate::line::{LineReader, LineResult};
pub use crate::scan::{
    FieldEnd, FieldRules, NoneScanner, Rfc4180Scanner, Scan, ScanField,
    ScannerSet, WeakScanner,
};
pub use crate::writer::{Encoder, EncoderBuilder};

mod dialect;
mod line;
mod scan;
mod writer;
