use crate::dialect::{Delimiter, Quotes, Terminator, QUOTE};

/// A builder for configuring an encoder.
///
/// This builder permits specifying the delimiter, terminator and quoting
/// convention.
#[derive(Debug)]
pub struct EncoderBuilder {
    enc: Encoder,
}

impl Default for EncoderBuilder {
    fn default() -> EncoderBuilder {
        EncoderBuilder::new()
    }
}

impl EncoderBuilder {
    /// Create a new builder for configuring an encoder.
    pub fn new() -> EncoderBuilder {
        EncoderBuilder { enc: Encoder::default() }
    }

    /// Build an encoder from this configuration.
    pub fn build(&self) -> Encoder {
        self.enc.clone()
    }

    /// The field delimiter to write between fields.
    ///
    /// The default is `b","`.
    pub fn delimiter(&mut self, delimiter: Delimiter) -> &mut EncoderBuilder {
        self.enc.delimiter = delimiter;
        self
    }

    /// The record terminator to write after each record.
    ///
    /// The default is `Terminator::LF`.
    pub fn terminator(&mut self, term: Terminator) -> &mut EncoderBuilder {
        self.enc.term = term;
        self
    }

    /// The quoting convention to write fields with.
    ///
    /// The default is `Quotes::Rfc4180`.
    pub fn quotes(&mut self, quotes: Quotes) -> &mut EncoderBuilder {
        self.enc.quotes = quotes;
        self
    }
}

/// Quotes and escapes fields for output.
///
/// How a field is written depends on the quoting convention:
///
/// * `All` quotes every field and doubles embedded quotes.
/// * `Rfc4180` quotes a field only when it contains the delimiter, a quote,
///   `\r` or `\n`, and doubles embedded quotes.
/// * `Weak` quotes in the same cases as `Rfc4180` but writes embedded quotes
///   as they are.
/// * `None` writes every field as it is.
///
/// ```
/// use stdcsv_core::{EncoderBuilder, Quotes};
///
/// let enc = EncoderBuilder::new().quotes(Quotes::Rfc4180).build();
/// let mut out = vec![];
/// enc.encode_record(&[&b"a"[..], b"b,c", b"say \"hi\""], &mut out);
/// assert_eq!(out, b"a,\"b,c\",\"say \"\"hi\"\"\"\n");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Encoder {
    delimiter: Delimiter,
    term: Terminator,
    quotes: Quotes,
}

impl Encoder {
    /// Creates an encoder with the default configuration.
    pub fn new() -> Encoder {
        Encoder::default()
    }

    /// The delimiter this encoder writes.
    pub fn delimiter(&self) -> &Delimiter {
        &self.delimiter
    }

    /// Change the delimiter.
    pub fn set_delimiter(&mut self, delimiter: Delimiter) {
        self.delimiter = delimiter;
    }

    /// The terminator this encoder writes.
    pub fn terminator(&self) -> Terminator {
        self.term
    }

    /// Change the terminator.
    pub fn set_terminator(&mut self, term: Terminator) {
        self.term = term;
    }

    /// The quoting convention this encoder writes.
    pub fn quotes(&self) -> Quotes {
        self.quotes
    }

    /// Returns true if `field` will be surrounded by quotes.
    pub fn needs_quotes(&self, field: &[u8]) -> bool {
        match self.quotes {
            Quotes::All => true,
            Quotes::None => false,
            Quotes::Rfc4180 | Quotes::Weak => {
                memchr::memchr3(QUOTE, b'\r', b'\n', field).is_some()
                    || self.delimiter.find(field).is_some()
            }
        }
    }

    /// Append one encoded field to `out`, returning the number of bytes
    /// written.
    pub fn encode_field(&self, field: &[u8], out: &mut Vec<u8>) -> usize {
        let start = out.len();
        if !self.needs_quotes(field) {
            out.extend_from_slice(field);
            return out.len() - start;
        }

        out.push(QUOTE);
        if self.quotes == Quotes::Weak {
            out.extend_from_slice(field);
        } else {
            let mut rest = field;
            while let Some(i) = memchr::memchr(QUOTE, rest) {
                out.extend_from_slice(&rest[..i + 1]);
                out.push(QUOTE);
                rest = &rest[i + 1..];
            }
            out.extend_from_slice(rest);
        }
        out.push(QUOTE);
        out.len() - start
    }

    /// Append a complete record to `out`: every field encoded, separated by
    /// the delimiter and followed by the terminator.
    ///
    /// Returns the number of bytes written.
    pub fn encode_record<I, T>(&self, fields: I, out: &mut Vec<u8>) -> usize
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let start = out.len();
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(self.delimiter.as_bytes());
            }
            self.encode_field(field.as_ref(), out);
        }
        out.extend_from_slice(self.term.as_bytes());
        out.len() - start
    }
}
