use core::fmt;
use core::str::FromStr;

use memchr::memmem::Finder;

/// The quote character recognized by every quoting convention.
pub const QUOTE: u8 = b'"';

/// Delimiters considered by [`sniff_delimiter`], in priority order.
pub const DELIMITER_CANDIDATES: &[u8] = b",|\t;:";

/// The quoting convention used when reading or writing fields.
///
/// The variants are ordered from the most lenient to the strictest, which
/// is also the order a reader walks (backwards) when it gives up on a
/// convention that the input doesn't follow.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum Quotes {
    /// Quotes have no meaning. Every field is split on the delimiter.
    None,
    /// A quoted field ends at a quote followed by the delimiter, or at a
    /// quote that ends the record. Embedded quotes are not escaped.
    Weak,
    /// Quoted fields follow RFC 4180: embedded quotes are doubled.
    Rfc4180,
    /// Like `Rfc4180`, but a writer quotes every field. Readers treat this
    /// exactly like `Rfc4180`.
    All,
}

impl Default for Quotes {
    fn default() -> Quotes {
        Quotes::Rfc4180
    }
}

impl Quotes {
    /// The convention actually used for reading.
    ///
    /// `All` only changes how fields are written.
    pub fn for_reading(self) -> Quotes {
        match self {
            Quotes::All => Quotes::Rfc4180,
            q => q,
        }
    }

    /// The next more lenient convention, if there is one.
    ///
    /// `All` and `Rfc4180` both fall back to `Weak`, `Weak` falls back to
    /// `None` and `None` has nowhere left to go.
    pub fn downgrade(self) -> Option<Quotes> {
        match self {
            Quotes::All | Quotes::Rfc4180 => Some(Quotes::Weak),
            Quotes::Weak => Some(Quotes::None),
            Quotes::None => None,
        }
    }

    /// Returns true when quote characters carry meaning.
    pub fn is_quoting(self) -> bool {
        self != Quotes::None
    }

    fn name(self) -> &'static str {
        match self {
            Quotes::None => "NONE",
            Quotes::Weak => "WEAK",
            Quotes::Rfc4180 => "RFC4180",
            Quotes::All => "ALL",
        }
    }
}

impl fmt::Display for Quotes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Quotes {
    type Err = String;

    /// Parses a convention name case insensitively.
    fn from_str(s: &str) -> Result<Quotes, String> {
        match s.to_ascii_uppercase().as_str() {
            "NONE" => Ok(Quotes::None),
            "WEAK" => Ok(Quotes::Weak),
            "RFC4180" => Ok(Quotes::Rfc4180),
            "ALL" => Ok(Quotes::All),
            _ => Err(format!("invalid quote option: {}", s)),
        }
    }
}

/// A record terminator used when writing.
///
/// Readers always accept `\n`, `\r` and `\r\n`. Writers emit `\n` unless
/// told otherwise.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Terminator {
    /// Writes `\r\n`.
    CRLF,
    /// Writes the byte given.
    Any(u8),
}

impl Terminator {
    /// Unix line endings (`\n`).
    pub const LF: Terminator = Terminator::Any(b'\n');
    /// Classic Mac line endings (`\r`).
    pub const CR: Terminator = Terminator::Any(b'\r');

    /// The bytes written at the end of each record.
    pub fn as_bytes(&self) -> &[u8] {
        match *self {
            Terminator::CRLF => b"\r\n",
            Terminator::Any(ref b) => core::slice::from_ref(b),
        }
    }
}

impl Default for Terminator {
    fn default() -> Terminator {
        Terminator::LF
    }
}

/// A field delimiter.
///
/// Delimiters may be longer than one byte (`~^_` is as valid as `,`). A
/// delimiter also knows its "weak" form: the quote character followed by
/// the delimiter, which is how a weakly quoted field ends.
#[derive(Clone)]
pub struct Delimiter {
    bytes: Vec<u8>,
    weak: Vec<u8>,
    finder: Finder<'static>,
    weak_finder: Finder<'static>,
}

impl Delimiter {
    /// Create a delimiter from the bytes given.
    ///
    /// # Panics
    ///
    /// When `bytes` is empty.
    pub fn new(bytes: &[u8]) -> Delimiter {
        assert!(!bytes.is_empty(), "delimiter must not be empty");
        let mut weak = Vec::with_capacity(bytes.len() + 1);
        weak.push(QUOTE);
        weak.extend_from_slice(bytes);
        Delimiter {
            finder: Finder::new(bytes).into_owned(),
            weak_finder: Finder::new(&weak).into_owned(),
            bytes: bytes.to_vec(),
            weak,
        }
    }

    /// The offset of the first occurrence of the delimiter in `haystack`.
    pub fn find(&self, haystack: &[u8]) -> Option<usize> {
        self.finder.find(haystack)
    }

    /// The offset of the first occurrence of the weak form in `haystack`.
    pub fn find_weak(&self, haystack: &[u8]) -> Option<usize> {
        self.weak_finder.find(haystack)
    }

    /// The delimiter itself.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The quote character followed by the delimiter.
    pub fn weak(&self) -> &[u8] {
        &self.weak
    }

    /// The length of the delimiter in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
}

impl Default for Delimiter {
    fn default() -> Delimiter {
        Delimiter::new(b",")
    }
}

impl PartialEq for Delimiter {
    fn eq(&self, other: &Delimiter) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Delimiter {}

impl fmt::Debug for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Delimiter({:?})", String::from_utf8_lossy(&self.bytes))
    }
}

/// Choose a delimiter by counting candidates in the first line of input.
///
/// Each byte in [`DELIMITER_CANDIDATES`] is counted in `header`. The
/// candidate with the strictly highest count wins. When no candidate
/// appears, or when two candidates share the highest count, a comma is
/// chosen.
///
/// ```
/// use stdcsv_core::sniff_delimiter;
///
/// assert_eq!(sniff_delimiter(b"a,b|c,d,e"), b',');
/// assert_eq!(sniff_delimiter(b"a\tb\tc"), b'\t');
/// assert_eq!(sniff_delimiter(b"a|b;c"), b',');
/// ```
pub fn sniff_delimiter(header: &[u8]) -> u8 {
    let mut best = b',';
    let mut best_count = 0;
    let mut tied = false;
    for &candidate in DELIMITER_CANDIDATES {
        let count = memchr::memchr_iter(candidate, header).count();
        if count > best_count {
            best = candidate;
            best_count = count;
            tied = false;
        } else if count == best_count && count > 0 {
            tied = true;
        }
    }
    if tied {
        b','
    } else {
        best
    }
}
