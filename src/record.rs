use std::fmt;
use std::ops::{self, Range};
use std::sync::Arc;

use memmap2::Mmap;

/// The text of one record, as read from its source.
#[derive(Clone)]
pub(crate) enum RawText {
    /// Text copied into a reusable buffer. Only `buf[..len]` is valid.
    Owned { buf: Vec<u8>, len: usize },
    /// Text borrowed from a shared memory map.
    Mapped { map: Arc<Mmap>, start: usize, end: usize },
}

impl Default for RawText {
    fn default() -> RawText {
        RawText::Owned { buf: vec![], len: 0 }
    }
}

impl RawText {
    pub(crate) fn as_bytes(&self) -> &[u8] {
        match *self {
            RawText::Owned { ref buf, len } => &buf[..len],
            RawText::Mapped { ref map, start, end } => &map[start..end],
        }
    }

    /// The owned buffer and its valid length, dropping any mapped text.
    pub(crate) fn owned_parts(&mut self) -> (&mut Vec<u8>, &mut usize) {
        if let RawText::Mapped { .. } = *self {
            *self = RawText::default();
        }
        match *self {
            RawText::Owned { ref mut buf, ref mut len } => (buf, len),
            RawText::Mapped { .. } => unreachable!("mapped text was replaced"),
        }
    }

    /// Replace the text with a copy of `text`.
    pub(crate) fn set(&mut self, text: &[u8]) {
        let (buf, len) = self.owned_parts();
        buf.clear();
        buf.extend_from_slice(text);
        *len = text.len();
    }
}

/// Where a field's bytes live.
#[derive(Clone, Debug, Default)]
pub(crate) struct Slot {
    /// The field's location in the raw text, used when `is_owned` is false.
    pub(crate) span: Range<usize>,
    /// The field's rewritten content, used when `is_owned` is true.
    pub(crate) owned: Vec<u8>,
    pub(crate) is_owned: bool,
}

/// A single record read from delimited text.
///
/// A record remembers the raw text it was parsed from. Fields that appear
/// verbatim in that text are stored as offsets into it. Fields that had to
/// be rewritten (quotes removed, line breaks replaced) have their own
/// buffers.
///
/// Records are meant to be reused: reading into a record discards its old
/// fields but keeps every allocation.
#[derive(Clone, Default)]
pub struct Record {
    pub(crate) raw: RawText,
    pub(crate) slots: Vec<Slot>,
    pub(crate) len: usize,
}

impl Record {
    /// Create a new empty record.
    pub fn new() -> Record {
        Record::default()
    }

    /// Return the field at index `i`.
    ///
    /// If no field at index `i` exists, then this returns `None`.
    pub fn get(&self, i: usize) -> Option<&[u8]> {
        if i >= self.len {
            return None;
        }
        let slot = &self.slots[i];
        if slot.is_owned {
            Some(&slot.owned)
        } else {
            self.raw.as_bytes().get(slot.span.clone())
        }
    }

    /// Returns true if field `i` has its own buffer rather than pointing
    /// into the raw text.
    pub fn is_owned(&self, i: usize) -> bool {
        i < self.len && self.slots[i].is_owned
    }

    /// Returns true if and only if this record has no fields.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of fields in this record.
    pub fn len(&self) -> usize {
        self.len
    }

    /// The raw text this record was parsed from.
    ///
    /// For records spanning multiple lines, the lines are joined by `\n`
    /// (or by whatever terminator the file used, for memory mapped input).
    pub fn raw(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    /// The length of the raw text in bytes.
    pub fn raw_len(&self) -> usize {
        self.raw().len()
    }

    /// Clear this record so that it has zero fields.
    ///
    /// Note that it is not necessary to clear the record to reuse it with
    /// a reader.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Returns an iterator over all fields in this record.
    pub fn iter(&self) -> RecordIter<'_> {
        RecordIter { rec: self, i: 0 }
    }

    /// Start a new field, reusing an old slot when there is one.
    pub(crate) fn push_slot(&mut self) -> usize {
        let i = self.len;
        if i < self.slots.len() {
            let slot = &mut self.slots[i];
            slot.span = 0..0;
            slot.owned.clear();
            slot.is_owned = false;
        } else {
            self.slots.push(Slot::default());
        }
        self.len += 1;
        i
    }

    /// Pad with empty fields or drop fields until there are exactly `n`.
    pub(crate) fn normalize(&mut self, n: usize) {
        while self.len < n {
            self.push_slot();
        }
        self.len = n;
    }
}

impl ops::Index<usize> for Record {
    type Output = [u8];

    fn index(&self, i: usize) -> &[u8] {
        match self.get(i) {
            Some(field) => field,
            None => panic!("field index {} out of bounds ({})", i, self.len),
        }
    }
}

impl<'a> IntoIterator for &'a Record {
    type IntoIter = RecordIter<'a>;
    type Item = &'a [u8];

    fn into_iter(self) -> RecordIter<'a> {
        self.iter()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter().map(bstr::BStr::new)).finish()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Record) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for Record {}

impl<T: AsRef<[u8]>> PartialEq<[T]> for Record {
    fn eq(&self, other: &[T]) -> bool {
        self.iter().eq(other.iter().map(|f| f.as_ref()))
    }
}

impl<T: AsRef<[u8]>> PartialEq<Vec<T>> for Record {
    fn eq(&self, other: &Vec<T>) -> bool {
        self == other.as_slice()
    }
}

/// An iterator over the fields in a record.
#[derive(Clone, Debug)]
pub struct RecordIter<'a> {
    rec: &'a Record,
    i: usize,
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let field = self.rec.get(self.i)?;
        self.i += 1;
        Some(field)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rec.len().saturating_sub(self.i);
        (n, Some(n))
    }
}

impl<'a> ExactSizeIterator for RecordIter<'a> {}
