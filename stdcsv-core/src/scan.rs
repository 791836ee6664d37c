use core::ops::Range;

use crate::dialect::{Delimiter, Quotes, QUOTE};

/// The rules shared by every field scanner.
#[derive(Clone, Debug, Default)]
pub struct FieldRules {
    /// The delimiter separating fields.
    pub delimiter: Delimiter,
    /// When set, leading and trailing ASCII whitespace is removed from
    /// every field.
    pub trim: bool,
}

impl FieldRules {
    /// Rules for the given delimiter, without trimming.
    pub fn new(delimiter: Delimiter) -> FieldRules {
        FieldRules { delimiter, trim: false }
    }
}

/// Where a field ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldEnd {
    /// The field's bytes inside the scanned text, for fields that didn't
    /// need transforming. `None` means the field was written to the
    /// scanner's output buffer instead.
    pub span: Option<Range<usize>>,
    /// The position at which the next field starts.
    pub next: usize,
    /// Whether the field was terminated by a delimiter (as opposed to the
    /// end of the text).
    pub delimited: bool,
}

/// The result of scanning one field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Scan {
    /// The field is complete.
    Field(FieldEnd),
    /// The text ran out while a quoted field was still open.
    ///
    /// To continue, the caller appends another line to the text, pushes its
    /// embedded break replacement onto the output buffer and calls
    /// `scan_field` again with the position where the new line starts.
    Open,
}

/// A scanner for one field under one quoting convention.
///
/// A scanner is stateful only across `Scan::Open` results: after `reset`,
/// the first call must point `pos` at the first byte of the field, and each
/// call after `Scan::Open` points `pos` at the first byte of the line that
/// was appended.
pub trait ScanField {
    /// Prepare to scan a new field.
    fn reset(&mut self);

    /// Scan a field in `text` starting at `pos`.
    ///
    /// Field content that has to be rewritten is appended to `out`.
    fn scan_field(
        &mut self,
        rules: &FieldRules,
        text: &[u8],
        pos: usize,
        out: &mut Vec<u8>,
    ) -> Scan;
}

/// Scans fields with no regard for quotes.
///
/// The field ends at the first complete occurrence of the delimiter (a
/// partial match of a multi-byte delimiter does not count) or at the end
/// of the text. Fields are never copied.
#[derive(Clone, Debug, Default)]
pub struct NoneScanner;

impl ScanField for NoneScanner {
    fn reset(&mut self) {}

    fn scan_field(
        &mut self,
        rules: &FieldRules,
        text: &[u8],
        pos: usize,
        _out: &mut Vec<u8>,
    ) -> Scan {
        let (end, next, delimited) = match rules.delimiter.find(&text[pos..]) {
            Some(i) => (pos + i, pos + i + rules.delimiter.len(), true),
            None => (text.len(), text.len(), false),
        };

        let mut start = pos;
        let mut trailing = 0;
        if rules.trim {
            while start < end && text[start].is_ascii_whitespace() {
                start += 1;
            }
            for &b in &text[start..end] {
                if b.is_ascii_whitespace() {
                    trailing += 1;
                } else {
                    trailing = 0;
                }
            }
        }
        let span = Some(start..end - trailing);
        Scan::Field(FieldEnd { span, next, delimited })
    }
}

/// Scans weakly quoted fields.
///
/// The field must start with a quote. It ends at the first quote that is
/// followed by the delimiter, or at a quote that ends the text. Every other
/// quote is part of the field's content.
#[derive(Clone, Debug, Default)]
pub struct WeakScanner {
    started: bool,
}

impl ScanField for WeakScanner {
    fn reset(&mut self) {
        self.started = false;
    }

    fn scan_field(
        &mut self,
        rules: &FieldRules,
        text: &[u8],
        pos: usize,
        out: &mut Vec<u8>,
    ) -> Scan {
        let content = if self.started {
            pos
        } else {
            debug_assert_eq!(text.get(pos), Some(&QUOTE));
            self.started = true;
            pos + 1
        };
        let hay = &text[content..];

        if let Some(i) = rules.delimiter.find_weak(hay) {
            out.extend_from_slice(&hay[..i]);
            finish(rules, out);
            return Scan::Field(FieldEnd {
                span: None,
                next: content + i + rules.delimiter.weak().len(),
                delimited: true,
            });
        }
        if let Some((&QUOTE, init)) = hay.split_last() {
            out.extend_from_slice(init);
            finish(rules, out);
            return Scan::Field(FieldEnd {
                span: None,
                next: text.len(),
                delimited: false,
            });
        }
        out.extend_from_slice(hay);
        Scan::Open
    }
}

/// Scans fields quoted according to RFC 4180.
///
/// Inside quotes, a doubled quote stands for one literal quote and a
/// single quote ends the quoted section. The delimiter only ends the field
/// outside of quotes. Bytes between a closing quote and the delimiter are
/// kept as they are.
#[derive(Clone, Debug, Default)]
pub struct Rfc4180Scanner {
    started: bool,
    qualified: bool,
    last_was_quote: bool,
}

impl ScanField for Rfc4180Scanner {
    fn reset(&mut self) {
        *self = Rfc4180Scanner::default();
    }

    fn scan_field(
        &mut self,
        rules: &FieldRules,
        text: &[u8],
        pos: usize,
        out: &mut Vec<u8>,
    ) -> Scan {
        let mut i = pos;
        if !self.started {
            debug_assert_eq!(text.get(pos), Some(&QUOTE));
            self.started = true;
            self.qualified = true;
            i += 1;
        }

        let delim = rules.delimiter.as_bytes();
        while i < text.len() {
            if self.qualified {
                match memchr::memchr(QUOTE, &text[i..]) {
                    None => {
                        out.extend_from_slice(&text[i..]);
                        i = text.len();
                    }
                    Some(j) => {
                        out.extend_from_slice(&text[i..i + j]);
                        self.qualified = false;
                        self.last_was_quote = true;
                        i += j + 1;
                    }
                }
            } else if text[i] == QUOTE {
                // A quote right after a closing quote is an escaped quote.
                if self.last_was_quote {
                    out.push(QUOTE);
                }
                self.qualified = true;
                self.last_was_quote = false;
                i += 1;
            } else if text[i..].starts_with(delim) {
                finish(rules, out);
                return Scan::Field(FieldEnd {
                    span: None,
                    next: i + delim.len(),
                    delimited: true,
                });
            } else {
                out.push(text[i]);
                self.last_was_quote = false;
                i += 1;
            }
        }

        if self.qualified {
            return Scan::Open;
        }
        finish(rules, out);
        Scan::Field(FieldEnd {
            span: None,
            next: text.len(),
            delimited: false,
        })
    }
}

/// Apply trimming to a completed owned field.
fn finish(rules: &FieldRules, out: &mut Vec<u8>) {
    if !rules.trim {
        return;
    }
    let leading = out.iter().take_while(|b| b.is_ascii_whitespace()).count();
    out.drain(..leading);
    let trailing =
        out.iter().rev().take_while(|b| b.is_ascii_whitespace()).count();
    out.truncate(out.len() - trailing);
}

/// One scanner of each kind, selected per field.
#[derive(Clone, Debug, Default)]
pub struct ScannerSet {
    none: NoneScanner,
    weak: WeakScanner,
    rfc4180: Rfc4180Scanner,
}

impl ScannerSet {
    /// Create a new set of scanners.
    pub fn new() -> ScannerSet {
        ScannerSet::default()
    }

    /// Pick and reset the scanner for a field.
    ///
    /// The quoted scanners are only used when `quotes` gives quotes a
    /// meaning and the field's first byte is a quote. Everything else is
    /// scanned without regard for quotes.
    pub fn select(&mut self, quotes: Quotes, first: u8) -> &mut dyn ScanField {
        let scanner: &mut dyn ScanField = if first != QUOTE {
            &mut self.none
        } else {
            match quotes.for_reading() {
                Quotes::None => &mut self.none,
                Quotes::Weak => &mut self.weak,
                Quotes::Rfc4180 | Quotes::All => &mut self.rfc4180,
            }
        };
        scanner.reset();
        scanner
    }
}
