//! Printable character counting
//!
//! Index mapping used by every table in this module: index 0 is `' '` (32),
//! index 94 is `'~'` (126).

use crate::protocol::{PRINTABLE_COUNT, PRINTABLE_MAX, PRINTABLE_MIN};
use std::io::{self, Write};

/// A byte known to lie in the printable ASCII range
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrintableChar(u8);

impl PrintableChar {
    pub fn from_byte(b: u8) -> Option<Self> {
        if (PRINTABLE_MIN..=PRINTABLE_MAX).contains(&b) {
            Some(Self(b))
        } else {
            None
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        if index < PRINTABLE_COUNT {
            Some(Self(PRINTABLE_MIN + index as u8))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        (self.0 - PRINTABLE_MIN) as usize
    }

    pub fn as_char(self) -> char {
        self.0 as char
    }

    /// All printable characters in ascending order
    pub fn all() -> impl Iterator<Item = PrintableChar> {
        (PRINTABLE_MIN..=PRINTABLE_MAX).map(PrintableChar)
    }
}

/// Per-connection histogram. A single payload is at most `u32::MAX` bytes,
/// so no bucket can overflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    buckets: [u32; PRINTABLE_COUNT],
}

impl Default for Tally {
    fn default() -> Self {
        Self::new()
    }
}

impl Tally {
    pub fn new() -> Self {
        Self {
            buckets: [0; PRINTABLE_COUNT],
        }
    }

    pub fn get(&self, c: PrintableChar) -> u32 {
        self.buckets[c.index()]
    }

    /// Sum of all buckets
    pub fn count(&self) -> u64 {
        self.buckets.iter().map(|&n| n as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|&n| n == 0)
    }

    /// Add the printable bytes of `bytes`, returning how many there were.
    /// A payload may be fed in any number of pieces.
    pub fn record(&mut self, bytes: &[u8]) -> u32 {
        let mut count = 0u32;
        for &b in bytes {
            if let Some(c) = PrintableChar::from_byte(b) {
                self.buckets[c.index()] += 1;
                count += 1;
            }
        }
        count
    }
}

/// Count printable bytes in `payload` and build its histogram.
pub fn count_printable(payload: &[u8]) -> (u32, Tally) {
    let mut tally = Tally::new();
    let count = tally.record(payload);
    (count, tally)
}

/// Process-wide totals. Only ever grows, one fold per completed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totals {
    buckets: [u64; PRINTABLE_COUNT],
    connections: u64,
}

impl Default for Totals {
    fn default() -> Self {
        Self::new()
    }
}

impl Totals {
    pub fn new() -> Self {
        Self {
            buckets: [0; PRINTABLE_COUNT],
            connections: 0,
        }
    }

    pub fn fold(&mut self, tally: &Tally) {
        for (total, &n) in self.buckets.iter_mut().zip(tally.buckets.iter()) {
            *total += n as u64;
        }
        self.connections += 1;
    }

    pub fn get(&self, c: PrintableChar) -> u64 {
        self.buckets[c.index()]
    }

    /// Number of connections folded in so far
    pub fn connections(&self) -> u64 {
        self.connections
    }

    pub fn printable_total(&self) -> u64 {
        self.buckets.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrintableChar, u64)> + '_ {
        PrintableChar::all().map(move |c| (c, self.buckets[c.index()]))
    }

    /// One `char '<c>' : <n> times` line per printable character, ascending
    pub fn write_report<W: Write>(&self, mut out: W) -> io::Result<()> {
        for (c, n) in self.iter() {
            writeln!(out, "char '{}' : {} times", c.as_char(), n)?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(c: char) -> PrintableChar {
        PrintableChar::from_byte(c as u8).unwrap()
    }

    #[test]
    fn test_index_mapping_bounds() {
        assert_eq!(PrintableChar::from_index(0).unwrap().as_char(), ' ');
        assert_eq!(PrintableChar::from_index(94).unwrap().as_char(), '~');
        assert!(PrintableChar::from_index(95).is_none());
        assert!(PrintableChar::from_byte(31).is_none());
        assert!(PrintableChar::from_byte(127).is_none());
        assert_eq!(ch('A').index(), 33);
        assert_eq!(PrintableChar::all().count(), PRINTABLE_COUNT);
    }

    #[test]
    fn test_count_mixed_payload() {
        let (count, tally) = count_printable(b"AB\x01C ");
        assert_eq!(count, 4);
        for c in ['A', 'B', 'C', ' '] {
            assert_eq!(tally.get(ch(c)), 1);
        }
        assert_eq!(tally.count(), 4);
    }

    #[test]
    fn test_count_empty_payload() {
        let (count, tally) = count_printable(b"");
        assert_eq!(count, 0);
        assert!(tally.is_empty());
    }

    #[test]
    fn test_count_matches_histogram_sum_for_all_bytes() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let (count, tally) = count_printable(&payload);
        assert_eq!(count as u64, tally.count());

        // Every byte value outside [32,126] is ignored entirely
        let noise: Vec<u8> = (0..32u8).chain(127..=255u8).collect();
        let (count, tally) = count_printable(&noise);
        assert_eq!(count, 0);
        assert!(tally.is_empty());
    }

    #[test]
    fn test_repeated_characters() {
        let (count, tally) = count_printable(b"~~~ ~\n");
        assert_eq!(count, 5);
        assert_eq!(tally.get(ch('~')), 4);
        assert_eq!(tally.get(ch(' ')), 1);
    }

    #[test]
    fn test_record_in_pieces_matches_whole() {
        let payload = b"Hello,\x00 world!\x7f~";
        let (whole_count, whole) = count_printable(payload);

        let mut pieces = Tally::new();
        let mut count = 0;
        for piece in payload.chunks(3) {
            count += pieces.record(piece);
        }
        assert_eq!(count, whole_count);
        assert_eq!(pieces, whole);
    }

    #[test]
    fn test_totals_fold_is_elementwise_sum() {
        let mut totals = Totals::new();
        let (_, a) = count_printable(b"aab");
        let (_, b) = count_printable(b"b\tc");
        totals.fold(&a);
        totals.fold(&b);

        assert_eq!(totals.get(ch('a')), 2);
        assert_eq!(totals.get(ch('b')), 2);
        assert_eq!(totals.get(ch('c')), 1);
        assert_eq!(totals.printable_total(), 5);
        assert_eq!(totals.connections(), 2);
    }

    #[test]
    fn test_report_format_and_order() {
        let mut totals = Totals::new();
        totals.fold(&count_printable(b"~  !").1);

        let mut out = Vec::new();
        totals.write_report(&mut out).unwrap();
        let report = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = report.lines().collect();

        assert_eq!(lines.len(), 95);
        assert_eq!(lines[0], "char ' ' : 2 times");
        assert_eq!(lines[1], "char '!' : 1 times");
        assert_eq!(lines[2], "char '\"' : 0 times");
        assert_eq!(lines[94], "char '~' : 1 times");
    }
}
