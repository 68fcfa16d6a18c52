//! Linearization of the unordered pairs `(i, j), i < j` of `n` entities.
//!
//! Pairs are numbered row by row: `(0,1), (0,2), ..., (0,n-1), (1,2), ...`.
//! A [`PairRange`] is a half-open interval `[first, last)` over these numbers
//! and is the unit of work handed to a worker or an external job.

use crate::libs::error::{GofmError, Result};

/// `n(n-1)/2`
pub fn total_pairs(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Number of the first pair in row `i`
fn row_start(n: usize, i: usize) -> usize {
    // sum_{r<i} (n-1-r)
    i * (2 * n - i - 1) / 2
}

/// The pair at position `p` of the linearization.
///
/// ```
/// use gofm::libs::pairs::pair_at;
/// assert_eq!(pair_at(4, 0), (0, 1));
/// assert_eq!(pair_at(4, 2), (0, 3));
/// assert_eq!(pair_at(4, 3), (1, 2));
/// assert_eq!(pair_at(4, 5), (2, 3));
/// ```
pub fn pair_at(n: usize, p: usize) -> (usize, usize) {
    debug_assert!(p < total_pairs(n));

    // closed-form estimate, then fix rounding
    let nf = n as f64;
    let disc = (2.0 * nf - 1.0).powi(2) - 8.0 * p as f64;
    let mut i = (((2.0 * nf - 1.0) - disc.max(0.0).sqrt()) / 2.0).floor() as usize;
    i = i.min(n.saturating_sub(2));
    while i > 0 && row_start(n, i) > p {
        i -= 1;
    }
    while i + 1 < n && row_start(n, i + 1) <= p {
        i += 1;
    }

    let j = i + 1 + (p - row_start(n, i));
    (i, j)
}

/// Position of pair `(i, j)` with `i < j`
pub fn index_of(n: usize, i: usize, j: usize) -> usize {
    debug_assert!(i < j && j < n);
    row_start(n, i) + (j - i - 1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PairRange {
    pub first: usize,
    pub last: usize,
}

impl PairRange {
    pub fn new(first: usize, last: usize) -> Self {
        Self { first, last }
    }

    /// All pairs of `n` entities
    pub fn full(n: usize) -> Self {
        Self::new(0, total_pairs(n))
    }

    /// Validate a user-supplied range against `n` entities.
    ///
    /// `last` of `None` means the end of the linearization.
    pub fn checked(n: usize, first: usize, last: Option<usize>) -> Result<Self> {
        let total = total_pairs(n);
        let last = last.unwrap_or(total);
        if first > last || last > total {
            return Err(GofmError::InvalidParameter(format!(
                "pair range [{}, {}) outside [0, {})",
                first, last, total
            )));
        }
        Ok(Self::new(first, last))
    }

    pub fn len(&self) -> usize {
        self.last - self.first
    }

    pub fn is_empty(&self) -> bool {
        self.first >= self.last
    }

    /// Split `[0, total)` into `parts` contiguous ranges whose sizes differ by at most one.
    ///
    /// ```
    /// use gofm::libs::pairs::PairRange;
    /// let parts = PairRange::split(10, 3);
    /// assert_eq!(parts, vec![PairRange::new(0, 4), PairRange::new(4, 7), PairRange::new(7, 10)]);
    /// assert_eq!(PairRange::split(2, 5).len(), 2);
    /// ```
    pub fn split(total: usize, parts: usize) -> Vec<PairRange> {
        let parts = parts.max(1).min(total.max(1));
        let base = total / parts;
        let extra = total % parts;

        let mut ranges = Vec::with_capacity(parts);
        let mut start = 0;
        for k in 0..parts {
            let size = base + usize::from(k < extra);
            ranges.push(PairRange::new(start, start + size));
            start += size;
        }
        ranges
    }

    /// Cut this range into consecutive pieces of at most `size` pairs
    pub fn chunks(&self, size: usize) -> Vec<PairRange> {
        let size = size.max(1);
        let mut ranges = vec![];
        let mut start = self.first;
        while start < self.last {
            let end = (start + size).min(self.last);
            ranges.push(PairRange::new(start, end));
            start = end;
        }
        ranges
    }

    /// Iterate the `(i, j)` pairs of this range for `n` entities
    pub fn iter(&self, n: usize) -> PairIter {
        let (i, j) = if self.is_empty() {
            (0, 0)
        } else {
            pair_at(n, self.first)
        };
        PairIter {
            n,
            i,
            j,
            remaining: self.len(),
        }
    }
}

impl std::fmt::Display for PairRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

pub struct PairIter {
    n: usize,
    i: usize,
    j: usize,
    remaining: usize,
}

impl Iterator for PairIter {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = (self.i, self.j);
        self.remaining -= 1;
        self.j += 1;
        if self.j >= self.n {
            self.i += 1;
            self.j = self.i + 1;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
