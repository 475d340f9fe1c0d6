//! Compressed gene × gene link matrix.
//!
//! Every cell `(row, col)` holds a bitset with one bit per dataset. Cells are
//! laid out row-major in a single flat `Vec<u64>`, each occupying
//! `words_per_cell` consecutive words, so a whole row is one contiguous slice.
//! The matrix stores no identities; callers resolve indices through their own
//! [`IndexedAxis`](crate::axis::IndexedAxis) instances.

use coexlink_common::{CoexLinkError, Result};
use tracing::debug;

use crate::bits::{self, words_for_bits};

#[derive(Debug, Clone)]
pub struct CompressedLinkMatrix {
    rows: usize,
    cols: usize,
    datasets: usize,
    words_per_cell: usize,
    words: Vec<u64>,
}

impl CompressedLinkMatrix {
    /// Allocate a zeroed `rows × cols` matrix with `datasets` bits per cell.
    /// The allocation is sized once and never grows.
    pub fn new(rows: usize, cols: usize, datasets: usize) -> Result<Self> {
        let words_per_cell = words_for_bits(datasets);
        let total = rows
            .checked_mul(cols)
            .and_then(|cells| cells.checked_mul(words_per_cell))
            .ok_or_else(|| {
                CoexLinkError::Capacity(format!("{rows} x {cols} x {datasets} bits overflows usize"))
            })?;

        debug!(
            rows,
            cols,
            datasets,
            words_per_cell,
            bytes = total * std::mem::size_of::<u64>(),
            "Allocating link matrix"
        );

        Ok(Self {
            rows,
            cols,
            datasets,
            words_per_cell,
            words: vec![0u64; total],
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn dataset_count(&self) -> usize {
        self.datasets
    }

    pub fn words_per_cell(&self) -> usize {
        self.words_per_cell
    }

    fn check(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.rows {
            return Err(CoexLinkError::out_of_range("row", row, self.rows));
        }
        if col >= self.cols {
            return Err(CoexLinkError::out_of_range("column", col, self.cols));
        }
        Ok(())
    }

    fn check_bit(&self, bit: usize) -> Result<()> {
        if bit >= self.datasets {
            return Err(CoexLinkError::out_of_range("dataset bit", bit, self.datasets));
        }
        Ok(())
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        (row * self.cols + col) * self.words_per_cell
    }

    /// Unchecked cell access for scans that iterate within bounds.
    #[inline]
    pub(crate) fn cell_words(&self, row: usize, col: usize) -> &[u64] {
        let start = self.offset(row, col);
        &self.words[start..start + self.words_per_cell]
    }

    /// Words backing cell `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> Result<&[u64]> {
        self.check(row, col)?;
        let start = self.offset(row, col);
        Ok(&self.words[start..start + self.words_per_cell])
    }

    pub fn set(&mut self, row: usize, col: usize, bit: usize) -> Result<()> {
        self.check(row, col)?;
        self.check_bit(bit)?;
        let start = self.offset(row, col);
        bits::set_bit(&mut self.words[start..start + self.words_per_cell], bit)
    }

    pub fn get(&self, row: usize, col: usize, bit: usize) -> Result<bool> {
        self.check_bit(bit)?;
        bits::test_bit(self.cell(row, col)?, bit)
    }

    /// Number of distinct datasets supporting the pair `(row, col)`.
    pub fn support_count(&self, row: usize, col: usize) -> Result<u32> {
        Ok(bits::pop_count(self.cell(row, col)?))
    }

    /// Support counts for every column of `row`, in column order.
    pub fn row_support_counts(&self, row: usize) -> Result<Vec<u32>> {
        if row >= self.rows {
            return Err(CoexLinkError::out_of_range("row", row, self.rows));
        }
        Ok((0..self.cols)
            .map(|col| {
                let start = self.offset(row, col);
                bits::pop_count(&self.words[start..start + self.words_per_cell])
            })
            .collect())
    }

    /// Disjoint mutable views over every row, in row order.
    ///
    /// Each view can be handed to a different worker; no two views share
    /// storage, so population needs no locking.
    pub fn rows_mut(&mut self) -> Vec<LinkRowMut<'_>> {
        let (cols, datasets, words_per_cell) = (self.cols, self.datasets, self.words_per_cell);
        let stride = cols * words_per_cell;
        if stride == 0 {
            return (0..self.rows)
                .map(|row| LinkRowMut { row, cols, datasets, words_per_cell, words: &mut [] })
                .collect();
        }
        self.words
            .chunks_exact_mut(stride)
            .enumerate()
            .map(|(row, words)| LinkRowMut { row, cols, datasets, words_per_cell, words })
            .collect()
    }
}

/// Exclusive write access to a single matrix row.
#[derive(Debug)]
pub struct LinkRowMut<'a> {
    row: usize,
    cols: usize,
    datasets: usize,
    words_per_cell: usize,
    words: &'a mut [u64],
}

impl LinkRowMut<'_> {
    pub fn index(&self) -> usize {
        self.row
    }

    fn cell_start(&self, col: usize) -> Result<usize> {
        if col >= self.cols {
            return Err(CoexLinkError::out_of_range("column", col, self.cols));
        }
        Ok(col * self.words_per_cell)
    }

    pub fn set(&mut self, col: usize, bit: usize) -> Result<()> {
        let start = self.cell_start(col)?;
        if bit >= self.datasets {
            return Err(CoexLinkError::out_of_range("dataset bit", bit, self.datasets));
        }
        bits::set_bit(&mut self.words[start..start + self.words_per_cell], bit)
    }

    pub fn support_count(&self, col: usize) -> Result<u32> {
        let start = self.cell_start(col)?;
        Ok(bits::pop_count(&self.words[start..start + self.words_per_cell]))
    }
}
