//! Threshold scans over a populated link matrix.

use crate::bits;
use crate::matrix::CompressedLinkMatrix;

/// One matrix cell that met the support threshold, by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkCount {
    pub row: usize,
    pub col: usize,
    pub support: u32,
}

/// Lazy row-major scan yielding every cell with `support >= min_support`.
///
/// Holds only a shared borrow of the matrix; call
/// [`links_at_or_above`] again to restart the scan.
#[derive(Debug, Clone)]
pub struct LinksAtOrAbove<'a> {
    matrix: &'a CompressedLinkMatrix,
    min_support: u32,
    row: usize,
    col: usize,
}

/// Scan `matrix` for cells supported by at least `min_support` datasets.
///
/// A threshold of 0 is treated as 1: a cell with no supporting dataset is
/// never a link.
pub fn links_at_or_above(matrix: &CompressedLinkMatrix, min_support: u32) -> LinksAtOrAbove<'_> {
    LinksAtOrAbove {
        matrix,
        min_support: min_support.max(1),
        row: 0,
        col: 0,
    }
}

impl Iterator for LinksAtOrAbove<'_> {
    type Item = LinkCount;

    fn next(&mut self) -> Option<LinkCount> {
        let (rows, cols) = (self.matrix.rows(), self.matrix.cols());
        if cols == 0 {
            return None;
        }
        while self.row < rows {
            let (row, col) = (self.row, self.col);
            self.col += 1;
            if self.col == cols {
                self.col = 0;
                self.row += 1;
            }
            let support = bits::pop_count(self.matrix.cell_words(row, col));
            if support >= self.min_support {
                return Some(LinkCount { row, col, support });
            }
        }
        None
    }
}

/// Cell counts per support level: entry `k` is the number of cells supported
/// by exactly `k` datasets. The vector has `dataset_count + 1` entries.
pub fn support_histogram(matrix: &CompressedLinkMatrix) -> Vec<u64> {
    let mut histogram = vec![0u64; matrix.dataset_count() + 1];
    for row in 0..matrix.rows() {
        for col in 0..matrix.cols() {
            let support = bits::pop_count(matrix.cell_words(row, col)) as usize;
            histogram[support] += 1;
        }
    }
    histogram
}
