//! coexlink-matrix — Packed-bit storage for gene × gene × dataset link evidence.

pub mod bits;
pub mod axis;
pub mod matrix;
pub mod query;

pub use axis::IndexedAxis;
pub use matrix::{CompressedLinkMatrix, LinkRowMut};
pub use query::{links_at_or_above, support_histogram, LinkCount, LinksAtOrAbove};
