//! Binning containers
//!
//! Each one routes a datum to exactly one sub-container chosen by a quantity:
//!
//! - [`Bin`]: fixed number of equal bins over `[low, high)` plus
//!   underflow, overflow and nanflow
//! - [`SparselyBin`]: unbounded equal-width bins, created on first fill
//! - [`Categorize`]: one bin per distinct string

mod bin;
mod categorize;
mod sparse;

pub use bin::Bin;
pub use categorize::Categorize;
pub use sparse::SparselyBin;
