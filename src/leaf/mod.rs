//! Leaf containers: fixed-shape accumulators with no children
//!
//! - [`Count`]: total weight
//! - [`Sum`]: weighted sum of a quantity
//! - [`Average`]: weighted mean
//! - [`Deviate`]: weighted mean and variance
//! - [`Minimize`] / [`Maximize`]: running extremes
//! - [`Bag`]: multiset of observed values
//!
//! # Example
//!
//! ```
//! use histoflow::leaf::Deviate;
//! use histoflow::quantity::Quantity;
//! use histoflow::traits::Container;
//!
//! let mut left = Deviate::new(Quantity::<f64>::identity());
//! let mut right = left.zero();
//! for v in [1.0, 2.0, 3.0] {
//!     left.add(&v).unwrap();
//! }
//! for v in [4.0, 5.0, 6.0] {
//!     right.add(&v).unwrap();
//! }
//! let all = left.merge(&right).unwrap();
//! assert!((all.mean() - 3.5).abs() < 1e-12);
//! ```

mod bag;
mod count;
mod extremes;
mod moments;
mod sum;

pub use bag::{Bag, BagRange, BagValue};
pub use count::Count;
pub use extremes::{Maximize, Minimize};
pub use moments::{Average, Deviate};
pub use sum::Sum;
