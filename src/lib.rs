//! # Histoflow
//!
//! Composable, mergeable histogram and statistics containers.
//!
//! Every container starts empty, accumulates weighted data through `fill`,
//! and combines with another container of the same shape through `merge`.
//! Containers nest: a [`Bin`](binning::Bin) of [`Average`](leaf::Average)s is
//! a profile plot, a [`Label`](collection::Label) of histograms fills several
//! plots from one pass over the data.
//!
//! ## Features
//!
//! - **Leaf statistics**: Count, Sum, Average, Deviate, Minimize, Maximize, Bag
//! - **Binning**: fixed (`Bin`), unbounded sparse (`SparselyBin`) and
//!   string-keyed (`Categorize`) binning
//! - **Collections**: Label, UntypedLabel, Index, Branch, Fraction, Stack,
//!   Partition, Limit
//! - **Full Mergeability**: `merge` is associative and commutative, so data
//!   can be split across workers and reduced in any order
//! - **Wire Format**: a self-describing JSON encoding that round-trips every
//!   container, including ones with no entries
//!
//! ## Quick Start
//!
//! ```rust
//! use histoflow::prelude::*;
//!
//! let mut hist = Bin::new(10, 0.0, 100.0, Quantity::<f64>::identity(), Count::new(), Count::new()).unwrap();
//! for x in [3.0, 14.0, 15.5, 92.0, 120.0] {
//!     hist.add(&x).unwrap();
//! }
//! assert_eq!(hist.values()[1].entries(), 2.0);
//! assert_eq!(hist.overflow().entries(), 1.0);
//! ```
//!
//! ## Distributed Computing
//!
//! `fill` mutates one container; `merge` never mutates its operands, so the
//! usual pattern is one container per worker and a reduction at the end:
//!
//! ```rust
//! use histoflow::prelude::*;
//!
//! let template = SparselyBin::new(1.0, Quantity::<f64>::identity(), Count::new(), Count::new()).unwrap();
//! let mut worker1 = template.zero();
//! let mut worker2 = template.zero();
//!
//! // Each worker processes its partition
//! worker1.add(&2.5).unwrap();
//! worker2.add(&2.7).unwrap();
//! worker2.add(&9.1).unwrap();
//!
//! // Merge results
//! let total = merge_all([worker1, worker2]).unwrap().unwrap();
//! assert_eq!(total.entries(), 3.0);
//! assert_eq!((total.min_bin(), total.max_bin()), (Some(2), Some(9)));
//! ```
//!
//! ## Wire Format
//!
//! ```rust
//! use histoflow::prelude::*;
//!
//! let mut count = Count::<f64>::new();
//! count.add(&1.0).unwrap();
//! let text = histoflow::wire::to_wire_string(&count).unwrap();
//! assert_eq!(text, r#"{"type":"Count","data":1.0}"#);
//!
//! // Decode without knowing the shape up front
//! let any: Aggregator<f64> = histoflow::wire::from_wire_str(&text).unwrap();
//! assert_eq!(any.name(), "Count");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod aggregator;
pub mod binning;
pub mod collection;
pub mod error;
pub mod leaf;
pub mod math;
pub mod quantity;
pub mod traits;
pub mod wire;

pub mod prelude {
    pub use crate::aggregator::Aggregator;
    pub use crate::binning::{Bin, Categorize, SparselyBin};
    pub use crate::collection::{
        Branch, Fraction, Index, Label, Limit, Partition, Stack, UntypedLabel,
    };
    pub use crate::error::{Error, Result};
    pub use crate::leaf::{Average, Bag, BagRange, Count, Deviate, Maximize, Minimize, Sum};
    pub use crate::quantity::{Quantity, Transform, Value};
    pub use crate::traits::*;
}

pub use aggregator::Aggregator;
pub use error::{Error, Result};
pub use traits::Container;
