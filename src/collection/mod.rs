//! Collection containers
//!
//! These hold several sub-aggregators side by side. [`Label`], [`Index`]
//! and their untyped twins [`UntypedLabel`] and [`Branch`] fill every child
//! with every datum; [`Fraction`], [`Stack`] and [`Partition`] pick children
//! by a selection or a set of cuts; [`Limit`] drops its child once too much
//! weight has been seen.

mod fraction;
mod index;
mod label;
mod limit;
mod stack;

pub use fraction::Fraction;
pub use index::{Branch, Index};
pub use label::{Label, UntypedLabel};
pub use limit::Limit;
pub use stack::{Partition, Stack};

use crate::error::{Error, Result};
use crate::traits::Container;

/// Fill every child, after checking that none of them will fail.
pub(crate) fn fill_all<'a, C, I>(children: I, datum: &C::Datum, weight: f64) -> Result<()>
where
    C: Container + ?Sized + 'a,
    I: IntoIterator<Item = &'a mut C>,
{
    let mut children: Vec<&mut C> = children.into_iter().collect();
    for child in &children {
        child.check_fill(datum)?;
    }
    for child in &mut children {
        child.fill(datum, weight)?;
    }
    Ok(())
}

/// Fail unless all children share one container type, returning it.
pub(crate) fn common_type<'a, C>(
    container: &str,
    mut children: impl Iterator<Item = &'a C>,
) -> Result<&'static str>
where
    C: Container + 'a,
{
    let first = children
        .next()
        .ok_or_else(|| Error::construction(format!("{} needs at least one child", container)))?
        .name();
    match children.find(|c| c.name() != first) {
        Some(other) => Err(Error::construction(format!(
            "all {} children must have the same type, found {} and {}",
            container,
            first,
            other.name()
        ))),
        None => Ok(first),
    }
}
