//! Hierarchical Risk Parity (HRP) portfolio allocation.
//!
//! The allocation pipeline runs in four stages: correlation-to-distance
//! transform, single-linkage clustering, quasi-diagonal leaf ordering, and
//! recursive bisection of the ordered assets with inverse-variance weighting.
//! [`allocator::HrpAllocator`] drives the full pipeline; the stage modules are
//! public so each step can be used on its own.

pub mod allocator;
pub mod bisection;
pub mod distance;
pub mod estimators;
pub mod linkage;
pub mod quasi_diag;
pub mod returns;

pub use allocator::{HrpAllocator, HrpDendrogram, HrpError};
pub use linkage::Merge;
pub use returns::{Lookback, ReturnSeries};
