//! The partition graph: a quotient of the trace graph whose nodes are
//! equivalence classes of concrete events.
//!
//! Every mutation of the quotient goes through the transactional operation
//! layer in [`ops`]; applying an operation returns its exact inverse, so an
//! engine can try a change, inspect the result and rewind bit-for-bit.

pub mod ops;
pub mod partition;
pub mod pgraph;

pub use ops::{GraphOp, MergeOp, ModelError, ModelResult, SplitOp, SplitPart};
pub use partition::{Partition, PartitionId};
pub use pgraph::PartitionGraph;
