//! Tensor Module
//!
//! Shaped float32 buffers and the headerless binary file format used to move
//! them between implementations.

pub mod codec;
pub mod named;

pub use codec::{read_all, read_tensor, write_tensor, write_verified};
pub use named::{num_elements, Tensor, TensorId, TensorKind};
