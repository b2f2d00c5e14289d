//! Low-level wire encoding for the compact binary format.
//!
//! - [`var_uint`]: leading-ones VarUInt codec
//! - [`primitives`]: bounds-checked [`Reader`] and the [`ByteWriter`] accumulator

pub mod primitives;
pub mod var_uint;

pub use primitives::{ByteWriter, Reader};
