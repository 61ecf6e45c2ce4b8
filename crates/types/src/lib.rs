//! Core value types for Tidemark consensus.
//!
//! Everything here is a plain, owned value: identifiers, heights, and the
//! block header the finality engine consumes. Decoding headers off the wire
//! or out of storage is the caller's concern; these types assume that has
//! already happened.

mod header;
mod identifiers;

pub use header::BlockHeader;
pub use identifiers::{BlockHeight, BlockId, GeneratorKey, HexError, Round};
