//! Ethereum client implementations.

mod mock;

pub use self::mock::{MockEthereum, RecordedCall};
