pub mod arrangement;
pub mod block;
pub mod boundary;
pub mod error;
pub mod extract;
pub mod math;
pub mod offset;
pub mod pipeline;
pub mod plan;
pub mod rules;

pub use error::{LotfillError, Result};
