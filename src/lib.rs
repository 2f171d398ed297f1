pub mod config;
pub mod error;
pub mod store;

pub use error::{RecordError, Result};
pub use store::{Reading, RecordStore};
