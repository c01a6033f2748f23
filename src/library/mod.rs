// Recording library: classification, retention and file lifecycle

pub mod error;
pub mod markers;
pub mod probe;
pub mod record;
pub mod store;

pub use error::*;
pub use markers::*;
pub use probe::*;
pub use record::*;
pub use store::*;
