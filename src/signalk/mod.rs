pub mod delta;
pub mod stream;

pub use delta::{Delta, Subscription};
pub use stream::run_ingest;
