pub mod client;

pub use client::{SubmitError, Submitter, WindyClient};
