pub mod assert;
pub mod diff;
pub mod monitoring;
pub mod snapshot;
