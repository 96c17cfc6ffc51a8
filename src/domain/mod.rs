pub mod assertion;
pub mod diff_result;
pub mod equality;
pub mod fingerprint;
pub mod identity;
pub mod ports;
pub mod snapshot;
pub mod table_diff;
pub mod value;
pub mod value_objects;
