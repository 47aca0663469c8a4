//! Domain primitives shared by the bronzedraw service, store and
//! provisioning crates.

pub mod error;
pub mod jan;
pub mod stage;
pub mod types;
