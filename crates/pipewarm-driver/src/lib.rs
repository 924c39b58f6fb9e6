//! Typed driver façade: the narrow set of setup and `create_<kind>`/
//! `destroy_<kind>` entry points the work engine drives, plus a real
//! `ash`-backed implementation and a counting mock for tests.

mod ash_driver;
mod error;
mod mock;
mod trait_def;

pub use ash_driver::AshDriver;
pub use error::DriverError;
pub use mock::{MockDriver, MockEvent};
pub use trait_def::Driver;
