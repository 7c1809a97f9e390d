//! Window hosts
//!
//! [`WinitHost`] drives real desktop windows; [`HeadlessHost`] keeps windows
//! in memory for `--headless` runs and tests.

pub mod headless;
pub mod winit_host;

pub use headless::HeadlessHost;
pub use winit_host::WinitHost;
