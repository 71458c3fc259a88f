//! Chromium DevTools Protocol driver.
//!
//! Owns the browser connection, the page registry and the low-level
//! primitives (evaluation, input dispatch, cookies, init scripts) the
//! resolver and helper crates build on.

pub mod commands;
pub mod config;
pub mod driver;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod transport;
mod util;

pub use commands::{Cookie, CookieDeletion, CookieParam, QueryScope};
pub use config::DriverConfig;
pub use driver::{CdpDriver, RemoteHandle};
pub use error::{DriverError, DriverErrorKind};
pub use registry::{Registry, TargetContext};
pub use transport::{CdpTransport, ChromiumTransport, CommandTarget, NoopTransport, TransportEvent};
