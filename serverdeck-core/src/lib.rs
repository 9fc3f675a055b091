//! ServerDeck Core Library
//!
//! View lifecycle and navigation core of a multi-server desktop shell:
//! - Per-view load state machine with retries (`ViewLoadController`)
//! - Navigation and new-window policy
//! - View registry with configuration reconciliation and deep links (`ViewManager`)
//! - Single-flight modal queue and popup window containment
//!
//! The library owns no windows or web contents itself; every platform primitive is reached
//! through the traits in [`traits`], and all timers and navigation futures go through the
//! [`traits::Scheduler`] seam so the core stays single-threaded.

pub mod error;
pub mod services;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use error::{CoreError, CoreResult};
pub use services::{ServiceContext, Shell};
pub use traits::{HostWindow, RenderingSurface, Scheduler, SurfaceFactory, ViewEventSink};
