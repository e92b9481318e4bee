//! Transport Layer for Engine-Surface IPC
//!
//! - [`in_process`]: direct channel communication (embedded mode)
//! - the daemon binary speaks newline-delimited JSON over stdio
//!
//! The transport separates the communication mechanism from engine and
//! surface logic, so a surface can embed the engine or talk to the daemon
//! without either side changing.

pub mod in_process;
pub mod traits;

pub use in_process::InProcessTransport;
pub use traits::{TransportError, UiTransport};
