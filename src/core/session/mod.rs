// Session module - Server-side sessions and the shared client registry
pub mod registry;
pub mod session;
pub mod state;

pub use registry::{ClientRegistry, SessionHandle, SessionId};
pub use session::Session;
pub use state::{CloseReason, SessionState};
