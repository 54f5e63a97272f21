// Session identity, record, and lifecycle management.

mod identity;
mod manager;
mod record;

pub use identity::SessionIdentity;
pub use manager::{SessionManager, SessionState};
pub use record::SessionRecord;
