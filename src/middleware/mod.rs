mod auth_gate;
mod client_ctx;
mod permission_guard;

pub use auth_gate::AuthGate;
pub use client_ctx::{ClientCtx, ClientCtxInner};
pub use permission_guard::RequirePermission;
