//! The authenticating reverse proxy.

mod forward;
mod handlers;
pub mod redirect;
mod route;
mod whitelist;

pub use forward::Forwarder;
pub use handlers::dispatch;
pub use route::{Route, RouteTable, host_without_port, normalize};
pub use whitelist::Whitelist;
