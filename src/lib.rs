// wsd - window server core
//
// Input translation, window records and the shared-memory frame
// hand-off for a single-seat window server. Protocol front-ends and
// the compositor itself live outside this crate.

pub mod core;
pub mod config;
pub mod util;
pub mod prelude;

pub use crate::config::ServerConfig;
pub use crate::core::context::ServerContext;

#[cfg(test)]
mod tests;
