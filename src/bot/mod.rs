//! Operator-facing bot layer: commands, inline keyboards, and the
//! long-poll dispatcher that ties them to the lifecycle controller.

mod callbacks;
mod commands;
mod dispatcher;
pub mod format;
pub mod keyboards;

pub use dispatcher::Dispatcher;
