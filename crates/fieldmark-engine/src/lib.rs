pub mod agent;
pub mod broker;
pub mod config;
pub mod coordinator;
pub mod dom;
pub mod formatter;
pub mod highlight;
pub mod identify;
pub mod lifecycle;
pub mod store;

pub use fieldmark_common::error;
pub use fieldmark_common::protocol;
