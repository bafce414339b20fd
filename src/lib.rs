// Public API for integration tests and potential library usage

pub mod oracle;
pub mod protocol;
pub mod scoring;
pub mod session;
pub mod state;
pub mod types;
pub mod validate;
pub mod ws;
