pub mod bootstrap;
pub mod cache;
pub mod channel;
pub mod error;
pub mod ops;
pub mod protocol;
pub mod supervisor;
pub mod trust;

#[cfg(test)]
mod tests;

pub const WORKER_BINARY: &str = "node";
pub const WORKER_HOSTNAME: &str = "localhost";
pub const WORKER_BASE_URL: &str = const_format::concatcp!("https://", WORKER_HOSTNAME);
