pub mod categories;
pub mod config;
pub mod episodes;
pub mod error;
pub mod graphql;
pub mod http;
pub mod metrics;
mod projection;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
