pub mod config;
pub mod dataset;
pub mod model;
pub mod processing;
pub mod scrape;

#[cfg(test)]
mod test_util;

pub use config::{read_config, Config};
