// Library exports for daemonctl

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod worker;
