pub mod api;
pub mod app;
pub mod campaigns;
pub mod cli;
pub mod config;
pub mod model;
pub mod output;
pub mod progress;
pub mod schedule;
pub mod selection;
pub mod targeting;
pub mod utils;
pub mod wizard;

#[cfg(test)]
mod tests;
