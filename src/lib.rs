pub mod artifacts;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod forecast;
pub mod indicator;
pub mod input;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod risk;
pub mod selection;
