pub mod cli;
pub mod dataset;
pub mod enrichment;
pub mod logging;
pub mod normalization;
pub mod tmdb;

pub mod util {
    pub mod env;
}
