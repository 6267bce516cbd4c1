#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod cli;
pub mod engine;
pub mod filter;
pub mod genotype;
pub mod model;
pub mod output;
pub mod reader;
pub mod reference;
pub mod sort;
pub mod utils;
