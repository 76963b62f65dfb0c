#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate lazy_static;

pub mod browser_controller;
pub mod cache;
pub mod carousel;
pub mod config;
pub mod extractor;
pub mod runner;
pub mod scheduler;
pub mod scraper;
pub mod service;
pub mod site_adapter;
pub mod status;
pub mod types;
pub mod utils;
