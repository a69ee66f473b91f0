mod app;
mod config;
mod effects;
mod output;
mod report;

pub use app::run_app;
