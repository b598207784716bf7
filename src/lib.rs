//! Extract the data behind interactive chart and table visualizations by
//! triggering their tooltips and reading what they reveal.

pub mod config;
pub mod harvest;
pub mod models;
pub mod pipeline;
pub mod sink;
pub mod supervisor;
pub mod surface;
pub mod tooltip;
pub mod utils;
