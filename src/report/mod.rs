//! Report output: PNG plots and the run summary.

pub mod generator;
pub mod plots;

pub use generator::{format_logit_line, generate_json_report, generate_markdown_report};
pub use plots::{render_bar_chart, render_heatmap, PlotSettings};
