//! CLI domain: parse, route, output, and presentation only.
//! No engine logic; the route table builds engine services and hands results to presentation.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_plans_json, format_plans_text, format_run_report_json, format_run_report_text,
    format_topics_text,
};
pub use route::RunContext;
