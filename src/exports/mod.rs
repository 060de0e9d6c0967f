//! Output formats for command results

pub mod json;

pub use json::{export_json, export_json_line};
