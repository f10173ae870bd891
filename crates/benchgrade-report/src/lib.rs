//! benchgrade-report: HTML rendering of report cards.

pub mod html;

pub use html::{generate_html, write_html_report};
