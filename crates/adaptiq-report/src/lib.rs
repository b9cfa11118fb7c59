//! adaptiq-report: HTML rendering of adaptiq quiz run reports.
//!
//! JSON persistence lives on `adaptiq_core::report::QuizReport`; this crate
//! renders the same report as a self-contained HTML page.

pub mod html;
