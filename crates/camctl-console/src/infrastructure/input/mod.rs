//! Operator input adapters.

pub mod line_console;
