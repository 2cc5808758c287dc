//! Format renderers: pure functions `Event -> String`, none of which may
//! depend on coordinator state. This crate carries the two most broadly
//! useful renderers — compact one-liners for log lines, and Markdown for
//! transcript views — following the log-line formatting conventions used
//! elsewhere in this codebase.

pub mod compact;
pub mod markdown;

pub use compact::render_compact;
pub use markdown::render_markdown;
