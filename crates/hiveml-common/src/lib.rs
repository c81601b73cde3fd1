//! Shared foundations for the hiveml workspace.
//!
//! - Source spans (`Span`)
//! - Diagnostics (`Diagnostic`, `DiagnosticCategory`)
//! - Compiler-wide limits

pub mod diagnostics;
pub mod limits;
pub mod span;

pub use diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticNote};
pub use span::Span;
