//! Diagnostic rendering shapes shared by the elaborator and the CLI.
//!
//! The elaborator itself never renders text: it returns typed `ElabError`
//! values (see `hiveml_elab::error`). This module only defines the shape a
//! driver uses to present those errors (and unused-binding warnings) to a
//! user, analogous to the corpus's `Diagnostic` / `DiagnosticCategory` split
//! between a typed core and a presentation layer.

use crate::span::Span;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiagnosticCategory {
    Error,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticNote {
    pub span: Span,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub span: Span,
    pub message: String,
    pub notes: Vec<DiagnosticNote>,
}

impl Diagnostic {
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            category: DiagnosticCategory::Error,
            span,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    pub fn warning(span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            category: DiagnosticCategory::Warning,
            span,
            message: message.into(),
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, span: Span, message: impl Into<String>) -> Self {
        self.notes.push(DiagnosticNote { span, message: message.into() });
        self
    }
}
