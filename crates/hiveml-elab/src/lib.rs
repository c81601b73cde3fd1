//! The elaborator (components I, J, K, L): turns a parsed [`hiveml_syntax`]
//! program into a resolved, effect-checked [`ir`] program plus the
//! [`error::ElabError`]s or unused-binding [`hiveml_common::Diagnostic`]s it
//! raised along the way.
//!
//! This crate is the core the rest of the workspace is built around: it
//! never touches stdin/stdout, never reads a file, and never panics on
//! malformed-but-well-typed input (only on a caller bypassing the public
//! API and corrupting `InferenceContext` directly, which every panic
//! message names explicitly).

pub mod decode;
pub mod error;
pub mod expr;
pub mod ir;
pub mod module;
pub mod primitives;
pub mod subtype;
