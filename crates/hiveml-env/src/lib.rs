//! Lexical environments, module signatures, and synonym-dependency
//! analysis (components E and F).
//!
//! Everything here is a plain value built and consumed by
//! `hiveml-elab`; this crate owns no mutable global state of its own —
//! an `Environment` is cloned (cheaply, via `im`-free persistent-by-copy
//! `IndexMap`s) whenever a functor application or module nesting needs
//! an isolated extension of the enclosing scope.

pub mod environment;
pub mod signature;
pub mod synonym_graph;

pub use environment::{Binding, Environment, ModuleBinding, TypeBinding};
pub use signature::{AbstractedSig, SigRecord, TypeSigItem};
pub use synonym_graph::{synonym_cycles, SynonymGraph};
