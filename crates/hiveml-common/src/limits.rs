//! Centralized limits and thresholds.

/// Maximum recursion depth when walking types for occurs-checks, synonym
/// expansion, or printing. Guards against stack overflow on pathological
/// (but not necessarily cyclic — cycles are rejected earlier) input.
pub const MAX_TYPE_WALK_DEPTH: u32 = 512;

/// Maximum recursion depth for expression/pattern checking.
pub const MAX_EXPR_CHECK_DEPTH: u32 = 512;

/// Maximum number of labels a single record or optional-argument row may
/// carry. Exists to keep diagnostic rendering and row-kind merges bounded;
/// not part of the type-theoretic model.
pub const MAX_ROW_LABELS: usize = 4096;
