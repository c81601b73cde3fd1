//! Component-spanning typed errors (§7 of the error-handling design).
//!
//! One enum, one variant per error kind; every variant carries the
//! source [`Span`] plus whatever reified data the diagnostic layer needs
//! to render it. Nothing in this crate recovers from an `ElabError` —
//! the first one raised aborts elaboration of the enclosing binding and
//! propagates to the driver via `?`.

use std::fmt;

use hiveml_common::Span;
use hiveml_ids::{BoundId, BoundRowId, OpaqueId, RowVarId, SynonymId, TypeVarId, VariantId};
use hiveml_types::Type;

#[derive(Clone, Debug, PartialEq)]
pub enum ElabError {
    // -- Lookup --
    UnboundVariable { name: String, span: Span },
    UnboundModuleName { name: String, span: Span },
    UnboundSignatureName { name: String, span: Span },
    UnboundTypeParameter { name: String, span: Span },
    UnboundRowParameter { name: String, span: Span },
    UndefinedConstructor { name: String, span: Span },
    UndefinedTypeName { name: String, span: Span },
    UndefinedKindName { name: String, span: Span },

    // -- Shape --
    NotOfStructureType { span: Span },
    NotOfFunctorType { span: Span },
    NotAStructureSignature { span: Span },
    RootModuleMustBeStructure { span: Span },
    SupportOnlyFirstOrderFunctor { span: Span },
    CannotRestrictTransparentType { name: String, span: Span },
    InvalidIdentifier { name: String, span: Span },

    // -- Arity / labels --
    InvalidNumberOfTypeArguments { name: String, expected: usize, found: usize, span: Span },
    InvalidNumberOfConstructorArguments { name: String, expected: usize, found: usize, span: Span },
    BadArityOfOrderedArguments { expected: usize, found: usize, span: Span },
    UnexpectedMandatoryLabel { label: String, span: Span },
    MissingMandatoryLabel { label: String, span: Span },
    UnexpectedOptionalLabel { label: String, span: Span },
    DuplicatedLabel { label: String, span: Span },
    TypeParameterBoundMoreThanOnce { name: String, span: Span },
    RowParameterBoundMoreThanOnce { name: String, span: Span },
    BoundMoreThanOnceInPattern { name: String, span: Span },
    InvalidByte { span: Span },

    // -- Type checking --
    ContradictionError { actual: Type, expected: Type, span: Span },
    InclusionError { fid: TypeVarId, actual: Type, expected: Type, span: Span },
    InclusionRowError { frid: RowVarId, span: Span },
    CyclicTypeParameter { names: Vec<String>, span: Span },
    CyclicSynonymTypeDefinition { ids: Vec<SynonymId>, span: Span },
    KindContradiction { span: Span },

    // -- Signature matching --
    MissingRequiredValName { name: String, span: Span },
    MissingRequiredTypeName { name: String, span: Span },
    MissingRequiredModuleName { name: String, span: Span },
    MissingRequiredSignatureName { name: String, span: Span },
    NotASubtype { span: Span },
    NotASubtypeVariant { name: String, span: Span },
    NotASubtypeSynonym { name: String, span: Span },
    NotASubtypeTypeOpacity { name: String, span: Span },
    PolymorphicContradiction { bound: BoundId, span: Span },
    ConflictInSignature { name: String, span: Span },
    OpaqueIDExtrudesScopeViaType { id: OpaqueId, span: Span },
    OpaqueIDExtrudesScopeViaSignature { id: OpaqueId, span: Span },
    CannotFreezeNonGlobalName { name: String, span: Span },

    // -- Expression checking --
    InvalidFormatSpecifier { found: char, span: Span },
    LetRecBindingMustBeAFunction { name: String, span: Span },
    ExpressionNestedTooDeep { span: Span },
    TooManyRowLabels { span: Span },
}

impl ElabError {
    pub fn span(&self) -> Span {
        use ElabError::*;
        match self {
            UnboundVariable { span, .. }
            | UnboundModuleName { span, .. }
            | UnboundSignatureName { span, .. }
            | UnboundTypeParameter { span, .. }
            | UnboundRowParameter { span, .. }
            | UndefinedConstructor { span, .. }
            | UndefinedTypeName { span, .. }
            | UndefinedKindName { span, .. }
            | NotOfStructureType { span }
            | NotOfFunctorType { span }
            | NotAStructureSignature { span }
            | RootModuleMustBeStructure { span }
            | SupportOnlyFirstOrderFunctor { span }
            | CannotRestrictTransparentType { span, .. }
            | InvalidIdentifier { span, .. }
            | InvalidNumberOfTypeArguments { span, .. }
            | InvalidNumberOfConstructorArguments { span, .. }
            | BadArityOfOrderedArguments { span, .. }
            | UnexpectedMandatoryLabel { span, .. }
            | MissingMandatoryLabel { span, .. }
            | UnexpectedOptionalLabel { span, .. }
            | DuplicatedLabel { span, .. }
            | TypeParameterBoundMoreThanOnce { span, .. }
            | RowParameterBoundMoreThanOnce { span, .. }
            | BoundMoreThanOnceInPattern { span, .. }
            | InvalidByte { span }
            | ContradictionError { span, .. }
            | InclusionError { span, .. }
            | InclusionRowError { span, .. }
            | CyclicTypeParameter { span, .. }
            | CyclicSynonymTypeDefinition { span, .. }
            | KindContradiction { span }
            | MissingRequiredValName { span, .. }
            | MissingRequiredTypeName { span, .. }
            | MissingRequiredModuleName { span, .. }
            | MissingRequiredSignatureName { span, .. }
            | NotASubtype { span }
            | NotASubtypeVariant { span, .. }
            | NotASubtypeSynonym { span, .. }
            | NotASubtypeTypeOpacity { span, .. }
            | PolymorphicContradiction { span, .. }
            | ConflictInSignature { span, .. }
            | OpaqueIDExtrudesScopeViaType { span, .. }
            | OpaqueIDExtrudesScopeViaSignature { span, .. }
            | CannotFreezeNonGlobalName { span, .. }
            | InvalidFormatSpecifier { span, .. }
            | LetRecBindingMustBeAFunction { span, .. }
            | ExpressionNestedTooDeep { span }
            | TooManyRowLabels { span } => *span,
        }
    }
}

impl fmt::Display for ElabError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ElabError::*;
        match self {
            UnboundVariable { name, .. } => write!(f, "unbound variable `{name}`"),
            UnboundModuleName { name, .. } => write!(f, "unbound module `{name}`"),
            UnboundSignatureName { name, .. } => write!(f, "unbound signature `{name}`"),
            UnboundTypeParameter { name, .. } => write!(f, "unbound type parameter `{name}`"),
            UnboundRowParameter { name, .. } => write!(f, "unbound row parameter `{name}`"),
            UndefinedConstructor { name, .. } => write!(f, "undefined constructor `{name}`"),
            UndefinedTypeName { name, .. } => write!(f, "undefined type `{name}`"),
            UndefinedKindName { name, .. } => write!(f, "undefined kind `{name}`"),
            NotOfStructureType { .. } => write!(f, "expected a structure"),
            NotOfFunctorType { .. } => write!(f, "expected a functor"),
            NotAStructureSignature { .. } => write!(f, "expected a structure signature"),
            RootModuleMustBeStructure { .. } => write!(f, "the root module must be a structure"),
            SupportOnlyFirstOrderFunctor { .. } => write!(f, "only first-order functors are supported"),
            CannotRestrictTransparentType { name, .. } => write!(f, "cannot restrict transparent type `{name}`"),
            InvalidIdentifier { name, .. } => write!(f, "invalid identifier `{name}`"),
            InvalidNumberOfTypeArguments { name, expected, found, .. } => {
                write!(f, "`{name}` expects {expected} type argument(s), found {found}")
            }
            InvalidNumberOfConstructorArguments { name, expected, found, .. } => {
                write!(f, "constructor `{name}` expects {expected} argument(s), found {found}")
            }
            BadArityOfOrderedArguments { expected, found, .. } => {
                write!(f, "expected {expected} ordered argument(s), found {found}")
            }
            UnexpectedMandatoryLabel { label, .. } => write!(f, "unexpected mandatory label `{label}`"),
            MissingMandatoryLabel { label, .. } => write!(f, "missing mandatory label `{label}`"),
            UnexpectedOptionalLabel { label, .. } => write!(f, "unexpected optional label `{label}`"),
            DuplicatedLabel { label, .. } => write!(f, "duplicated label `{label}`"),
            TypeParameterBoundMoreThanOnce { name, .. } => write!(f, "type parameter `{name}` bound more than once"),
            RowParameterBoundMoreThanOnce { name, .. } => write!(f, "row parameter `{name}` bound more than once"),
            BoundMoreThanOnceInPattern { name, .. } => write!(f, "`{name}` bound more than once in pattern"),
            InvalidByte { .. } => write!(f, "invalid byte literal"),
            ContradictionError { actual, expected, .. } => write!(f, "expected `{expected:?}`, found `{actual:?}`"),
            InclusionError { fid, actual, expected, .. } => {
                write!(f, "rigid variable {fid:?} cannot unify `{actual:?}` with `{expected:?}`")
            }
            InclusionRowError { frid, .. } => write!(f, "rigid row variable {frid:?} cannot be unified"),
            CyclicTypeParameter { names, .. } => write!(f, "cyclic type parameter dependency: {}", names.join(" -> ")),
            CyclicSynonymTypeDefinition { ids, .. } => {
                let rendered: Vec<String> = ids.iter().map(|id| format!("{id:?}")).collect();
                write!(f, "cyclic synonym definition: {}", rendered.join(" -> "))
            }
            KindContradiction { .. } => write!(f, "incompatible record kinds"),
            MissingRequiredValName { name, .. } => write!(f, "missing required value `{name}`"),
            MissingRequiredTypeName { name, .. } => write!(f, "missing required type `{name}`"),
            MissingRequiredModuleName { name, .. } => write!(f, "missing required module `{name}`"),
            MissingRequiredSignatureName { name, .. } => write!(f, "missing required signature `{name}`"),
            NotASubtype { .. } => write!(f, "signature is not a subtype of the expected signature"),
            NotASubtypeVariant { name, .. } => write!(f, "variant `{name}` is not a subtype match"),
            NotASubtypeSynonym { name, .. } => write!(f, "synonym `{name}` is not a subtype match"),
            NotASubtypeTypeOpacity { name, .. } => write!(f, "type `{name}` does not match required opacity"),
            PolymorphicContradiction { bound, .. } => write!(f, "inconsistent instantiation of bound variable {bound:?}"),
            ConflictInSignature { name, .. } => write!(f, "`{name}` is defined more than once in this signature"),
            OpaqueIDExtrudesScopeViaType { id, .. } => write!(f, "opaque type {id:?} escapes its scope"),
            OpaqueIDExtrudesScopeViaSignature { id, .. } => write!(f, "opaque type {id:?} escapes its scope via a signature"),
            CannotFreezeNonGlobalName { name, .. } => write!(f, "cannot freeze `{name}`: not a global name"),
            InvalidFormatSpecifier { found, .. } => write!(f, "invalid format specifier `%{found}`"),
            LetRecBindingMustBeAFunction { name, .. } => write!(f, "recursive binding `{name}` must bind a function"),
            ExpressionNestedTooDeep { .. } => write!(f, "expression nested too deeply"),
            TooManyRowLabels { .. } => write!(f, "too many labels in a single record or optional-argument row"),
        }
    }
}

impl std::error::Error for ElabError {}

pub type ElabResult<T> = Result<T, ElabError>;
