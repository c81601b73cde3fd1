//! The elaborated intermediate representation (§6): every name is
//! resolved, every call carries its argument shape explicitly. This is
//! what the (external) code generator for the target runtime consumes;
//! the core never interprets it.

use indexmap::IndexMap;

use hiveml_ids::{GlobalName, LocalName, VariantId};
use hiveml_types::Type;

/// Mirrors `hiveml_ids::ResolvedName` — kept as its own type alias so the
/// rest of this module reads as a self-contained IR description.
pub type IName = hiveml_ids::ResolvedName;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct IArgs {
    pub ordered: Vec<IExpr>,
    pub mandatory: IndexMap<String, IExpr>,
    pub optional: IndexMap<String, IExpr>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IOptionalParam {
    pub label: String,
    pub name: LocalName,
    pub default: Option<IExpr>,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct IParams {
    pub ordered: Vec<LocalName>,
    pub mandatory: IndexMap<String, LocalName>,
    pub optional: Vec<IOptionalParam>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IPattern {
    Var(LocalName),
    Wildcard,
    BaseConst(IBaseConst),
    Tuple(Vec<IPattern>),
    Constructor(VariantId, String, Vec<IPattern>),
    Record(IndexMap<String, IPattern>),
    ListNil,
    ListCons(Box<IPattern>, Box<IPattern>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum IBaseConst {
    Unit,
    Bool(bool),
    Int(i64),
    Float(u64),
    Char(char),
    Binary(Vec<u8>),
    /// A format-string literal, conversion specifiers kept verbatim; the
    /// target runtime's printf-style primitive interprets it at run time.
    Format(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct IBranch {
    pub pattern: IPattern,
    pub body: IExpr,
}

#[derive(Clone, Debug, PartialEq)]
pub enum IExpr {
    IVar(IName),
    IApply(IName, IArgs),
    ILambda { self_name: Option<LocalName>, params: IParams, body: Box<IExpr> },
    ILetIn { name: LocalName, value: Box<IExpr>, body: Box<IExpr> },
    ICase { scrutinee: Box<IExpr>, branches: Vec<IBranch> },
    IReceive { branches: Vec<IBranch> },
    IConstructor { variant: VariantId, ctor: String, args: Vec<IExpr> },
    ITuple(Vec<IExpr>),
    IRecord(IndexMap<String, IExpr>),
    IRecordAccess(Box<IExpr>, String),
    IRecordUpdate(Box<IExpr>, IndexMap<String, IExpr>),
    IListNil,
    IListCons(Box<IExpr>, Box<IExpr>),
    IFreeze(GlobalName, Vec<IExpr>),
    IFreezeUpdate(Box<IExpr>, Vec<IExpr>),
    IBaseConst(IBaseConst),
}

/// One resolved top-level binding plus the poly type inference assigned
/// it, handed to the code generator alongside the IR body.
#[derive(Clone, Debug, PartialEq)]
pub struct IrBinding {
    pub name: GlobalName,
    pub source_name: String,
    pub ty: Type,
    pub body: IExpr,
}
