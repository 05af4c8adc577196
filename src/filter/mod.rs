//! Filter-expression compiler
//!
//! Turns user-built filter conditions into the query-string tokens the ledger
//! API understands. Compilation is pure and total: the operator set is a
//! closed enum, so there is no unknown-operator path at runtime.

pub mod expression;
pub mod operator;

pub use expression::{
    compile, compile_encoded, join_tokens, FilterDraft, FilterSet, FilterToken, TOKEN_SEPARATOR,
};
pub use operator::Operator;
