//! The admin console's own small grammar: a `logos` token set
//! ([`token_kind`]), a generic [`tokenizer`] built on top of it, and a
//! recursive-descent [`parser`] that turns console input into the
//! planner-neutral [`crate::command::Statement`] tree.

pub mod parser;
pub mod token_kind;
pub mod tokenizer;
