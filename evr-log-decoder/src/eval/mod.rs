//! Expression evaluation for format directives
//!
//! The grammar is deliberately small: operand atoms `val1`..`val4`, numeric
//! literals, typedef member access (`val1.state`) and one trailing
//! `+ <literal>` bias. Enum lookups (`%E[expr, Typedef:member]`) resolve
//! through the same context.

pub mod context;
pub mod expression;

pub use context::EvalContext;
pub use expression::evaluate;
