//! atoll-expr — expression trees for symbolic regression.
//!
//! Value-typed syntax trees over a fixed operator alphabet, with the
//! operations the search engine needs: structural statistics, pre-order
//! subtree addressing, a total structural order, integer serialization for
//! novelty tracking, IEEE-faithful evaluation, and rule-based algebraic
//! simplification. Random synthesis and the breeding operators live in
//! [`gen`]; the novelty trie in [`trie`].
//!
//! # Quick start
//!
//! ```
//! use atoll_expr::{Expr, SimpRules};
//!
//! // x0 * (x0 + 0) simplifies to x0 * x0
//! let e = Expr::Mul(vec![
//!     Expr::Var(0),
//!     Expr::Add(vec![Expr::Var(0), Expr::ConstantF(0.0)]),
//! ]);
//! let s = e.simplify(&SimpRules::no_convert()).unwrap();
//! assert_eq!(s.size(), 3);
//! let y = s.eval(0.0, &[3.0], &[], &[]);
//! assert!((y - 9.0).abs() < 1e-12);
//! ```

pub mod display;
pub mod error;
pub mod eval;
pub mod gen;
pub mod node;
pub mod order;
pub mod serial;
pub mod simplify;
pub mod trie;

pub use error::ExprError;
pub use gen::TreeParams;
pub use node::{Expr, Op};
pub use simplify::SimpRules;
pub use trie::IpreTrie;
