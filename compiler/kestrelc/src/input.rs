//! Salsa inputs.
//!
//! A module's syntax tree is the only input: whoever parses the source
//! lowers it once and hands the tree over. Setting a new tree invalidates
//! every query that read it.

use kestrel_ir::{Name, SyntaxTree};

#[salsa::input]
pub struct SourceModule {
    pub name: Name,

    #[return_ref]
    pub tree: SyntaxTree,
}
