//! The Eeyore stage: AST → Eeyore generation, declaration rearrangement,
//! jump/label cleanup, and textual rendering.

pub mod gen;
pub mod ir;
pub mod jump_clean;
pub mod printer;
pub mod rearrange;
pub mod symtab;

use crate::error::Result;
use crate::front::ast::CompUnit;
use crate::front::sema::Checked;

use ir::Code;

/// Runs the full Eeyore pipeline: generate, rearrange declarations, then
/// clean up jumps and labels.
pub fn lower(cu: &CompUnit, checked: &Checked) -> Result<Code> {
    let code = gen::generate(cu, checked)?;
    let code = rearrange::rearrange(code)?;
    let code = jump_clean::clean(code)?;
    Ok(code)
}
