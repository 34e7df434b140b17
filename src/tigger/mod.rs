pub mod alloc;
pub mod cfg;
pub mod gen;
pub mod interval;
pub mod ir;
pub mod liveness;
pub mod printer;

use crate::error::Result;
use crate::eeyore;

use ir::Code;

pub fn lower(eeyore_code: &eeyore::ir::Code) -> Result<Code> {
    gen::generate(eeyore_code)
}
