//! The lowering-phase symbol table: binds source identifiers to the Eeyore
//! operand that realizes them (an `OrigVar` or a `Param`), plus enough type
//! information to size array accesses.

use crate::common::Id;
use crate::front::types::Type;
use crate::util::ChainedMap;

use super::ir::Operand;

#[derive(Clone, Debug)]
pub struct EeyoreEntry {
    pub ty: Type,
    pub operand: Operand,
}

pub type EeyoreSymbolTable = ChainedMap<Id, EeyoreEntry>;
