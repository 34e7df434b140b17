pub mod printer;

use crate::error::Result;
use crate::tigger;

/// Tigger statements already name RISC-V ABI registers, so lowering is just
/// printing them in RISC-V's own syntax rather than building a second IR.
pub fn lower(tigger_code: &tigger::ir::Code) -> Result<String> {
    Ok(printer::print(tigger_code))
}
