//! A six-step peephole pass over the finished (rearranged) Eeyore list:
//! double-jump chain collapsing, useless-jump elimination, and label
//! coalescing + dense renumbering.

use log::{debug, trace};

use crate::common::{Map, Set};
use crate::error::{internal_error, Result};

use super::ir::{Code, Stmt};

/// Cycle guard for the double-jump chase: malformed input could otherwise
/// loop forever following a jump cycle.
const MAX_JUMP_CHASE: usize = 10_000;

pub fn clean(mut code: Code) -> Result<Code> {
    // Step 1: map label id -> index of its defining `Label` statement.
    let label_pos: Map<u32, usize> = code
        .iter()
        .enumerate()
        .filter_map(|(i, s)| match s {
            Stmt::Label { id } => Some((*id, i)),
            _ => None,
        })
        .collect();

    // Step 2: double-jump rewriting. Follow `label -> (labels)* -> Goto`
    // chains and retarget the jump to the final label.
    for i in 0..code.len() {
        let target = match &code[i] {
            Stmt::Goto { label } => Some(*label),
            Stmt::CondGoto { label, .. } => Some(*label),
            _ => None,
        };
        let Some(start) = target else { continue };
        let mut cur = start;
        let mut steps = 0;
        loop {
            steps += 1;
            if steps > MAX_JUMP_CHASE {
                internal_error!("double-jump chase exceeded {MAX_JUMP_CHASE} steps; likely a jump cycle");
            }
            let Some(&pos) = label_pos.get(&cur) else { break };
            let next_pos = pos + 1;
            match code.get(next_pos) {
                Some(Stmt::Goto { label }) => cur = *label,
                _ => break,
            }
        }
        if cur != start {
            match &mut code[i] {
                Stmt::Goto { label } => *label = cur,
                Stmt::CondGoto { label, .. } => *label = cur,
                _ => unreachable!(),
            }
        }
    }

    // Steps 3-5: drop jumps that are useless either because the nearest
    // non-label predecessor is itself a `Goto` ("jump after jump"), or
    // because only labels lie between the jump and its target ("jump to
    // next"). Collect surviving jump targets as we go.
    let mut keep = vec![true; code.len()];
    let mut last_nonlabel_was_goto = false;
    for i in 0..code.len() {
        match &code[i] {
            Stmt::Label { .. } => {}
            Stmt::Goto { label } => {
                let useless = last_nonlabel_was_goto || jump_to_next(&code, i, *label, &label_pos);
                keep[i] = !useless;
                last_nonlabel_was_goto = true;
            }
            Stmt::CondGoto { label, .. } => {
                let useless = jump_to_next(&code, i, *label, &label_pos);
                keep[i] = !useless;
                last_nonlabel_was_goto = false;
            }
            _ => {
                last_nonlabel_was_goto = false;
            }
        }
    }

    let mut valid_labels: Set<u32> = Set::new();
    for (i, stmt) in code.iter().enumerate() {
        if !keep[i] {
            continue;
        }
        match stmt {
            Stmt::Goto { label } | Stmt::CondGoto { label, .. } => {
                valid_labels.insert(*label);
            }
            _ => {}
        }
    }

    let code: Code = code
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep[*i])
        .map(|(_, s)| s)
        .collect();

    // Step 6: label coalescing and dense renumbering.
    let mut remap: Map<u32, u32> = Map::new();
    let mut next_id: u32 = 0;
    let mut prev_was_label: Option<u32> = None;
    for stmt in &code {
        if let Stmt::Label { id } = stmt {
            if valid_labels.contains(id) {
                let new_id = match prev_was_label {
                    Some(prev_new) => prev_new,
                    None => {
                        let n = next_id;
                        next_id += 1;
                        n
                    }
                };
                trace!("renumbering label {id} -> {new_id}");
                remap.insert(*id, new_id);
                prev_was_label = Some(new_id);
            } else {
                // Unreferenced label: fold into whatever precedes it, if
                // that predecessor was itself a kept label.
                if let Some(prev_new) = prev_was_label {
                    trace!("folding unreferenced label {id} into {prev_new}");
                    remap.insert(*id, prev_new);
                }
            }
        } else {
            prev_was_label = None;
        }
    }
    debug!("jump cleanup: {} label(s) renumbered to {next_id} dense id(s)", remap.len());

    let mut out = Code::with_capacity(code.len());
    for stmt in code {
        match stmt {
            Stmt::Label { id } => {
                if let Some(&new_id) = remap.get(&id) {
                    // Only emit once per coalesced group.
                    if out
                        .last()
                        .map(|s| matches!(s, Stmt::Label { id: prev } if *prev == new_id))
                        .unwrap_or(false)
                    {
                        continue;
                    }
                    out.push(Stmt::Label { id: new_id });
                }
            }
            Stmt::Goto { label } => {
                let new_label = *remap.get(&label).unwrap_or(&label);
                out.push(Stmt::Goto { label: new_label });
            }
            Stmt::CondGoto { op, lhs, rhs, label } => {
                let new_label = *remap.get(&label).unwrap_or(&label);
                out.push(Stmt::CondGoto {
                    op,
                    lhs,
                    rhs,
                    label: new_label,
                });
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Is the jump at `i` targeting `label` useless because only label
/// statements separate it from its own target?
fn jump_to_next(code: &Code, i: usize, label: u32, label_pos: &Map<u32, usize>) -> bool {
    let Some(&target_pos) = label_pos.get(&label) else {
        return false;
    };
    if target_pos <= i {
        return false;
    }
    code[i + 1..target_pos]
        .iter()
        .all(|s| matches!(s, Stmt::Label { .. }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eeyore::ir::Operand;

    #[test]
    fn jump_to_next_is_removed() {
        let code = vec![
            Stmt::Goto { label: 3 },
            Stmt::Label { id: 3 },
            Stmt::Ret { value: None },
        ];
        let out = clean(code).unwrap();
        assert!(!out.iter().any(|s| matches!(s, Stmt::Goto { .. })));
        assert!(!out.iter().any(|s| matches!(s, Stmt::Label { .. })));
    }

    #[test]
    fn jump_after_jump_is_removed() {
        let code = vec![
            Stmt::Goto { label: 0 },
            Stmt::Goto { label: 1 },
            Stmt::Label { id: 0 },
            Stmt::Label { id: 1 },
            Stmt::Ret { value: None },
        ];
        let out = clean(code).unwrap();
        let gotos = out.iter().filter(|s| matches!(s, Stmt::Goto { .. })).count();
        assert_eq!(gotos, 0);
    }

    #[test]
    fn labels_renumbered_densely() {
        let code = vec![
            Stmt::CondGoto {
                op: super::super::ir::RelOp::Eq,
                lhs: Operand::Imm(0),
                rhs: Operand::Imm(0),
                label: 5,
            },
            Stmt::Move {
                dst: Operand::TempVar { id: 0 },
                src: Operand::Imm(1),
            },
            Stmt::Label { id: 5 },
            Stmt::Ret { value: None },
        ];
        let out = clean(code).unwrap();
        let label_ids: Vec<u32> = out
            .iter()
            .filter_map(|s| match s {
                Stmt::Label { id } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(label_ids, vec![0]);
    }
}
