//! Forward stack-contents simulation.
//!
//! A small-step abstract machine over one method: each operand-stack slot
//! holds the set of instruction indices that could have produced it. States
//! merge slot-wise at control-flow joins and iterate to a fixed point, so
//! provenance survives branches and loops.

use std::collections::BTreeSet;

use tracing::debug;

use super::{descriptor_arg_count, Insn, InvokeKind, MethodCode};

/// Producer set for one operand-stack slot.
pub type Producers = BTreeSet<usize>;

/// Fixed-point result: the abstract stack entering each instruction.
#[derive(Debug, Clone)]
pub struct StackSimulation {
    entry: Vec<Option<Vec<Producers>>>,
}

impl StackSimulation {
    /// Operand stack just before instruction `idx`, top last.
    pub fn stack_before(&self, idx: usize) -> Option<&[Producers]> {
        self.entry.get(idx)?.as_deref()
    }

    /// Producers of the operand `depth` slots below the top, entering `idx`.
    pub fn operand_producers(&self, idx: usize, depth: usize) -> Option<&Producers> {
        let stack = self.stack_before(idx)?;
        if depth >= stack.len() {
            return None;
        }
        stack.get(stack.len() - 1 - depth)
    }
}

/// Net stack effect of one instruction: (pops, pushes).
fn effect(insn: &Insn) -> Option<(usize, usize)> {
    Some(match insn {
        Insn::Const => (0, 1),
        Insn::Load(_) => (0, 1),
        Insn::Store(_) => (1, 0),
        Insn::GetField(_) => (1, 1),
        Insn::PutField(_) => (2, 0),
        Insn::GetStatic(_) => (0, 1),
        Insn::PutStatic(_) => (1, 0),
        Insn::Invoke { kind, target } => {
            let args = descriptor_arg_count(&target.descriptor).ok()?;
            let receiver = match kind {
                InvokeKind::Static | InvokeKind::Dynamic => 0,
                _ => 1,
            };
            let pushes = match kind {
                // The call site materializes the functional object
                InvokeKind::Dynamic => 1,
                _ => usize::from(super::descriptor_returns_value(&target.descriptor)),
            };
            (args + receiver, pushes)
        }
        Insn::New(_) => (0, 1),
        Insn::Dup => (1, 2),
        Insn::Pop => (1, 0),
        Insn::Goto(_) => (0, 0),
        Insn::If(_) => (1, 0),
        Insn::Return => (0, 0),
        Insn::Throw => (1, 0),
        Insn::Other { pops, pushes } => (*pops as usize, *pushes as usize),
    })
}

fn successors(insn: &Insn, idx: usize, len: usize) -> Vec<usize> {
    match insn {
        Insn::Goto(target) => vec![*target],
        Insn::If(target) => {
            let mut out = Vec::with_capacity(2);
            if idx + 1 < len {
                out.push(idx + 1);
            }
            out.push(*target);
            out
        }
        Insn::Return | Insn::Throw => Vec::new(),
        _ => {
            if idx + 1 < len {
                vec![idx + 1]
            } else {
                Vec::new()
            }
        }
    }
}

/// Slot-wise union merge. Depth disagreement means the method is outside
/// the machine's model; the whole simulation degrades.
fn merge(into: &mut Vec<Producers>, from: &[Producers]) -> Result<bool, ()> {
    if into.len() != from.len() {
        return Err(());
    }
    let mut changed = false;
    for (slot, incoming) in into.iter_mut().zip(from) {
        for p in incoming {
            if slot.insert(*p) {
                changed = true;
            }
        }
    }
    Ok(changed)
}

/// Run the abstract machine over one method. `None` means the method could
/// not be modeled (stack underflow, malformed descriptor, inconsistent
/// join depths); callers treat that as an empty answer.
pub fn simulate(method: &MethodCode) -> Option<StackSimulation> {
    let len = method.instructions.len();
    let mut entry: Vec<Option<Vec<Producers>>> = vec![None; len];
    if len == 0 {
        return Some(StackSimulation { entry });
    }

    entry[0] = Some(Vec::new());
    let mut worklist = vec![0usize];

    while let Some(idx) = worklist.pop() {
        let insn = &method.instructions[idx];
        let state = entry[idx].clone()?;

        let (pops, pushes) = match effect(insn) {
            Some(e) => e,
            None => {
                debug!(
                    method = %method.signature(),
                    "unmodelable instruction, degrading simulation"
                );
                return None;
            }
        };
        if state.len() < pops {
            debug!(method = %method.signature(), idx, "stack underflow");
            return None;
        }

        let mut next = state.clone();
        // Dup replicates the top slot rather than minting a new producer
        if matches!(insn, Insn::Dup) {
            let top = next.last().cloned().unwrap_or_default();
            next.push(top);
        } else {
            next.truncate(next.len() - pops);
            for _ in 0..pushes {
                let mut slot = Producers::new();
                slot.insert(idx);
                next.push(slot);
            }
        }

        for succ in successors(insn, idx, len) {
            if succ >= len {
                continue;
            }
            match &mut entry[succ] {
                Some(existing) => match merge(existing, &next) {
                    Ok(true) => worklist.push(succ),
                    Ok(false) => {}
                    Err(()) => {
                        debug!(
                            method = %method.signature(),
                            succ, "inconsistent join depth"
                        );
                        return None;
                    }
                },
                slot @ None => {
                    *slot = Some(next.clone());
                    worklist.push(succ);
                }
            }
        }
    }

    Some(StackSimulation { entry })
}
