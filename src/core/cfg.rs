// This module implements the control-flow prepass. ControlFlowScan walks the bytecode once from
// offset 0 to the end with the shared PC stepper and records, without touching any IR, every
// branch site (keyed by the jump's own PC, holding its true and false targets), every block
// target PC, and every call target PC. Call targets double as block targets so each function
// entry gets its own block. Targets are deduplicated by PC, which is what lets the main pass
// resolve two jumps to the same PC to one block and two calls to the same PC to one function.
// The scan also checks that every target lies inside the program and on an instruction
// boundary, since a target in the middle of an instruction would leave a block that the main
// pass never reaches. Ownership of a PC by a function is decided by function entry order: the
// owner is the function with the greatest entry at or below the PC, and PCs below the first
// entry belong to the top-level program. A jump may also land one past the last instruction.
// That PC is not a shared block target: each function containing such a jump gets its own end
// block, so the scan records the owners of those jumps instead.

//! Control-flow discovery prepass.

use super::error::{DecodeError, DecodeResult};
use super::instruction::Instruction;
use super::opcode::{self, InstrKind, JumpKind};
use hashbrown::HashMap;
use std::collections::BTreeSet;

/// Destinations of the jump at one PC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchTargets {
    pub kind: JumpKind,
    /// Destination when the jump is taken.
    pub true_pc: usize,
    /// Fallthrough destination; unused for unconditional jumps.
    pub false_pc: usize,
}

impl BranchTargets {
    /// PCs that need a block for this branch.
    pub fn block_pcs(&self) -> impl Iterator<Item = usize> {
        let false_pc = self.kind.is_conditional().then_some(self.false_pc);
        std::iter::once(self.true_pc).chain(false_pc)
    }
}

/// Result of the control-flow prepass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFlowScan {
    /// Branch targets keyed by the PC of the jump instruction.
    branches: HashMap<usize, BranchTargets>,

    /// Call targets keyed by the PC of the call instruction.
    call_sites: HashMap<usize, usize>,

    /// Every PC that starts a block.
    block_targets: BTreeSet<usize>,

    /// Entry PCs of called functions.
    functions: BTreeSet<usize>,

    /// Owners of jumps that land on the end of the program.
    end_owners: BTreeSet<Option<usize>>,

    /// Length of the scanned buffer.
    code_len: usize,
}

impl ControlFlowScan {
    /// Scan `code` and collect branch and call targets.
    pub fn scan(code: &[u8]) -> DecodeResult<Self> {
        let mut scan = Self {
            code_len: code.len(),
            ..Self::default()
        };
        let mut boundaries = BTreeSet::new();
        let mut references = Vec::new();
        let mut end_jumps = Vec::new();

        let mut pc = 0;
        while pc < code.len() {
            let inst = Instruction::decode(code, pc)?;
            boundaries.insert(pc);

            match inst.info.kind {
                InstrKind::Call => {
                    let target = inst.target(code.len())?;
                    scan.call_sites.insert(pc, target);
                    if scan.functions.insert(target) {
                        log::debug!("Discovered function entry at {}", target);
                        scan.block_targets.insert(target);
                    }
                    references.push((pc, target));
                }
                InstrKind::Jump(kind) => {
                    let targets = BranchTargets {
                        kind,
                        true_pc: inst.target(code.len())?,
                        false_pc: inst.next_pc(),
                    };
                    for target in targets.block_pcs() {
                        if target == code.len() {
                            end_jumps.push(pc);
                        } else {
                            scan.block_targets.insert(target);
                            references.push((pc, target));
                        }
                    }
                    scan.branches.insert(pc, targets);
                }
                _ => {}
            }

            pc += opcode::step(code, pc)?;
        }

        for (offset, target) in references {
            if target != code.len() && !boundaries.contains(&target) {
                return Err(DecodeError::MisalignedTarget { offset, target });
            }
        }

        scan.end_owners = end_jumps.into_iter().map(|pc| scan.owner_of(pc)).collect();

        log::debug!(
            "Prepass found {} branch sites, {} block targets, {} functions",
            scan.branches.len(),
            scan.block_targets.len(),
            scan.functions.len()
        );
        Ok(scan)
    }

    /// Branch targets of the jump at `pc`.
    pub fn branch(&self, pc: usize) -> Option<&BranchTargets> {
        self.branches.get(&pc)
    }

    /// Target of the call at `pc`.
    pub fn call_target(&self, pc: usize) -> Option<usize> {
        self.call_sites.get(&pc).copied()
    }

    /// PCs that start a block, in ascending order.
    pub fn block_targets(&self) -> impl Iterator<Item = usize> + '_ {
        self.block_targets.iter().copied()
    }

    /// Function entry PCs, in ascending order.
    pub fn functions(&self) -> impl Iterator<Item = usize> + '_ {
        self.functions.iter().copied()
    }

    /// Functions (`None` for the top-level program) holding a jump to the end of the program.
    pub fn end_owners(&self) -> impl Iterator<Item = Option<usize>> + '_ {
        self.end_owners.iter().copied()
    }

    pub fn is_block_target(&self, pc: usize) -> bool {
        self.block_targets.contains(&pc)
    }

    pub fn is_function_entry(&self, pc: usize) -> bool {
        self.functions.contains(&pc)
    }

    /// Entry PC of the function that owns `pc`, or `None` for the top-level program.
    pub fn owner_of(&self, pc: usize) -> Option<usize> {
        self.functions.range(..=pc).next_back().copied()
    }

    /// True when the program has no jumps and no calls.
    pub fn is_straight_line(&self) -> bool {
        self.branches.is_empty() && self.call_sites.is_empty()
    }

    pub fn code_len(&self) -> usize {
        self.code_len
    }
}
