//! Barrier insertion
//!
//! Rewrites a routine graph so that every pointer dereference or mutation
//! through a value not provably barrier-free is preceded by the matching
//! STM barrier call. Plain generational write barriers left by an earlier
//! GC pass are removed where the STM write barrier subsumes them. Inside
//! ignored regions nothing is inserted, and plain barriers are kept.

use rustc_hash::FxHashMap;

use marten_vm_cfg::{Block, BlockId, Cfg, Instr, ValueId};

use crate::category::Category;
use crate::dataflow::{Analysis, analyze, transfer};
use crate::error::TransformError;

/// Barrier coverage for one value within the current block. A write
/// barrier covers subsequent reads as well; coverage ends at any
/// transaction break and whenever the value is redefined.
#[derive(Debug, Clone, Copy, Default)]
struct Coverage {
    read: bool,
    write: bool,
}

/// Instrument a routine graph. Returns the rewritten graph; the input is
/// left untouched so the caller can diff or retry.
pub fn instrument(cfg: &Cfg) -> Result<Cfg, TransformError> {
    let analysis = analyze(cfg)?;

    let mut blocks = Vec::with_capacity(cfg.blocks.len());
    for (idx, block) in cfg.blocks.iter().enumerate() {
        let Some(entry) = analysis.entry_state(idx) else {
            // Unreachable block: nothing executes here, leave it alone.
            blocks.push(block.clone());
            continue;
        };

        let block_id = BlockId(idx as u32);
        let mut state = entry.clone();
        let mut covered: FxHashMap<ValueId, Coverage> = FxHashMap::default();
        let mut instrs = Vec::with_capacity(block.instrs.len());

        for instr in &block.instrs {
            match instr {
                Instr::GetField { obj, .. } => {
                    let cat = state.category(*obj);
                    if !state.ignored
                        && !cat.read_barrier_free()
                        && !covered_for_read(&covered, *obj)
                    {
                        instrs.push(Instr::StmReadBarrier { obj: *obj });
                        covered.entry(*obj).or_default().read = true;
                    }
                    instrs.push(instr.clone());
                }
                Instr::SetField { obj, .. } => {
                    let cat = state.category(*obj);
                    if !state.ignored
                        && !cat.write_barrier_free()
                        && !covered.get(obj).copied().unwrap_or_default().write
                    {
                        instrs.push(Instr::StmWriteBarrier { obj: *obj });
                        let cov = covered.entry(*obj).or_default();
                        cov.write = true;
                        cov.read = true;
                    }
                    instrs.push(instr.clone());
                }
                Instr::GcWriteBarrier { .. } => {
                    // Subsumed by the STM write barrier; only regions the
                    // pass must not touch keep their original barrier.
                    if state.ignored {
                        instrs.push(instr.clone());
                    }
                }
                Instr::StmReadBarrier { obj } => {
                    covered.entry(*obj).or_default().read = true;
                    instrs.push(instr.clone());
                }
                Instr::StmWriteBarrier { obj } => {
                    let cov = covered.entry(*obj).or_default();
                    cov.write = true;
                    cov.read = true;
                    instrs.push(instr.clone());
                }
                Instr::TransactionBreak(_) | Instr::CallExternal { .. } => {
                    covered.clear();
                    instrs.push(instr.clone());
                }
                _ => instrs.push(instr.clone()),
            }

            if let Some(dest) = instr.dest() {
                covered.remove(&dest);
            }
            transfer(instr, &mut state, block_id)?;
        }

        blocks.push(Block {
            instrs,
            successors: block.successors.clone(),
        });
    }

    Ok(Cfg {
        blocks,
        entry: cfg.entry,
    })
}

fn covered_for_read(covered: &FxHashMap<ValueId, Coverage>, obj: ValueId) -> bool {
    let cov = covered.get(&obj).copied().unwrap_or_default();
    cov.read || cov.write
}

/// Category of `value` at the entry of `block` (debug/verification use).
pub fn category_of(
    cfg: &Cfg,
    block: BlockId,
    value: ValueId,
) -> Result<Option<Category>, TransformError> {
    let analysis: Analysis = analyze(cfg)?;
    Ok(analysis.category_at_entry(block, value))
}
