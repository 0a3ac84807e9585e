//! Forward category dataflow
//!
//! Computes, for every block entry, the category of each pointer value via
//! a worklist fixpoint. The lattice is finite and the transfer function
//! monotone (categories only widen, tracked values only get dropped at
//! merges), so the fixpoint exists; the iteration bound converts any
//! violation of that reasoning into a compile-time error instead of a hang.

use rustc_hash::FxHashMap;

use marten_vm_cfg::{BlockId, Cfg, Instr, ValueId};

use crate::category::Category;
use crate::error::TransformError;

/// Analysis state at one program point: category per tracked value, plus
/// whether execution is inside an ignored region.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FlowState {
    pub(crate) cats: FxHashMap<ValueId, Category>,
    pub(crate) ignored: bool,
}

impl FlowState {
    pub(crate) fn category(&self, value: ValueId) -> Category {
        self.cats.get(&value).copied().unwrap_or(Category::Unknown)
    }

    fn set(&mut self, value: ValueId, cat: Category) {
        self.cats.insert(value, cat);
    }

    /// A potential transaction switch: no category fact survives.
    fn widen_all(&mut self) {
        for cat in self.cats.values_mut() {
            *cat = Category::Unknown;
        }
    }

    /// Merge a predecessor's exit state into this entry state. Values the
    /// predecessor does not define are dropped (dead on that path);
    /// disagreeing categories widen. Returns whether anything changed.
    fn merge_from(&mut self, incoming: &FlowState, at: BlockId) -> Result<bool, TransformError> {
        if self.ignored != incoming.ignored {
            return Err(TransformError::UnbalancedIgnoredRegion { block: at });
        }
        let mut changed = false;
        let keys: Vec<ValueId> = self.cats.keys().copied().collect();
        for value in keys {
            match incoming.cats.get(&value) {
                Some(&theirs) => {
                    let ours = self.cats[&value];
                    let merged = ours.lub(theirs);
                    if merged != ours {
                        self.cats.insert(value, merged);
                        changed = true;
                    }
                }
                None => {
                    self.cats.remove(&value);
                    changed = true;
                }
            }
        }
        Ok(changed)
    }
}

/// Apply one instruction's effect on the analysis state.
pub(crate) fn transfer(
    instr: &Instr,
    state: &mut FlowState,
    block: BlockId,
) -> Result<(), TransformError> {
    match instr {
        Instr::AllocGc { dest, .. } => state.set(*dest, Category::Local),
        Instr::AllocImmortal { dest } => state.set(*dest, Category::Immortal),
        Instr::LoadNull { dest } => state.set(*dest, Category::Null),
        Instr::Copy { dest, src }
        | Instr::CastPtr { dest, src }
        | Instr::PtrOffset { dest, src } => {
            let cat = state.category(*src);
            state.set(*dest, cat);
        }
        Instr::Phi { dest, srcs } => {
            let mut cat = state.category(srcs[0]);
            for &src in &srcs[1..] {
                cat = cat.lub(state.category(src));
            }
            state.set(*dest, cat);
        }
        Instr::GetField { dest, .. } => state.set(*dest, Category::Unknown),
        Instr::SetField { value, .. } => {
            // The stored value escapes into another object.
            state.set(*value, Category::Unknown);
        }
        Instr::Return { value } => {
            if let Some(value) = value {
                state.set(*value, Category::Unknown);
            }
        }
        Instr::CallExternal { dest, args } => {
            if state.ignored {
                return Err(TransformError::BreakInIgnoredRegion { block });
            }
            for &arg in args {
                state.set(arg, Category::Unknown);
            }
            // The call is also a transaction break.
            state.widen_all();
            if let Some(dest) = dest {
                state.set(*dest, Category::Unknown);
            }
        }
        Instr::TransactionBreak(_) => {
            if state.ignored {
                return Err(TransformError::BreakInIgnoredRegion { block });
            }
            state.widen_all();
        }
        Instr::IgnoredStart => {
            if state.ignored {
                return Err(TransformError::NestedIgnoredRegion { block });
            }
            state.ignored = true;
        }
        Instr::IgnoredStop => {
            if !state.ignored {
                return Err(TransformError::UnbalancedIgnoredRegion { block });
            }
            state.ignored = false;
        }
        Instr::GcWriteBarrier { .. }
        | Instr::StmReadBarrier { .. }
        | Instr::StmWriteBarrier { .. } => {}
    }
    Ok(())
}

/// The fixpoint solution: category state at every reachable block entry.
#[derive(Debug)]
pub struct Analysis {
    pub(crate) entry_states: Vec<Option<FlowState>>,
}

impl Analysis {
    /// Category of `value` at the entry of `block`; `None` if the block is
    /// unreachable or the value is not live there.
    pub fn category_at_entry(&self, block: BlockId, value: ValueId) -> Option<Category> {
        self.entry_states
            .get(block.0 as usize)?
            .as_ref()?
            .cats
            .get(&value)
            .copied()
    }

    pub(crate) fn entry_state(&self, block: usize) -> Option<&FlowState> {
        self.entry_states.get(block)?.as_ref()
    }
}

/// Run the forward dataflow over a validated graph.
pub fn analyze(cfg: &Cfg) -> Result<Analysis, TransformError> {
    cfg.validate()?;

    let nblocks = cfg.blocks.len();
    let pass_limit = 4 * nblocks + 16;
    let mut entry_states: Vec<Option<FlowState>> = vec![None; nblocks];
    let mut passes = vec![0usize; nblocks];

    entry_states[cfg.entry.0 as usize] = Some(FlowState::default());
    let mut worklist = vec![cfg.entry];

    while let Some(block_id) = worklist.pop() {
        let idx = block_id.0 as usize;
        passes[idx] += 1;
        if passes[idx] > pass_limit {
            return Err(TransformError::NoFixpoint { block: block_id });
        }

        let mut state = entry_states[idx]
            .clone()
            .expect("worklist block has an entry state");
        for instr in &cfg.blocks[idx].instrs {
            transfer(instr, &mut state, block_id)?;
        }

        for &succ in &cfg.blocks[idx].successors {
            let sidx = succ.0 as usize;
            let changed = if let Some(existing) = &mut entry_states[sidx] {
                existing.merge_from(&state, succ)?
            } else {
                entry_states[sidx] = Some(state.clone());
                true
            };
            if changed && !worklist.contains(&succ) {
                worklist.push(succ);
            }
        }
    }

    Ok(Analysis { entry_states })
}

#[cfg(test)]
mod tests {
    use super::*;
    use marten_vm_cfg::{Block, BreakKind};

    fn v(n: u32) -> ValueId {
        ValueId(n)
    }

    #[test]
    fn test_seed_categories() {
        let cfg = Cfg {
            blocks: vec![
                Block::with_successors(
                    vec![
                        Instr::AllocGc {
                            dest: v(0),
                            has_finalizer: false,
                        },
                        Instr::AllocImmortal { dest: v(1) },
                        Instr::LoadNull { dest: v(2) },
                        Instr::CastPtr {
                            dest: v(3),
                            src: v(0),
                        },
                    ],
                    vec![BlockId(1)],
                ),
                Block::new(vec![]),
            ],
            entry: BlockId(0),
        };
        let analysis = analyze(&cfg).unwrap();
        let b1 = BlockId(1);
        assert_eq!(analysis.category_at_entry(b1, v(0)), Some(Category::Local));
        assert_eq!(
            analysis.category_at_entry(b1, v(1)),
            Some(Category::Immortal)
        );
        assert_eq!(analysis.category_at_entry(b1, v(2)), Some(Category::Null));
        assert_eq!(analysis.category_at_entry(b1, v(3)), Some(Category::Local));
    }

    #[test]
    fn test_break_point_widens_everything() {
        // Category monotonicity: whatever a value was before the break,
        // it is Unknown after it.
        let cfg = Cfg {
            blocks: vec![
                Block::with_successors(
                    vec![
                        Instr::AllocImmortal { dest: v(0) },
                        Instr::AllocGc {
                            dest: v(1),
                            has_finalizer: false,
                        },
                        Instr::TransactionBreak(BreakKind::Commit),
                    ],
                    vec![BlockId(1)],
                ),
                Block::new(vec![]),
            ],
            entry: BlockId(0),
        };
        let analysis = analyze(&cfg).unwrap();
        let b1 = BlockId(1);
        assert_eq!(
            analysis.category_at_entry(b1, v(0)),
            Some(Category::Unknown)
        );
        assert_eq!(
            analysis.category_at_entry(b1, v(1)),
            Some(Category::Unknown)
        );
    }

    #[test]
    fn test_every_break_kind_widens() {
        for kind in [
            BreakKind::Commit,
            BreakKind::CommitIfNotAtomic,
            BreakKind::StartIfNotAtomic,
            BreakKind::EnterCallbackCall,
            BreakKind::LeaveCallbackCall,
            BreakKind::BeginInevitable,
            BreakKind::PartialCommitAndResume,
            BreakKind::PerformTransaction,
        ] {
            let mut state = FlowState::default();
            state.set(v(0), Category::Local);
            transfer(&Instr::TransactionBreak(kind), &mut state, BlockId(0)).unwrap();
            assert_eq!(state.category(v(0)), Category::Unknown, "{kind:?}");
        }
    }

    #[test]
    fn test_merge_disagreement_widens() {
        // Diamond: v0 is Local on one path, Immortal on the other.
        let cfg = Cfg {
            blocks: vec![
                Block::with_successors(vec![], vec![BlockId(1), BlockId(2)]),
                Block::with_successors(
                    vec![Instr::AllocGc {
                        dest: v(0),
                        has_finalizer: false,
                    }],
                    vec![BlockId(3)],
                ),
                Block::with_successors(vec![Instr::AllocImmortal { dest: v(0) }], vec![BlockId(3)]),
                Block::new(vec![]),
            ],
            entry: BlockId(0),
        };
        let analysis = analyze(&cfg).unwrap();
        assert_eq!(
            analysis.category_at_entry(BlockId(3), v(0)),
            Some(Category::Unknown)
        );
    }

    #[test]
    fn test_merge_agreement_keeps_category() {
        let alloc = |dest| Instr::AllocGc {
            dest,
            has_finalizer: false,
        };
        let cfg = Cfg {
            blocks: vec![
                Block::with_successors(vec![], vec![BlockId(1), BlockId(2)]),
                Block::with_successors(vec![alloc(v(0))], vec![BlockId(3)]),
                Block::with_successors(vec![alloc(v(0))], vec![BlockId(3)]),
                Block::new(vec![]),
            ],
            entry: BlockId(0),
        };
        let analysis = analyze(&cfg).unwrap();
        assert_eq!(
            analysis.category_at_entry(BlockId(3), v(0)),
            Some(Category::Local)
        );
    }

    #[test]
    fn test_escape_through_set_field() {
        let mut state = FlowState::default();
        state.set(v(0), Category::Local);
        state.set(v(1), Category::Unknown);
        transfer(
            &Instr::SetField {
                obj: v(1),
                slot: 0,
                value: v(0),
            },
            &mut state,
            BlockId(0),
        )
        .unwrap();
        assert_eq!(state.category(v(0)), Category::Unknown);
    }

    #[test]
    fn test_loop_reaches_fixpoint() {
        // Entry -> loop header; loop body re-enters the header. The value
        // allocated before the loop stays Local across the back edge.
        let cfg = Cfg {
            blocks: vec![
                Block::with_successors(
                    vec![Instr::AllocGc {
                        dest: v(0),
                        has_finalizer: false,
                    }],
                    vec![BlockId(1)],
                ),
                Block::with_successors(vec![], vec![BlockId(1), BlockId(2)]),
                Block::new(vec![Instr::Return { value: None }]),
            ],
            entry: BlockId(0),
        };
        let analysis = analyze(&cfg).unwrap();
        assert_eq!(
            analysis.category_at_entry(BlockId(2), v(0)),
            Some(Category::Local)
        );
    }

    #[test]
    fn test_break_in_ignored_region_rejected() {
        let cfg = Cfg::single_block(vec![
            Instr::IgnoredStart,
            Instr::TransactionBreak(BreakKind::Commit),
            Instr::IgnoredStop,
        ]);
        assert_eq!(
            analyze(&cfg).unwrap_err(),
            TransformError::BreakInIgnoredRegion { block: BlockId(0) }
        );
    }

    #[test]
    fn test_external_call_in_ignored_region_rejected() {
        let cfg = Cfg::single_block(vec![
            Instr::IgnoredStart,
            Instr::CallExternal {
                dest: None,
                args: vec![],
            },
        ]);
        assert_eq!(
            analyze(&cfg).unwrap_err(),
            TransformError::BreakInIgnoredRegion { block: BlockId(0) }
        );
    }

    #[test]
    fn test_unbalanced_ignored_region_rejected() {
        let cfg = Cfg::single_block(vec![Instr::IgnoredStop]);
        assert!(matches!(
            analyze(&cfg).unwrap_err(),
            TransformError::UnbalancedIgnoredRegion { .. }
        ));

        let cfg = Cfg::single_block(vec![Instr::IgnoredStart, Instr::IgnoredStart]);
        assert!(matches!(
            analyze(&cfg).unwrap_err(),
            TransformError::NestedIgnoredRegion { .. }
        ));
    }

    #[test]
    fn test_ignored_region_disagreement_at_merge_rejected() {
        // One predecessor leaves an ignored region open, the other closes
        // it: merging is a static error.
        let cfg = Cfg {
            blocks: vec![
                Block::with_successors(vec![], vec![BlockId(1), BlockId(2)]),
                Block::with_successors(vec![Instr::IgnoredStart], vec![BlockId(3)]),
                Block::with_successors(vec![], vec![BlockId(3)]),
                Block::new(vec![]),
            ],
            entry: BlockId(0),
        };
        assert!(matches!(
            analyze(&cfg).unwrap_err(),
            TransformError::UnbalancedIgnoredRegion { .. }
        ));
    }
}
