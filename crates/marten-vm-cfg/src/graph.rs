//! Basic blocks and the routine graph

use serde::{Deserialize, Serialize};

use crate::error::CfgError;
use crate::instruction::Instr;
use crate::operand::BlockId;

/// A basic block: straight-line instructions plus successor edges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Instructions, in execution order
    pub instrs: Vec<Instr>,
    /// Successor blocks (empty for exit blocks)
    pub successors: Vec<BlockId>,
}

impl Block {
    /// Block with the given instructions and no successors.
    pub fn new(instrs: Vec<Instr>) -> Self {
        Self {
            instrs,
            successors: Vec::new(),
        }
    }

    /// Block with instructions and successors.
    pub fn with_successors(instrs: Vec<Instr>, successors: Vec<BlockId>) -> Self {
        Self { instrs, successors }
    }
}

/// One routine's control-flow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cfg {
    /// Blocks, indexed by `BlockId`
    pub blocks: Vec<Block>,
    /// Entry block
    pub entry: BlockId,
}

impl Cfg {
    /// Single-block routine.
    pub fn single_block(instrs: Vec<Instr>) -> Self {
        Self {
            blocks: vec![Block::new(instrs)],
            entry: BlockId(0),
        }
    }

    /// Look up a block.
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    /// Predecessor lists, indexed by block.
    pub fn predecessors(&self) -> Vec<Vec<BlockId>> {
        let mut preds = vec![Vec::new(); self.blocks.len()];
        for (idx, block) in self.blocks.iter().enumerate() {
            for &succ in &block.successors {
                preds[succ.0 as usize].push(BlockId(idx as u32));
            }
        }
        preds
    }

    /// Check structural well-formedness: the entry and every edge target
    /// must exist, and phi nodes may only appear with at least one input.
    pub fn validate(&self) -> Result<(), CfgError> {
        if self.entry.0 as usize >= self.blocks.len() {
            return Err(CfgError::UnknownBlock(self.entry));
        }
        for (idx, block) in self.blocks.iter().enumerate() {
            let id = BlockId(idx as u32);
            for &succ in &block.successors {
                if succ.0 as usize >= self.blocks.len() {
                    return Err(CfgError::BadEdge {
                        from: id,
                        to: succ,
                    });
                }
            }
            for instr in &block.instrs {
                if let Instr::Phi { dest, srcs } = instr {
                    if srcs.is_empty() {
                        return Err(CfgError::EmptyPhi {
                            block: id,
                            dest: *dest,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
