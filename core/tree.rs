//! Decision trees narrowing a code down to candidate instructions.
//!
//! Every inner node discriminates on `mask`: candidates that fix all of the
//! mask bits are bucketed by their fixed value in `fixed_bit_nodes`,
//! candidates that leave the mask bits variable go to `arbitrary_bit_node`.
//! A lookup follows the matching bucket and the arbitrary child, so a leaf
//! reached by a code only holds candidates that still need confirmation.

use std::{collections::BTreeMap, fmt};

use crate::{
    condition::Functions,
    error::ConditionError,
    insn::{Form, InstructionDecoder},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TreeOptions {
    /// Discriminate on bits fixed by only a part of the candidates.
    pub split_wildcards: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            split_wildcards: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionNode {
    /// Position of the node in depth-first preorder.
    pub index: usize,
    pub mask: u64,
    pub fixed_bit_nodes: BTreeMap<u64, DecisionNode>,
    pub arbitrary_bit_node: Option<Box<DecisionNode>>,
    /// Candidate instruction indices, only leaves have them.
    pub instructions: Vec<usize>,
}

impl DecisionNode {
    pub fn is_leaf(&self) -> bool {
        self.fixed_bit_nodes.is_empty() && self.arbitrary_bit_node.is_none()
    }

    /// Iterates over the node and all its descendants in depth-first preorder.
    pub fn all_nodes(&self) -> Nodes<'_> {
        Nodes { stack: vec![self] }
    }

    fn collect(&self, code: u64, out: &mut Vec<usize>) {
        out.extend_from_slice(&self.instructions);
        if let Some(node) = self.fixed_bit_nodes.get(&(code & self.mask)) {
            node.collect(code, out);
        }
        if let Some(node) = &self.arbitrary_bit_node {
            node.collect(code, out);
        }
    }
}

pub struct Nodes<'a> {
    stack: Vec<&'a DecisionNode>,
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a DecisionNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Some(arbitrary) = &node.arbitrary_bit_node {
            self.stack.push(arbitrary);
        }
        self.stack.extend(node.fixed_bit_nodes.values().rev());
        Some(node)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionTree {
    pub form: Form,
    pub root: DecisionNode,
}

struct Builder<'a> {
    insns: &'a [InstructionDecoder],
    opts: &'a TreeOptions,
    code_mask: u64,
    next_index: usize,
}

impl Builder<'_> {
    fn node(&mut self, candidates: Vec<usize>, consumed: u64) -> DecisionNode {
        let index = self.next_index;
        self.next_index += 1;

        let leaf = |instructions| DecisionNode {
            index,
            mask: 0,
            fixed_bit_nodes: BTreeMap::new(),
            arbitrary_bit_node: None,
            instructions,
        };

        if candidates.len() <= 1 {
            return leaf(candidates);
        }

        let free = self.code_mask & !consumed;
        let shared = candidates
            .iter()
            .fold(free, |m, &i| m & self.insns[i].fixed_bit_mask);
        let mask = if shared != 0 {
            shared
        } else if self.opts.split_wildcards {
            self.partial_mask(&candidates, free)
        } else {
            0
        };
        if mask == 0 {
            trace!("node {index}: leaf with {} candidates", candidates.len());
            return leaf(candidates);
        }

        let mut buckets: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
        let mut arbitrary = Vec::new();
        for i in candidates {
            let insn = &self.insns[i];
            if insn.fixed_bit_mask & mask == mask {
                buckets.entry(insn.fixed_bits & mask).or_default().push(i);
            } else {
                arbitrary.push(i);
            }
        }
        trace!(
            "node {index}: mask {mask:#x}, {} bucket(s), {} arbitrary",
            buckets.len(),
            arbitrary.len()
        );

        let consumed = consumed | mask;
        let fixed_bit_nodes = buckets
            .into_iter()
            .map(|(key, list)| (key, self.node(list, consumed)))
            .collect();
        let arbitrary_bit_node = if arbitrary.is_empty() {
            None
        } else {
            Some(Box::new(self.node(arbitrary, consumed)))
        };
        DecisionNode {
            index,
            mask,
            fixed_bit_nodes,
            arbitrary_bit_node,
            instructions: Vec::new(),
        }
    }

    /// Picks the best discriminating bit among bits fixed by a part of the
    /// candidates and returns all free bits fixed by the same candidates.
    fn partial_mask(&self, candidates: &[usize], free: u64) -> u64 {
        let fixed_by = |bit: u64| -> Vec<bool> {
            candidates
                .iter()
                .map(|&i| self.insns[i].fixed_bit_mask & bit != 0)
                .collect()
        };

        let mut best: Option<(u64, usize)> = None;
        for pos in (0..64).rev() {
            let bit = 1 << pos;
            if free & bit == 0 {
                continue;
            }
            let (mut zeros, mut ones) = (0, 0);
            for &i in candidates {
                let insn = &self.insns[i];
                if insn.fixed_bit_mask & bit != 0 {
                    if insn.fixed_bits & bit != 0 {
                        ones += 1;
                    } else {
                        zeros += 1;
                    }
                }
            }
            if zeros + ones == 0 {
                continue;
            }
            let score = (zeros * ones + 1) * (zeros + ones);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((bit, score));
            }
        }

        let Some((prime, _)) = best else {
            return 0;
        };
        let pattern = fixed_by(prime);
        (0..64)
            .map(|pos| 1_u64 << pos)
            .filter(|&bit| free & bit != 0 && fixed_by(bit) == pattern)
            .fold(0, |mask, bit| mask | bit)
    }
}

impl DecisionTree {
    /// Builds the tree for instructions `indices` of the same form.
    pub fn build(
        form: Form,
        insns: &[InstructionDecoder],
        indices: Vec<usize>,
        opts: &TreeOptions,
    ) -> Self {
        let mut builder = Builder {
            insns,
            opts,
            code_mask: form.code_mask(),
            next_index: 0,
        };
        let root = builder.node(indices, 0);
        debug!("decision tree {form}: {} node(s)", builder.next_index);
        Self { form, root }
    }

    pub fn all_nodes(&self) -> Nodes<'_> {
        self.root.all_nodes()
    }

    /// Returns candidate instruction indices for the code in ascending order.
    pub fn candidates(&self, code: u64) -> Vec<usize> {
        let mut out = Vec::new();
        self.root.collect(code & self.form.code_mask(), &mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Returns indices of all confirmed instructions in ascending order.
    pub fn decode(
        &self,
        code: u64,
        insns: &[InstructionDecoder],
        functions: &Functions,
    ) -> Result<Vec<usize>, ConditionError> {
        let code = code & self.form.code_mask();
        let mut out = Vec::new();
        for i in self.candidates(code) {
            if insns[i].confirm(code, functions)? {
                out.push(i);
            }
        }
        Ok(out)
    }

    /// Returns a printable dump of the tree.
    pub fn display<'a>(&'a self, insns: &'a [InstructionDecoder]) -> TreeDisplay<'a> {
        TreeDisplay { tree: self, insns }
    }
}

pub struct TreeDisplay<'a> {
    tree: &'a DecisionTree,
    insns: &'a [InstructionDecoder],
}

impl TreeDisplay<'_> {
    fn fmt_node(
        &self,
        fmt: &mut fmt::Formatter,
        node: &DecisionNode,
        prefix: &str,
        depth: usize,
    ) -> fmt::Result {
        let width = (self.tree.form.bit_len() as usize + 3) / 4 + 2;
        write!(fmt, "{:indent$}{prefix}[{}] ", "", node.index, indent = depth * 2)?;
        if node.is_leaf() {
            if node.instructions.is_empty() {
                fmt.write_str("-")?;
            }
            for (i, &insn) in node.instructions.iter().enumerate() {
                if i != 0 {
                    fmt.write_str(", ")?;
                }
                fmt.write_str(&self.insns[insn].name)?;
            }
            return writeln!(fmt);
        }
        writeln!(fmt, "mask {:#0width$x}", node.mask)?;
        for (key, child) in &node.fixed_bit_nodes {
            let prefix = format!("{key:#0width$x}: ");
            self.fmt_node(fmt, child, &prefix, depth + 1)?;
        }
        if let Some(child) = &node.arbitrary_bit_node {
            self.fmt_node(fmt, child, "*: ", depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for TreeDisplay<'_> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        writeln!(fmt, "{}:", self.tree.form)?;
        self.fmt_node(fmt, &self.tree.root, "", 1)
    }
}
