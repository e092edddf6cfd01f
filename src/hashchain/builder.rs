//! Hash chain tree construction
//!
//! Inputs become the leaves of an implicit binary tree stored in an array:
//! `nodes[0]` is the root, the children of node `p` are `2p + 1` and
//! `2p + 2`, and index `nodes.len() + i` addresses input `i`. When the number
//! of inputs is not a power of two, orphan nodes are folded upwards so that
//! every input stays provable with the shortest possible chain.

use super::algorithm::DigestAlgorithm;
use super::digest_list::digest_hash_step;
use super::error::HashChainError;
use super::types::{HashChain, HashChainResult, HashStep, StepValue};

const ROOT_IDX: usize = 0;

/// Collects input digests and builds the hash chain tree over them
#[derive(Debug, Clone)]
pub struct HashChainBuilder {
    algorithm: DigestAlgorithm,
    inputs: Vec<Vec<u8>>,
}

/// Finished tree: the root digest plus one chain per input, in input order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltHashChain {
    pub result: HashChainResult,
    pub chains: Vec<HashChain>,
}

impl HashChainBuilder {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            inputs: Vec::new(),
        }
    }

    /// Builds a tree over `inputs` in one call
    pub fn build(
        algorithm: DigestAlgorithm,
        inputs: impl IntoIterator<Item = Vec<u8>>,
    ) -> Result<BuiltHashChain, HashChainError> {
        let mut builder = Self::new(algorithm);
        for input in inputs {
            builder.add_input_hash(input);
        }
        builder.finish()
    }

    pub fn add_input_hash(&mut self, digest: impl Into<Vec<u8>>) -> &mut Self {
        self.inputs.push(digest.into());
        self
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Computes the tree, its root and the chain of every input
    pub fn finish(self) -> Result<BuiltHashChain, HashChainError> {
        if self.inputs.is_empty() {
            return Err(HashChainError::NoInputs);
        }

        let tree = Tree::build(self.algorithm, &self.inputs)?;
        let result = HashChainResult {
            digest_method: self.algorithm,
            digest_value: tree.top().to_vec(),
        };

        let chains = (0..self.inputs.len())
            .map(|item| {
                Ok(HashChain {
                    digest_method: self.algorithm,
                    steps: tree.make_chain(item)?,
                })
            })
            .collect::<Result<Vec<_>, HashChainError>>()?;

        tracing::debug!(
            inputs = self.inputs.len(),
            algorithm = %self.algorithm,
            "Hash chain built"
        );

        Ok(BuiltHashChain { result, chains })
    }
}

fn ceil_log2(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}

fn parent_idx(i: usize) -> usize {
    (i - 1) / 2
}

fn child_idx(parent: usize, direction: usize) -> usize {
    2 * parent + 1 + direction
}

fn left_idx(i: usize) -> usize {
    child_idx(i, 0)
}

fn right_idx(i: usize) -> usize {
    child_idx(i, 1)
}

struct Tree<'a> {
    algorithm: DigestAlgorithm,
    inputs: &'a [Vec<u8>],
    nodes: Vec<Option<Vec<u8>>>,
    max_index: usize,
}

impl<'a> Tree<'a> {
    fn build(algorithm: DigestAlgorithm, inputs: &'a [Vec<u8>]) -> Result<Self, HashChainError> {
        let node_count = (1usize << ceil_log2(inputs.len())) - 1;
        let mut tree = Tree {
            algorithm,
            inputs,
            nodes: vec![None; node_count],
            max_index: node_count + inputs.len(),
        };

        if inputs.len() > 1 {
            tree.hash_inputs()?;
            tree.hash_nodes()?;
            tree.fix_tree(ROOT_IDX)?;
        }
        Ok(tree)
    }

    fn top(&self) -> &[u8] {
        if self.inputs.len() == 1 {
            &self.inputs[0]
        } else {
            self.get(ROOT_IDX).unwrap_or_default()
        }
    }

    fn is_leaf(&self, i: usize) -> bool {
        i >= self.nodes.len()
    }

    fn get(&self, i: usize) -> Option<&[u8]> {
        if i < self.nodes.len() {
            self.nodes[i].as_deref()
        } else if i < self.max_index {
            Some(&self.inputs[i - self.nodes.len()])
        } else {
            None
        }
    }

    /// Value at `i`, descending through left children past missing nodes
    fn get_deep(&self, mut i: usize) -> Option<&[u8]> {
        let mut value = self.get(i);
        while value.is_none() && i < self.max_index {
            i = left_idx(i);
            value = self.get(i);
        }
        value
    }

    fn step(&self, left: &[u8], right: &[u8]) -> Result<Vec<u8>, HashChainError> {
        digest_hash_step(self.algorithm, left, right)
    }

    /// Pairs inputs into the lowest level of internal nodes
    fn hash_inputs(&mut self) -> Result<(), HashChainError> {
        let base = self.nodes.len();
        for i in (0..self.inputs.len() - 1).step_by(2) {
            let digest = self.step(&self.inputs[i], &self.inputs[i + 1])?;
            self.nodes[parent_idx(base + i)] = Some(digest);
        }
        Ok(())
    }

    /// Combines complete pairs level by level, bottom up
    fn hash_nodes(&mut self) -> Result<(), HashChainError> {
        let mut level_start = self.nodes.len() / 2;
        while level_start > 0 {
            let level_end = level_start * 2;
            let mut i = level_start;
            while i < level_end {
                let digest = match (&self.nodes[i], &self.nodes[i + 1]) {
                    (Some(left), Some(right)) => self.step(left, right)?,
                    _ => break,
                };
                self.nodes[parent_idx(i)] = Some(digest);
                i += 2;
            }
            level_start /= 2;
        }
        Ok(())
    }

    /// Folds orphan subtrees into their ancestors
    fn fix_tree(&mut self, i: usize) -> Result<Option<Vec<u8>>, HashChainError> {
        if i >= self.max_index {
            return Ok(None);
        }
        if let Some(value) = self.get(i) {
            return Ok(Some(value.to_vec()));
        }

        let left = match self.get(left_idx(i)) {
            Some(value) => value.to_vec(),
            None => return self.fix_tree(left_idx(i)),
        };

        match self.fix_tree(right_idx(i))? {
            None => Ok(Some(left)),
            Some(right) => {
                let digest = self.step(&left, &right)?;
                self.nodes[i] = Some(digest.clone());
                Ok(Some(digest))
            }
        }
    }

    /// Walks from the root down to input `item`, emitting one step per level
    fn make_chain(&self, item: usize) -> Result<Vec<HashStep>, HashChainError> {
        let mut steps = Vec::new();
        let mut current = ROOT_IDX;
        let mut level = ceil_log2(self.inputs.len()) as i64 - 1;

        while current < self.nodes.len() {
            let direction = if level >= 0 {
                (item >> level) & 1
            } else {
                0
            };
            let mut mine = child_idx(current, direction);
            let other = child_idx(current, 1 - direction);

            while self.get(mine).is_none() {
                if mine >= self.max_index {
                    return Err(HashChainError::Malformed(format!(
                        "no node on the path of input {}",
                        item
                    )));
                }
                mine = left_idx(mine);
                level -= 1;
            }

            let other_value = StepValue::HashValue {
                digest: self
                    .get_deep(other)
                    .ok_or_else(|| {
                        HashChainError::Malformed(format!("missing sibling of node {}", mine))
                    })?
                    .to_vec(),
            };

            let my_value = if self.is_leaf(mine) {
                StepValue::DataRef {
                    digest: self.get(mine).unwrap_or_default().to_vec(),
                }
            } else {
                StepValue::StepRef {
                    step: steps.len() + 1,
                }
            };

            let step = if direction == 0 {
                HashStep {
                    left: my_value,
                    right: other_value,
                }
            } else {
                HashStep {
                    left: other_value,
                    right: my_value,
                }
            };
            steps.push(step);

            current = mine;
            level -= 1;
        }

        Ok(steps)
    }
}
