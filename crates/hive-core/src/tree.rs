//! Hash tree engine.
//!
//! Builds a single root from an ordered sequence of pre-hashed nodes by
//! hashing adjacent pairs level by level. The engine never reorders its
//! input: callers present nodes in canonical order, since any permutation
//! yields a different root.

use crate::crypto::Blake3Hash;

/// A node in the hash tree. Only its hash is observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeNode {
    /// Wraps the hash of raw leaf bytes.
    Leaf(Blake3Hash),
    /// Wraps a hash derived from two children.
    Internal(Blake3Hash),
}

impl TreeNode {
    /// Hash raw bytes into a leaf.
    pub fn leaf(bytes: &[u8]) -> Self {
        TreeNode::Leaf(leaf_hash(bytes))
    }

    /// Combine two children into their parent.
    pub fn internal(left: &TreeNode, right: &TreeNode) -> Self {
        TreeNode::Internal(Blake3Hash::hash_pair(&left.hash(), &right.hash()))
    }

    /// The leaf standing in for missing data.
    pub fn anchor() -> Self {
        TreeNode::Leaf(Blake3Hash::anchor())
    }

    /// The node's hash.
    pub fn hash(&self) -> Blake3Hash {
        match self {
            TreeNode::Leaf(h) | TreeNode::Internal(h) => *h,
        }
    }

    /// Check if this is a leaf node.
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf(_))
    }
}

/// Hash leaf bytes. `leaf_hash(&[])` is the anchor value.
pub fn leaf_hash(bytes: &[u8]) -> Blake3Hash {
    Blake3Hash::hash(bytes)
}

/// Build the tree bottom-up and return its root.
///
/// Adjacent pairs are hashed into parents; an unpaired trailing node is
/// carried up unchanged. A single node is its own root. No nodes yields the
/// anchor leaf.
pub fn build_tree(nodes: Vec<TreeNode>) -> TreeNode {
    if nodes.is_empty() {
        return TreeNode::anchor();
    }

    let mut level = nodes;
    while level.len() > 1 {
        let mut parents = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [left, right] => parents.push(TreeNode::internal(left, right)),
                [odd] => parents.push(*odd),
                _ => unreachable!("chunks(2) yields one or two nodes"),
            }
        }
        level = parents;
    }

    level[0]
}

/// Convenience over [`build_tree`] returning only the root hash.
pub fn root_hash(nodes: Vec<TreeNode>) -> Blake3Hash {
    build_tree(nodes).hash()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(names: &[&str]) -> Vec<TreeNode> {
        names.iter().map(|n| TreeNode::leaf(n.as_bytes())).collect()
    }

    #[test]
    fn test_empty_input_is_anchor() {
        let root = build_tree(Vec::new());
        assert_eq!(root, TreeNode::anchor());
        assert_eq!(root.hash(), Blake3Hash::anchor());
        assert_eq!(leaf_hash(&[]), Blake3Hash::anchor());
    }

    #[test]
    fn test_single_node_is_root() {
        let node = TreeNode::leaf(b"only");
        assert_eq!(build_tree(vec![node]), node);
    }

    #[test]
    fn test_two_nodes() {
        let nodes = leaves(&["a", "b"]);
        let expected = Blake3Hash::hash_pair(&nodes[0].hash(), &nodes[1].hash());
        let root = build_tree(nodes);
        assert!(!root.is_leaf());
        assert_eq!(root.hash(), expected);
    }

    #[test]
    fn test_odd_node_is_promoted() {
        let nodes = leaves(&["a", "b", "c"]);
        let ab = TreeNode::internal(&nodes[0], &nodes[1]);
        let expected = TreeNode::internal(&ab, &nodes[2]);
        assert_eq!(build_tree(nodes), expected);
    }

    #[test]
    fn test_order_matters() {
        let forward = root_hash(leaves(&["a", "b", "c", "d"]));
        let swapped = root_hash(leaves(&["b", "a", "c", "d"]));
        assert_ne!(forward, swapped);
    }

    #[test]
    fn test_deterministic() {
        let names = ["x", "y", "z", "w", "v"];
        assert_eq!(root_hash(leaves(&names)), root_hash(leaves(&names)));
    }

    /// Reference shape: split so the left subtree is the largest power of
    /// two below `n`, mirroring level-by-level pairing with promotion.
    fn reference_root(nodes: &[TreeNode]) -> TreeNode {
        match nodes.len() {
            0 => TreeNode::anchor(),
            1 => nodes[0],
            n => {
                let split = n.next_power_of_two() / 2;
                TreeNode::internal(&reference_root(&nodes[..split]), &reference_root(&nodes[split..]))
            }
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_matches_reference_shape(data in proptest::collection::vec(proptest::collection::vec(0u8..=255, 0..16), 0..70)) {
            let nodes: Vec<TreeNode> = data.iter().map(|d| TreeNode::leaf(d)).collect();
            proptest::prop_assert_eq!(build_tree(nodes.clone()), reference_root(&nodes));
        }
    }
}
