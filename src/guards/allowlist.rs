//! Allowlist Merkle trees
//!
//! Leaves are keccak-256 of the base58 wallet address. Pairs are hashed in
//! sorted order without a domain prefix, and an unpaired node is carried up
//! unchanged. This matches the candy guard v2 verifier.

use solana_program::keccak::hashv;
use solana_sdk::pubkey::Pubkey;

pub type Node = [u8; 32];

pub fn leaf(wallet: &Pubkey) -> Node {
    hashv(&[wallet.to_string().as_bytes()]).to_bytes()
}

fn hash_pair(a: &Node, b: &Node) -> Node {
    if a <= b {
        hashv(&[a.as_ref(), b.as_ref()]).to_bytes()
    } else {
        hashv(&[b.as_ref(), a.as_ref()]).to_bytes()
    }
}

#[derive(Debug, Clone)]
pub struct MerkleTree {
    layers: Vec<Vec<Node>>,
}

impl MerkleTree {
    pub fn from_wallets(wallets: &[Pubkey]) -> Self {
        Self::from_leaves(wallets.iter().map(leaf).collect())
    }

    pub fn from_leaves(leaves: Vec<Node>) -> Self {
        let mut layers = vec![leaves];
        while let Some(last) = layers.last() {
            if last.len() <= 1 {
                break;
            }
            let next: Vec<Node> = last
                .chunks(2)
                .map(|pair| match pair {
                    [a, b] => hash_pair(a, b),
                    [a] => *a,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            layers.push(next);
        }
        Self { layers }
    }

    /// Root of the tree; all zeroes for an empty list
    pub fn root(&self) -> Node {
        self.layers
            .last()
            .and_then(|layer| layer.first())
            .copied()
            .unwrap_or([0u8; 32])
    }

    /// Sibling path for `leaf`, or `None` if it is not in the tree
    pub fn proof(&self, leaf: &Node) -> Option<Vec<Node>> {
        let mut index = self.layers.first()?.iter().position(|n| n == leaf)?;
        let mut proof = Vec::with_capacity(self.layers.len());
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling = index ^ 1;
            if let Some(node) = layer.get(sibling) {
                proof.push(*node);
            }
            index /= 2;
        }
        Some(proof)
    }

    pub fn proof_for_wallet(&self, wallet: &Pubkey) -> Option<Vec<Node>> {
        self.proof(&leaf(wallet))
    }
}

pub fn verify(proof: &[Node], root: &Node, leaf: &Node) -> bool {
    let computed = proof
        .iter()
        .fold(*leaf, |acc, sibling| hash_pair(&acc, sibling));
    computed == *root
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallets(n: usize) -> Vec<Pubkey> {
        (0..n).map(|_| Pubkey::new_unique()).collect()
    }

    #[test]
    fn test_every_member_verifies() {
        // odd count exercises node promotion
        for n in [1usize, 2, 5, 8] {
            let list = wallets(n);
            let tree = MerkleTree::from_wallets(&list);
            let root = tree.root();
            for wallet in &list {
                let proof = tree.proof_for_wallet(wallet).unwrap();
                assert!(verify(&proof, &root, &leaf(wallet)), "n={n}");
            }
        }
    }

    #[test]
    fn test_outsider_has_no_proof() {
        let list = wallets(4);
        let tree = MerkleTree::from_wallets(&list);
        let outsider = Pubkey::new_unique();
        assert!(tree.proof_for_wallet(&outsider).is_none());

        // a member's proof does not verify another wallet
        let proof = tree.proof_for_wallet(&list[0]).unwrap();
        assert!(!verify(&proof, &tree.root(), &leaf(&outsider)));
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let list = wallets(1);
        let tree = MerkleTree::from_wallets(&list);
        assert_eq!(tree.root(), leaf(&list[0]));
        assert!(tree.proof_for_wallet(&list[0]).unwrap().is_empty());
    }

    #[test]
    fn test_empty_tree() {
        let tree = MerkleTree::from_leaves(vec![]);
        assert_eq!(tree.root(), [0u8; 32]);
        assert!(tree.proof(&[1u8; 32]).is_none());
    }

    #[test]
    fn test_root_independent_of_pair_order() {
        let list = wallets(2);
        let forward = MerkleTree::from_wallets(&list);
        let reversed = MerkleTree::from_wallets(&[list[1], list[0]]);
        assert_eq!(forward.root(), reversed.root());
    }
}
