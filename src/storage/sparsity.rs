//! Fan-out accounting and prune selection.

use hashbrown::HashMap;
use smallvec::SmallVec;
use crate::model::{Statement, Token};

/// Outgoing statement count per main node.
pub fn fanout(statements: &[Statement]) -> HashMap<Token, usize> {
    let mut counts: HashMap<Token, usize> = HashMap::new();
    for s in statements {
        *counts.entry(s.main).or_default() += 1;
    }
    counts
}

/// Indices (ascending) of the statements a prune must remove so that no
/// node keeps more than `limit` outgoing statements.
///
/// Per node, statements are ranked by descending probability; ties keep the
/// earlier position. Everything past the first `limit` is selected.
pub fn overflow(statements: &[Statement], limit: usize) -> Vec<usize> {
    let mut by_node: HashMap<Token, SmallVec<[usize; 8]>> = HashMap::new();
    for (i, s) in statements.iter().enumerate() {
        by_node.entry(s.main).or_default().push(i);
    }

    let mut dropped = Vec::new();
    for (_, mut indices) in by_node {
        if indices.len() <= limit {
            continue;
        }
        indices.sort_by(|&a, &b| {
            let pa = statements[a].probability.value();
            let pb = statements[b].probability.value();
            pb.total_cmp(&pa).then(a.cmp(&b))
        });
        dropped.extend_from_slice(&indices[limit..]);
    }
    dropped.sort_unstable();
    dropped
}
