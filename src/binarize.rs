//! Minimal binarization of flat productions: among all ways of grouping the
//! children into a binary tree, pick one whose worst created node has the
//! lowest parsing complexity and fan-out.

use std::cmp::{max, Reverse};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};

use tracing::trace;

use crate::error::GrammarError;
use crate::rules::Symbol;
use crate::syntree::{IndexedTree, SynTree};
use crate::utils::ranges;

/// Marks the label of a node created by binarization.
pub const BINARIZED_MARK: &str = "}<";

/// `(complexity, fanout)`, compared lexicographically
type Cost = (usize, usize);

fn is_binarized_label(label: &Symbol) -> bool {
  label.name.contains(BINARIZED_MARK)
}

fn bits(mask: u64) -> impl Iterator<Item = usize> {
  (0..64).filter(move |i| mask & (1 << i) != 0)
}

struct Agenda<'a> {
  children: &'a [IndexedTree],
  child_leaves: Vec<Vec<usize>>,
}

impl Agenda<'_> {
  fn fanout(&self, mask: u64) -> usize {
    let mut leaves = bits(mask)
      .flat_map(|i| self.child_leaves[i].iter().copied())
      .collect::<Vec<_>>();
    leaves.sort_unstable();
    ranges(&leaves).len()
  }

  /// Finds the cheapest way of building `full` out of single children and
  /// returns, for every created node, the two parts it joins.
  fn search(&self, full: u64) -> BTreeMap<u64, (u64, u64)> {
    let mut best: BTreeMap<u64, Cost> = BTreeMap::new();
    let mut splits = BTreeMap::new();
    let mut done = BTreeSet::new();
    let mut finished: Vec<u64> = Vec::new();
    let mut heap = BinaryHeap::new();

    for i in 0..self.children.len() {
      best.insert(1 << i, (0, 0));
      heap.push(Reverse(((0, 0), 1u64 << i)));
    }

    while let Some(Reverse((cost, mask))) = heap.pop() {
      if best.get(&mask) != Some(&cost) || !done.insert(mask) {
        continue;
      }
      if mask == full {
        break;
      }
      for &other in &finished {
        if other & mask != 0 {
          continue;
        }
        let joined = mask | other;
        let fanout = self.fanout(joined);
        let complexity = fanout + self.fanout(mask) + self.fanout(other);
        let new_cost = max(max(cost, best[&other]), (complexity, fanout));
        if best.get(&joined).is_none_or(|&c| new_cost < c) {
          best.insert(joined, new_cost);
          splits.insert(joined, (mask, other));
          heap.push(Reverse((new_cost, joined)));
        }
      }
      finished.push(mask);
    }
    trace!(?best, "binarization agenda");
    splits
  }

  fn build(&self, parent: &Symbol, mask: u64, full: u64, splits: &BTreeMap<u64, (u64, u64)>) -> IndexedTree {
    let Some(&(a, b)) = splits.get(&mask) else {
      // a single child
      return self.children[mask.trailing_zeros() as usize].clone();
    };
    let (left, right) = if a.trailing_zeros() < b.trailing_zeros() { (a, b) } else { (b, a) };
    let label = if mask == full {
      parent.clone()
    } else {
      let names = bits(mask)
        .filter_map(|i| self.children[i].label())
        .map(Symbol::to_string)
        .collect::<Vec<_>>();
      Symbol::new(format!("{}{}{}>", parent, BINARIZED_MARK, names.join("-")))
    };
    SynTree::Branch(
      label,
      vec![
        self.build(parent, left, full, splits),
        self.build(parent, right, full, splits),
      ],
    )
  }
}

/// Binarizes the root of a production. Productions with at most two children
/// are returned as they are.
pub fn minimal_binarization(tree: &IndexedTree) -> Result<IndexedTree, GrammarError> {
  let (parent, children) = match tree {
    SynTree::Branch(label, children) if children.len() > 2 => (label, children),
    _ => return Ok(tree.clone()),
  };
  if children.len() > 64 {
    return Err(GrammarError::BinarizationWidth(children.len()));
  }

  let agenda = Agenda {
    children,
    child_leaves: children.iter().map(SynTree::sorted_leaves).collect(),
  };
  let full = if children.len() == 64 { u64::MAX } else { (1 << children.len()) - 1 };
  let splits = agenda.search(full);
  Ok(agenda.build(parent, full, full, &splits))
}

/// Splices nodes created by binarization back into their parents.
pub fn unbinarize(tree: &IndexedTree) -> IndexedTree {
  match tree {
    SynTree::Leaf(idx) => SynTree::Leaf(*idx),
    SynTree::Branch(label, children) => {
      let mut flat = Vec::with_capacity(children.len());
      for child in children {
        let child = unbinarize(child);
        match child {
          SynTree::Branch(label, grandchildren) if is_binarized_label(&label) => {
            flat.extend(grandchildren)
          }
          other => flat.push(other),
        }
      }
      SynTree::Branch(label.clone(), flat)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tree(s: &str) -> IndexedTree {
    s.parse().unwrap()
  }

  #[test]
  fn test_small_productions_untouched() {
    let t = tree("(S (NP 0) (VP 1))");
    assert_eq!(minimal_binarization(&t).unwrap(), t);
  }

  #[test]
  fn test_prefers_low_fanout() {
    // joining the discontinuous A with B fills its gap
    let t = tree("(S (A 0 2) (B 1) (C 3))");
    let b = minimal_binarization(&t).unwrap();
    assert_eq!(b, tree("(S (S}<A-B> (A 0 2) (B 1)) (C 3))"));
    assert_eq!(unbinarize(&b), t);
  }

  #[test]
  fn test_binary_everywhere() {
    let t = tree("(S (A 0) (B 1) (C 2) (D 3) (E 4))");
    let b = minimal_binarization(&t).unwrap();
    assert!(b.subtrees().iter().all(|n| n.children().len() <= 2));
    assert!(b.subtrees().iter().skip(1).any(|n| n.label().is_some_and(is_binarized_label)));
    assert_eq!(b.sorted_leaves(), t.sorted_leaves());
    assert_eq!(unbinarize(&b), t);
  }

  #[test]
  fn test_too_wide() {
    let children = (0..65)
      .map(|i| SynTree::Branch(Symbol::new("X"), vec![SynTree::Leaf(i)]))
      .collect();
    let t = SynTree::Branch(Symbol::new("S"), children);
    assert!(matches!(
      minimal_binarization(&t),
      Err(GrammarError::BinarizationWidth(65))
    ));
  }
}
