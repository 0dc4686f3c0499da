use std::fmt;

use crate::rules::Symbol;

/// An ordered tree whose leaves are sentence positions rather than words.
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Clone)]
pub enum SynTree<T> {
  Branch(T, Vec<SynTree<T>>),
  Leaf(usize),
}

/// A treebank tree (or fragment) with structured labels.
pub type IndexedTree = SynTree<Symbol>;

/// Words by position; `None` marks an elided position, such as the frontier
/// of a fragment.
pub type Sentence = Vec<Option<String>>;

/// Splits on whitespace into a sentence without elided positions.
pub fn sentence(words: &str) -> Sentence {
  words.split_whitespace().map(|w| Some(w.to_string())).collect()
}

impl<T> SynTree<T> {
  pub fn is_leaf(&self) -> bool {
    matches!(self, Self::Leaf(_))
  }

  pub fn is_branch(&self) -> bool {
    matches!(self, Self::Branch(_, _))
  }

  pub fn get_leaf(&self) -> Option<usize> {
    match self {
      Self::Leaf(idx) => Some(*idx),
      _ => None,
    }
  }

  pub fn get_branch(&self) -> Option<(&T, &[SynTree<T>])> {
    match self {
      Self::Branch(label, children) => Some((label, children)),
      _ => None,
    }
  }

  pub fn into_branch(self) -> Option<(T, Vec<SynTree<T>>)> {
    match self {
      Self::Branch(label, children) => Some((label, children)),
      _ => None,
    }
  }

  pub fn label(&self) -> Option<&T> {
    self.get_branch().map(|(label, _)| label)
  }

  pub fn children(&self) -> &[SynTree<T>] {
    match self {
      Self::Branch(_, children) => children,
      Self::Leaf(_) => &[],
    }
  }

  /// Leaves in tree order.
  pub fn leaves(&self) -> Vec<usize> {
    let mut leaves = Vec::new();
    self.collect_leaves(&mut leaves);
    leaves
  }

  fn collect_leaves(&self, out: &mut Vec<usize>) {
    match self {
      Self::Leaf(idx) => out.push(*idx),
      Self::Branch(_, children) => children.iter().for_each(|c| c.collect_leaves(out)),
    }
  }

  pub fn sorted_leaves(&self) -> Vec<usize> {
    let mut leaves = self.leaves();
    leaves.sort_unstable();
    leaves
  }

  /// A leaf has height 1, a node with only leaves below it height 2.
  pub fn height(&self) -> usize {
    match self {
      Self::Leaf(_) => 1,
      Self::Branch(_, children) => 1 + children.iter().map(Self::height).max().unwrap_or(0),
    }
  }

  /// All branches in preorder, the tree itself first.
  pub fn subtrees(&self) -> Vec<&SynTree<T>> {
    let mut result = Vec::new();
    self.collect_subtrees(&mut result);
    result
  }

  fn collect_subtrees<'a>(&'a self, out: &mut Vec<&'a SynTree<T>>) {
    if let Self::Branch(_, children) = self {
      out.push(self);
      children.iter().for_each(|c| c.collect_subtrees(out));
    }
  }

  pub fn map<V>(&self, map_branch: &impl Fn(&T) -> V) -> SynTree<V> {
    match self {
      Self::Branch(label, children) => SynTree::Branch(
        map_branch(label),
        children.iter().map(|c| c.map(map_branch)).collect(),
      ),
      Self::Leaf(idx) => SynTree::Leaf(*idx),
    }
  }
}

impl<T: Clone> SynTree<T> {
  pub fn map_leaves(&self, map_leaf: &impl Fn(usize) -> usize) -> Self {
    match self {
      Self::Branch(label, children) => Self::Branch(
        label.clone(),
        children.iter().map(|c| c.map_leaves(map_leaf)).collect(),
      ),
      Self::Leaf(idx) => Self::Leaf(map_leaf(*idx)),
    }
  }

  /// Sorts the children of every node by their leaves, so that trees that
  /// only differ in the order of discontinuous children become equal.
  pub fn canonicalized(&self) -> Self {
    match self {
      Self::Leaf(idx) => Self::Leaf(*idx),
      Self::Branch(label, children) => {
        let mut children = children.iter().map(Self::canonicalized).collect::<Vec<_>>();
        if children.len() > 1 {
          children.sort_by_cached_key(|c| c.leaves());
        }
        Self::Branch(label.clone(), children)
      }
    }
  }
}

impl<T> fmt::Display for SynTree<T>
where
  T: fmt::Display,
{
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Leaf(idx) => write!(f, "{}", idx),
      Self::Branch(label, children) => {
        write!(f, "({}", label)?;
        for child in children {
          write!(f, " {}", child)?;
        }
        write!(f, ")")
      }
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
  fn test_display_matches_reader() {
    let src = "(S (NP 1) (VP (V 0) (ADJ 2)))";
    assert_eq!(tree(src).to_string(), src);
  }

  #[test]
  fn test_leaves_and_height() {
    let t = tree("(S (NP 1) (VP (V 0) (ADJ 2)))");
    assert_eq!(t.leaves(), vec![1, 0, 2]);
    assert_eq!(t.sorted_leaves(), vec![0, 1, 2]);
    assert_eq!(t.height(), 4);
    assert_eq!(t.children()[0].height(), 2);
    assert_eq!(t.subtrees().len(), 5);
  }

  #[test]
  fn test_canonicalized_orders_children_by_leaves() {
    let t = tree("(S (VP (ADJ 2) (V 0)) (NP 1))");
    assert_eq!(t.canonicalized(), tree("(S (VP (V 0) (ADJ 2)) (NP 1))"));
  }

  #[test]
  fn test_map_leaves() {
    let t = tree("(S (A 3) (B 5))");
    assert_eq!(t.map_leaves(&|i| i - 3), tree("(S (A 0) (B 2))"));
  }

  #[test]
  fn test_sentence() {
    assert_eq!(
      sentence("is Mary happy"),
      vec![Some("is".to_string()), Some("Mary".to_string()), Some("happy".to_string())]
    );
  }
}
