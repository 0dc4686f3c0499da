//! Double DOP: a grammar with one flattened production per recurring
//! fragment, and the map from those productions back to the fragments they
//! stand for.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::binarize::{minimal_binarization, unbinarize};
use crate::error::GrammarError;
use crate::extract::extract_rules;
use crate::grammar::{count_rules, WeightedGrammar};
use crate::rules::{Rule, Symbol};
use crate::syntree::{IndexedTree, Sentence, SynTree};
use crate::utils::{range_heads, Err};

/// Fragments with their counts. A fragment's sentence has words at terminal
/// positions and `None` at the positions covered by frontier nodes.
pub type Fragments = BTreeMap<(IndexedTree, Sentence), u64>;

/// Renumbered top productions, children in leaf order, mapped to the
/// fragments they were flattened from (leaves numbered the same way as the
/// key).
pub type Backtransform = BTreeMap<IndexedTree, IndexedTree>;

/// Finds the fragments recurring in a treebank. Any closure with the same
/// signature is an extractor.
pub trait FragmentExtractor {
  fn extract_fragments(&self, trees: &[IndexedTree], sents: &[Sentence]) -> Result<Fragments, Err>;
}

impl<F> FragmentExtractor for F
where
  F: Fn(&[IndexedTree], &[Sentence]) -> Result<Fragments, Err>,
{
  fn extract_fragments(&self, trees: &[IndexedTree], sents: &[Sentence]) -> Result<Fragments, Err> {
    self(trees, sents)
  }
}

fn is_elided(sent: &[Option<String>], idx: usize) -> bool {
  sent.get(idx).is_none_or(Option::is_none)
}

/// A node all of whose leaves are elided.
fn is_frontier(tree: &IndexedTree, sent: &[Option<String>]) -> bool {
  let children = tree.children();
  !children.is_empty()
    && children
      .iter()
      .all(|c| c.get_leaf().is_some_and(|idx| is_elided(sent, idx)))
}

fn leaves_and_frontier_nodes(
  tree: &IndexedTree,
  sent: &[Option<String>],
  out: &mut Vec<IndexedTree>,
) -> Result<(), GrammarError> {
  if is_frontier(tree, sent) {
    out.push(tree.clone());
    return Ok(());
  }
  for child in tree.children() {
    match child {
      SynTree::Branch(..) => leaves_and_frontier_nodes(child, sent, out)?,
      SynTree::Leaf(idx) => match sent.get(*idx).and_then(Option::as_ref) {
        Some(word) => out.push(SynTree::Branch(
          Symbol::terminal_placeholder(word),
          vec![SynTree::Leaf(*idx)],
        )),
        None => {
          return Err(GrammarError::MalformedTree(format!(
            "fragment node {} mixes elided and lexical positions",
            tree
          )))
        }
      },
    }
  }
  Ok(())
}

/// Collapses a fragment into a production of depth two: its frontier nodes
/// and its terminals, which become `#&word` preterminals. Fragments whose
/// root has leaves as children are returned as they are.
///
/// `(ROOT (S_2 0 2) (ROOT|<$,>_2 ($, 1) ($. 3)))` with sentence
/// `[None, ",", None, "."]` becomes `(ROOT (S_2 0 2) (#&, 1) (#&. 3))`.
pub fn flatten(tree: &IndexedTree, sent: &[Option<String>]) -> Result<IndexedTree, GrammarError> {
  match tree {
    SynTree::Branch(label, children) if children.iter().all(SynTree::is_branch) => {
      let mut items = Vec::new();
      leaves_and_frontier_nodes(tree, sent, &mut items)?;
      Ok(SynTree::Branch(label.clone(), items))
    }
    _ => Ok(tree.clone()),
  }
}

/// The root with its children cut down to their range heads.
pub fn top_production(tree: &IndexedTree) -> IndexedTree {
  match tree {
    SynTree::Leaf(idx) => SynTree::Leaf(*idx),
    SynTree::Branch(label, children) => SynTree::Branch(
      label.clone(),
      children
        .iter()
        .map(|child| match child {
          SynTree::Leaf(idx) => SynTree::Leaf(*idx),
          SynTree::Branch(label, _) => SynTree::Branch(
            label.clone(),
            range_heads(&child.sorted_leaves())
              .into_iter()
              .map(SynTree::Leaf)
              .collect(),
          ),
        })
        .collect(),
    ),
  }
}

/// Numbers the leaves `0..n` in sentence order. Also returns the sentence
/// position of each new number.
pub fn renumber(tree: &IndexedTree) -> (IndexedTree, Vec<usize>) {
  let leaves = tree.sorted_leaves();
  let renumbered = tree.map_leaves(&|idx| leaves.binary_search(&idx).unwrap_or(idx));
  (renumbered, leaves)
}

/// The renumbered top production with its children sorted by their leaves.
/// Rule extraction moves the child providing the first argument to the front
/// and a parser builds children in that order, so the key must not depend on
/// the order of the tree.
fn backtransform_key(tree: &IndexedTree) -> IndexedTree {
  renumber(&top_production(tree)).0.canonicalized()
}

/// The fragment with frontier nodes cut down to their range heads, numbered
/// like the renumbered top production of its flattening.
fn fragment_in_key_order(fragment: &IndexedTree, sent: &[Option<String>], prod: &IndexedTree) -> IndexedTree {
  fn compress(tree: &IndexedTree, sent: &[Option<String>]) -> IndexedTree {
    match tree {
      SynTree::Leaf(idx) => SynTree::Leaf(*idx),
      SynTree::Branch(label, children) => {
        if is_frontier(tree, sent) {
          SynTree::Branch(
            label.clone(),
            range_heads(&tree.sorted_leaves()).into_iter().map(SynTree::Leaf).collect(),
          )
        } else {
          SynTree::Branch(label.clone(), children.iter().map(|c| compress(c, sent)).collect())
        }
      }
    }
  }

  let (_, leaves) = renumber(&top_production(prod));
  compress(fragment, sent).map_leaves(&|idx| leaves.binary_search(&idx).unwrap_or(idx))
}

/// A fragment kept for the grammar.
struct Entry {
  prod: IndexedTree,
  sent: Sentence,
  fragment: IndexedTree,
  count: u64,
  /// Set for every fragment but the first sharing a production
  fresh: Option<Symbol>,
}

/// Builds the double-DOP grammar of a treebank. The plain SRCG is added for
/// coverage, so the result parses everything the plain SRCG parses.
pub fn double_dop(
  trees: &[IndexedTree],
  sents: &[Sentence],
  extractor: &impl FragmentExtractor,
) -> Result<(WeightedGrammar, Backtransform), GrammarError> {
  let (srcg, marked) = count_rules(trees, sents, true)?;
  let fragments = extractor
    .extract_fragments(&marked, sents)
    .map_err(GrammarError::FragmentExtraction)?;
  debug!(fragments = fragments.len(), "extracted fragments");

  let mut entries: Vec<Entry> = Vec::new();
  let mut by_key: BTreeMap<IndexedTree, Vec<usize>> = BTreeMap::new();
  let mut fresh_ids = 1..;
  for ((fragment, sent), &count) in &fragments {
    let prod = flatten(fragment, sent)?;
    if &prod == fragment {
      continue;
    }
    let key = backtransform_key(&prod);
    let fragment = fragment_in_key_order(fragment, sent, &prod);

    let same_key = by_key.entry(key).or_default();
    if let Some(&i) = same_key.iter().find(|&&i| entries[i].fragment == fragment) {
      entries[i].count += count;
      continue;
    }
    let fresh = if same_key.is_empty() {
      None
    } else {
      fresh_ids.next().map(Symbol::fresh)
    };
    same_key.push(entries.len());
    entries.push(Entry {
      prod,
      sent: sent.clone(),
      fragment,
      count,
      fresh,
    });
  }

  let mut counts: BTreeMap<Rule, f64> = BTreeMap::new();
  let mut backtransform = Backtransform::new();
  let mut ambiguous = 0;
  for entry in entries {
    let tree = match &entry.fresh {
      None => minimal_binarization(&entry.prod)?,
      Some(fresh) => {
        ambiguous += 1;
        let (label, children) = entry.prod.get_branch().ok_or_else(|| {
          GrammarError::MalformedTree(format!("flattened fragment {} has no root", entry.prod))
        })?;
        let inner = SynTree::Branch(fresh.clone(), children.to_vec());
        SynTree::Branch(label.clone(), vec![minimal_binarization(&inner)?])
      }
    };
    let (marked, rules) = extract_rules(&tree, &entry.sent, true)?;
    let key = backtransform_key(&unbinarize(&marked));
    backtransform.insert(key, entry.fragment);

    let mut rules = rules.into_iter();
    if let Some(root) = rules.next() {
      *counts.entry(root).or_insert(0.0) += entry.count as f64;
    }
    for rule in rules {
      counts.entry(rule).or_insert(1.0);
    }
  }

  let fragment_rules = counts.len();
  for (rule, &count) in &srcg {
    counts.entry(rule.clone()).or_insert(count as f64);
  }
  let grammar = WeightedGrammar::from_counts(counts.iter().map(|(rule, &c)| (rule, c)));
  info!(
    fragment_rules,
    ambiguous,
    rules = grammar.len(),
    "induced double-DOP grammar"
  );
  Ok((grammar, backtransform))
}

/// Turns a derivation of a double-DOP grammar back into a tree of the
/// treebank, replacing every flattened production by its fragment.
/// Productions missing from `backtransform` come from the plain SRCG and are
/// kept as they are.
pub fn recover_from_fragments(
  derivation: &IndexedTree,
  backtransform: &Backtransform,
) -> Result<IndexedTree, GrammarError> {
  let derivation = unbinarize(derivation);
  recover(&derivation, backtransform)
}

fn recover(derivation: &IndexedTree, backtransform: &Backtransform) -> Result<IndexedTree, GrammarError> {
  let Some((label, children)) = derivation.get_branch() else {
    return Ok(derivation.clone());
  };
  if children.iter().all(SynTree::is_leaf) {
    return Ok(derivation.clone());
  }

  let (result, node) = match backtransform.get(&backtransform_key(derivation)) {
    Some(fragment) => {
      // an ambiguous fragment sits below its fresh symbol
      let node = match children {
        [only] if only.label().is_some_and(Symbol::is_fresh) => only,
        _ => derivation,
      };
      let (_, leaves) = renumber(&top_production(node));
      let fragment = fragment.map_leaves(&|idx| leaves.get(idx).copied().unwrap_or(idx));
      (fragment, node)
    }
    None => (top_production(derivation), derivation),
  };

  let frontier = result
    .subtrees()
    .into_iter()
    .filter(|t| t.height() == 2)
    .count();
  let children = node.children();
  if frontier != children.len() {
    return Err(GrammarError::BacktransformShape {
      label: label.clone(),
      expected: frontier,
      found: children.len(),
    });
  }

  let mut recovered = BTreeMap::new();
  for child in children {
    let first = child.sorted_leaves().first().copied();
    let child = recover(child, backtransform)?;
    if let (Some(first), Some((_, grandchildren))) = (first, child.into_branch()) {
      recovered.insert(first, grandchildren);
    }
  }
  Ok(splice(result, &mut recovered))
}

/// Replaces the children of every node of height two by the recovered
/// subtree starting at the same position.
fn splice(tree: IndexedTree, recovered: &mut BTreeMap<usize, Vec<IndexedTree>>) -> IndexedTree {
  let height = tree.height();
  match tree {
    SynTree::Leaf(idx) => SynTree::Leaf(idx),
    SynTree::Branch(label, children) if height == 2 => {
      let first = children.iter().filter_map(SynTree::get_leaf).min();
      match first.and_then(|first| recovered.remove(&first)) {
        Some(grandchildren) => SynTree::Branch(label, grandchildren),
        None => SynTree::Branch(label, children),
      }
    }
    SynTree::Branch(label, children) => SynTree::Branch(
      label,
      children.into_iter().map(|c| splice(c, recovered)).collect(),
    ),
  }
}
