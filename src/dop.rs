//! Reduction of DOP to an SRCG, generalizing Goodman's (1996) reduction of
//! DOP1 to a PCFG to discontinuous constituents.
//!
//! Every node except the root gets a unique decoration (`NP@12`). For each
//! rule of the treebank, every choice between the plain and the decorated
//! symbol at each position is a rule of the reduction, weighted by the number
//! of subtrees headed by the decorated children.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::GrammarError;
use crate::extract::extract_rules;
use crate::grammar::{check_corpus, induce_srcg, WeightedGrammar};
use crate::rules::{Rule, Symbol};
use crate::syntree::{IndexedTree, Sentence, SynTree};
use crate::utils::combinations;

#[derive(Debug, Clone, PartialEq)]
pub struct DopOptions {
  /// Equal weights estimate: divide by the corpus frequency of the
  /// (undecorated) left-hand side as well.
  pub normalize: bool,
  /// Also return a grammar for finding the shortest derivation.
  pub shortest_derivation: bool,
  /// Share of the DOP probability of rules with an undecorated lhs; the rest
  /// goes to the fully undecorated rules in proportion to the plain SRCG.
  pub interpolate: f64,
  /// Compatibility mode: scale every rule by `interpolate` and leave out the
  /// plain SRCG, so the result is not normalized.
  pub wrong_interpolate: bool,
  pub arity_marks: bool,
}

impl Default for DopOptions {
  fn default() -> Self {
    Self {
      normalize: false,
      shortest_derivation: false,
      interpolate: 1.0,
      wrong_interpolate: false,
      arity_marks: true,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DopGrammar {
  Probabilistic(WeightedGrammar),
  ShortestDerivation {
    /// Weight `ln 1` for rules with a decorated lhs and `ln 0.5` otherwise,
    /// so that the best derivation uses the fewest fragments.
    shortest: WeightedGrammar,
    /// The probabilistic model, for breaking ties between shortest
    /// derivations.
    probabilistic: WeightedGrammar,
  },
}

impl DopGrammar {
  pub fn probabilistic(&self) -> &WeightedGrammar {
    match self {
      Self::Probabilistic(g) | Self::ShortestDerivation { probabilistic: g, .. } => g,
    }
  }
}

/// Gives every node but the root a unique id, starting at `*next_id`.
///
/// The root stays plain: a rule with a decorated root lhs could never be
/// used, since no rule has that symbol on its right-hand side.
pub fn decorate_with_ids(tree: &IndexedTree, next_id: &mut usize) -> IndexedTree {
  match tree {
    SynTree::Leaf(idx) => SynTree::Leaf(*idx),
    SynTree::Branch(label, children) => SynTree::Branch(
      label.clone(),
      children.iter().map(|c| decorate_node(c, next_id)).collect(),
    ),
  }
}

fn decorate_node(tree: &IndexedTree, next_id: &mut usize) -> IndexedTree {
  match tree {
    SynTree::Leaf(idx) => SynTree::Leaf(*idx),
    SynTree::Branch(label, children) => {
      let label = label.decorated(*next_id);
      *next_id += 1;
      SynTree::Branch(
        label,
        children.iter().map(|c| decorate_node(c, next_id)).collect(),
      )
    }
  }
}

/// Subtree and node counts of a reduction.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeFrequencies {
  /// Number of subtrees headed by a plain or decorated symbol
  pub subtrees: BTreeMap<Symbol, f64>,
  /// Corpus frequency of plain symbols
  pub nodes: BTreeMap<Symbol, f64>,
}

impl NodeFrequencies {
  /// Counts the nodes of `tree` and the subtrees they head, given the same
  /// tree with decorations. Returns the number of subtrees headed by the
  /// root.
  pub fn update(&mut self, tree: &IndexedTree, decorated: &IndexedTree) -> f64 {
    match (tree, decorated) {
      (SynTree::Branch(label, children), SynTree::Branch(dlabel, dchildren)) => {
        *self.nodes.entry(label.clone()).or_insert(0.0) += 1.0;
        let n = if children.first().is_some_and(SynTree::is_branch) {
          children
            .iter()
            .zip(dchildren)
            .map(|(c, dc)| self.update(c, dc) + 1.0)
            .product::<f64>()
        } else {
          1.0
        };
        *self.subtrees.entry(label.clone()).or_insert(0.0) += n;
        // the root has no decoration and must not be counted twice
        if dlabel != label {
          *self.subtrees.entry(dlabel.clone()).or_insert(0.0) += n;
        }
        n
      }
      _ => 0.0,
    }
  }

  fn subtrees_of(&self, symbol: &Symbol) -> f64 {
    self.subtrees.get(symbol).copied().unwrap_or(0.0)
  }
}

/// Induces the DOP reduction of a treebank.
pub fn dop_srcg_rules(
  trees: &[IndexedTree],
  sents: &[Sentence],
  options: &DopOptions,
) -> Result<DopGrammar, GrammarError> {
  check_corpus(trees, sents)?;
  let trees = trees.iter().map(SynTree::canonicalized).collect::<Vec<_>>();

  let mut next_id = 1;
  let mut freqs = NodeFrequencies::default();
  let mut counts: BTreeMap<Rule, f64> = BTreeMap::new();
  for (tree, sent) in trees.iter().zip(sents) {
    let (marked, rules) = extract_rules(tree, sent, options.arity_marks)?;
    let decorated = decorate_with_ids(&marked, &mut next_id);
    let (_, drules) = extract_rules(&decorated, sent, false)?;
    freqs.update(&marked, &decorated);

    for (rule, drule) in rules.iter().zip(&drules) {
      let choices = rule
        .symbols()
        .into_iter()
        .zip(drule.symbols())
        .map(|(plain, dec)| if plain == dec { vec![plain] } else { vec![plain, dec] })
        .collect::<Vec<_>>();
      for symbols in combinations(&choices) {
        *counts.entry(rule.with_symbols(&symbols)).or_insert(0.0) += 1.0;
      }
    }
  }
  debug!(nodes = next_id - 1, rules = counts.len(), "decorated treebank");

  let srcg = if options.interpolate != 1.0 {
    Some(induce_srcg(&trees, sents, options.arity_marks)?)
  } else {
    None
  };

  let mut probabilistic = WeightedGrammar::new();
  let mut dropped = 0;
  for (rule, &freq) in counts.iter() {
    let symbols = rule.symbols();
    let lhs = &symbols[0];
    let numerator = freq
      * symbols[1..]
        .iter()
        .filter(|s| s.is_decorated())
        .map(|s| freqs.subtrees_of(s))
        .product::<f64>();
    let mut denominator = freqs.subtrees_of(lhs);
    if options.normalize && !lhs.is_decorated() {
      denominator *= freqs.nodes.get(lhs).copied().unwrap_or(0.0);
    }
    let mut prob = numerator / denominator;

    if let Some(srcg) = &srcg {
      let interpolate = options.interpolate;
      if options.wrong_interpolate {
        prob *= interpolate;
      } else if !lhs.is_decorated() {
        // the plain SRCG takes the remaining mass of each undecorated lhs
        prob *= interpolate;
        if !symbols.iter().any(Symbol::is_decorated) {
          prob += (1.0 - interpolate) * srcg.get(rule).map(f64::exp).unwrap_or(0.0);
        }
      }
    }

    if prob > 0.0 && prob.is_finite() {
      probabilistic.insert(rule.clone(), prob.ln());
    } else {
      dropped += 1;
    }
  }
  info!(
    trees = trees.len(),
    rules = probabilistic.len(),
    dropped,
    "induced DOP reduction"
  );

  if options.shortest_derivation {
    let shortest = counts
      .keys()
      .map(|rule| {
        let w = if rule.lhs().is_decorated() { 1.0f64 } else { 0.5 };
        (rule.clone(), w.ln())
      })
      .collect();
    Ok(DopGrammar::ShortestDerivation {
      shortest,
      probabilistic,
    })
  } else {
    Ok(DopGrammar::Probabilistic(probabilistic))
  }
}
