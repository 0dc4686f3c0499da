use std::collections::BTreeMap;
use std::fmt;

use tracing::info;

use crate::error::GrammarError;
use crate::extract::extract_rules;
use crate::rules::{Rule, Symbol};
use crate::syntree::{IndexedTree, Sentence};

/// Rules with log-probabilities. Ordered, so that everything derived from a
/// grammar comes out the same on every run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeightedGrammar {
  rules: BTreeMap<Rule, f64>,
}

impl WeightedGrammar {
  pub fn new() -> Self {
    Self::default()
  }

  /// Log relative frequencies of `counts`, one distribution per left-hand
  /// side.
  pub fn from_counts<'a, I>(counts: I) -> Self
  where
    I: IntoIterator<Item = (&'a Rule, f64)> + Clone,
  {
    let mut totals: BTreeMap<&Symbol, f64> = BTreeMap::new();
    for (rule, count) in counts.clone() {
      *totals.entry(rule.lhs()).or_insert(0.0) += count;
    }
    counts
      .into_iter()
      .map(|(rule, count)| (rule.clone(), (count / totals[rule.lhs()]).ln()))
      .collect()
  }

  pub fn insert(&mut self, rule: Rule, weight: f64) -> Option<f64> {
    self.rules.insert(rule, weight)
  }

  pub fn get(&self, rule: &Rule) -> Option<f64> {
    self.rules.get(rule).copied()
  }

  pub fn contains(&self, rule: &Rule) -> bool {
    self.rules.contains_key(rule)
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn iter(&self) -> impl Iterator<Item = (&Rule, f64)> {
    self.rules.iter().map(|(rule, &w)| (rule, w))
  }

  pub fn rules(&self) -> impl Iterator<Item = &Rule> {
    self.rules.keys()
  }

  /// Checks that the rules of every left-hand side form a probability
  /// distribution, reporting the first label that doesn't.
  pub fn check_normalization(&self, tolerance: f64) -> Result<(), GrammarError> {
    let mut sums: BTreeMap<&Symbol, f64> = BTreeMap::new();
    for (rule, w) in self.iter() {
      *sums.entry(rule.lhs()).or_insert(0.0) += w.exp();
    }
    match sums.into_iter().find(|(_, sum)| (sum - 1.0).abs() > tolerance) {
      Some((label, sum)) => Err(GrammarError::NotNormalized {
        label: label.clone(),
        sum,
      }),
      None => Ok(()),
    }
  }
}

impl FromIterator<(Rule, f64)> for WeightedGrammar {
  fn from_iter<I: IntoIterator<Item = (Rule, f64)>>(iter: I) -> Self {
    Self {
      rules: iter.into_iter().collect(),
    }
  }
}

impl<'a> IntoIterator for &'a WeightedGrammar {
  type Item = (&'a Rule, &'a f64);
  type IntoIter = std::collections::btree_map::Iter<'a, Rule, f64>;

  fn into_iter(self) -> Self::IntoIter {
    self.rules.iter()
  }
}

impl fmt::Display for WeightedGrammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (rule, w) in self.iter() {
      writeln!(f, "{:.4} {}", w.exp(), rule)?;
    }
    Ok(())
  }
}

pub(crate) fn check_corpus(trees: &[IndexedTree], sents: &[Sentence]) -> Result<(), GrammarError> {
  if trees.len() != sents.len() {
    return Err(GrammarError::CorpusMismatch {
      trees: trees.len(),
      sents: sents.len(),
    });
  }
  Ok(())
}

/// Counts the rules of a corpus. Also returns the trees as extraction
/// labelled them (with arity markers when `arity_marks` is set).
pub fn count_rules(
  trees: &[IndexedTree],
  sents: &[Sentence],
  arity_marks: bool,
) -> Result<(BTreeMap<Rule, u64>, Vec<IndexedTree>), GrammarError> {
  check_corpus(trees, sents)?;
  let mut counts = BTreeMap::new();
  let mut marked = Vec::with_capacity(trees.len());
  for (tree, sent) in trees.iter().zip(sents) {
    let (tree, rules) = extract_rules(tree, sent, arity_marks)?;
    for rule in rules {
      *counts.entry(rule).or_insert(0) += 1;
    }
    marked.push(tree);
  }
  Ok((counts, marked))
}

/// Induces a probabilistic SRCG the way a PCFG is read off a treebank: rule
/// weights are log relative frequencies per left-hand side.
pub fn induce_srcg(
  trees: &[IndexedTree],
  sents: &[Sentence],
  arity_marks: bool,
) -> Result<WeightedGrammar, GrammarError> {
  let (counts, _) = count_rules(trees, sents, arity_marks)?;
  let grammar = WeightedGrammar::from_counts(counts.iter().map(|(rule, &c)| (rule, c as f64)));
  info!(trees = trees.len(), rules = grammar.len(), "induced SRCG");
  Ok(grammar)
}
