use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info};

use crate::error::GrammarError;
use crate::grammar::WeightedGrammar;
use crate::rules::{Rule, Symbol};
use crate::yield_function::PackedYield;

/// Weight given to binary rules with probability one, so that a parser
/// ranking by summed weights still prefers derivations with fewer nodes.
const CERTAIN_BINARY_WEIGHT: f64 = 0.01;

/// A unary or binary rule over label ids. `rhs2` is 0 (`Epsilon`) for unary
/// rules; `prob` is the negated log-probability.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledRule {
  pub lhs: usize,
  pub rhs1: usize,
  pub rhs2: usize,
  pub args: Vec<u16>,
  pub lengths: Vec<u8>,
  pub prob: f64,
}

impl CompiledRule {
  pub fn is_unary(&self) -> bool {
    self.rhs2 == 0
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalRule {
  pub lhs: usize,
  pub word: String,
  pub prob: f64,
}

/// A grammar interned into dense label ids with the indices a chart parser
/// looks rules up by. `Epsilon` is always 0 and `ROOT` always 1.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledGrammar {
  /// Unary rules by their right-hand side
  pub unary: Vec<Vec<Rc<CompiledRule>>>,
  /// Binary rules by their left corner
  pub lbinary: Vec<Vec<Rc<CompiledRule>>>,
  /// Binary rules by their right corner
  pub rbinary: Vec<Vec<Rc<CompiledRule>>>,
  /// Phrasal rules by left-hand side
  pub bylhs: Vec<Vec<Rc<CompiledRule>>>,
  pub lexical: BTreeMap<String, Vec<Rc<LexicalRule>>>,
  pub toid: BTreeMap<Symbol, usize>,
  pub tolabel: Vec<Symbol>,
  /// Number of arguments of each label, 0 for labels never seen as lhs
  pub arity: Vec<usize>,
}

impl CompiledGrammar {
  pub fn new(grammar: &WeightedGrammar) -> Result<Self, GrammarError> {
    let mut labels = grammar
      .rules()
      .flat_map(Rule::symbols)
      .collect::<BTreeSet<_>>();
    labels.remove(&Symbol::epsilon());
    labels.remove(&Symbol::root());
    let tolabel = [Symbol::epsilon(), Symbol::root()]
      .into_iter()
      .chain(labels)
      .collect::<Vec<_>>();
    let toid = tolabel
      .iter()
      .enumerate()
      .map(|(id, label)| (label.clone(), id))
      .collect::<BTreeMap<_, _>>();
    let n = tolabel.len();

    let mut arity = vec![0; n];
    let mut seen = vec![false; n];
    let mut unary = vec![Vec::new(); n];
    let mut lbinary = vec![Vec::new(); n];
    let mut rbinary = vec![Vec::new(); n];
    let mut bylhs = vec![Vec::new(); n];
    let mut lexical: BTreeMap<String, Vec<Rc<LexicalRule>>> = BTreeMap::new();

    for (rule, w) in grammar.iter() {
      let lhs = toid[rule.lhs()];
      let found = match rule {
        Rule::Lexical { .. } => 1,
        Rule::Phrasal { yf, .. } => yf.arity(),
      };
      if !seen[lhs] {
        seen[lhs] = true;
        arity[lhs] = found;
      } else if arity[lhs] != found {
        return Err(GrammarError::ArityMismatch {
          label: rule.lhs().clone(),
          expected: arity[lhs],
          found,
        });
      }

      match rule {
        Rule::Lexical { word, .. } => {
          lexical.entry(word.clone()).or_default().push(Rc::new(LexicalRule {
            lhs,
            word: word.clone(),
            prob: w.abs(),
          }));
        }
        Rule::Phrasal { rhs, yf, .. } => {
          let (rhs1, rhs2) = match rhs.as_slice() {
            [a] => (toid[a], 0),
            [a, b] => (toid[a], toid[b]),
            _ => return Err(GrammarError::NotBinarized(rule.to_string())),
          };
          let PackedYield { args, lengths } = yf.encode()?;
          let mut prob = w.abs();
          if rhs2 != 0 && prob == 0.0 {
            prob = CERTAIN_BINARY_WEIGHT;
          }
          let compiled = Rc::new(CompiledRule {
            lhs,
            rhs1,
            rhs2,
            args,
            lengths,
            prob,
          });

          if rhs2 == 0 {
            unary[rhs1].push(Rc::clone(&compiled));
          } else {
            lbinary[rhs1].push(Rc::clone(&compiled));
            rbinary[rhs2].push(Rc::clone(&compiled));
          }
          bylhs[lhs].push(compiled);
        }
      }
    }

    debug!(
      labels = n,
      words = lexical.len(),
      "interned labels"
    );
    info!(rules = grammar.len(), "compiled grammar");

    Ok(Self {
      unary,
      lbinary,
      rbinary,
      bylhs,
      lexical,
      toid,
      tolabel,
      arity,
    })
  }

  pub fn label(&self, id: usize) -> &Symbol {
    &self.tolabel[id]
  }

  pub fn num_labels(&self) -> usize {
    self.tolabel.len()
  }

  /// Checks that the phrasal and lexical rules of every label form a
  /// probability distribution.
  pub fn test_normalization(&self, tolerance: f64) -> Result<(), GrammarError> {
    let mut sums = vec![0.0; self.num_labels()];
    for rule in self.bylhs.iter().flatten() {
      sums[rule.lhs] += (-rule.prob).exp();
    }
    for rule in self.lexical.values().flatten() {
      sums[rule.lhs] += (-rule.prob).exp();
    }
    let has_rules = |id: usize| {
      !self.bylhs[id].is_empty() || self.lexical.values().flatten().any(|r| r.lhs == id)
    };
    match (0..sums.len()).find(|&id| has_rules(id) && (sums[id] - 1.0).abs() > tolerance) {
      Some(id) => Err(GrammarError::NotNormalized {
        label: self.tolabel[id].clone(),
        sum: sums[id],
      }),
      None => Ok(()),
    }
  }

  fn fmt_rule(&self, f: &mut fmt::Formatter<'_>, rule: &CompiledRule) -> fmt::Result {
    write!(f, "{} -> {}", self.tolabel[rule.lhs], self.tolabel[rule.rhs1])?;
    if !rule.is_unary() {
      write!(f, " {}", self.tolabel[rule.rhs2])?;
    }
    let yf = PackedYield {
      args: rule.args.clone(),
      lengths: rule.lengths.clone(),
    };
    write!(f, " {} {:.4}", yf.decode(), rule.prob)
  }
}

impl fmt::Display for CompiledGrammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "//** labels:")?;
    for (label, arity) in self.tolabel.iter().zip(&self.arity) {
      write!(f, " {}/{}", label, arity)?;
    }
    writeln!(f)?;

    for rule in self.bylhs.iter().flatten() {
      self.fmt_rule(f, rule)?;
      writeln!(f)?;
    }
    for rule in self.lexical.values().flatten() {
      writeln!(f, "{} -> {:?} {:.4}", self.tolabel[rule.lhs], rule.word, rule.prob)?;
    }
    Ok(())
  }
}
