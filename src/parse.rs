/// Simple recursive-descent readers for bracketed trees and grammar files
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::compiled::CompiledGrammar;
use crate::extract::resolve;
use crate::grammar::WeightedGrammar;
use crate::rules::{RawProduction, Rule, Symbol, ROOT};
use crate::syntree::{IndexedTree, SynTree};
use crate::yield_function::YieldFunction;
use crate::Err;

/// Label some tools use for the root
pub const VROOT: &str = "VROOT";

type Infallible<'a, T> = (T, &'a str);
type ParseResult<'a, T> = Result<(T, &'a str), Err>;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// Try to consume a regex, returning None if it doesn't match
fn optional_re<'a>(re: &'static Regex, s: &'a str) -> Infallible<'a, Option<&'a str>> {
  match re.find(s) {
    Some(m) if m.start() == 0 => {
      let (_, rest) = s.split_at(m.end());
      (Some(m.as_str()), rest)
    }
    _ => (None, s),
  }
}

/// Try to consume a regex, failing if it doesn't match
fn needed_re<'a>(re: &'static Regex, s: &'a str) -> ParseResult<'a, &'a str> {
  if let (Some(c), rest) = optional_re(re, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", re, s).into())
  }
}

/// Try to consume a char, returning None if it doesn't match
fn optional_char(c: char, s: &str) -> Infallible<'_, Option<char>> {
  match s.strip_prefix(c) {
    Some(rest) => (Some(c), rest),
    None => (None, s),
  }
}

/// Try to consume a char, failing if it doesn't match
fn needed_char(c: char, s: &str) -> ParseResult<'_, char> {
  if let (Some(c), rest) = optional_char(c, s) {
    Ok((c, rest))
  } else {
    Err(format!("couldn't match {} at {}", c, s).into())
  }
}

fn skip_whitespace(s: &str) -> &str {
  regex_static!(WHITESPACE, r"^\s+");
  optional_re(&WHITESPACE, s).1
}

/// A node label: anything up to whitespace or a bracket
fn parse_label(s: &str) -> ParseResult<'_, &str> {
  regex_static!(LABEL, r"^[^\s()]+");
  needed_re(&LABEL, s).map_err(|e| format!("label: {}", e).into())
}

fn parse_index(s: &str) -> ParseResult<'_, usize> {
  regex_static!(INDEX, r"^[0-9]+");
  let (digits, s) = needed_re(&INDEX, s)
    .map_err(|e| -> Err { format!("leaf (trees must have integer leaves): {}", e).into() })?;
  Ok((digits.parse()?, s))
}

fn parse_tree(s: &str) -> ParseResult<'_, IndexedTree> {
  let (_, s) = needed_char('(', s)?;
  let s = skip_whitespace(s);
  let (label, s) = parse_label(s)?;

  let mut children = Vec::new();
  let mut rem = s;
  loop {
    rem = skip_whitespace(rem);
    if let (Some(_), rest) = optional_char(')', rem) {
      return Ok((SynTree::Branch(Symbol::from(label), children), rest));
    }
    if rem.is_empty() {
      return Err(format!("unbalanced brackets in tree at {}", label).into());
    }
    let (child, rest) = if rem.starts_with('(') {
      parse_tree(rem)?
    } else {
      let (idx, rest) = parse_index(rem)?;
      (SynTree::Leaf(idx), rest)
    };
    children.push(child);
    rem = rest;
  }
}

/// Reads a bracketed tree with sentence positions as leaves, e.g.
/// `(S (NP 1) (VP (V 0) (ADJ 2)))`. Labels keep their `_k` arity and `@n`
/// decoration suffixes as structured fields.
impl FromStr for IndexedTree {
  type Err = Err;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (tree, rest) = parse_tree(skip_whitespace(s))?;
    if !skip_whitespace(rest).is_empty() {
      return Err(format!("trailing input after tree: {}", rest).into());
    }
    Ok(tree)
  }
}

/// Reads the blocks of an rparse yield function such as
/// `[[[true, false], [true]]]`; 0/1 are accepted as well.
fn parse_bool_blocks(s: &str) -> Result<YieldFunction, Err> {
  regex_static!(BLOCK, r"\[([^\[\]]*)\]");
  let mut blocks = Vec::new();
  for caps in BLOCK.captures_iter(s) {
    let block = caps[1]
      .split(',')
      .map(str::trim)
      .filter(|tok| !tok.is_empty())
      .map(|tok| match tok {
        "true" | "1" => Ok(1),
        "false" | "0" => Ok(0),
        other => Err(format!("not a yield function entry: {}", other)),
      })
      .collect::<Result<Vec<_>, _>>()?;
    blocks.push(block);
  }
  if blocks.is_empty() {
    return Err(format!("no yield function in {}", s).into());
  }
  Ok(YieldFunction::new(blocks))
}

fn read_root_label(label: &str) -> Symbol {
  if label == VROOT {
    Symbol::new(ROOT)
  } else {
    Symbol::from(label)
  }
}

/// Parses the lines written by [`crate::export::export_rparse`]:
/// `<freq> <prob>:<LHS> --> <RHS...> [[[true, false], ...]]`
pub fn parse_rparse_grammar(s: &str) -> Result<WeightedGrammar, Err> {
  let mut grammar = WeightedGrammar::default();
  for (lineno, line) in s.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let split = line
      .find("[[[")
      .ok_or_else(|| format!("line {}: missing yield function", lineno + 1))?;
    let (head, yf) = line.split_at(split);
    let yf = parse_bool_blocks(yf).map_err(|e| format!("line {}: {}", lineno + 1, e))?;

    let mut tokens = head.split_whitespace();
    let _freq = tokens.next();
    let (prob, lhs) = tokens
      .next()
      .and_then(|t| t.split_once(':'))
      .ok_or_else(|| format!("line {}: expected <prob>:<lhs>", lineno + 1))?;
    if tokens.next() != Some("-->") {
      return Err(format!("line {}: expected -->", lineno + 1).into());
    }
    let prob: f64 = prob.parse()?;
    let rhs = tokens.map(Symbol::from).collect::<Vec<_>>();

    let rule = Rule::Phrasal {
      lhs: read_root_label(lhs),
      rhs,
      yf,
    };
    grammar.insert(rule, prob.ln());
  }
  debug!(rules = grammar.len(), "read rparse grammar");
  Ok(grammar)
}

/// Parses a bitpar grammar: a rules file with lines `<p> <LHS> <RHS...>` and
/// a lexicon with lines `<word> <tag> <p> <tag> <p> ...`. Weights are turned
/// into relative frequencies per left-hand side. With `ewe` (equal weights
/// estimate) the probability is also divided by the number of decorated
/// variants of the undecorated label.
pub fn parse_bitpar_grammar(rules: &str, lexicon: &str, ewe: bool) -> Result<CompiledGrammar, Err> {
  let mut weighted: Vec<(Rule, f64)> = Vec::new();
  let mut ntfd: BTreeMap<Symbol, f64> = BTreeMap::new();
  let mut variants: BTreeMap<Symbol, BTreeSet<Symbol>> = BTreeMap::new();

  let mut count = |label: &Symbol, p: f64| {
    *ntfd.entry(label.clone()).or_insert(0.0) += p;
    let base = Symbol {
      decoration: None,
      ..label.clone()
    };
    variants.entry(base).or_default().insert(label.clone());
  };

  for (lineno, line) in rules.lines().enumerate() {
    let mut tokens = line.split_whitespace();
    let Some(p) = tokens.next() else { continue };
    let p: f64 = p
      .parse()
      .map_err(|e| format!("rules line {}: bad weight {}: {}", lineno + 1, p, e))?;
    let lhs = tokens
      .next()
      .map(read_root_label)
      .ok_or_else(|| format!("rules line {}: missing lhs", lineno + 1))?;
    let rhs = tokens
      .enumerate()
      .map(|(n, label)| (Symbol::from(label), vec![n]))
      .collect::<Vec<_>>();
    if rhs.is_empty() {
      return Err(format!("rules line {}: empty right-hand side", lineno + 1).into());
    }

    count(&lhs, p);
    let raw = RawProduction::Phrasal {
      args: vec![(0..rhs.len()).collect()],
      lhs,
      rhs,
    };
    weighted.push((resolve(&raw)?, p));
  }

  for (lineno, line) in lexicon.lines().enumerate() {
    let mut tokens = line.split_whitespace();
    let Some(word) = tokens.next() else { continue };
    let rest = tokens.collect::<Vec<_>>();
    if rest.is_empty() || rest.len() % 2 != 0 {
      return Err(format!("lexicon line {}: expected tag/weight pairs", lineno + 1).into());
    }
    for pair in rest.chunks(2) {
      let tag = Symbol::from(pair[0]);
      let p: f64 = pair[1]
        .parse()
        .map_err(|e| format!("lexicon line {}: bad weight {}: {}", lineno + 1, pair[1], e))?;
      count(&tag, p);
      weighted.push((
        Rule::Lexical {
          lhs: tag,
          word: word.to_string(),
        },
        p,
      ));
    }
  }

  let mut grammar = WeightedGrammar::default();
  for (rule, p) in weighted {
    let lhs = rule.lhs();
    let mut denominator = ntfd[lhs];
    if ewe {
      let base = Symbol {
        decoration: None,
        ..lhs.clone()
      };
      denominator *= variants[&base].len() as f64;
    }
    grammar.insert(rule, (p / denominator).ln());
  }
  debug!(rules = grammar.len(), ewe, "read bitpar grammar");

  Ok(CompiledGrammar::new(&grammar)?)
}

pub fn read_rparse_grammar(path: impl AsRef<Path>) -> Result<WeightedGrammar, Err> {
  parse_rparse_grammar(&fs::read_to_string(path)?)
}

pub fn read_bitpar_grammar(
  rules: impl AsRef<Path>,
  lexicon: impl AsRef<Path>,
  ewe: bool,
) -> Result<CompiledGrammar, Err> {
  parse_bitpar_grammar(&fs::read_to_string(rules)?, &fs::read_to_string(lexicon)?, ewe)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_tree() {
    let t: IndexedTree = "(S (NP 1) (VP_2 (V 0) (ADJ 2)))".parse().unwrap();
    let (label, children) = t.get_branch().unwrap();
    assert_eq!(label, &Symbol::new("S"));
    assert_eq!(children.len(), 2);
    assert_eq!(children[1].label().unwrap().arity, Some(2));
    assert_eq!(t.leaves(), vec![1, 0, 2]);
  }

  #[test]
  fn test_parse_frontier_node() {
    let t: IndexedTree = "(ROOT (S_2 0 2) ($, 1))".parse().unwrap();
    assert_eq!(t.children()[0].children().len(), 2);
    assert_eq!(t.to_string(), "(ROOT (S_2 0 2) ($, 1))");
  }

  #[test]
  fn test_parse_tree_errors() {
    assert!("(S (NP Mary))".parse::<IndexedTree>().is_err());
    assert!("(S (NP 0)".parse::<IndexedTree>().is_err());
    assert!("(S (NP 0)) (X 1)".parse::<IndexedTree>().is_err());
  }

  #[test]
  fn test_parse_rparse_line() {
    let g = parse_rparse_grammar("1 0.25:VROOT --> S_2 X [[[true, false, true]]]\n").unwrap();
    let (rule, w) = g.iter().next().unwrap();
    assert_eq!(rule.lhs(), &Symbol::root());
    assert_eq!(
      rule,
      &Rule::Phrasal {
        lhs: Symbol::root(),
        rhs: vec![Symbol::from("S_2"), Symbol::new("X")],
        yf: YieldFunction::new(vec![vec![1, 0, 1]]),
      }
    );
    assert!((w - 0.25f64.ln()).abs() < 1e-9);
  }

  #[test]
  fn test_parse_bitpar() {
    let rules = "3 VROOT S\n2 S NP VP\n1 S VP\n1 VP V NP\n";
    let lexicon = "Mary NP 2\nsees V 1\nJohn NP 1 VP 1\n";
    let g = parse_bitpar_grammar(rules, lexicon, false).unwrap();

    let s = g.toid[&Symbol::new("S")];
    assert_eq!(g.bylhs[s].len(), 2);
    assert!(g.test_normalization(1e-9).is_ok());
    assert_eq!(g.lexical["John"].len(), 2);
    assert_eq!(g.bylhs[1].len(), 1);
  }

  #[test]
  fn test_parse_bitpar_equal_weights() {
    let rules = "1 ROOT NP@1\n1 ROOT NP@2\n1 NP@1 N\n1 NP@2 N\n";
    let lexicon = "dog N 1\n";
    let g = parse_bitpar_grammar(rules, lexicon, true).unwrap();
    let np1 = g.toid[&Symbol::from("NP@1")];
    // NP@1 and NP@2 are the two variants of NP, so each rule gets half
    assert!((g.bylhs[np1][0].prob - 2f64.ln()).abs() < 1e-9);
    let root = g.toid[&Symbol::root()];
    // ROOT has a single variant but two rules
    assert!((g.bylhs[root][0].prob - 2f64.ln()).abs() < 1e-9);
    let n = g.toid[&Symbol::new("N")];
    assert!(g.lexical["dog"].iter().all(|r| r.lhs == n && r.prob == 0.0));
  }
}
