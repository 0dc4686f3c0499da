use std::error::Error;
use std::fmt;

use crate::rules::Symbol;
use crate::utils::Err;

/// Everything that can go wrong while turning trees into a grammar.
/// Each stage fails with its own variant so callers can tell which rule or
/// label was at fault.
#[derive(Debug)]
pub enum GrammarError {
  /// The tree's leaves are not a permutation of the sentence positions, or a
  /// node mixes leaves and subtrees.
  MalformedTree(String),
  /// A variable of the left-hand side is bound by no right-hand side element.
  UnresolvedVariable { lhs: Symbol, var: usize },
  /// A yield function does not fit the packed encoding (8 blocks of 16 bits).
  YieldCapacity { blocks: usize, longest: usize },
  /// A yield function entry that is not a 0/1 flag.
  InvalidYieldFlag(usize),
  /// A rule with more than two right-hand side symbols.
  NotBinarized(String),
  /// A label used as left-hand side with two different numbers of arguments.
  ArityMismatch {
    label: Symbol,
    expected: usize,
    found: usize,
  },
  /// A backtransform fragment whose frontier does not line up with the
  /// children of the derivation node.
  BacktransformShape {
    label: Symbol,
    expected: usize,
    found: usize,
  },
  /// Too many children to search for a minimal binarization.
  BinarizationWidth(usize),
  /// The rules of a left-hand side do not form a probability distribution.
  NotNormalized { label: Symbol, sum: f64 },
  /// Different numbers of trees and sentences.
  CorpusMismatch { trees: usize, sents: usize },
  /// The fragment extractor failed.
  FragmentExtraction(Err),
}

impl fmt::Display for GrammarError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::MalformedTree(msg) => write!(f, "malformed tree: {}", msg),
      Self::UnresolvedVariable { lhs, var } => {
        write!(f, "variable {} of {} not bound by any child", var, lhs)
      }
      Self::YieldCapacity { blocks, longest } => write!(
        f,
        "yield function too large: {} blocks, longest {} (max 8 blocks of 16)",
        blocks, longest
      ),
      Self::InvalidYieldFlag(flag) => write!(f, "yield function entry {} is not 0 or 1", flag),
      Self::NotBinarized(rule) => write!(f, "grammar not binarized: {}", rule),
      Self::ArityMismatch {
        label,
        expected,
        found,
      } => write!(
        f,
        "arity mismatch for {}: expected {} arguments, found {}",
        label, expected, found
      ),
      Self::BacktransformShape {
        label,
        expected,
        found,
      } => write!(
        f,
        "backtransform for {} has {} frontier nodes but derivation has {} children",
        label, expected, found
      ),
      Self::BinarizationWidth(n) => write!(f, "cannot binarize production with {} children", n),
      Self::NotNormalized { label, sum } => write!(f, "rules of {} sum to {}", label, sum),
      Self::CorpusMismatch { trees, sents } => {
        write!(f, "{} trees but {} sentences", trees, sents)
      }
      Self::FragmentExtraction(err) => write!(f, "fragment extraction failed: {}", err),
    }
  }
}

impl Error for GrammarError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::FragmentExtraction(err) => Some(err.as_ref()),
      _ => None,
    }
  }
}
