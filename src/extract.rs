//! Reading SRCG productions off leaf-indexed trees.
//!
//! Every internal node `A` with children `B1 .. Bn` yields a production
//! `A(args) -> B1(vars1) .. Bn(varsn)`, where each child's variables are the
//! first positions of its contiguous blocks and the lhs arguments list those
//! variables block by block. A node covering several non-adjacent blocks gets
//! an arity marker (`VP_2`). Preterminals yield lexical productions.

use tracing::trace;

use crate::error::GrammarError;
use crate::rules::{RawProduction, Rule, Symbol};
use crate::syntree::{IndexedTree, SynTree};
use crate::utils::{range_heads, ranges};
use crate::yield_function::YieldFunction;

/// Checks that every leaf of `tree` is a distinct position of `sent`, and
/// that positions no leaf covers are elided. A fragment rooted at a
/// discontinuous node leaves such gaps.
fn check_leaves(tree: &IndexedTree, sent: &[Option<String>]) -> Result<(), GrammarError> {
  let leaves = tree.sorted_leaves();
  let malformed = |what: &str| -> Result<(), GrammarError> {
    Err(GrammarError::MalformedTree(format!(
      "{} in {} for a sentence of length {}",
      what,
      tree,
      sent.len()
    )))
  };
  if leaves.windows(2).any(|w| w[0] == w[1]) {
    return malformed("repeated leaf");
  }
  if leaves.last().is_some_and(|&last| last >= sent.len()) {
    return malformed("leaf out of range");
  }
  let uncovered_word = sent
    .iter()
    .enumerate()
    .any(|(pos, word)| word.is_some() && leaves.binary_search(&pos).is_err());
  if uncovered_word {
    return malformed("uncovered word");
  }
  Ok(())
}

/// Returns a copy of `tree` whose labels carry arity markers (when
/// `arity_marks` is set) together with its productions in preorder.
/// Elided positions (`None` in `sent`) and frontier nodes yield no
/// production.
pub fn extract(
  tree: &IndexedTree,
  sent: &[Option<String>],
  arity_marks: bool,
) -> Result<(IndexedTree, Vec<RawProduction>), GrammarError> {
  check_leaves(tree, sent)?;
  let mut productions = Vec::new();
  let marked = extract_node(tree, sent, arity_marks, &mut productions)?;
  trace!(tree = %tree, productions = productions.len(), "extracted productions");
  Ok((marked, productions))
}

fn mark(label: &Symbol, blocks: usize, arity_marks: bool) -> Symbol {
  if arity_marks {
    label.clone().with_arity(blocks)
  } else {
    label.clone()
  }
}

fn extract_node(
  node: &IndexedTree,
  sent: &[Option<String>],
  arity_marks: bool,
  out: &mut Vec<RawProduction>,
) -> Result<IndexedTree, GrammarError> {
  let (label, children) = match node {
    SynTree::Leaf(idx) => return Ok(SynTree::Leaf(*idx)),
    SynTree::Branch(label, children) => (label, children),
  };

  if children.is_empty() {
    return Err(GrammarError::MalformedTree(format!("node {} has no children", label)));
  }

  if children.iter().all(SynTree::is_leaf) {
    if let [SynTree::Leaf(pos)] = children.as_slice() {
      // preterminal
      if let Some(word) = &sent[*pos] {
        out.push(RawProduction::Lexical {
          lhs: label.clone(),
          word: word.clone(),
        });
      }
      return Ok(node.clone());
    }
    // frontier node of a fragment, e.g. (S_2 0 2)
    let blocks = range_heads(&node.sorted_leaves()).len();
    return Ok(SynTree::Branch(mark(label, blocks, arity_marks), children.clone()));
  }

  if !children.iter().all(SynTree::is_branch) {
    return Err(GrammarError::MalformedTree(format!(
      "node {} mixes leaves and subtrees",
      label
    )));
  }

  let child_heads = children
    .iter()
    .map(|c| range_heads(&c.sorted_leaves()))
    .collect::<Vec<_>>();
  if child_heads.iter().any(Vec::is_empty) {
    return Err(GrammarError::MalformedTree(format!(
      "a child of {} covers no positions",
      label
    )));
  }

  let args = ranges(&node.sorted_leaves())
    .into_iter()
    .map(|run| {
      run
        .into_iter()
        .filter(|x| child_heads.iter().any(|heads| heads.contains(x)))
        .collect::<Vec<_>>()
    })
    .collect::<Vec<_>>();
  let lhs = mark(label, args.len(), arity_marks);

  let mut rhs = Vec::with_capacity(children.len());
  for (child, heads) in children.iter().zip(child_heads) {
    if let Some(child_label) = child.label() {
      rhs.push((mark(child_label, heads.len(), arity_marks), heads));
    }
  }

  // A[0,1] -> B[1] C[0] becomes A[0,1] -> C[0] B[1]: the child providing the
  // first argument goes first, the others keep their order
  let first = args[0][0];
  if rhs[0].1[0] != first {
    rhs.sort_by_key(|(_, heads)| heads[0] != first);
  }

  out.push(RawProduction::Phrasal {
    lhs: lhs.clone(),
    args,
    rhs,
  });

  let marked_children = children
    .iter()
    .map(|c| extract_node(c, sent, arity_marks, out))
    .collect::<Result<Vec<_>, _>>()?;

  Ok(SynTree::Branch(lhs, marked_children))
}

/// Replaces the variables of a production by the index of the right-hand
/// side element that binds them. Lexical productions keep their word.
///
/// `S[[0,1,2]] -> NP[1] VP[0,2]` becomes `S -> NP VP` with yield
/// function `[[1,0,1]]`.
pub fn resolve(production: &RawProduction) -> Result<Rule, GrammarError> {
  match production {
    RawProduction::Lexical { lhs, word } => Ok(Rule::Lexical {
      lhs: lhs.clone(),
      word: word.clone(),
    }),
    RawProduction::Phrasal { lhs, args, rhs } => {
      let blocks = args
        .iter()
        .map(|block| {
          block
            .iter()
            .map(|&var| {
              rhs
                .iter()
                .position(|(_, vars)| vars.contains(&var))
                .ok_or_else(|| GrammarError::UnresolvedVariable {
                  lhs: lhs.clone(),
                  var,
                })
            })
            .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

      Ok(Rule::Phrasal {
        lhs: lhs.clone(),
        rhs: rhs.iter().map(|(sym, _)| sym.clone()).collect(),
        yf: YieldFunction::new(blocks),
      })
    }
  }
}

/// Extracts and resolves the rules of one tree.
pub fn extract_rules(
  tree: &IndexedTree,
  sent: &[Option<String>],
  arity_marks: bool,
) -> Result<(IndexedTree, Vec<Rule>), GrammarError> {
  let (marked, productions) = extract(tree, sent, arity_marks)?;
  let rules = productions.iter().map(resolve).collect::<Result<Vec<_>, _>>()?;
  Ok((marked, rules))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::syntree::sentence;

  fn sym(s: &str) -> Symbol {
    Symbol::from(s)
  }

  fn tree(s: &str) -> IndexedTree {
    s.parse().unwrap()
  }

  #[test]
  fn test_discontinuous_vp() {
    let t = tree("(S (NP 1) (VP (V 0) (ADJ 2)))");
    let sent = sentence("is Mary happy");
    let (marked, prods) = extract(&t, &sent, true).unwrap();

    assert_eq!(
      prods,
      vec![
        RawProduction::Phrasal {
          lhs: sym("S"),
          args: vec![vec![0, 1, 2]],
          rhs: vec![(sym("VP_2"), vec![0, 2]), (sym("NP"), vec![1])],
        },
        RawProduction::Lexical {
          lhs: sym("NP"),
          word: "Mary".to_string(),
        },
        RawProduction::Phrasal {
          lhs: sym("VP_2"),
          args: vec![vec![0], vec![2]],
          rhs: vec![(sym("V"), vec![0]), (sym("ADJ"), vec![2])],
        },
        RawProduction::Lexical {
          lhs: sym("V"),
          word: "is".to_string(),
        },
        RawProduction::Lexical {
          lhs: sym("ADJ"),
          word: "happy".to_string(),
        },
      ]
    );

    // the input is untouched, the copy carries the marker
    assert_eq!(t.children()[1].label(), Some(&sym("VP")));
    assert_eq!(marked, tree("(S (NP 1) (VP_2 (V 0) (ADJ 2)))"));
  }

  #[test]
  fn test_resolved_rules() {
    let t = tree("(S (NP 1) (VP (V 0) (ADJ 2)))");
    let (_, rules) = extract_rules(&t, &sentence("is Mary happy"), true).unwrap();

    assert_eq!(rules.len(), 5);
    assert_eq!(
      rules[0],
      Rule::Phrasal {
        lhs: sym("S"),
        rhs: vec![sym("VP_2"), sym("NP")],
        yf: YieldFunction::new(vec![vec![0, 1, 0]]),
      }
    );
    assert_eq!(
      rules[2],
      Rule::Phrasal {
        lhs: sym("VP_2"),
        rhs: vec![sym("V"), sym("ADJ")],
        yf: YieldFunction::new(vec![vec![0], vec![1]]),
      }
    );
    let lexical = rules
      .iter()
      .filter(|r| r.is_lexical())
      .map(|r| r.to_string())
      .collect::<Vec<_>>();
    assert_eq!(lexical, vec![r#"NP -> "Mary""#, r#"V -> "is""#, r#"ADJ -> "happy""#]);
  }

  #[test]
  fn test_resolve_variables() {
    let raw = RawProduction::Phrasal {
      lhs: sym("S"),
      args: vec![vec![0, 1, 2]],
      rhs: vec![(sym("NP"), vec![1]), (sym("VP"), vec![0, 2])],
    };
    let rule = resolve(&raw).unwrap();
    assert_eq!(rule.symbols(), vec![sym("S"), sym("NP"), sym("VP")]);
    match rule {
      Rule::Phrasal { yf, .. } => assert_eq!(yf, YieldFunction::new(vec![vec![1, 0, 1]])),
      _ => panic!("expected a phrasal rule"),
    }
  }

  #[test]
  fn test_unresolved_variable() {
    let raw = RawProduction::Phrasal {
      lhs: sym("S"),
      args: vec![vec![0, 3]],
      rhs: vec![(sym("NP"), vec![0])],
    };
    assert!(matches!(
      resolve(&raw),
      Err(GrammarError::UnresolvedVariable { var: 3, .. })
    ));
  }

  #[test]
  fn test_args_only_keep_child_heads() {
    // X covers 0-1 contiguously, so 1 is not a variable of S
    let t = tree("(S (X (A 0) (B 1)) (C 2))");
    let (_, rules) = extract_rules(&t, &sentence("a b c"), true).unwrap();
    assert_eq!(
      rules[0],
      Rule::Phrasal {
        lhs: sym("S"),
        rhs: vec![sym("X"), sym("C")],
        yf: YieldFunction::new(vec![vec![0, 1]]),
      }
    );
  }

  #[test]
  fn test_no_arity_marks() {
    let t = tree("(S (NP 1) (VP (V 0) (ADJ 2)))");
    let (marked, rules) = extract_rules(&t, &sentence("is Mary happy"), false).unwrap();
    assert_eq!(marked, t);
    assert_eq!(rules[2].lhs(), &sym("VP"));
  }

  #[test]
  fn test_elided_positions_and_frontiers_are_skipped() {
    let t = tree("(ROOT (S_2 0 2) (X ($, 1) ($. 3)))");
    let sent = vec![None, Some(",".to_string()), None, Some(".".to_string())];
    let (_, prods) = extract(&t, &sent, true).unwrap();

    let lhss = prods.iter().map(|p| p.lhs().to_string()).collect::<Vec<_>>();
    assert_eq!(lhss, vec!["ROOT", "X_2", "$,", "$."]);
    assert_eq!(
      prods[0],
      RawProduction::Phrasal {
        lhs: sym("ROOT"),
        args: vec![vec![0, 1, 2, 3]],
        rhs: vec![(sym("S_2"), vec![0, 2]), (sym("X_2"), vec![1, 3])],
      }
    );
  }

  #[test]
  fn test_gap_at_elided_position() {
    let t = tree("(VP_2 (V 0) (ADJ 2))");
    let sent = vec![Some("is".to_string()), None, Some("happy".to_string())];
    let (marked, rules) = extract_rules(&t, &sent, true).unwrap();
    assert_eq!(marked, t);
    assert_eq!(
      rules[0],
      Rule::Phrasal {
        lhs: sym("VP_2"),
        rhs: vec![sym("V"), sym("ADJ")],
        yf: YieldFunction::new(vec![vec![0], vec![1]]),
      }
    );

    // a word no leaf covers is still an error
    let sent = sentence("is Mary happy");
    assert!(matches!(extract(&t, &sent, true), Err(GrammarError::MalformedTree(_))));
  }

  #[test]
  fn test_malformed_trees() {
    let sent = sentence("a b");
    // leaf 2 out of range
    let t = tree("(S (A 0) (B 2))");
    assert!(matches!(extract(&t, &sent, true), Err(GrammarError::MalformedTree(_))));
    // duplicated leaf
    let t = tree("(S (A 0) (B 0))");
    assert!(matches!(extract(&t, &sent, true), Err(GrammarError::MalformedTree(_))));
    // mixed children
    let t = tree("(S (A 0) 1)");
    assert!(matches!(extract(&t, &sent, true), Err(GrammarError::MalformedTree(_))));
  }
}
