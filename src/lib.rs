#[macro_use]
extern crate lazy_static;

pub mod binarize;
pub mod compiled;
pub mod dop;
pub mod doubledop;
pub mod enumerate;
pub mod error;
pub mod export;
pub mod extract;
pub mod grammar;
pub mod parse;
pub mod rules;
pub mod syntree;
pub mod utils;
pub mod yield_function;

pub use crate::compiled::CompiledGrammar;
pub use crate::dop::{dop_srcg_rules, DopGrammar, DopOptions};
pub use crate::doubledop::{double_dop, recover_from_fragments, Backtransform, FragmentExtractor, Fragments};
pub use crate::error::GrammarError;
pub use crate::extract::{extract, extract_rules, resolve};
pub use crate::grammar::{induce_srcg, WeightedGrammar};
pub use crate::rules::{Rule, Symbol};
pub use crate::syntree::{sentence, IndexedTree, Sentence, SynTree};
pub use crate::utils::Err;

#[cfg(test)]
fn treebank() -> (Vec<IndexedTree>, Vec<Sentence>) {
  let trees = [
    "(ROOT (S (VP_2 (V 0) (ADJ 2)) (NP 1)))",
    "(ROOT (S (NP 0) (VP (V 1) (ADJ 2))))",
    "(ROOT (S (NP 0) (VP (V 1) (NP 2))))",
  ]
  .iter()
  .map(|t| t.parse().unwrap())
  .collect();
  let sents = vec![
    sentence("is Mary happy"),
    sentence("Mary is happy"),
    sentence("Mary sees John"),
  ];
  (trees, sents)
}

#[test]
fn test_srcg_compiles() {
  let (trees, sents) = treebank();
  let grammar = induce_srcg(&trees, &sents, true).unwrap();
  let compiled = CompiledGrammar::new(&grammar).unwrap();

  let vp2 = compiled.toid[&Symbol::from("VP_2")];
  assert_eq!(compiled.arity[vp2], 2);
  assert_eq!(compiled.lexical["Mary"].len(), 1);
  assert!(compiled.test_normalization(1e-9).is_ok());
}

#[test]
fn test_dop_reduction_compiles() {
  let (trees, sents) = treebank();
  let options = DopOptions {
    shortest_derivation: true,
    ..DopOptions::default()
  };
  let dop = dop_srcg_rules(&trees, &sents, &options).unwrap();
  let DopGrammar::ShortestDerivation {
    shortest,
    probabilistic,
  } = dop
  else {
    panic!("asked for the shortest derivation grammar");
  };
  assert!(probabilistic.check_normalization(1e-9).is_ok());

  let compiled = CompiledGrammar::new(&probabilistic).unwrap();
  let shortest = CompiledGrammar::new(&shortest).unwrap();
  assert_eq!(compiled.tolabel, shortest.tolabel);
  // decorated labels share the arity of their plain label
  for (label, &arity) in compiled.tolabel.iter().zip(&compiled.arity) {
    if label.is_decorated() {
      let plain = Symbol {
        decoration: None,
        ..label.clone()
      };
      assert_eq!(compiled.arity[compiled.toid[&plain]], arity);
    }
  }
}

#[test]
fn test_double_dop_round_trip() {
  let (trees, sents) = treebank();
  // every tree minus its words is a fragment
  let whole_trees = |trees: &[IndexedTree], sents: &[Sentence]| -> Result<Fragments, Err> {
    Ok(
      trees
        .iter()
        .cloned()
        .zip(sents.iter().cloned())
        .map(|fragment| (fragment, 1))
        .collect(),
    )
  };
  let (grammar, backtransform) = double_dop(&trees, &sents, &whole_trees).unwrap();
  assert!(grammar.check_normalization(1e-9).is_ok());
  CompiledGrammar::new(&grammar).unwrap();

  // a whole tree flattens to ROOT over its words
  let derivation: IndexedTree = "(ROOT (ROOT}<#&Mary-#&sees> (#&Mary 0) (#&sees 1)) (#&John 2))"
    .parse()
    .unwrap();
  let recovered = recover_from_fragments(&derivation, &backtransform).unwrap();
  assert_eq!(recovered, trees[2]);
}
