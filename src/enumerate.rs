use std::collections::HashMap;
use std::iter;

use crate::compiled::CompiledGrammar;
use crate::rules::Symbol;
use crate::syntree::{IndexedTree, SynTree};
use crate::utils::DiagonalProduct;

/// A label over a set of sentence positions (bit `i` set for position `i`).
/// Lexical edges point at an `Epsilon` item whose `vec` is the position
/// itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChartItem {
  pub label: usize,
  pub vec: u64,
}

impl ChartItem {
  pub fn new(label: usize, vec: u64) -> Self {
    Self { label, vec }
  }

  /// The `Epsilon` child of a lexical edge at `position`.
  pub fn terminal(position: usize) -> Self {
    Self::new(0, position as u64)
  }
}

/// One way of building an item; `prob` is the negated log-probability of the
/// rule used.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
  pub prob: f64,
  pub left: ChartItem,
  pub right: Option<ChartItem>,
}

/// A parse chart as a parser leaves it: the edges of every item.
pub type Chart = HashMap<ChartItem, Vec<Edge>>;

/// Enumerates the derivations of `start` top-down with their summed weights.
/// For each edge, the derivations of its children are combined
/// breadth-first, at most `n` per edge, so that unbounded charts can be
/// explored lazily.
pub fn enumerate_derivations<'a>(
  chart: &'a Chart,
  start: ChartItem,
  grammar: &'a CompiledGrammar,
  n: usize,
) -> Box<dyn Iterator<Item = (IndexedTree, f64)> + 'a> {
  let label = grammar
    .tolabel
    .get(start.label)
    .cloned()
    .unwrap_or_else(|| Symbol::new(start.label.to_string()));
  let edges = chart.get(&start).map(Vec::as_slice).unwrap_or(&[]);

  Box::new(
    edges
      .iter()
      .flat_map(move |edge| -> Box<dyn Iterator<Item = (IndexedTree, f64)> + 'a> {
        if edge.left.label == 0 {
          let leaf = SynTree::Leaf(edge.left.vec as usize);
          return Box::new(iter::once((
            SynTree::Branch(label.clone(), vec![leaf]),
            edge.prob,
          )));
        }

        let sources = iter::once(edge.left)
          .chain(edge.right)
          .map(|item| enumerate_derivations(chart, item, grammar, n))
          .collect();
        let label = label.clone();
        let prob = edge.prob;
        Box::new(DiagonalProduct::new(sources).take(n).map(move |children| {
          let prob = prob + children.iter().map(|(_, p)| p).sum::<f64>();
          let children = children.into_iter().map(|(tree, _)| tree).collect();
          (SynTree::Branch(label.clone(), children), prob)
        }))
      }),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::WeightedGrammar;
  use crate::rules::Rule;

  fn grammar() -> CompiledGrammar {
    let lexical = |lhs: &str, word: &str| {
      (
        Rule::Lexical {
          lhs: Symbol::new(lhs),
          word: word.to_string(),
        },
        0.0,
      )
    };
    let g: WeightedGrammar = [
      (
        Rule::Phrasal {
          lhs: Symbol::new("S"),
          rhs: vec![Symbol::new("NP"), Symbol::new("VP")],
          yf: vec![vec![0, 1]].into(),
        },
        0.0,
      ),
      (
        Rule::Phrasal {
          lhs: Symbol::new("VP"),
          rhs: vec![Symbol::new("V")],
          yf: vec![vec![0]].into(),
        },
        0.0,
      ),
      lexical("NP", "Mary"),
      lexical("VP", "walks"),
      lexical("V", "walks"),
    ]
    .into_iter()
    .collect();
    CompiledGrammar::new(&g).unwrap()
  }

  fn chart(g: &CompiledGrammar) -> (Chart, ChartItem) {
    let id = |s: &str| g.toid[&Symbol::new(s)];
    let s = ChartItem::new(id("S"), 0b11);
    let np = ChartItem::new(id("NP"), 0b01);
    let vp = ChartItem::new(id("VP"), 0b10);
    let v = ChartItem::new(id("V"), 0b10);

    let mut chart = Chart::new();
    chart.insert(s, vec![Edge { prob: 0.5, left: np, right: Some(vp) }]);
    chart.insert(np, vec![Edge { prob: 0.25, left: ChartItem::terminal(0), right: None }]);
    chart.insert(
      vp,
      vec![
        Edge { prob: 0.25, left: ChartItem::terminal(1), right: None },
        Edge { prob: 1.0, left: v, right: None },
      ],
    );
    chart.insert(v, vec![Edge { prob: 0.5, left: ChartItem::terminal(1), right: None }]);
    (chart, s)
  }

  #[test]
  fn test_all_derivations() {
    let g = grammar();
    let (chart, start) = chart(&g);
    let derivations = enumerate_derivations(&chart, start, &g, 10).collect::<Vec<_>>();
    assert_eq!(
      derivations,
      vec![
        ("(S (NP 0) (VP 1))".parse().unwrap(), 1.0),
        ("(S (NP 0) (VP (V 1)))".parse().unwrap(), 2.25),
      ]
    );
  }

  #[test]
  fn test_at_most_n_per_edge() {
    let g = grammar();
    let (chart, start) = chart(&g);
    assert_eq!(enumerate_derivations(&chart, start, &g, 1).count(), 1);
  }

  #[test]
  fn test_missing_item() {
    let g = grammar();
    let (chart, _) = chart(&g);
    let nothing = ChartItem::new(1, 0b11);
    assert_eq!(enumerate_derivations(&chart, nothing, &g, 10).count(), 0);
  }
}
