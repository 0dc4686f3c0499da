use crate::grammar::WeightedGrammar;
use crate::rules::{Rule, Symbol};
use crate::yield_function::YieldFunction;

/// How labels are spelled in an exported grammar.
pub trait LabelFormat {
  fn format(&self, label: &Symbol) -> String;
}

/// Labels as they render (`VP_2@3`); reads back with
/// [`crate::parse::parse_rparse_grammar`].
pub struct Verbatim;

impl LabelFormat for Verbatim {
  fn format(&self, label: &Symbol) -> String {
    label.to_string()
  }
}

/// rparse's own labels: every label ends in its arity (`VP2`, `NP1`), the
/// root is `VROOT`, and binarization labels `X|<A-B_2>^<P>_2` become
/// `@^X1^P1-A1-B2X2`. A missing parent is written as `^1`, the way rparse
/// spells an empty label.
pub struct RparseLabels;

fn with_arity_digit(label: &str) -> String {
  if label.contains('_') {
    label.replace('_', "")
  } else {
    format!("{}1", label)
  }
}

fn marked_list(labels: &str) -> String {
  labels.split('-').map(with_arity_digit).collect::<Vec<_>>().join("-")
}

impl LabelFormat for RparseLabels {
  fn format(&self, label: &Symbol) -> String {
    let label = label.to_string().replace("ROOT", "VROOT");
    let (Some(bar), Some(open), Some(close), Some(last_close)) = (
      label.find('|'),
      label.find('<'),
      label.find('>'),
      label.rfind('>'),
    ) else {
      return with_arity_digit(&label);
    };
    if open > close {
      return with_arity_digit(&label);
    }

    let arity = match label[last_close..].rsplit_once('_') {
      Some((_, k)) => k,
      None => "1",
    };
    let parent = label
      .find('^')
      .and_then(|caret| {
        let start = caret + 2;
        let end = caret + label[caret..].find('>')?;
        label.get(start..end)
      })
      .unwrap_or("");
    let children = marked_list(&label[open + 1..close]);
    let current = with_arity_digit(&label[..bar]);
    format!("@^{}^{}-{}X{}", current, marked_list(parent), children, arity)
  }
}

fn write_yield(out: &mut String, yf: &YieldFunction) {
  out.push('[');
  for (i, block) in yf.blocks().iter().enumerate() {
    if i > 0 {
      out.push_str(", ");
    }
    let flags = block
      .iter()
      .map(|&x| if x == 1 { "true" } else { "false" })
      .collect::<Vec<_>>();
    out.push_str(&format!("[{}]", flags.join(", ")));
  }
  out.push(']');
}

/// Writes the phrasal rules of a grammar in rparse's format, one per line:
/// `1 <prob>:<LHS> --> <RHS...> [[[true, false], ...]]`. Frequencies are
/// all 1; lexical rules are left out.
pub fn export_rparse(grammar: &WeightedGrammar, labels: &dyn LabelFormat) -> String {
  let mut out = String::new();
  for (rule, w) in grammar.iter() {
    let Rule::Phrasal { lhs, rhs, yf } = rule else {
      continue;
    };
    let rhs = rhs.iter().map(|s| labels.format(s)).collect::<Vec<_>>();
    out.push_str(&format!(
      "1 {:?}:{} --> {} [",
      w.exp(),
      labels.format(lhs),
      rhs.join(" ")
    ));
    write_yield(&mut out, yf);
    out.push_str("]\n");
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::grammar::induce_srcg;
  use crate::parse::parse_rparse_grammar;
  use crate::syntree::sentence;

  fn grammar() -> WeightedGrammar {
    let trees = vec![
      "(ROOT (S (NP 1) (VP (V 0) (ADJ 2))))".parse().unwrap(),
      "(ROOT (S (NP 0) (VP (V 1) (ADJ 2))))".parse().unwrap(),
    ];
    let sents = vec![sentence("is Mary happy"), sentence("Mary is happy")];
    induce_srcg(&trees, &sents, true).unwrap()
  }

  #[test]
  fn test_line_format() {
    let g: WeightedGrammar = [(
      Rule::Phrasal {
        lhs: Symbol::new("S"),
        rhs: vec![Symbol::from("VP_2"), Symbol::new("NP")],
        yf: YieldFunction::new(vec![vec![0, 1, 0]]),
      },
      0.0,
    )]
    .into_iter()
    .collect();
    assert_eq!(
      export_rparse(&g, &Verbatim),
      "1 1.0:S --> VP_2 NP [[[false, true, false]]]\n"
    );
    assert_eq!(
      export_rparse(&g, &RparseLabels),
      "1 1.0:S1 --> VP2 NP1 [[[false, true, false]]]\n"
    );
  }

  #[test]
  fn test_round_trip_phrasal_rules() {
    let g = grammar();
    let text = export_rparse(&g, &Verbatim);
    assert!(!text.contains("Mary"));

    let back = parse_rparse_grammar(&text).unwrap();
    let phrasal = g.iter().filter(|(rule, _)| !rule.is_lexical()).collect::<Vec<_>>();
    assert_eq!(back.len(), phrasal.len());
    for (rule, w) in phrasal {
      assert!((back.get(rule).unwrap() - w).abs() < 1e-9);
    }
  }

  #[test]
  fn test_rparse_labels() {
    let f = |s: &str| RparseLabels.format(&Symbol::from(s));
    assert_eq!(f("NP"), "NP1");
    assert_eq!(f("VP_2"), "VP2");
    assert_eq!(f("ROOT"), "VROOT1");
    assert_eq!(f("S|<NP-VP_2>^<ROOT>_2"), "@^S1^VROOT1-NP1-VP2X2");
    assert_eq!(f("S|<NP-VP>"), "@^S1^1-NP1-VP1X1");
  }
}
