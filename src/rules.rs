use std::fmt;

use crate::yield_function::YieldFunction;

pub const EPSILON: &str = "Epsilon";
pub const ROOT: &str = "ROOT";

/// A grammar symbol. Arity markers and DOP node decorations are separate
/// fields instead of being spliced into the label string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol {
  pub name: String,
  /// Number of argument blocks, only recorded when greater than one
  pub arity: Option<usize>,
  /// Unique node id for DOP reductions
  pub decoration: Option<usize>,
}

impl Symbol {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      arity: None,
      decoration: None,
    }
  }

  pub fn epsilon() -> Self {
    Self::new(EPSILON)
  }

  pub fn root() -> Self {
    Self::new(ROOT)
  }

  pub fn is_epsilon(&self) -> bool {
    self.name == EPSILON && self.arity.is_none() && self.decoration.is_none()
  }

  /// Marks the symbol with `k` argument blocks. A single block leaves the
  /// symbol as it is.
  pub fn with_arity(mut self, k: usize) -> Self {
    if k > 1 {
      self.arity = Some(k);
    }
    self
  }

  pub fn decorated(&self, id: usize) -> Self {
    Self {
      decoration: Some(id),
      ..self.clone()
    }
  }

  pub fn is_decorated(&self) -> bool {
    self.decoration.is_some()
  }

  /// Fresh nonterminal standing in for an ambiguous double-DOP fragment.
  pub fn fresh(n: usize) -> Self {
    Self::new(format!("#{}", n))
  }

  pub fn is_fresh(&self) -> bool {
    self
      .name
      .strip_prefix('#')
      .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
  }

  /// Preterminal placeholder for a terminal inside a flattened fragment.
  pub fn terminal_placeholder(word: &str) -> Self {
    Self::new(format!("#&{}", word))
  }
}

/// Splits a rendered label such as `VP_2@3` back into its fields. Names that
/// merely contain `_` or `@` without a numeric suffix are kept whole.
impl From<&str> for Symbol {
  fn from(label: &str) -> Self {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    let (rest, decoration) = match label.rsplit_once('@') {
      Some((rest, id)) if numeric(id) && !rest.is_empty() => (rest, id.parse().ok()),
      _ => (label, None),
    };
    let (name, arity) = match rest.rsplit_once('_') {
      Some((name, k)) if numeric(k) && !name.is_empty() => match k.parse::<usize>() {
        Ok(k) if k > 1 => (name, Some(k)),
        _ => (rest, None),
      },
      _ => (rest, None),
    };

    Self {
      name: name.to_string(),
      arity,
      decoration,
    }
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)?;
    if let Some(k) = self.arity {
      write!(f, "_{}", k)?;
    }
    if let Some(id) = self.decoration {
      write!(f, "@{}", id)?;
    }
    Ok(())
  }
}

/// A production read off a tree before its variables are resolved. Variables
/// are sentence positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawProduction {
  Lexical {
    lhs: Symbol,
    word: String,
  },
  Phrasal {
    lhs: Symbol,
    /// One block of variables per contiguous argument of the lhs
    args: Vec<Vec<usize>>,
    /// Each child with the first positions of its contiguous blocks
    rhs: Vec<(Symbol, Vec<usize>)>,
  },
}

impl RawProduction {
  pub fn lhs(&self) -> &Symbol {
    match self {
      Self::Lexical { lhs, .. } | Self::Phrasal { lhs, .. } => lhs,
    }
  }
}

impl fmt::Display for RawProduction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Lexical { lhs, word } => write!(f, "{}({:?}) -> {}", lhs, word, EPSILON),
      Self::Phrasal { lhs, args, rhs } => {
        write!(f, "{}{:?} ->", lhs, args)?;
        for (sym, vars) in rhs {
          write!(f, " {}{:?}", sym, vars)?;
        }
        Ok(())
      }
    }
  }
}

/// An SRCG rule whose yield function refers to right-hand side positions.
/// Lexical rules rewrite to `Epsilon` and carry their word instead of a yield
/// function.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
  Lexical {
    lhs: Symbol,
    word: String,
  },
  Phrasal {
    lhs: Symbol,
    rhs: Vec<Symbol>,
    yf: YieldFunction,
  },
}

impl Rule {
  pub fn lhs(&self) -> &Symbol {
    match self {
      Self::Lexical { lhs, .. } | Self::Phrasal { lhs, .. } => lhs,
    }
  }

  pub fn is_lexical(&self) -> bool {
    matches!(self, Self::Lexical { .. })
  }

  /// Right-hand side symbols; `Epsilon` for lexical rules.
  pub fn rhs(&self) -> Vec<Symbol> {
    match self {
      Self::Lexical { .. } => vec![Symbol::epsilon()],
      Self::Phrasal { rhs, .. } => rhs.clone(),
    }
  }

  /// All symbols of the rule, left-hand side first.
  pub fn symbols(&self) -> Vec<Symbol> {
    let mut symbols = vec![self.lhs().clone()];
    symbols.extend(self.rhs());
    symbols
  }

  /// The same rule with its symbols replaced position by position (lhs
  /// first). Lexical rules only take the new lhs.
  pub fn with_symbols(&self, symbols: &[Symbol]) -> Self {
    match self {
      Self::Lexical { word, .. } => Self::Lexical {
        lhs: symbols[0].clone(),
        word: word.clone(),
      },
      Self::Phrasal { yf, .. } => Self::Phrasal {
        lhs: symbols[0].clone(),
        rhs: symbols[1..].to_vec(),
        yf: yf.clone(),
      },
    }
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Lexical { lhs, word } => write!(f, "{} -> {:?}", lhs, word),
      Self::Phrasal { lhs, rhs, yf } => {
        write!(f, "{} ->", lhs)?;
        for sym in rhs {
          write!(f, " {}", sym)?;
        }
        write!(f, " {}", yf)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_symbol_round_trips_through_label() {
    for label in ["VP", "VP_2", "VP_2@13", "NP@4", "ROOT|<$,>_2", "$,", "#&sees", "PP_1"] {
      let symbol = Symbol::from(label);
      assert_eq!(symbol.to_string(), label);
    }
  }

  #[test]
  fn test_symbol_fields() {
    let s = Symbol::from("VP_2@13");
    assert_eq!(s.name, "VP");
    assert_eq!(s.arity, Some(2));
    assert_eq!(s.decoration, Some(13));

    // not an arity marker
    assert_eq!(Symbol::from("PP_1").name, "PP_1");
    assert_eq!(Symbol::from("e@mail").name, "e@mail");
  }

  #[test]
  fn test_fresh_symbols() {
    assert!(Symbol::fresh(3).is_fresh());
    assert!(!Symbol::terminal_placeholder("sees").is_fresh());
    assert!(!Symbol::new("#").is_fresh());
  }

  #[test]
  fn test_arity_of_single_block_is_unmarked() {
    assert_eq!(Symbol::new("NP").with_arity(1).to_string(), "NP");
    assert_eq!(Symbol::new("VP").with_arity(3).to_string(), "VP_3");
  }
}
