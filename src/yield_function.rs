use std::fmt;

use crate::error::GrammarError;

pub const MAX_BLOCKS: usize = 8;
pub const MAX_BLOCK_LEN: usize = 16;

/// The argument structure of a rule: one block per argument of the left-hand
/// side, each entry naming the right-hand side position that contributes the
/// next component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct YieldFunction(pub Vec<Vec<usize>>);

impl YieldFunction {
  pub fn new(blocks: Vec<Vec<usize>>) -> Self {
    Self(blocks)
  }

  /// Number of argument blocks, i.e. the fan-out of the left-hand side.
  pub fn arity(&self) -> usize {
    self.0.len()
  }

  pub fn blocks(&self) -> &[Vec<usize>] {
    &self.0
  }

  pub fn encode(&self) -> Result<PackedYield, GrammarError> {
    PackedYield::encode(self)
  }
}

impl From<Vec<Vec<usize>>> for YieldFunction {
  fn from(blocks: Vec<Vec<usize>>) -> Self {
    Self(blocks)
  }
}

impl fmt::Display for YieldFunction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[")?;
    for (idx, block) in self.0.iter().enumerate() {
      if idx > 0 {
        write!(f, ",")?;
      }
      write!(f, "[")?;
      for (jdx, var) in block.iter().enumerate() {
        if jdx > 0 {
          write!(f, ",")?;
        }
        write!(f, "{}", var)?;
      }
      write!(f, "]")?;
    }
    write!(f, "]")
  }
}

/// Bit-packed yield function of a binary rule. Bit `i` of `args[b]` is entry
/// `i` of block `b`; `lengths[b]` says how many bits are used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackedYield {
  pub args: Vec<u16>,
  pub lengths: Vec<u8>,
}

impl PackedYield {
  pub fn encode(yf: &YieldFunction) -> Result<Self, GrammarError> {
    let blocks = yf.blocks();
    let longest = blocks.iter().map(Vec::len).max().unwrap_or(0);
    if blocks.len() > MAX_BLOCKS || longest > MAX_BLOCK_LEN {
      return Err(GrammarError::YieldCapacity {
        blocks: blocks.len(),
        longest,
      });
    }

    let mut args = Vec::with_capacity(blocks.len());
    for block in blocks {
      let mut packed = 0u16;
      for (bit, &flag) in block.iter().enumerate() {
        match flag {
          0 => {}
          1 => packed |= 1 << bit,
          other => return Err(GrammarError::InvalidYieldFlag(other)),
        }
      }
      args.push(packed);
    }
    let lengths = blocks.iter().map(|b| b.len() as u8).collect();

    Ok(Self { args, lengths })
  }

  pub fn decode(&self) -> YieldFunction {
    YieldFunction(
      self
        .args
        .iter()
        .zip(self.lengths.iter())
        .map(|(&arg, &len)| (0..len).map(|bit| ((arg >> bit) & 1) as usize).collect())
        .collect(),
    )
  }

  /// Number of argument blocks.
  pub fn len(&self) -> usize {
    self.args.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_encode_packs_little_endian() {
    let yf = YieldFunction::new(vec![vec![0, 1, 0], vec![1]]);
    let packed = yf.encode().unwrap();
    assert_eq!(packed.args, vec![0b010, 0b1]);
    assert_eq!(packed.lengths, vec![3, 1]);
    assert_eq!(packed.decode(), yf);
  }

  #[test]
  fn test_round_trip_keeps_trailing_zeros() {
    // without the lengths, [1, 0, 0] and [1] would decode alike
    for yf in [
      vec![vec![1, 0, 0]],
      vec![vec![0], vec![1], vec![0, 0]],
      vec![vec![1; 16]; 8],
      vec![],
    ] {
      let yf = YieldFunction::new(yf);
      assert_eq!(yf.encode().unwrap().decode(), yf);
    }
  }

  #[test]
  fn test_capacity_limits() {
    let too_many = YieldFunction::new(vec![vec![0]; 9]);
    assert!(matches!(
      too_many.encode(),
      Err(GrammarError::YieldCapacity { blocks: 9, .. })
    ));

    let too_long = YieldFunction::new(vec![vec![0; 17]]);
    assert!(matches!(
      too_long.encode(),
      Err(GrammarError::YieldCapacity { longest: 17, .. })
    ));
  }

  #[test]
  fn test_non_binary_entry() {
    let yf = YieldFunction::new(vec![vec![0, 2, 1]]);
    assert!(matches!(yf.encode(), Err(GrammarError::InvalidYieldFlag(2))));
  }

  #[test]
  fn test_display() {
    let yf = YieldFunction::new(vec![vec![0], vec![1, 0]]);
    assert_eq!(yf.to_string(), "[[0],[1,0]]");
  }
}
