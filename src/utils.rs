use std::error::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

/// Takes a list where each element is a set of choices, and returns all the possible sets
/// generated. Will clone the elements.
///
/// ```
/// let v = vec![
///   vec!["S"],
///   vec!["NP", "NP@1"],
///   vec!["VP", "VP@2"],
/// ];
///
/// assert_eq!(srcg::utils::combinations(&v), vec![
///   vec!["S", "NP", "VP"],
///   vec!["S", "NP@1", "VP"],
///   vec!["S", "NP", "VP@2"],
///   vec!["S", "NP@1", "VP@2"],
/// ]);
/// ```
pub fn combinations<T>(list: &[Vec<T>]) -> Vec<Vec<T>>
where
  T: Clone,
{
  if list.is_empty() {
    Vec::new()
  } else if list.len() == 1 {
    list[0].iter().map(|e| vec![e.clone()]).collect()
  } else {
    let (head, tail) = list.split_at(1);
    let head = &head[0];

    combinations(tail)
      .into_iter()
      .flat_map(|subseq| {
        // prepend every element of the head to every possible subseq
        head.iter().map(move |v| {
          let mut newseq = subseq.clone();
          newseq.insert(0, v.clone());
          newseq
        })
      })
      .collect()
  }
}

/// Partitions a sorted sequence of positions into maximal contiguous runs.
///
/// ```
/// assert_eq!(srcg::utils::ranges(&[0, 1, 3, 4, 6]), vec![vec![0, 1], vec![3, 4], vec![6]]);
/// ```
pub fn ranges(positions: &[usize]) -> Vec<Vec<usize>> {
  let mut result: Vec<Vec<usize>> = Vec::new();
  for &pos in positions {
    match result.last_mut() {
      Some(run) if run.last().map(|&p| p + 1) == Some(pos) => run.push(pos),
      _ => result.push(vec![pos]),
    }
  }
  result
}

/// The first element of every contiguous run.
///
/// ```
/// assert_eq!(srcg::utils::range_heads(&[0, 1, 3, 4, 6]), vec![0, 3, 6]);
/// ```
pub fn range_heads(positions: &[usize]) -> Vec<usize> {
  ranges(positions).into_iter().map(|run| run[0]).collect()
}

/// Cartesian product in lexicographic order (the last list varies fastest).
fn lexicographic_product<T: Clone>(lists: &[Vec<T>]) -> Vec<Vec<T>> {
  lists.iter().fold(vec![Vec::new()], |acc, list| {
    acc
      .into_iter()
      .flat_map(|prefix| {
        list.iter().map(move |item| {
          let mut seq = prefix.clone();
          seq.push(item.clone());
          seq
        })
      })
      .collect()
  })
}

/// Breadth-first (diagonal) cartesian product over possibly unbounded
/// iterators. Each step pulls one new element from a single input, cycling
/// through the inputs from the last to the first, and emits every combination
/// that involves the new element. Bound it with `take(n)`.
///
/// ```
/// use srcg::utils::DiagonalProduct;
///
/// let seqs: Vec<Box<dyn Iterator<Item = usize>>> = vec![Box::new(0..), Box::new(0..)];
/// let firsts = DiagonalProduct::new(seqs).take(9).collect::<Vec<_>>();
/// assert_eq!(firsts, vec![
///   vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1],
///   vec![0, 2], vec![1, 2], vec![2, 0], vec![2, 1], vec![2, 2],
/// ]);
/// ```
pub struct DiagonalProduct<'a, T> {
  sources: Vec<Box<dyn Iterator<Item = T> + 'a>>,
  seen: Vec<Vec<T>>,
  stopped: Vec<bool>,
  cursor: usize,
  pending: std::collections::VecDeque<Vec<T>>,
  started: bool,
}

impl<'a, T: Clone> DiagonalProduct<'a, T> {
  pub fn new(sources: Vec<Box<dyn Iterator<Item = T> + 'a>>) -> Self {
    let n = sources.len();
    Self {
      sources,
      seen: vec![Vec::new(); n],
      stopped: vec![false; n],
      cursor: n,
      pending: std::collections::VecDeque::new(),
      started: false,
    }
  }

  /// Pull the first element of every source; an empty source makes the whole
  /// product empty.
  fn start(&mut self) -> Option<Vec<T>> {
    self.started = true;
    for (idx, source) in self.sources.iter_mut().enumerate() {
      let first = source.next()?;
      self.seen[idx].push(first);
    }
    Some(self.seen.iter().map(|s| s[0].clone()).collect())
  }

  fn step(&mut self) -> bool {
    while !self.stopped.iter().all(|&s| s) {
      self.cursor = if self.cursor == 0 {
        self.sources.len() - 1
      } else {
        self.cursor - 1
      };
      let n = self.cursor;
      if self.stopped[n] {
        continue;
      }
      match self.sources[n].next() {
        None => self.stopped[n] = true,
        Some(item) => {
          self.seen[n].push(item.clone());
          let mut lists = self.seen.clone();
          lists[n] = vec![item];
          self.pending.extend(lexicographic_product(&lists));
          return true;
        }
      }
    }
    false
  }
}

impl<'a, T: Clone> Iterator for DiagonalProduct<'a, T> {
  type Item = Vec<T>;

  fn next(&mut self) -> Option<Self::Item> {
    if !self.started {
      if self.sources.is_empty() {
        self.started = true;
        return Some(Vec::new());
      }
      match self.start() {
        Some(first) => return Some(first),
        None => {
          self.stopped.iter_mut().for_each(|s| *s = true);
          return None;
        }
      }
    }
    loop {
      if let Some(next) = self.pending.pop_front() {
        return Some(next);
      }
      if self.sources.is_empty() || !self.step() {
        return None;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ranges_of_discontinuous_yield() {
    assert_eq!(ranges(&[]), Vec::<Vec<usize>>::new());
    assert_eq!(ranges(&[2]), vec![vec![2]]);
    assert_eq!(range_heads(&[0, 2, 3, 5]), vec![0, 2, 5]);
  }

  #[test]
  fn test_diagonal_product_finite() {
    let seqs: Vec<Box<dyn Iterator<Item = char>>> =
      vec![Box::new("ab".chars()), Box::new("x".chars())];
    let all = DiagonalProduct::new(seqs).collect::<Vec<_>>();
    assert_eq!(all, vec![vec!['a', 'x'], vec!['b', 'x']]);
  }

  #[test]
  fn test_diagonal_product_empty_source() {
    let seqs: Vec<Box<dyn Iterator<Item = usize>>> = vec![Box::new(0..3), Box::new(0..0)];
    assert_eq!(DiagonalProduct::new(seqs).count(), 0);
  }

  #[test]
  fn test_diagonal_product_covers_grid() {
    let seqs: Vec<Box<dyn Iterator<Item = usize>>> = vec![Box::new(0..3), Box::new(0..2)];
    let mut all = DiagonalProduct::new(seqs).collect::<Vec<_>>();
    assert_eq!(all.len(), 6);
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 6);
  }
}
