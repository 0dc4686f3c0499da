use criterion::{black_box, criterion_group, criterion_main, Criterion};

use srcg::{dop_srcg_rules, induce_srcg, sentence, CompiledGrammar, DopOptions, IndexedTree, Sentence};

const TREEBANK_SRC: &str = include_str!("./treebank.txt");

fn read_treebank() -> (Vec<IndexedTree>, Vec<Sentence>) {
  TREEBANK_SRC
    .lines()
    .filter_map(|line| line.split_once('\t'))
    .map(|(tree, sent)| (tree.parse::<IndexedTree>().unwrap(), sentence(sent)))
    .unzip()
}

fn criterion_benchmark(c: &mut Criterion) {
  let (trees, sents) = read_treebank();

  c.bench_function("induce srcg", |b| {
    b.iter(|| induce_srcg(black_box(&trees), black_box(&sents), true).unwrap().len())
  });

  c.bench_function("dop reduction", |b| {
    b.iter(|| {
      dop_srcg_rules(black_box(&trees), black_box(&sents), &DopOptions::default())
        .unwrap()
        .probabilistic()
        .len()
    })
  });

  let dop = dop_srcg_rules(&trees, &sents, &DopOptions::default()).unwrap();
  c.bench_function("compile dop reduction", |b| {
    b.iter(|| CompiledGrammar::new(black_box(dop.probabilistic())).unwrap().num_labels())
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
