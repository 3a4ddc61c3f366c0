use criterion::{criterion_group, criterion_main, Criterion};
use pl0::{
    lexer::SUGGESTED_TOKENS_CAPACITY, parser::parse_program, token::Token,
    util::intern::Interner,
};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/big.pl0");

fn parser(input: &str, tokens: &mut Vec<Token>, interner: &mut Interner<str>) {
    let program = parse_program(input, tokens, interner).unwrap();
    _ = black_box(program);
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    let mut interner = Interner::with_capacity(64);

    c.bench_function("parser", |b| {
        b.iter(|| {
            tokens.clear();
            parser(black_box(INPUT), &mut tokens, &mut interner);
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
