use criterion::{criterion_group, criterion_main, Criterion};
use unicollate::{AlternateHandling, CollationOptions, Collator, Strength, DEMO_TABLE};

fn word_list() -> Vec<&'static str> {
    vec![
        "demark", "de-luge", "deluge", "de-Luge", "de luge", "deLuge", "death", "item10",
        "item2", "item02", "chair", "czar", "ch", "déjà", "deja", "a\u{0327}\u{0301}",
        "e\u{0300}\u{0301}", "か", "が", "カ", "あ", "가", "각", "\u{4E00}\u{4E01}", "100", "99",
    ]
}

fn sort_words(collator: &Collator) {
    let mut words = word_list();
    words.sort_by(|a, b| collator.compare(a, b));
}

fn build_keys(collator: &Collator) {
    for word in word_list() {
        let _ = collator.sort_key(word);
    }
}

fn compare_non_ignorable(c: &mut Criterion) {
    let collator = Collator::new(DEMO_TABLE.clone(), CollationOptions::default()).unwrap();

    c.bench_function("compare, non-ignorable", |b| b.iter(|| sort_words(&collator)));
}

fn compare_shifted(c: &mut Criterion) {
    let collator = Collator::new(
        DEMO_TABLE.clone(),
        CollationOptions {
            strength: Strength::Quaternary,
            alternate: AlternateHandling::Shifted,
            ..Default::default()
        },
    )
    .unwrap();

    c.bench_function("compare, shifted", |b| b.iter(|| sort_words(&collator)));
}

fn keys_non_ignorable(c: &mut Criterion) {
    let collator = Collator::new(DEMO_TABLE.clone(), CollationOptions::default()).unwrap();

    c.bench_function("sort keys, non-ignorable", |b| b.iter(|| build_keys(&collator)));
}

fn keys_shifted(c: &mut Criterion) {
    let collator = Collator::new(
        DEMO_TABLE.clone(),
        CollationOptions {
            strength: Strength::Quaternary,
            alternate: AlternateHandling::Shifted,
            ..Default::default()
        },
    )
    .unwrap();

    c.bench_function("sort keys, shifted", |b| b.iter(|| build_keys(&collator)));
}

criterion_group!(
    benches,
    compare_non_ignorable,
    compare_shifted,
    keys_non_ignorable,
    keys_shifted
);
criterion_main!(benches);
