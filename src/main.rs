#![warn(clippy::pedantic)]

use unicollate::{collate, AlternateHandling, CollationOptions, Collator, Strength, DEMO_TABLE};

fn main() {
    let words = [
        "demark", "de-luge", "deluge", "de-Luge", "de luge", "deLuge", "death", "item10",
        "item2", "chair", "czar", "déjà", "deja", "か", "が", "カ", "가",
    ];

    //
    // DEFAULT OPTIONS
    //

    let collator = Collator::new(DEMO_TABLE.clone(), CollationOptions::default()).unwrap();
    print_sorted("default", &collator, &words);

    //
    // SHIFTED, QUATERNARY STRENGTH
    //

    let collator = Collator::new(
        DEMO_TABLE.clone(),
        CollationOptions {
            strength: Strength::Quaternary,
            alternate: AlternateHandling::Shifted,
            ..Default::default()
        },
    )
    .unwrap();
    print_sorted("shifted", &collator, &words);

    //
    // NUMERIC
    //

    let collator = Collator::new(
        DEMO_TABLE.clone(),
        CollationOptions {
            numeric: true,
            ..Default::default()
        },
    )
    .unwrap();
    print_sorted("numeric", &collator, &words);

    //
    // SORT KEY DUMP
    //

    for word in ["chair", "déjà", "item10"] {
        let key = collator.sort_key(word);
        let hex: String = key.iter().map(|b| format!("{b:02X} ")).collect();
        println!("key({word}) = {}", hex.trim_end());
    }
}

fn print_sorted(label: &str, collator: &Collator, words: &[&str]) {
    let mut sorted = words.to_vec();
    sorted.sort_by(|a, b| collate(collator, a, b));
    println!("{label}: {}", sorted.join(" < "));
}
