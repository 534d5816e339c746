//! 生成结果解析基准测试

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use study_assistant_lib::llm::parser::{
    correct_letter_index, parse_flashcards, parse_generated_notes, parse_quiz, FlashcardParseMode,
};

fn quiz_text(blocks: usize) -> String {
    let mut text = String::from("Here are your questions:\n\n");
    for i in 1..=blocks {
        text.push_str(&format!(
            "{i}. Question number {i}?\nA) First\nB) Second\nC) Third\nD) Fourth\nCorrect: {}\nExplanation: Because.\n\n",
            ["A", "B", "C", "D"][i % 4]
        ));
        if i % 5 == 0 {
            text.push_str(&format!("{}. Broken block\nA) Only\nB) Two\n\n", i * 100));
        }
    }
    text
}

fn flashcard_text(cards: usize) -> String {
    (1..=cards)
        .map(|i| format!("Question: What is term {i}?\nAnswer: Definition {i}.\n"))
        .collect()
}

fn notes_json(notes: usize) -> String {
    let items: Vec<String> = (1..=notes)
        .map(|i| {
            format!(
                r#"{{"title":"Note {i}","content":"Body {i}\nwith lines","summary":"S{i}","tags":["t{i}"]}}"#
            )
        })
        .collect();
    format!("```json\n{{\"notes\":[{}]}}\n```", items.join(","))
}

fn benchmark_quiz_parsing(c: &mut Criterion) {
    let small = quiz_text(5);
    let large = quiz_text(50);

    c.bench_function("parse_quiz_5_blocks", |b| {
        b.iter(|| black_box(parse_quiz(black_box(&small))))
    });
    c.bench_function("parse_quiz_50_blocks", |b| {
        b.iter(|| black_box(parse_quiz(black_box(&large))))
    });
    c.bench_function("correct_letter_index", |b| {
        b.iter(|| black_box(correct_letter_index(black_box("C"))))
    });
}

fn benchmark_flashcard_parsing(c: &mut Criterion) {
    let text = flashcard_text(20);
    c.bench_function("parse_flashcards_lenient_20", |b| {
        b.iter(|| black_box(parse_flashcards(black_box(&text), FlashcardParseMode::Lenient)))
    });
    c.bench_function("parse_flashcards_strict_20", |b| {
        b.iter(|| black_box(parse_flashcards(black_box(&text), FlashcardParseMode::Strict)))
    });
}

fn benchmark_notes_parsing(c: &mut Criterion) {
    let text = notes_json(10);
    c.bench_function("parse_generated_notes_10", |b| {
        b.iter(|| black_box(parse_generated_notes(black_box(&text), 10)))
    });
}

criterion_group!(
    benches,
    benchmark_quiz_parsing,
    benchmark_flashcard_parsing,
    benchmark_notes_parsing
);
criterion_main!(benches);
