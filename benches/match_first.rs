use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use textmate_matcher::{
    CancellationToken, MatchEngine, MatcherOptions, Priority, StringWithId, SyntaxTreeBuilder,
};

const GRAMMAR: &str = r##"{
    "scopeName": "source.json",
    "patterns": [{ "include": "#value" }],
    "repository": {
        "value": {
            "patterns": [
                { "include": "#constant" },
                { "include": "#number" },
                { "include": "#string" },
                { "include": "#array" },
                { "include": "#object" }
            ]
        },
        "constant": { "match": "\\b(?:true|false|null)\\b", "name": "constant.language.json" },
        "number": { "match": "-?(?:0|[1-9]\\d*)(?:\\.\\d+)?(?:[eE][+-]?\\d+)?", "name": "constant.numeric.json" },
        "string": {
            "begin": "\"",
            "end": "\"",
            "name": "string.quoted.double.json",
            "patterns": [{ "match": "\\\\.", "name": "constant.character.escape.json" }]
        },
        "array": { "begin": "\\[", "end": "\\]", "patterns": [{ "include": "#value" }] },
        "object": { "begin": "\\{", "end": "\\}", "patterns": [{ "include": "#string" }, { "include": "#value" }] }
    }
}"##;

fn criterion_benchmark(c: &mut Criterion) {
    let line = r#"{"name": "John", "age": 30, "active": true, "score": 95.5, "tags": ["developer", "rust"], "address": null}"#;
    let mut builder = SyntaxTreeBuilder::new();
    let root = builder.add_grammar_from_json(GRAMMAR).unwrap();
    let engine = MatchEngine::new(Arc::new(builder.build()), MatcherOptions::default());
    let cancel = CancellationToken::new();

    let scan = |text: &StringWithId| {
        let mut offset = 0;
        while offset < text.len() {
            let state = engine
                .match_first(root, text, offset, Priority::Normal, "source.json", &cancel)
                .expect("search should succeed");
            offset = match state.match_data.range(0) {
                Some(range) if range.end > offset => range.end,
                _ => offset + 1,
            };
            std::hint::black_box(state);
        }
    };

    let cached = StringWithId::new(line);
    c.bench_function("match_first cached line", |b| b.iter(|| scan(&cached)));

    c.bench_function("match_first new line", |b| {
        b.iter(|| {
            // a new identity never hits the cache
            scan(&StringWithId::new(line));
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
