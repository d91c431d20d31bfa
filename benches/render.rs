use criterion::{Criterion, criterion_group, criterion_main};
use lucciola::{Grammar, Renderer, ScopeName, StateId};

fn string_grammar() -> (Grammar, StateId) {
    let string_scope = ScopeName::new(1).unwrap();
    let escape_scope = ScopeName::new(2).unwrap();

    let mut grammar = Grammar::new();
    let root = grammar.add_state();
    let string = grammar.add_state();
    let quote = grammar.add_pattern("\"").unwrap();
    grammar[quote].set_outer_scope(string_scope);
    grammar.add_begin(root, string, quote);
    let end_quote = grammar.add_pattern("\"").unwrap();
    grammar.set_end(string, end_quote, false);
    let escape = grammar.add_pattern(r"\\.").unwrap();
    grammar[escape].set_capture_scope("0", escape_scope);
    grammar.add_match(string, escape);
    (grammar, root)
}

fn criterion_benchmark(c: &mut Criterion) {
    let (grammar, root) = string_grammar();
    let input = "let s = \"some \\\"quoted\\\" text\"; call(s);\n".repeat(64);

    c.bench_function("render strings", |b| {
        b.iter(|| {
            let mut renderer = Renderer::new(&grammar, &input, root);
            while let Some(line) = renderer.render_next_line() {
                std::hint::black_box(line);
            }
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
