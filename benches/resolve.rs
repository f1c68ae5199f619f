use apimeter::access_log::parse_log;
use apimeter::metrics::ApiMetrics;
use apimeter::{load_spec_str, Specification};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn example_spec() -> &'static str {
    r#"openapi: 3.1.0
info:
  title: Verb Zoo
  version: "1.0.0"
servers:
  - url: https://zoo.example.com/api/v2
paths:
  "/":
    get:
      responses:
        "200": { description: OK }
  /zoo/animals:
    get:
      responses:
        "200": { description: OK }
    post:
      responses:
        "200": { description: OK }
  /zoo/animals/{id}:
    parameters:
      - { name: id, in: path, required: true, schema: { type: integer } }
    get:
      responses:
        "200": { description: OK }
    put:
      responses:
        "200": { description: OK }
    delete:
      responses:
        "200": { description: OK }
  /zoo/animals/{id}/toys/{toy_id}:
    get:
      parameters:
        - { name: id, in: path, required: true, schema: { type: integer } }
        - { name: toy_id, in: path, required: true, schema: { type: string } }
      responses:
        "200": { description: OK }
  /zoo/{category}/animals/{id}/habitats/{habitat_id}/sections/{section_id}:
    get:
      parameters:
        - { name: category, in: path, required: true, schema: { type: string } }
        - { name: id, in: path, required: true, schema: { type: integer } }
        - { name: habitat_id, in: path, required: true, schema: { type: integer } }
        - { name: section_id, in: path, required: true, schema: { type: integer } }
      responses:
        "200": { description: OK }
  /zoo/{name}/fed/{today}:
    get:
      parameters:
        - { name: name, in: path, required: true, schema: { type: string } }
        - { name: today, in: path, required: true, schema: { type: boolean } }
      responses:
        "200": { description: OK }
  /complex/{a}/{b}/{c}/{d}/{e}/{f}/{g}/{h}/{i}:
    get:
      parameters:
        - { name: a, in: path, required: true }
        - { name: b, in: path, required: true }
        - { name: c, in: path, required: true }
        - { name: d, in: path, required: true }
        - { name: e, in: path, required: true }
        - { name: f, in: path, required: true }
        - { name: g, in: path, required: true }
        - { name: h, in: path, required: true }
        - { name: i, in: path, required: true }
      responses:
        "200": { description: OK }
"#
}

fn parse_spec(yaml: &str) -> Specification {
    load_spec_str(yaml).expect("failed to load spec")
}

fn bench_resolve(c: &mut Criterion) {
    let spec = parse_spec(example_spec());
    let test_paths = [
        ("GET", "/api/v2/zoo/animals/123"),
        ("GET", "/api/v2/zoo/animals/123/toys/456"),
        ("GET", "/api/v2/zoo/cats/animals/123/habitats/88/sections/5"),
        ("GET", "/api/v2/zoo/rex/fed/true"),
        ("GET", "/api/v2/complex/1/2/3/4/5/6/7/8/9?debug=1"),
    ];
    c.bench_function("resolve_match", |b| {
        b.iter(|| {
            for (method, path) in test_paths.iter() {
                black_box(spec.resolve(method, path));
            }
        })
    });

    let misses = [
        ("GET", "/wp-login.php"),
        ("GET", "/api/v2/zoo/animals/abc"),
        ("GET", "/api/v2/zoo/rex/fed/yes"),
        ("TRACE", "/api/v2/zoo/animals"),
    ];
    c.bench_function("resolve_miss", |b| {
        b.iter(|| {
            for (method, path) in misses.iter() {
                black_box(spec.resolve(method, path));
            }
        })
    });
}

fn bench_ingest(c: &mut Criterion) {
    let spec = parse_spec(example_spec());
    let metrics = ApiMetrics::new(&["X-Consumer-Username".to_string()]);
    let body = br#"{"request":{"method":"GET","uri":"/api/v2/zoo/animals/7/toys/ball","headers":{"x-consumer-username":"keeper"}},"response":{"status":200},"latencies":{"request":23}}"#;
    c.bench_function("parse_resolve_observe", |b| {
        b.iter(|| {
            let log = parse_log(black_box(body)).expect("valid record");
            let route = spec.resolve(&log.request.method, &log.request.uri);
            metrics.observe(&log, route.as_ref());
        })
    });
}

criterion_group!(benches, bench_resolve, bench_ingest);
criterion_main!(benches);
