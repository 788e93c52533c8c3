//! Performance benchmarks for vela-audit
//!
//! Run with: cargo bench

use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use vela_audit::{AuditDispatcher, DispatcherConfig, Environment, Event, MemorySink, Template};

const FINGERPRINT: &str = "$inet_$id_$typeof_$from";

fn sample_event(env: &Arc<Environment>) -> Event {
    Event::new(env, "ssh")
        .with_subject("login failed")
        .with_remote("10.0.0.8:52011")
        .with_from("sshd")
        .with_user("root")
        .with_msg("Failed password for root from 10.0.0.8 port 52011")
        .with_alert()
}

fn bench_template(c: &mut Criterion) {
    c.bench_function("Template::compile", |b| {
        b.iter(|| Template::compile(FINGERPRINT));
    });

    let env = Arc::new(Environment::default());
    let event = sample_event(&env);
    let template = Template::compile(FINGERPRINT);
    c.bench_function("Template::render", |b| {
        b.iter(|| template.render(&event));
    });
}

fn bench_event_serialization(c: &mut Criterion) {
    let env = Arc::new(Environment::default());
    let event = sample_event(&env);

    c.bench_function("Event to_bytes", |b| {
        b.iter(|| event.to_bytes());
    });

    c.bench_function("Event to_line", |b| {
        b.iter(|| event.to_line());
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let env = Arc::new(Environment::default());

    let mut group = c.benchmark_group("dispatch");
    for (label, pass) in [("inhibit", "nomatch"), ("pass", "sshd")] {
        let config = DispatcherConfig::builder()
            .to(Arc::new(MemorySink::new("sdk")))
            .pass("from", pass)
            .build()
            .unwrap();
        let dispatcher = AuditDispatcher::new(Arc::clone(&env), config);

        group.bench_function(label, |b| {
            b.to_async(&rt)
                .iter(|| async { dispatcher.handle(sample_event(&env)).await });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_template,
    bench_event_serialization,
    bench_dispatch,
);
criterion_main!(benches);
