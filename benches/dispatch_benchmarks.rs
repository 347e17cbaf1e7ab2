use std::{hint::black_box, sync::Arc};

use criterion::{criterion_group, criterion_main, Criterion};
use rach::{
    auth::{AllowAll, Credentials},
    broker::ChannelSink,
    protocol::parse_request,
    service::ServiceRegistry,
    Dispatcher,
};

const PUB_FRAME: &str =
    r#"{"matcher":"42","type":"pub","data":{"topic":"/sensors/floor-3/temp","data":{"c":21.5}}}"#;

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_pub_envelope", |b| {
        b.iter(|| parse_request(black_box(PUB_FRAME)))
    });
}

fn bench_dispatch_publish(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let dispatcher = Dispatcher::builder()
        .services(ServiceRegistry::builder().with_builtins().build())
        .auth(AllowAll)
        .build();

    let mut receivers = Vec::new();
    let mut ids = Vec::new();
    for n in 0..64 {
        let (sink, rx) = ChannelSink::pair(format!("bench-{n}"));
        let id = dispatcher
            .on_connect(&Credentials::from_pairs(Vec::new(), "bench"), Arc::new(sink))
            .unwrap();
        let topic = if n % 2 == 0 { "/sensors" } else { "/sensors/floor-3" };
        runtime.block_on(dispatcher.on_message(
            &id,
            &format!(r#"{{"matcher":"1","type":"addSub","data":{{"topic":"{topic}"}}}}"#),
        ));
        ids.push(id);
        receivers.push(rx);
    }
    let publisher = ids[0].clone();

    c.bench_function("dispatch_pub_64_subscribers", |b| {
        b.iter(|| {
            runtime.block_on(dispatcher.on_message(&publisher, PUB_FRAME));
            for rx in &mut receivers {
                while rx.try_recv().is_ok() {}
            }
        })
    });
}

criterion_group!(benches, bench_parse, bench_dispatch_publish);
criterion_main!(benches);
