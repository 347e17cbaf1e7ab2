use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rach::{identity::ClientId, topic::normalize, TopicTree};

fn populated_tree(
    depth: usize,
    subscribers_per_level: usize,
) -> (TopicTree, String) {
    let mut tree = TopicTree::new();
    let mut path = String::new();
    for level in 0..depth {
        path.push_str(&format!("/l{level}"));
        for n in 0..subscribers_per_level {
            tree.subscribe(&ClientId::from(format!("c{level}-{n}")), &path);
        }
    }
    (tree, path)
}

fn bench_publish_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish_fanout");
    for depth in [2usize, 8, 16] {
        let (tree, leaf) = populated_tree(depth, 32);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &leaf, |b, leaf| {
            b.iter(|| {
                let mut hits = 0usize;
                tree.publish(black_box(leaf), |_, _| hits += 1);
                hits
            })
        });
    }
    group.finish();
}

fn bench_subscribe_purge(c: &mut Criterion) {
    c.bench_function("subscribe_then_purge_1k_topics", |b| {
        b.iter(|| {
            let mut tree = TopicTree::new();
            let id = ClientId::from("bench");
            for n in 0..1000 {
                tree.subscribe(&id, &format!("/a/{}/b", n % 50));
            }
            black_box(tree.purge(&id))
        })
    });
}

fn bench_normalize(c: &mut Criterion) {
    c.bench_function("normalize_messy_topic", |b| {
        b.iter(|| normalize(black_box("//sensors///floor-3//temp/")))
    });
}

criterion_group!(
    benches,
    bench_publish_fanout,
    bench_subscribe_purge,
    bench_normalize
);
criterion_main!(benches);
