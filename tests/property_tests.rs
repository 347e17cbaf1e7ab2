use std::collections::BTreeSet;

use proptest::prelude::*;
use rach::{
    identity::ClientId,
    topic::{
        normalize,
        path::{ancestors, resolve},
    },
    TopicTree,
};

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,4}"
}

fn messy_topic() -> impl Strategy<Value = String> {
    prop::collection::vec(("/{0,3}", segment()), 0..6).prop_map(|parts| {
        parts
            .into_iter()
            .map(|(slashes, seg)| format!("{slashes}{seg}"))
            .collect::<String>()
    })
}

fn canonical_topic() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 0..5).prop_map(|segs| normalize(&segs.join("/")))
}

proptest! {
    #[test]
    fn normalize_is_idempotent(raw in ".*") {
        let once = normalize(&raw);
        prop_assert_eq!(normalize(&once), once.clone());
        prop_assert!(once.starts_with('/'));
        prop_assert!(once == "/" || !once.ends_with('/'));
    }

    #[test]
    fn messy_topics_keep_segments(raw in messy_topic()) {
        let expected: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let canonical = normalize(&raw);
        let got: Vec<&str> = canonical.split('/').filter(|s| !s.is_empty()).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn resolve_keeps_absolute_topics(ns in messy_topic(), topic in canonical_topic()) {
        prop_assert_eq!(resolve(&ns, &topic), topic);
    }

    /// Публикация доходит ровно до подписчиков узлов-предков (включая сам
    /// топик) и никогда до потомков.
    #[test]
    fn fanout_is_exactly_the_ancestors(
        subscriptions in prop::collection::vec(canonical_topic(), 1..12),
        target in canonical_topic(),
    ) {
        let mut tree = TopicTree::new();
        for (n, topic) in subscriptions.iter().enumerate() {
            tree.subscribe(&ClientId::from(format!("c{n}")), topic);
        }

        let mut visited = BTreeSet::new();
        tree.publish(&target, |node, id| {
            visited.insert((node.to_string(), id.to_string()));
        });

        let chain: BTreeSet<String> = ancestors(&target).into_iter().collect();
        let expected: BTreeSet<(String, String)> = subscriptions
            .iter()
            .enumerate()
            .filter(|(_, topic)| chain.contains(*topic))
            .map(|(n, topic)| (topic.clone(), format!("c{n}")))
            .collect();

        prop_assert_eq!(visited, expected);
    }
}
