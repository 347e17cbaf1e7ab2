#![no_main]

use libfuzzer_sys::fuzz_target;
use rach::topic::{normalize, path::ancestors};

fuzz_target!(|raw: &str| {
    let once = normalize(raw);
    assert!(once.starts_with('/'));
    assert!(once == "/" || !once.ends_with('/'));
    assert_eq!(normalize(&once), once);

    let chain = ancestors(&once);
    assert_eq!(chain.first().map(String::as_str), Some("/"));
    assert_eq!(chain.last(), Some(&once));
});
