#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rach::protocol::{parse_request, RequestType};
use serde_json::json;

#[derive(Debug, Arbitrary)]
enum FuzzInput {
    /// Произвольные байты как текстовый кадр
    Raw(Vec<u8>),
    /// Синтаксически корректный конверт со случайными полями
    Shaped {
        matcher: String,
        kind: RequestType,
        topic: Option<String>,
        args: Option<Vec<i64>>,
    },
}

fuzz_target!(|input: FuzzInput| {
    match input {
        FuzzInput::Raw(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            let _ = parse_request(&text);
        }
        FuzzInput::Shaped {
            matcher,
            kind,
            topic,
            args,
        } => {
            let mut data = json!({});
            if let Some(topic) = &topic {
                data["topic"] = json!(topic);
            }
            if let Some(args) = &args {
                data["args"] = json!(args);
            }
            let frame = json!({ "matcher": matcher, "type": kind, "data": data }).to_string();

            match parse_request(&frame) {
                Ok(inbound) => {
                    assert_eq!(inbound.matcher, matcher);
                    assert_eq!(inbound.request.kind(), kind);
                    assert!(inbound.request.topic().starts_with('/'));
                }
                // корректный конверт всегда даёт адресную ошибку
                Err(rejection) => assert_eq!(rejection.matcher.as_deref(), Some(matcher.as_str())),
            }
        }
    }
});
