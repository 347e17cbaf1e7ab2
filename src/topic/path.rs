/// Корневой топик.
pub const ROOT: &str = "/";

/// Сегменты пути без пустых элементов.
///
/// Ведущий `/`, повторные и завершающие слэши не порождают сегментов:
/// `"//a///b/"` даёт `["a", "b"]`.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Приводит топик к канонической форме.
///
/// Каноническая форма начинается с `/`, не содержит пустых сегментов и не
/// заканчивается на `/` (кроме самого корня). Функция чистая и
/// идемпотентна: `normalize(normalize(t)) == normalize(t)`.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for seg in segments(path) {
        out.push('/');
        out.push_str(seg);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// Проверяет, что строка уже в канонической форме.
pub fn is_canonical(path: &str) -> bool {
    normalize(path) == path
}

/// Приводит пространство имён к виду, пригодному для конкатенации:
/// всегда начинается и заканчивается на `/`.
pub fn normalize_namespace(ns: &str) -> String {
    let mut out = normalize(ns);
    if !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Разрешает топик относительно пространства имён.
///
/// Абсолютные топики (начинающиеся с `/`) не меняются, относительные
/// дописываются к `namespace`. Результат всегда канонический.
pub fn resolve(
    namespace: &str,
    topic: &str,
) -> String {
    if topic.starts_with('/') {
        normalize(topic)
    } else {
        normalize(&format!("{}{topic}", normalize_namespace(namespace)))
    }
}

/// Все префиксы канонического пути от корня до самого пути включительно.
///
/// `"/a/b"` даёт `["/", "/a", "/a/b"]`.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut acc = vec![ROOT.to_string()];
    let mut cur = String::new();
    for seg in segments(path) {
        cur.push('/');
        cur.push_str(seg);
        acc.push(cur.clone());
    }
    acc
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", "/")]
    #[case("/", "/")]
    #[case("//", "/")]
    #[case("a", "/a")]
    #[case("/a", "/a")]
    #[case("/a/", "/a")]
    #[case("a/b", "/a/b")]
    #[case("//a///b/", "/a/b")]
    #[case("/a b/c", "/a b/c")]
    fn test_normalize(
        #[case] input: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(normalize(input), expected);
        assert!(is_canonical(expected));
    }

    #[test]
    fn test_segments_skip_empty() {
        let segs: Vec<_> = segments("//a///b/").collect();
        assert_eq!(segs, vec!["a", "b"]);
        assert_eq!(segments("/").count(), 0);
    }

    #[rstest]
    #[case("/", "/")]
    #[case("", "/")]
    #[case("app", "/app/")]
    #[case("/app/", "/app/")]
    fn test_normalize_namespace(
        #[case] input: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(normalize_namespace(input), expected);
    }

    /// Тест проверяет разрешение относительных и абсолютных топиков.
    #[rstest]
    #[case("/", "x", "/x")]
    #[case("/app", "x/y", "/app/x/y")]
    #[case("/app/", "/abs", "/abs")]
    #[case("app", "", "/app")]
    fn test_resolve(
        #[case] ns: &str,
        #[case] topic: &str,
        #[case] expected: &str,
    ) {
        assert_eq!(resolve(ns, topic), expected);
    }

    #[test]
    fn test_ancestors() {
        assert_eq!(ancestors("/"), vec!["/"]);
        assert_eq!(ancestors("/a/b"), vec!["/", "/a", "/a/b"]);
    }
}
