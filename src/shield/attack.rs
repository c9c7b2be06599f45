// Pattern-based screening of the request target for common injection payloads.

use axum::http::Uri;
use once_cell::sync::Lazy;
use regex::Regex;

/// Kind of payload found in the request target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackKind {
    SqlInjection,
    NoSqlInjection,
    CrossSiteScripting,
    PathTraversal,
}

static PATTERNS: Lazy<Vec<(AttackKind, Regex)>> = Lazy::new(|| {
    let table = [
        (
            AttackKind::SqlInjection,
            r"(?i)('\s*or\s+|\bor\s+\d+\s*=\s*\d+|\bunion\s+(all\s+)?select\b|;\s*(drop|truncate)\s+table\b|\bsleep\s*\(\s*\d+\s*\))",
        ),
        (
            AttackKind::NoSqlInjection,
            r"(?i)(\[\s*\$[a-z]+\s*\]|(^|&)\$[a-z]+=|\$where\b)",
        ),
        (
            AttackKind::CrossSiteScripting,
            r"(?i)(<\s*script\b|<\s*iframe\b|javascript\s*:|\bon(error|load|click|mouseover)\s*=)",
        ),
        (AttackKind::PathTraversal, r"(?i)(\.\./|\.\.\\|%2e%2e(%2f|%5c|/))"),
    ];

    table
        .into_iter()
        .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("shield pattern compiles")))
        .collect()
});

/// Scan path and query (raw and percent-decoded) for known attack payloads.
pub fn detect(uri: &Uri) -> Option<AttackKind> {
    let path = uri.path();
    let raw_query = uri.query().unwrap_or("");
    let decoded_query = decode_query(raw_query);

    let targets = [path, raw_query, decoded_query.as_str()];
    PATTERNS.iter().find_map(|(kind, re)| {
        targets
            .iter()
            .any(|target| re.is_match(target))
            .then_some(*kind)
    })
}

/// Percent-decode a query string back to `k=v&k=v` form.
fn decode_query(query: &str) -> String {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(pairs) => pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&"),
        Err(_) => query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(target: &str) -> Option<AttackKind> {
        detect(&target.parse::<Uri>().unwrap())
    }

    #[test]
    fn test_clean_requests_pass() {
        assert_eq!(check("/api/v1/users"), None);
        assert_eq!(check("/api/example?page=2&sort=name"), None);
        assert_eq!(check("/api/v1/users?q=Ada%20Lovelace"), None);
    }

    #[test]
    fn test_sql_injection() {
        assert_eq!(check("/api?id=1%27%20OR%20%271%27=%271"), Some(AttackKind::SqlInjection));
        assert_eq!(check("/api?id=1+UNION+SELECT+password"), Some(AttackKind::SqlInjection));
    }

    #[test]
    fn test_nosql_operator_injection() {
        assert_eq!(check("/api?email%5B%24ne%5D=x"), Some(AttackKind::NoSqlInjection));
        assert_eq!(check("/api?%24where=sleep"), Some(AttackKind::NoSqlInjection));
    }

    #[test]
    fn test_xss() {
        assert_eq!(
            check("/api?name=%3Cscript%3Ealert(1)%3C/script%3E"),
            Some(AttackKind::CrossSiteScripting)
        );
    }

    #[test]
    fn test_path_traversal() {
        assert_eq!(check("/api?file=../../etc/passwd"), Some(AttackKind::PathTraversal));
        assert_eq!(check("/static/%2e%2e/%2e%2e/etc/passwd"), Some(AttackKind::PathTraversal));
    }
}
