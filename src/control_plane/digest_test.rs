use super::digest::*;
use crate::AuthError;

fn rfc_challenge() -> DigestChallenge {
    DigestChallenge::parse(
        r#"Digest realm="testrealm@host.com", qop="auth,auth-int", nonce="dcd98b7102dd2f0e8b11d0f600bfb0c093", opaque="5ccc069c403ebaf9f0171e9517f40e41""#,
    )
    .unwrap()
}

#[test]
fn parse_challenge_with_quoted_qop_list() {
    let challenge = rfc_challenge();

    assert_eq!(challenge.realm, "testrealm@host.com");
    assert_eq!(challenge.nonce, "dcd98b7102dd2f0e8b11d0f600bfb0c093");
    assert_eq!(challenge.qop.as_deref(), Some("auth"));
    assert_eq!(challenge.opaque.as_deref(), Some("5ccc069c403ebaf9f0171e9517f40e41"));
    assert_eq!(challenge.algorithm, None);
}

#[test]
fn parse_challenge_with_unquoted_tokens_in_any_order() {
    let challenge =
        DigestChallenge::parse(r#"Digest qop=auth, algorithm=MD5, nonce="abc,def", realm="MMS Public API""#).unwrap();

    assert_eq!(challenge.realm, "MMS Public API");
    assert_eq!(challenge.nonce, "abc,def");
    assert_eq!(challenge.qop.as_deref(), Some("auth"));
    assert_eq!(challenge.algorithm.as_deref(), Some("MD5"));
}

#[test]
fn parse_rejects_non_digest_schemes_and_missing_fields() {
    assert!(matches!(
        DigestChallenge::parse(r#"Basic realm="x""#),
        Err(AuthError::MalformedChallenge(_))
    ));
    assert!(matches!(
        DigestChallenge::parse(r#"Digest realm="x""#),
        Err(AuthError::MalformedChallenge(_))
    ));
    assert!(matches!(
        DigestChallenge::parse(r#"Digest realm="x", nonce="unterminated"#),
        Err(AuthError::MalformedChallenge(_))
    ));
}

#[test]
fn parse_rejects_unsupported_qop_and_algorithm() {
    assert!(matches!(
        DigestChallenge::parse(r#"Digest realm="x", nonce="n", qop="auth-int""#),
        Err(AuthError::UnsupportedQop(_))
    ));
    assert!(matches!(
        DigestChallenge::parse(r#"Digest realm="x", nonce="n", algorithm=SHA-256"#),
        Err(AuthError::UnsupportedAlgorithm(_))
    ));
}

#[test]
fn response_matches_rfc_2617_example() {
    let credentials = DigestCredentials::new("Mufasa", "Circle Of Life");
    let response = credentials.response("GET", "/dir/index.html", &rfc_challenge(), "0a4f113b");

    assert_eq!(response, "6629fae49393a05397450978507c4ef1");
}

#[test]
fn response_without_qop_uses_legacy_form() {
    let challenge = DigestChallenge::parse(r#"Digest realm="r", nonce="n""#).unwrap();
    let credentials = DigestCredentials::new("user", "secret");

    let ha1 = md5_hex("user:r:secret");
    let ha2 = md5_hex("POST:/restart");
    let expected = md5_hex(&format!("{}:n:{}", ha1, ha2));

    assert_eq!(credentials.response("POST", "/restart", &challenge, "ignored"), expected);
}

#[test]
fn authorization_header_carries_all_fields() {
    let credentials = DigestCredentials::new("Mufasa", "Circle Of Life");
    let header = credentials.authorization_with_cnonce("GET", "/dir/index.html", &rfc_challenge(), "0a4f113b");

    assert!(header.starts_with("Digest username=\"Mufasa\""));
    assert!(header.contains("uri=\"/dir/index.html\""));
    assert!(header.contains("response=\"6629fae49393a05397450978507c4ef1\""));
    assert!(header.contains("qop=auth, nc=00000001, cnonce=\"0a4f113b\""));
    assert!(header.contains("opaque=\"5ccc069c403ebaf9f0171e9517f40e41\""));
    assert!(!header.contains("Circle Of Life"));
}

#[test]
fn same_challenge_produces_fresh_client_nonces() {
    let credentials = DigestCredentials::new("user", "secret");
    let challenge = rfc_challenge();

    let first = credentials.authorization("GET", "/clusters/c", &challenge);
    let second = credentials.authorization("GET", "/clusters/c", &challenge);

    assert_ne!(first, second);
    let cnonce = |header: &str| header.split("cnonce=\"").nth(1).unwrap().split('"').next().unwrap().to_string();
    assert_ne!(cnonce(&first), cnonce(&second));
    assert_eq!(cnonce(&first).len(), 16);
}

#[test]
fn response_is_deterministic_for_fixed_cnonce() {
    let credentials = DigestCredentials::new("user", "secret");
    let challenge = rfc_challenge();

    assert_eq!(
        credentials.response("GET", "/a", &challenge, "cafebabe"),
        credentials.response("GET", "/a", &challenge, "cafebabe")
    );
    assert_ne!(
        credentials.response("GET", "/a", &challenge, "cafebabe"),
        credentials.response("GET", "/a", &challenge, "deadbeef")
    );
}

#[test]
fn debug_output_hides_secret() {
    let credentials = DigestCredentials::new("user", "top-secret");
    assert!(!format!("{:?}", credentials).contains("top-secret"));
}

#[test]
fn cnonce_is_sixteen_lowercase_hex_digits() {
    let cnonce = generate_cnonce();

    assert_eq!(cnonce.len(), 16);
    assert!(cnonce.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    assert_eq!(hex::decode(&cnonce).unwrap().len(), 8);
}
