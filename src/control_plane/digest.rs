//! HTTP digest challenge/response (MD5, `qop=auth`).
//!
//! Each call re-authenticates: the challenge is never cached, the nonce count
//! is always the first use and a fresh client nonce is drawn every time.

use std::collections::HashMap;

use rand::Rng;

use crate::constants::DIGEST_NONCE_COUNT;
use crate::AuthError;

const QOP_AUTH: &str = "auth";
const ALGORITHM_MD5: &str = "MD5";

/// Parameters of a `WWW-Authenticate: Digest ...` challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    /// Quality of protection selected from the offered list
    pub qop: Option<String>,
    pub opaque: Option<String>,
    pub algorithm: Option<String>,
}

impl DigestChallenge {
    pub fn parse(header: &str) -> std::result::Result<Self, AuthError> {
        let header = header.trim();
        let params = match header.split_once(char::is_whitespace) {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("digest") => rest,
            _ => return Err(AuthError::MalformedChallenge(header.to_string())),
        };

        let mut values = parse_params(params)?;
        let realm = values
            .remove("realm")
            .ok_or_else(|| AuthError::MalformedChallenge("missing realm".into()))?;
        let nonce = values
            .remove("nonce")
            .ok_or_else(|| AuthError::MalformedChallenge("missing nonce".into()))?;

        let algorithm = values.remove("algorithm");
        if let Some(algorithm) = &algorithm {
            if !algorithm.eq_ignore_ascii_case(ALGORITHM_MD5) {
                return Err(AuthError::UnsupportedAlgorithm(algorithm.clone()));
            }
        }

        let qop = match values.remove("qop") {
            None => None,
            Some(offered) => {
                if offered.split(',').any(|q| q.trim().eq_ignore_ascii_case(QOP_AUTH)) {
                    Some(QOP_AUTH.to_string())
                } else {
                    return Err(AuthError::UnsupportedQop(offered));
                }
            }
        };

        Ok(Self {
            realm,
            nonce,
            qop,
            opaque: values.remove("opaque"),
            algorithm,
        })
    }
}

/// `key=value` pairs separated by commas; values are tokens or quoted
/// strings that may themselves contain commas and escaped quotes
fn parse_params(input: &str) -> std::result::Result<HashMap<String, String>, AuthError> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            key.push(c);
            chars.next();
        }
        if chars.next() != Some('=') {
            return Err(AuthError::MalformedChallenge(format!("parameter without value: {}", key.trim())));
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => value.push(c),
                }
            }
            if !closed {
                return Err(AuthError::MalformedChallenge(format!("unterminated value for {}", key.trim())));
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }

        params.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    Ok(params)
}

/// Identity and secret proving knowledge of the key without sending it
#[derive(Clone)]
pub struct DigestCredentials {
    username: String,
    secret: String,
}

impl std::fmt::Debug for DigestCredentials {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("DigestCredentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl DigestCredentials {
    pub fn new(
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// `H(H(user:realm:secret):nonce:nc:cnonce:qop:H(method:uri))`, or the
    /// legacy `H(HA1:nonce:HA2)` when the server offered no qop
    pub fn response(
        &self,
        method: &str,
        uri: &str,
        challenge: &DigestChallenge,
        cnonce: &str,
    ) -> String {
        let ha1 = md5_hex(&format!("{}:{}:{}", self.username, challenge.realm, self.secret));
        let ha2 = md5_hex(&format!("{}:{}", method, uri));
        match &challenge.qop {
            Some(qop) => md5_hex(&format!(
                "{}:{}:{}:{}:{}:{}",
                ha1, challenge.nonce, DIGEST_NONCE_COUNT, cnonce, qop, ha2
            )),
            None => md5_hex(&format!("{}:{}:{}", ha1, challenge.nonce, ha2)),
        }
    }

    /// `Authorization` header value with a freshly generated client nonce
    pub fn authorization(
        &self,
        method: &str,
        uri: &str,
        challenge: &DigestChallenge,
    ) -> String {
        self.authorization_with_cnonce(method, uri, challenge, &generate_cnonce())
    }

    pub(crate) fn authorization_with_cnonce(
        &self,
        method: &str,
        uri: &str,
        challenge: &DigestChallenge,
        cnonce: &str,
    ) -> String {
        let response = self.response(method, uri, challenge, cnonce);
        let mut header = format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", algorithm={}, response=\"{}\"",
            self.username, challenge.realm, challenge.nonce, uri, ALGORITHM_MD5, response
        );
        if let Some(qop) = &challenge.qop {
            header.push_str(&format!(", qop={}, nc={}, cnonce=\"{}\"", qop, DIGEST_NONCE_COUNT, cnonce));
        }
        if let Some(opaque) = &challenge.opaque {
            header.push_str(&format!(", opaque=\"{}\"", opaque));
        }
        header
    }
}

/// 16 random hex characters
pub fn generate_cnonce() -> String {
    hex::encode(rand::thread_rng().gen::<[u8; 8]>())
}

pub(crate) fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}
