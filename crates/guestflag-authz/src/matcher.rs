use serde::{Deserialize, Serialize};

/// Glob match where `*` spans any run of characters (including `/` and `:`).
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    let pattern = pattern.as_bytes();
    let value = value.as_bytes();
    let (mut p, mut v) = (0usize, 0usize);
    // Position of the last `*` seen and the value index it is currently absorbing up to.
    let mut resume: Option<(usize, usize)> = None;

    while v < value.len() {
        match pattern.get(p) {
            Some(b'*') => {
                resume = Some((p, v));
                p += 1;
            }
            Some(&byte) if byte == value[v] => {
                p += 1;
                v += 1;
            }
            _ => match resume {
                Some((star, absorbed)) => {
                    p = star + 1;
                    v = absorbed + 1;
                    resume = Some((star, absorbed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|byte| *byte == b'*')
}

/// A policy resource entry, exact or wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePattern(String);

impl ResourcePattern {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_exact(&self) -> bool {
        !self.0.contains('*')
    }

    pub fn matches(&self, resource: &str) -> bool {
        if self.is_exact() {
            return self.0 == resource;
        }
        wildcard_match(&self.0, resource)
    }
}

impl std::fmt::Display for ResourcePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
