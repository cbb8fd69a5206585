//! Logical id derivation from construct paths
//!
//! A construct path such as `UserPool/MyDemoAppClient/Resource` becomes
//! `UserPoolMyDemoAppClientAF7E558C`: the readable components followed by the
//! first eight hex digits of the MD5 of the whole path. Ids stay stable across
//! synthesis runs, so the orchestrator sees updates instead of replacements.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Removed from the path entirely
const HIDDEN_ID: &str = "Default";
/// Kept in the hash but not in the readable part
const HIDDEN_FROM_HUMAN_ID: &str = "Resource";
const PATH_SEP: &str = "/";
const HASH_LEN: usize = 8;
const MAX_HUMAN_LEN: usize = 240;
const MAX_ID_LEN: usize = 255;

/// A CloudFormation logical id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Derive the id for a construct path relative to its stack
    pub fn from_path<S: AsRef<str>>(path: &[S]) -> Self {
        let components: Vec<&str> = path
            .iter()
            .map(AsRef::as_ref)
            .filter(|c| *c != HIDDEN_ID)
            .collect();

        if let [single] = components.as_slice() {
            let candidate = remove_non_alphanumeric(single);
            if !candidate.is_empty() && candidate.len() <= MAX_ID_LEN {
                return Self(candidate);
            }
        }

        let hash = path_hash(&components);
        let mut human: String = remove_dupes(&components)
            .into_iter()
            .filter(|c| *c != HIDDEN_FROM_HUMAN_ID)
            .map(remove_non_alphanumeric)
            .collect();
        human.truncate(MAX_HUMAN_LEN);

        Self(format!("{human}{hash}"))
    }

    /// Use a literal id as-is
    pub fn literal(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn path_hash(components: &[&str]) -> String {
    let digest = Md5::digest(components.join(PATH_SEP).as_bytes());
    hex::encode(digest)[..HASH_LEN].to_uppercase()
}

fn remove_non_alphanumeric(s: &str) -> String {
    s.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// Drop a component when the previous one already ends with it
fn remove_dupes<'a>(components: &[&'a str]) -> Vec<&'a str> {
    let mut out: Vec<&str> = Vec::with_capacity(components.len());
    for component in components {
        match out.last() {
            Some(prev) if prev.ends_with(component) => {}
            _ => out.push(component),
        }
    }
    out
}
