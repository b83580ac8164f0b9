//! Running cookie string carried across redirect hops.

use std::time::SystemTime;

use reqwest::Response;

/// Ordered `name=value` pairs, serialized as a single `Cookie` header.
///
/// Later values for the same name replace earlier ones in place, so the
/// header keeps the order in which cookies were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    pairs: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` header style string (`a=1; b=2`).
    pub fn parse(header: &str) -> Self {
        let mut jar = Self::new();
        for part in header.split(';') {
            if let Some((name, value)) = split_pair(part) {
                jar.set(name, value);
            }
        }
        jar
    }

    /// Insert or replace a cookie.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.pairs.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value.to_string(),
            None => self.pairs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn remove(&mut self, name: &str) {
        self.pairs.retain(|(n, _)| n != name);
    }

    /// Apply every `Set-Cookie` of a response. A cookie whose `Max-Age` is
    /// zero or whose `Expires` is in the past deletes the name.
    pub fn absorb_response(&mut self, response: &Response) {
        let now = SystemTime::now();
        for cookie in response.cookies() {
            let expired = cookie.max_age().is_some_and(|age| age.is_zero())
                || cookie.expires().is_some_and(|at| at <= now);
            if expired {
                self.remove(cookie.name());
            } else {
                self.set(cookie.name(), cookie.value());
            }
        }
    }

    /// Merge another jar into this one; the other jar wins on conflicts.
    pub fn extend(&mut self, other: &CookieJar) {
        for (name, value) in &other.pairs {
            self.set(name, value);
        }
    }

    /// Render as a `Cookie` request header value.
    pub fn to_header(&self) -> String {
        self.pairs
            .iter()
            .map(|(n, v)| format!("{}={}", n, v))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn split_pair(raw: &str) -> Option<(&str, &str)> {
    let (name, value) = raw.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}
