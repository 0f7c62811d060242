//! Navigation primitives and the role-based redirect policy.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// How the location was changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationKind {
    /// The current location was replaced in place.
    Replace,
    /// A full reload of the given location.
    Reload,
}

/// A single recorded navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub kind: NavigationKind,
    pub destination: String,
}

/// Capability to inspect and change the current location.
pub trait Navigator: Send + Sync {
    /// The path of the current location, e.g. `/admin/tutors`.
    fn current_path(&self) -> String;

    /// Replaces the current location with `destination`.
    fn replace(&self, destination: &str);

    /// Performs a full reload at `destination`, discarding in-memory state.
    fn reload(&self, destination: &str);
}

/// A navigator that keeps its location in memory and records every change.
#[derive(Debug)]
pub struct MemoryNavigator {
    inner: Mutex<MemoryNavigatorState>,
}

#[derive(Debug)]
struct MemoryNavigatorState {
    current: String,
    history: Vec<Navigation>,
}

impl MemoryNavigator {
    /// Creates a navigator positioned at `path`.
    pub fn at(path: impl Into<String>) -> Self {
        Self {
            inner: Mutex::new(MemoryNavigatorState {
                current: path.into(),
                history: Vec::new(),
            }),
        }
    }

    /// All navigations performed so far, oldest first.
    pub fn history(&self) -> Vec<Navigation> {
        self.with_state(|state| state.history.clone())
    }

    /// Number of navigations performed so far.
    pub fn navigation_count(&self) -> usize {
        self.with_state(|state| state.history.len())
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryNavigatorState) -> R) -> R {
        match self.inner.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn record(&self, kind: NavigationKind, destination: &str) {
        self.with_state(|state| {
            state.current = destination.to_string();
            state.history.push(Navigation {
                kind,
                destination: destination.to_string(),
            });
        });
    }
}

impl Navigator for MemoryNavigator {
    fn current_path(&self) -> String {
        self.with_state(|state| state.current.clone())
    }

    fn replace(&self, destination: &str) {
        self.record(NavigationKind::Replace, destination);
    }

    fn reload(&self, destination: &str) {
        self.record(NavigationKind::Reload, destination);
    }
}

/// Sends paths under `prefix` to `entry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRule {
    pub prefix: String,
    pub entry: String,
}

impl RedirectRule {
    pub fn new(prefix: impl Into<String>, entry: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            entry: entry.into(),
        }
    }

    /// Segment-aware prefix match: `/admin` matches `/admin`, `/admin/x`,
    /// `/admin?q` and `/admin#x`, not `/administrator`.
    pub fn matches(&self, path: &str) -> bool {
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
            None => false,
        }
    }
}

/// Chooses the login entry point for the caller's current role context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectPolicy {
    /// Checked in order; the first matching rule wins.
    pub rules: Vec<RedirectRule>,
    /// Entry point for paths no rule matches.
    pub default_entry: String,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                RedirectRule::new("/admin", "/admin/login"),
                RedirectRule::new("/tutor", "/tutor/login"),
            ],
            default_entry: "/login".to_string(),
        }
    }
}

impl RedirectPolicy {
    /// The entry point for a user currently at `path`.
    pub fn destination_for(&self, path: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(|rule| rule.entry.as_str())
            .unwrap_or(&self.default_entry)
    }

    /// Whether `path` is itself one of the entry points.
    pub fn is_entry_point(&self, path: &str) -> bool {
        let path = strip_query(path).trim_end_matches('/');
        let same = |entry: &str| entry.trim_end_matches('/') == path;
        same(&self.default_entry) || self.rules.iter().any(|rule| same(&rule.entry))
    }
}

fn strip_query(path: &str) -> &str {
    path.split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or(path)
}
