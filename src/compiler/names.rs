//! Deterministic, collision-free operation and resource naming

use std::collections::HashSet;

/// Maximum identifier length exposed to the agent
const MAX_NAME_LEN: usize = 64;

/// A running namespace of already-assigned names.
///
/// The compiler owns one set per namespace (operations, resources); the two
/// never interfere, so the same candidate may resolve to the same string in
/// each. First-seen-wins: the first candidate keeps the unsuffixed name,
/// later collisions accumulate `_2`, `_3`, ... suffixes.
#[derive(Debug, Default)]
pub struct NameSet {
    used: HashSet<String>,
}

impl NameSet {
    /// Create an empty namespace
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a raw candidate into a unique `[a-z0-9_]` name, max 64 chars
    pub fn resolve(&mut self, candidate: &str) -> String {
        let base = slug(candidate);

        if self.used.insert(base.clone()) {
            return base;
        }

        for n in 2u32.. {
            let suffix = format!("_{n}");
            let mut name: String = base
                .chars()
                .take(MAX_NAME_LEN - suffix.len())
                .collect();
            name.push_str(&suffix);
            if self.used.insert(name.clone()) {
                return name;
            }
        }
        unreachable!("suffix search is unbounded")
    }

    /// Whether a name has already been assigned in this namespace
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.used.contains(name)
    }
}

/// Lowercase, collapse non-alphanumeric runs to `_`, trim, truncate
fn slug(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut pending_sep = false;

    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !result.is_empty() {
                result.push('_');
            }
            pending_sep = false;
            result.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    if result.is_empty() {
        return "unnamed".to_string();
    }
    result.chars().take(MAX_NAME_LEN).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_collapses_runs() {
        assert_eq!(slug("GetUser"), "getuser");
        assert_eq!(slug("get-user--by_id"), "get_user_by_id");
        assert_eq!(slug("GET /users/{id}"), "get_users_id");
        assert_eq!(slug("  weird!!name  "), "weird_name");
    }

    #[test]
    fn slug_of_garbage_is_nonempty() {
        assert_eq!(slug("///"), "unnamed");
        assert_eq!(slug(""), "unnamed");
    }

    #[test]
    fn duplicate_candidates_get_numeric_suffixes() {
        let mut names = NameSet::new();
        assert_eq!(names.resolve("listItems"), "listitems");
        assert_eq!(names.resolve("listItems"), "listitems_2");
        assert_eq!(names.resolve("listItems"), "listitems_3");
    }

    #[test]
    fn namespaces_are_independent() {
        let mut ops = NameSet::new();
        let mut resources = NameSet::new();
        assert_eq!(ops.resolve("getUser"), "getuser");
        // A second, independent namespace starts fresh.
        assert_eq!(resources.resolve("getUser"), "getuser");
        assert_eq!(ops.resolve("getUser"), "getuser_2");
    }

    #[test]
    fn long_candidates_are_truncated_to_sixty_four() {
        let mut names = NameSet::new();
        let long = "a".repeat(100);
        let name = names.resolve(&long);
        assert_eq!(name.len(), 64);

        // The suffixed collision also stays within the limit.
        let name2 = names.resolve(&long);
        assert_eq!(name2.len(), 64);
        assert!(name2.ends_with("_2"));
    }

    #[test]
    fn resolution_is_deterministic() {
        let run = || {
            let mut names = NameSet::new();
            vec![
                names.resolve("get /a/{id}"),
                names.resolve("get /a/{id}"),
                names.resolve("post /a"),
            ]
        };
        assert_eq!(run(), run());
    }
}
