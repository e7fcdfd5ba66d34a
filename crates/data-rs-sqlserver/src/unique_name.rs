//! Collision-free name generation for aliases and temp tables.

use std::collections::{HashMap, HashSet};

/// Hands out unique names derived from requested bases.
///
/// The first request for a base returns it unchanged. Later requests append
/// a per-base counter directly, inserting `_` when the base already ends in
/// a digit so that `name1` + `1` cannot collide with `name` + `11`.
///
/// Names are compared case-insensitively, matching SQL Server's default
/// collation for identifiers. The returned name keeps the requested casing.
///
/// # Examples
///
/// ```
/// use data_rs_sqlserver::unique_name::UniqueNameGenerator;
///
/// let mut names = UniqueNameGenerator::new();
/// let got: Vec<String> = ["name", "name", "name", "name1", "name1"]
///     .iter()
///     .map(|n| names.next_name(n))
///     .collect();
/// assert_eq!(got, ["name", "name1", "name2", "name1_1", "name1_2"]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct UniqueNameGenerator {
    used: HashSet<String>,
    counters: HashMap<String, u32>,
}

impl UniqueNameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a name not handed out before, derived from `base`.
    pub fn next_name(&mut self, base: &str) -> String {
        let key = base.to_lowercase();
        if self.used.insert(key.clone()) {
            return base.to_string();
        }
        let separator = if base.ends_with(|c: char| c.is_ascii_digit()) {
            "_"
        } else {
            ""
        };
        let counter = self.counters.entry(key).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{base}{separator}{counter}");
            if self.used.insert(candidate.to_lowercase()) {
                return candidate;
            }
        }
    }

    /// Returns `true` if `name`, in any casing, has been handed out.
    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(&name.to_lowercase())
    }
}
