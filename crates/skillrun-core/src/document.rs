// SPDX-FileCopyrightText: 2026 Skillrun Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structural incremental updates for live documents.

use serde::{Deserialize, Serialize};

/// A single `{retain, delete, insert}` edit, measured in chars.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub retain: usize,
    pub delete: usize,
    pub insert: String,
}

impl DocumentUpdate {
    /// Computes the edit that turns `old` into `new`.
    ///
    /// The longest common prefix is retained and the remainder replaced.
    /// Identical inputs yield an empty update.
    pub fn between(old: &str, new: &str) -> Self {
        let retain = old
            .chars()
            .zip(new.chars())
            .take_while(|(a, b)| a == b)
            .count();
        let old_len = old.chars().count();
        Self {
            retain,
            delete: old_len - retain,
            insert: new.chars().skip(retain).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.delete == 0 && self.insert.is_empty()
    }

    /// Applies the edit to `doc`.
    pub fn apply(&self, doc: &str) -> String {
        let mut out: String = doc.chars().take(self.retain).collect();
        out.push_str(&self.insert);
        out.extend(doc.chars().skip(self.retain + self.delete));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn append_only_growth_retains_everything() {
        let update = DocumentUpdate::between("Hello", "Hello world");
        assert_eq!(
            update,
            DocumentUpdate {
                retain: 5,
                delete: 0,
                insert: " world".into()
            }
        );
        assert_eq!(update.apply("Hello"), "Hello world");
    }

    #[test]
    fn same_state_twice_is_empty() {
        assert!(DocumentUpdate::between("abc", "abc").is_empty());
        assert!(DocumentUpdate::between("", "").is_empty());
    }

    #[test]
    fn rewrite_deletes_divergent_tail() {
        let update = DocumentUpdate::between("héllo there", "héllo world");
        assert_eq!(update.retain, 6);
        assert_eq!(update.delete, 5);
        assert_eq!(update.apply("héllo there"), "héllo world");
    }

    proptest! {
        #[test]
        fn between_then_apply_reaches_target(old in "\\PC{0,40}", new in "\\PC{0,40}") {
            let update = DocumentUpdate::between(&old, &new);
            prop_assert_eq!(update.apply(&old), new);
        }
    }
}
