use serde::{Deserialize, Serialize};

/// Per-user list of searched city names, oldest first, without duplicates.
pub trait SearchHistory: Send {
    /// Append `name`, or move it to the end if already present.
    fn push(&mut self, name: &str);

    fn last(&self) -> Option<&str>;

    fn names(&self) -> &[String];
}

/// History held in memory; serializable so a session layer can persist it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHistory {
    names: Vec<String>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl SearchHistory for SessionHistory {
    fn push(&mut self, name: &str) {
        self.names.retain(|existing| existing != name);
        self.names.push(name.to_string());
    }

    fn last(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }

    fn names(&self) -> &[String] {
        &self.names
    }
}

impl<S: Into<String>> FromIterator<S> for SessionHistory {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut history = Self::new();
        for name in iter {
            let name: String = name.into();
            history.push(&name);
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushing_same_city_twice_keeps_one_entry_at_tail() {
        let mut history = SessionHistory::new();
        history.push("Paris");
        history.push("Paris");

        assert_eq!(history.len(), 1);
        assert_eq!(history.last(), Some("Paris"));
    }

    #[test]
    fn repeated_city_moves_to_tail() {
        let mut history = SessionHistory::new();
        history.push("Paris");
        history.push("Oslo");
        history.push("Paris");

        assert_eq!(history.names(), ["Oslo", "Paris"]);
    }

    #[test]
    fn empty_history_has_no_last() {
        assert_eq!(SessionHistory::new().last(), None);
    }

    #[test]
    fn collecting_deduplicates() {
        let history: SessionHistory = ["Rome", "Oslo", "Rome", "Lima"].into_iter().collect();
        assert_eq!(history.names(), ["Oslo", "Rome", "Lima"]);
    }

    #[test]
    fn serializes_as_plain_list() {
        let history: SessionHistory = ["Oslo", "Rome"].into_iter().collect();
        let json = serde_json::to_string(&history).expect("serialize");
        assert_eq!(json, r#"["Oslo","Rome"]"#);

        let back: SessionHistory = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, history);
    }
}
