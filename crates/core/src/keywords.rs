//! Keyword recommendation loop.
//!
//! Keeps the ordered selection history and the latest candidate set suggested by the server.
//! The server may re-offer keywords that are already selected; those are filtered from the
//! pickable candidates but the raw order is kept for display.

use crate::{ConsultError, ConsultResult};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct KeywordLoop {
    selected: Vec<String>,
    candidates: Vec<String>,
    offered: HashSet<String>,
}

impl KeywordLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start over with an initial candidate set and no selection.
    pub fn reset(&mut self, candidates: Vec<String>) {
        self.selected.clear();
        self.offered.clear();
        self.candidates.clear();
        self.replace_candidates(candidates);
    }

    /// Ordered selection history.
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// Candidate set exactly as the server returned it.
    pub fn raw_candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Pickable candidates: server order, first occurrence only, selected keywords removed.
    pub fn candidates(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.candidates
            .iter()
            .map(String::as_str)
            .filter(|k| !self.is_selected(k))
            .filter(|k| seen.insert(*k))
            .collect()
    }

    pub fn is_selected(&self, keyword: &str) -> bool {
        self.selected.iter().any(|s| s == keyword)
    }

    pub fn is_candidate(&self, keyword: &str) -> bool {
        !self.is_selected(keyword) && self.candidates.iter().any(|c| c == keyword)
    }

    /// Whether `keyword` appeared in any candidate set since the last reset.
    pub fn was_offered(&self, keyword: &str) -> bool {
        self.offered.contains(keyword)
    }

    /// Append `keyword` to the selection and return the updated selection snapshot.
    pub fn select(&mut self, keyword: &str) -> ConsultResult<Vec<String>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(ConsultError::validation("keyword cannot be empty"));
        }
        if self.is_selected(keyword) {
            return Err(ConsultError::validation(format!(
                "keyword '{keyword}' is already selected"
            )));
        }
        if !self.is_candidate(keyword) {
            return Err(ConsultError::validation(format!(
                "keyword '{keyword}' is not among the current candidates"
            )));
        }

        self.selected.push(keyword.to_string());
        Ok(self.selected.clone())
    }

    pub fn replace_candidates(&mut self, candidates: Vec<String>) {
        let candidates: Vec<String> = candidates
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        self.offered.extend(candidates.iter().cloned());
        self.candidates = candidates;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_select_appends_in_order() {
        let mut kw = KeywordLoop::new();
        kw.reset(strings(&["fever", "cough", "headache"]));

        kw.select("fever").unwrap();
        kw.replace_candidates(strings(&["chills", "cough"]));
        let snapshot = kw.select("cough").unwrap();

        assert_eq!(snapshot, strings(&["fever", "cough"]));
        assert_eq!(kw.selected(), &snapshot[..]);
    }

    #[test]
    fn test_duplicate_selection_rejected() {
        let mut kw = KeywordLoop::new();
        kw.reset(strings(&["fever", "cough"]));
        kw.select("fever").unwrap();

        assert!(kw.select("fever").is_err());
        assert_eq!(kw.selected().len(), 1);
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let mut kw = KeywordLoop::new();
        kw.reset(strings(&["fever"]));

        assert!(matches!(kw.select("rash"), Err(ConsultError::Validation(_))));
        assert!(kw.select("  ").is_err());
        assert!(kw.selected().is_empty());
    }

    #[test]
    fn test_candidates_filter_selected_and_duplicates() {
        let mut kw = KeywordLoop::new();
        kw.reset(strings(&["fever", "cough"]));
        kw.select("fever").unwrap();
        kw.replace_candidates(strings(&["chills", "fever", "sweating", "chills"]));

        assert_eq!(kw.candidates(), vec!["chills", "sweating"]);
        assert_eq!(kw.raw_candidates().len(), 4);
        assert!(!kw.is_candidate("fever"));
    }

    #[test]
    fn test_selection_is_subset_of_offered() {
        let mut kw = KeywordLoop::new();
        kw.reset(strings(&["fever"]));
        kw.select("fever").unwrap();
        kw.replace_candidates(strings(&["chills"]));
        kw.select("chills").unwrap();

        assert!(kw.selected().iter().all(|k| kw.was_offered(k)));
    }

    #[test]
    fn test_reset_clears_selection() {
        let mut kw = KeywordLoop::new();
        kw.reset(strings(&["fever"]));
        kw.select("fever").unwrap();
        kw.reset(strings(&["nausea"]));

        assert!(kw.selected().is_empty());
        assert!(!kw.was_offered("fever"));
        assert_eq!(kw.candidates(), vec!["nausea"]);
    }
}
