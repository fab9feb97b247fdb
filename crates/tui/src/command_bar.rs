//! `:` command bar: single-line input with resource-name suggestions.

use crossterm::event::{KeyCode, KeyEvent};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Still editing.
    Pending,
    Cancelled,
    /// Resource name to switch to.
    Submit(String),
}

#[derive(Default)]
pub struct CommandBar {
    active: bool,
    input: String,
    /// Cursor position in chars, `0..=input.chars().count()`.
    cursor: usize,
    names: Vec<String>,
    suggestions: Vec<String>,
    selected: usize,
    matcher: SkimMatcherV2,
}

impl CommandBar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open with an empty input, suggesting from `names`.
    pub fn activate(&mut self, names: Vec<String>) {
        self.active = true;
        self.names = names;
        self.input.clear();
        self.cursor = 0;
        self.update_suggestions();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
        self.input.clear();
        self.cursor = 0;
        self.suggestions.clear();
        self.selected = 0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn selected_suggestion(&self) -> Option<&str> {
        self.suggestions.get(self.selected).map(String::as_str)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> CommandOutcome {
        if !self.active {
            return CommandOutcome::Pending;
        }
        match key.code {
            KeyCode::Esc => {
                self.deactivate();
                return CommandOutcome::Cancelled;
            }
            KeyCode::Enter => {
                let target = self.resolve();
                self.deactivate();
                return CommandOutcome::Submit(target);
            }
            KeyCode::Tab => self.complete(),
            KeyCode::Up => self.cycle(false),
            KeyCode::Down => self.cycle(true),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.input.chars().count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.input.chars().count(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c) => self.insert(c),
            _ => {}
        }
        CommandOutcome::Pending
    }

    fn byte_at(&self, char_pos: usize) -> usize {
        self.input.char_indices().nth(char_pos).map_or(self.input.len(), |(i, _)| i)
    }

    fn insert(&mut self, c: char) {
        let at = self.byte_at(self.cursor);
        self.input.insert(at, c);
        self.cursor += 1;
        self.update_suggestions();
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let at = self.byte_at(self.cursor - 1);
        self.input.remove(at);
        self.cursor -= 1;
        self.update_suggestions();
    }

    fn cycle(&mut self, forward: bool) {
        let n = self.suggestions.len();
        if n == 0 {
            return;
        }
        self.selected = if forward { (self.selected + 1) % n } else { (self.selected + n - 1) % n };
    }

    fn complete(&mut self) {
        if let Some(s) = self.selected_suggestion().map(str::to_string) {
            self.cursor = s.chars().count();
            self.input = s;
            self.update_suggestions();
        }
    }

    /// The typed name when it is a known one, else the highlighted suggestion,
    /// else the raw input.
    fn resolve(&self) -> String {
        let typed = self.input.trim();
        if self.names.iter().any(|n| n.eq_ignore_ascii_case(typed)) {
            return typed.to_ascii_lowercase();
        }
        match self.selected_suggestion() {
            Some(s) if !typed.is_empty() => s.to_string(),
            _ => typed.to_string(),
        }
    }

    fn update_suggestions(&mut self) {
        self.selected = 0;
        let q = self.input.trim().to_ascii_lowercase();
        if q.is_empty() {
            self.suggestions = self.names.clone();
            return;
        }
        let prefixed: Vec<String> =
            self.names.iter().filter(|n| n.to_ascii_lowercase().starts_with(&q)).cloned().collect();
        if !prefixed.is_empty() {
            self.suggestions = prefixed;
            return;
        }
        let mut scored: Vec<(i64, &String)> =
            self.names.iter().filter_map(|n| self.matcher.fuzzy_match(n, &q).map(|s| (s, n))).collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        self.suggestions = scored.into_iter().map(|(_, n)| n.clone()).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn bar() -> CommandBar {
        let mut b = CommandBar::new();
        b.activate(vec!["deployments".into(), "pods".into()]);
        b
    }

    fn type_str(b: &mut CommandBar, s: &str) {
        for c in s.chars() {
            b.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn empty_input_suggests_everything() {
        assert_eq!(bar().suggestions(), ["deployments", "pods"]);
    }

    #[test]
    fn prefix_filters_case_insensitively() {
        let mut b = bar();
        type_str(&mut b, "PO");
        assert_eq!(b.suggestions(), ["pods"]);
    }

    #[test]
    fn fuzzy_fallback_when_no_prefix_matches() {
        let mut b = bar();
        type_str(&mut b, "dpl");
        assert_eq!(b.suggestions(), ["deployments"]);
        type_str(&mut b, "zzz");
        assert!(b.suggestions().is_empty());
    }

    #[test]
    fn tab_completes_selected_suggestion() {
        let mut b = bar();
        type_str(&mut b, "d");
        b.handle_key(key(KeyCode::Tab));
        assert_eq!(b.input(), "deployments");
        assert_eq!(b.cursor(), "deployments".len());
    }

    #[test]
    fn suggestion_selection_wraps() {
        let mut b = bar();
        b.handle_key(key(KeyCode::Up));
        assert_eq!(b.selected_suggestion(), Some("pods"));
        b.handle_key(key(KeyCode::Down));
        assert_eq!(b.selected_suggestion(), Some("deployments"));
    }

    #[test]
    fn cursor_editing_inserts_and_deletes_in_place() {
        let mut b = bar();
        type_str(&mut b, "pds");
        b.handle_key(key(KeyCode::Left));
        b.handle_key(key(KeyCode::Left));
        type_str(&mut b, "o");
        assert_eq!(b.input(), "pods");
        b.handle_key(key(KeyCode::End));
        b.handle_key(key(KeyCode::Backspace));
        assert_eq!(b.input(), "pod");
        b.handle_key(key(KeyCode::Home));
        b.handle_key(key(KeyCode::Backspace));
        assert_eq!(b.input(), "pod");
        b.handle_key(key(KeyCode::Right));
        b.handle_key(key(KeyCode::Right));
        b.handle_key(key(KeyCode::Right));
        b.handle_key(key(KeyCode::Right));
        assert_eq!(b.cursor(), 3);
    }

    #[test]
    fn enter_submits_exact_name_or_highlighted_suggestion() {
        let mut b = bar();
        type_str(&mut b, "Pods");
        assert_eq!(b.handle_key(key(KeyCode::Enter)), CommandOutcome::Submit("pods".into()));
        assert!(!b.is_active());

        b.activate(vec!["deployments".into(), "pods".into()]);
        type_str(&mut b, "dep");
        assert_eq!(b.handle_key(key(KeyCode::Enter)), CommandOutcome::Submit("deployments".into()));

        b.activate(vec!["deployments".into(), "pods".into()]);
        type_str(&mut b, "qqq");
        assert_eq!(b.handle_key(key(KeyCode::Enter)), CommandOutcome::Submit("qqq".into()));
    }

    #[test]
    fn esc_cancels_and_clears() {
        let mut b = bar();
        type_str(&mut b, "po");
        assert_eq!(b.handle_key(key(KeyCode::Esc)), CommandOutcome::Cancelled);
        assert!(!b.is_active());
        assert_eq!(b.input(), "");
    }
}
