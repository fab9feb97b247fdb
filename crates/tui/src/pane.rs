//! Scrollable text pane for describe output and pod logs.

/// Rows a pane loses to its border.
const BORDER_ROWS: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneKind {
    Describe,
    Logs,
}

#[derive(Debug, Clone)]
pub struct TextPane {
    kind: PaneKind,
    title: String,
    lines: Vec<String>,
    scroll: usize,
    /// Visible rows as of the last render.
    viewport: usize,
    loading: bool,
}

impl TextPane {
    pub fn new(kind: PaneKind, title: impl Into<String>) -> Self {
        Self { kind, title: title.into(), lines: Vec::new(), scroll: 0, viewport: 20, loading: true }
    }

    pub fn kind(&self) -> &PaneKind {
        &self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn set_loading(&mut self) {
        self.loading = true;
    }

    /// Replace content. Logs jump to the tail, describe output to the top.
    pub fn set_text(&mut self, text: &str) {
        self.lines = text.lines().map(str::to_string).collect();
        self.loading = false;
        self.scroll = match self.kind {
            PaneKind::Describe => self.scroll.min(self.max_scroll()),
            PaneKind::Logs => self.max_scroll(),
        };
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    fn max_scroll(&self) -> usize {
        self.lines.len().saturating_sub(self.viewport)
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.scroll = (self.scroll + n).min(self.max_scroll());
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.scroll = self.scroll.saturating_sub(n);
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.viewport.max(1));
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.viewport.max(1));
    }

    pub fn home(&mut self) {
        self.scroll = 0;
    }

    pub fn end(&mut self) {
        self.scroll = self.max_scroll();
    }

    /// Visible slice for a pane drawn `height` rows tall, border included.
    pub fn render(&mut self, height: u16) -> &[String] {
        self.viewport = usize::from(height.saturating_sub(BORDER_ROWS)).max(1);
        self.scroll = self.scroll.min(self.max_scroll());
        let end = (self.scroll + self.viewport).min(self.lines.len());
        &self.lines[self.scroll..end]
    }

    pub fn status_line(&self) -> String {
        let name = match self.kind {
            PaneKind::Describe => "describe",
            PaneKind::Logs => "logs",
        };
        let pos = if self.lines.is_empty() { 0 } else { self.scroll + 1 };
        format!(
            "{name} | line {pos}/{} | Esc back | j/k scroll | PgUp/PgDn page | g/G top/bottom | r refresh",
            self.lines.len()
        )
    }
}
