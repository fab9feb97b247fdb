//! Top-level UI state and the event loop.

use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use vigilant_core::{ResourceKind, TrackedResource};
use vigilant_kubehub::{ClusterOps, ClusterSummary};

use crate::command_bar::{CommandBar, CommandOutcome};
use crate::pane::{PaneKind, TextPane};
use crate::registry::ControllerRegistry;
use crate::tui::{self, Tui};
use crate::{draw, UiError};

/// Runtime knobs for the UI.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub initial_resource: String,
    pub tick: Duration,
    pub tail_lines: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { initial_resource: ResourceKind::Pods.name().to_string(), tick: Duration::from_millis(250), tail_lines: 500 }
    }
}

/// Object a detail pane shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl Target {
    fn of(r: &TrackedResource) -> Self {
        Self { kind: r.kind(), namespace: r.namespace.clone(), name: r.name.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    List,
    Detail(Target),
}

/// Results of background fetches, delivered back to the loop.
#[derive(Debug)]
pub enum AppMessage {
    Pane { kind: PaneKind, target: Target, text: Result<String, String> },
    Summary(ClusterSummary),
}

pub struct App {
    registry: ControllerRegistry,
    ops: Arc<dyn ClusterOps>,
    config: AppConfig,
    active: String,
    screen: Screen,
    pane: Option<TextPane>,
    command: CommandBar,
    header: ClusterSummary,
    flash: Option<String>,
    should_quit: bool,
    msg_tx: mpsc::UnboundedSender<AppMessage>,
    msg_rx: mpsc::UnboundedReceiver<AppMessage>,
}

impl App {
    pub fn new(registry: ControllerRegistry, ops: Arc<dyn ClusterOps>, config: AppConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            registry,
            ops,
            active: config.initial_resource.clone(),
            config,
            screen: Screen::List,
            pane: None,
            command: CommandBar::new(),
            header: ClusterSummary::default(),
            flash: None,
            should_quit: false,
            msg_tx,
            msg_rx,
        }
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn active_resource(&self) -> &str {
        &self.active
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn flash(&self) -> Option<&str> {
        self.flash.as_deref()
    }

    pub fn header(&self) -> &ClusterSummary {
        &self.header
    }

    pub fn command(&self) -> &CommandBar {
        &self.command
    }

    pub(crate) fn registry_mut(&mut self) -> &mut ControllerRegistry {
        &mut self.registry
    }

    pub(crate) fn pane_mut(&mut self) -> Option<&mut TextPane> {
        self.pane.as_mut()
    }

    /// Header line describing what the user is looking at.
    pub fn action_text(&self) -> String {
        if self.command.is_active() {
            return "Command Bar".to_string();
        }
        match (&self.screen, self.pane.as_ref().map(TextPane::kind)) {
            (Screen::Detail(t), Some(PaneKind::Logs)) => format!("Logs for {} {}", t.kind.singular(), t.name),
            (Screen::Detail(t), _) => format!("Describing {} {}", t.kind.singular(), t.name),
            (Screen::List, _) => format!("Viewing {}", self.active),
        }
    }

    /// Validate and activate the initial resource view.
    pub fn start(&mut self) -> Result<(), UiError> {
        let initial = self.active.clone();
        self.switch_to(&initial)?;
        self.request_summary();
        Ok(())
    }

    pub fn switch_to(&mut self, name: &str) -> Result<(), UiError> {
        let name = ResourceKind::from_name(name)
            .map(|k| k.name().to_string())
            .unwrap_or_else(|| name.trim().to_ascii_lowercase());
        if self.registry.get(&name).is_none() {
            return Err(UiError::UnknownResource(name));
        }
        counter!("vigilant_view_switches_total", 1u64);
        info!(resource = %name, "switching view");
        self.active = name;
        self.screen = Screen::List;
        self.pane = None;
        Ok(())
    }

    fn request_summary(&self) {
        let ops = Arc::clone(&self.ops);
        let tx = self.msg_tx.clone();
        tokio::spawn(async move {
            match ops.summary().await {
                Ok(s) => {
                    let _ = tx.send(AppMessage::Summary(s));
                }
                Err(e) => warn!(error = %e, "cluster summary failed"),
            }
        });
    }

    fn open_pane(&mut self, kind: PaneKind) {
        let Some(selected) = self.registry.get(&self.active).and_then(|c| c.selected().cloned()) else {
            return;
        };
        if kind == PaneKind::Logs && selected.kind() != ResourceKind::Pods {
            self.flash = Some(format!("logs are only available for pods, not {}", selected.kind()));
            return;
        }
        let target = Target::of(&selected);
        let title = format!("{} {}/{}", target.kind.singular(), target.namespace, target.name);
        self.pane = Some(TextPane::new(kind.clone(), title));
        self.screen = Screen::Detail(target.clone());
        self.fetch_pane(kind, target);
    }

    fn fetch_pane(&self, kind: PaneKind, target: Target) {
        let ops = Arc::clone(&self.ops);
        let tx = self.msg_tx.clone();
        let tail = self.config.tail_lines;
        tokio::spawn(async move {
            let res = match kind {
                PaneKind::Describe => ops.describe(target.kind, &target.namespace, &target.name).await,
                PaneKind::Logs => ops.logs(&target.namespace, &target.name, None, Some(tail)).await,
            };
            let text = res.map_err(|e| match kind {
                PaneKind::Describe => format!("Error describing {} {}: {e:#}", target.kind.singular(), target.name),
                PaneKind::Logs => format!("Error getting pod logs: {e:#}"),
            });
            let _ = tx.send(AppMessage::Pane { kind, target, text });
        });
    }

    pub fn handle_message(&mut self, msg: AppMessage) {
        match msg {
            AppMessage::Summary(s) => self.header = s,
            AppMessage::Pane { kind, target, text } => {
                if self.screen != Screen::Detail(target) {
                    debug!("dropping stale pane result");
                    return;
                }
                if let Some(pane) = self.pane.as_mut().filter(|p| *p.kind() == kind) {
                    match text {
                        Ok(t) => pane.set_text(&t),
                        Err(e) => pane.set_text(&e),
                    }
                }
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        if self.command.is_active() {
            if let CommandOutcome::Submit(name) = self.command.handle_key(key) {
                if let Err(e) = self.switch_to(&name) {
                    self.flash = Some(e.to_string());
                }
            }
            return;
        }
        self.flash = None;
        if key.code == KeyCode::Char('q') {
            self.should_quit = true;
            return;
        }
        match self.screen {
            Screen::List => self.list_key(key),
            Screen::Detail(_) => self.pane_key(key),
        }
    }

    fn list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(':') => self.command.activate(self.registry.available_names()),
            KeyCode::Char('d') => self.open_pane(PaneKind::Describe),
            KeyCode::Char('l') => self.open_pane(PaneKind::Logs),
            code => {
                let Some(c) = self.registry.get(&self.active) else { return };
                match code {
                    KeyCode::Down | KeyCode::Char('j') => c.select_next(),
                    KeyCode::Up | KeyCode::Char('k') => c.select_prev(),
                    KeyCode::Char('r') => c.refresh(),
                    _ => {}
                }
            }
        }
    }

    fn pane_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc {
            self.screen = Screen::List;
            self.pane = None;
            return;
        }
        if key.code == KeyCode::Char('r') {
            if let (Screen::Detail(t), Some(p)) = (&self.screen, self.pane.as_mut()) {
                p.set_loading();
                let (kind, target) = (p.kind().clone(), t.clone());
                self.fetch_pane(kind, target);
            }
            return;
        }
        let Some(p) = self.pane.as_mut() else { return };
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => p.scroll_down(1),
            KeyCode::Up | KeyCode::Char('k') => p.scroll_up(1),
            KeyCode::PageDown | KeyCode::Char(' ') => p.page_down(),
            KeyCode::PageUp => p.page_up(),
            KeyCode::Home | KeyCode::Char('g') => p.home(),
            KeyCode::End | KeyCode::Char('G') => p.end(),
            _ => {}
        }
    }

    /// Stop every synchronizer.
    pub fn shutdown(&mut self) {
        self.registry.clear();
    }

    /// Take over the terminal and run until the user quits.
    pub async fn run(mut self) -> Result<(), UiError> {
        self.start()?;
        tui::install_panic_hook();
        let mut terminal = tui::init()?;
        let res = self.main_loop(&mut terminal).await;
        self.shutdown();
        tui::restore()?;
        res
    }

    async fn main_loop(&mut self, terminal: &mut Tui) -> Result<(), UiError> {
        let mut events = EventStream::new();
        let mut tick = tokio::time::interval(self.config.tick);
        loop {
            terminal.draw(|frame| draw::draw(frame, self))?;
            if self.should_quit {
                return Ok(());
            }
            tokio::select! {
                ev = events.next() => match ev {
                    Some(Ok(Event::Key(key))) => self.handle_key(key),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(UiError::Terminal(e)),
                    None => return Ok(()),
                },
                _ = active_changed(&mut self.registry, &self.active) => {}
                Some(msg) = self.msg_rx.recv() => self.handle_message(msg),
                _ = tick.tick() => {}
            }
        }
    }
}

async fn active_changed(registry: &mut ControllerRegistry, name: &str) {
    match registry.get(name) {
        Some(c) => c.changed().await,
        None => std::future::pending().await,
    }
}
