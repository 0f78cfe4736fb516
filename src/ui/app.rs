use crate::ledger::{Confirmation, Ledger};
use crate::models::{Item, ItemId};
use crate::offline::{AgentHandle, AgentMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InputMode {
    Normal,
    Editing,
    Command,
    Confirm,
}

impl std::fmt::Display for InputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Editing => write!(f, "ADD"),
            Self::Command => write!(f, "COMMAND"),
            Self::Confirm => write!(f, "CONFIRM"),
        }
    }
}

/// Pending action that requires user confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingAction {
    Reset,
}

pub(crate) struct App {
    pub(crate) running: bool,
    pub(crate) input_mode: InputMode,
    pub(crate) command_input: String,
    pub(crate) status_message: String,
    pub(crate) show_help: bool,

    pub(crate) ledger: Ledger,
    pub(crate) item_index: usize,
    pub(crate) item_scroll: usize,

    // Confirmation
    pub(crate) pending_action: Option<PendingAction>,
    pub(crate) confirm_message: String,

    pub(crate) agent: Option<AgentHandle>,

    // Layout (updated each render frame)
    pub(crate) visible_rows: usize,
}

impl App {
    pub(crate) fn new(mut ledger: Ledger, agent: Option<AgentHandle>) -> Self {
        let status_message = ledger.take_warning().unwrap_or_default();
        Self {
            running: true,
            input_mode: InputMode::Normal,
            command_input: String::new(),
            status_message,
            show_help: false,

            ledger,
            item_index: 0,
            item_scroll: 0,

            pending_action: None,
            confirm_message: String::new(),

            agent,

            visible_rows: 20,
        }
    }

    pub(crate) fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    pub(crate) fn selected_item(&self) -> Option<&Item> {
        self.ledger.items().get(self.item_index)
    }

    // ── Ledger operations ─────────────────────────────────────

    /// Add from the input form. Invalid input is left in place for editing.
    pub(crate) fn submit_item(&mut self) -> bool {
        if !self.ledger.submit_pending() {
            return false;
        }
        self.item_index = 0;
        self.item_scroll = 0;
        self.after_commit();
        true
    }

    pub(crate) fn add_item(&mut self, raw: &str, category: Option<&str>) -> bool {
        if !self.ledger.add_item(raw, category) {
            return false;
        }
        self.item_index = 0;
        self.item_scroll = 0;
        self.after_commit();
        true
    }

    pub(crate) fn remove_selected(&mut self) -> Option<Item> {
        let item = self.selected_item()?.clone();
        self.remove_item(&item.id).then_some(item)
    }

    pub(crate) fn remove_item(&mut self, id: &ItemId) -> bool {
        if !self.ledger.remove_item(id) {
            return false;
        }
        self.clamp_selection();
        self.after_commit();
        true
    }

    pub(crate) fn request_reset(&mut self) {
        if self.ledger.items().is_empty() && self.ledger.state().new_item_value.is_empty() {
            self.set_status("Nothing to reset");
            return;
        }
        self.confirm_message = format!("Delete all {} items?", self.ledger.items().len());
        self.pending_action = Some(PendingAction::Reset);
        self.input_mode = InputMode::Confirm;
    }

    pub(crate) fn resolve_pending(&mut self, confirmation: Confirmation) {
        let action = self.pending_action.take();
        self.input_mode = InputMode::Normal;
        self.confirm_message.clear();

        match (action, confirmation) {
            (Some(PendingAction::Reset), Confirmation::Confirmed) => {
                self.ledger.reset(Confirmation::Confirmed);
                self.item_index = 0;
                self.item_scroll = 0;
                self.set_status("All items deleted");
                self.after_commit();
            }
            (Some(PendingAction::Reset), Confirmation::Cancelled) => {
                self.ledger.reset(Confirmation::Cancelled);
                self.set_status("Cancelled");
            }
            (None, _) => {}
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.ledger.items().len();
        if self.item_index >= len {
            self.item_index = len.saturating_sub(1);
        }
        if self.item_scroll > self.item_index {
            self.item_scroll = self.item_index;
        }
    }

    /// Surface a failed write from the last committed change.
    fn after_commit(&mut self) {
        if let Some(e) = self.ledger.take_storage_error() {
            self.set_status(e);
        }
    }

    // ── Offline agent ─────────────────────────────────────────

    pub(crate) fn activate_agent(&mut self) {
        match &self.agent {
            Some(agent) => {
                agent.post_message(&AgentMessage::SkipWaiting.to_json());
                self.set_status("Asked the offline cache to activate");
            }
            None => self.set_status("Offline cache is disabled"),
        }
    }

    /// Drain agent events and background write failures into the status bar.
    pub(crate) fn poll_background(&mut self) {
        let mut latest = None;
        if let Some(agent) = &self.agent {
            while let Some(event) = agent.try_event() {
                latest = Some(event.describe());
            }
        }
        if let Some(msg) = latest {
            self.set_status(msg);
        }
        self.after_commit();
    }
}
