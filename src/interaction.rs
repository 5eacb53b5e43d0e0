//! Interaction engine: turns raw pointer events on annotated units into
//! bubble show/hide decisions. Purely event-in, event-out; rendering the
//! bubble is the embedder's concern.
//!
//! One show timer exists for the whole page (pointer moves between units re-
//! arm it, last writer wins) while hide timers are per entry, so a bubble in
//! its grace period survives the pointer passing over a different unit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

use crate::metrics::{metric_names, MetricsRegistry};
use crate::timer::ScheduledTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    Hover,
    Click,
    DoubleClick,
    RightClick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierKey {
    None,
    Alt,
    Ctrl,
    Shift,
    Meta,
}

/// Modifier keys held during a pointer event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub meta: bool,
}

impl ModifierKey {
    /// `Ctrl` also accepts the meta key, so one binding covers both
    /// platforms' conventional shortcut key.
    pub fn matches(self, held: &Modifiers) -> bool {
        match self {
            ModifierKey::None => true,
            ModifierKey::Alt => held.alt,
            ModifierKey::Ctrl => held.ctrl || held.meta,
            ModifierKey::Shift => held.shift,
            ModifierKey::Meta => held.meta,
        }
    }
}

/// A configured trigger: the pointer action plus a required modifier, and
/// for hover the delay before the bubble shows.
#[derive(Debug, Clone, Copy)]
pub struct TriggerBinding {
    pub action: TriggerAction,
    pub modifier: ModifierKey,
    pub delay_ms: u64,
}

#[derive(Debug, Clone)]
pub struct InteractionConfig {
    /// Trigger that opens the bubble.
    pub main: TriggerBinding,
    /// Optional trigger that fires the quick action directly, no bubble.
    pub quick_action: Option<TriggerBinding>,
    /// Allow several bubbles shown at once; false means showing one hides
    /// the others.
    pub allow_multiple: bool,
    /// Grace period after the pointer leaves before the bubble hides.
    pub dismiss_delay_ms: u64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            main: TriggerBinding {
                action: TriggerAction::Hover,
                modifier: ModifierKey::None,
                delay_ms: 400,
            },
            quick_action: None,
            allow_multiple: false,
            dismiss_delay_ms: 300,
        }
    }
}

/// The unit under the pointer.
#[derive(Debug, Clone)]
pub struct UnitRef {
    pub entry_id: String,
    pub original_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    Enter,
    Leave,
    Click,
    DoubleClick,
    RightClick,
    /// Pointer entered the bubble itself.
    BubbleEnter,
    /// Pointer left the bubble.
    BubbleLeave,
}

#[derive(Debug, Clone)]
pub struct PointerEvent {
    pub action: PointerAction,
    pub target: UnitRef,
    pub modifiers: Modifiers,
}

/// Per-entry bubble lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BubbleState {
    Idle,
    PendingShow,
    Shown,
    PendingHide,
}

/// Decisions emitted toward the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BubbleEvent {
    Show {
        entry_id: String,
        original_text: String,
    },
    Hide {
        entry_id: String,
    },
    QuickAction {
        entry_id: String,
    },
}

pub struct InteractionEngine {
    config: RwLock<InteractionConfig>,
    metrics: Arc<MetricsRegistry>,
    show_timer: ScheduledTask,
    /// Entry the show timer is currently armed for.
    pending_show: Mutex<Option<String>>,
    hide_timers: Mutex<HashMap<String, Arc<ScheduledTask>>>,
    shown: Mutex<HashMap<String, String>>,
    tx: mpsc::UnboundedSender<BubbleEvent>,
}

impl InteractionEngine {
    pub fn new(
        config: InteractionConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<BubbleEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            config: RwLock::new(config),
            metrics,
            show_timer: ScheduledTask::new(),
            pending_show: Mutex::new(None),
            hide_timers: Mutex::new(HashMap::new()),
            shown: Mutex::new(HashMap::new()),
            tx,
        });
        (engine, rx)
    }

    pub fn set_config(&self, config: InteractionConfig) {
        *self.config.write() = config;
    }

    /// Current lifecycle state for an entry's bubble.
    pub fn state(&self, entry_id: &str) -> BubbleState {
        if self
            .hide_timers
            .lock()
            .get(entry_id)
            .map(|t| t.is_armed())
            .unwrap_or(false)
        {
            return BubbleState::PendingHide;
        }
        if self.shown.lock().contains_key(entry_id) {
            return BubbleState::Shown;
        }
        if self.pending_show.lock().as_deref() == Some(entry_id) && self.show_timer.is_armed() {
            return BubbleState::PendingShow;
        }
        BubbleState::Idle
    }

    /// Feed one pointer event through the state machine.
    pub fn handle_event(self: &Arc<Self>, event: PointerEvent) {
        let config = self.config.read().clone();
        match event.action {
            PointerAction::Enter => {
                // Re-entry during the grace period keeps the bubble up.
                self.cancel_hide(&event.target.entry_id);
                if config.main.action == TriggerAction::Hover
                    && config.main.modifier.matches(&event.modifiers)
                {
                    self.arm_show(&config, event.target);
                }
            }
            PointerAction::Leave => {
                self.cancel_pending_show(&event.target.entry_id);
                if self.shown.lock().contains_key(&event.target.entry_id) {
                    self.arm_hide(&config, &event.target.entry_id);
                }
            }
            PointerAction::Click | PointerAction::DoubleClick | PointerAction::RightClick => {
                let clicked = match event.action {
                    PointerAction::Click => TriggerAction::Click,
                    PointerAction::DoubleClick => TriggerAction::DoubleClick,
                    _ => TriggerAction::RightClick,
                };
                // Main binding takes precedence; a quick binding that
                // collides with it never fires.
                if config.main.action == clicked && config.main.modifier.matches(&event.modifiers) {
                    self.show(&config, event.target);
                    return;
                }
                if let Some(quick) = config.quick_action {
                    if quick.action == clicked && quick.modifier.matches(&event.modifiers) {
                        // Quick action bypasses the bubble entirely.
                        debug!(entry_id = event.target.entry_id.as_str(), "quick action");
                        let _ = self.tx.send(BubbleEvent::QuickAction {
                            entry_id: event.target.entry_id,
                        });
                    }
                }
            }
            PointerAction::BubbleEnter => {
                self.cancel_hide(&event.target.entry_id);
            }
            PointerAction::BubbleLeave => {
                if self.shown.lock().contains_key(&event.target.entry_id) {
                    self.arm_hide(&config, &event.target.entry_id);
                }
            }
        }
    }

    fn arm_show(self: &Arc<Self>, config: &InteractionConfig, target: UnitRef) {
        if self.shown.lock().contains_key(&target.entry_id) {
            return;
        }
        *self.pending_show.lock() = Some(target.entry_id.clone());
        let engine = Arc::clone(self);
        let config = config.clone();
        self.show_timer
            .arm(Duration::from_millis(config.main.delay_ms), move || {
                *engine.pending_show.lock() = None;
                engine.show(&config, target);
            });
    }

    fn cancel_pending_show(&self, entry_id: &str) {
        let mut pending = self.pending_show.lock();
        if pending.as_deref() == Some(entry_id) {
            *pending = None;
            self.show_timer.disarm();
        }
    }

    fn show(self: &Arc<Self>, config: &InteractionConfig, target: UnitRef) {
        if !config.allow_multiple {
            let others: Vec<String> = self
                .shown
                .lock()
                .keys()
                .filter(|id| **id != target.entry_id)
                .cloned()
                .collect();
            for id in others {
                self.hide_now(&id);
            }
        }
        let already = self
            .shown
            .lock()
            .insert(target.entry_id.clone(), target.original_text.clone())
            .is_some();
        if already {
            return;
        }
        self.metrics.incr(metric_names::BUBBLES_SHOWN, 1);
        debug!(entry_id = target.entry_id.as_str(), "bubble shown");
        let _ = self.tx.send(BubbleEvent::Show {
            entry_id: target.entry_id,
            original_text: target.original_text,
        });
    }

    fn arm_hide(self: &Arc<Self>, config: &InteractionConfig, entry_id: &str) {
        let timer = Arc::clone(
            self.hide_timers
                .lock()
                .entry(entry_id.to_string())
                .or_insert_with(|| Arc::new(ScheduledTask::new())),
        );
        let engine = Arc::clone(self);
        let entry_id = entry_id.to_string();
        timer.arm(Duration::from_millis(config.dismiss_delay_ms), move || {
            engine.hide_now(&entry_id);
        });
    }

    fn cancel_hide(&self, entry_id: &str) {
        if let Some(timer) = self.hide_timers.lock().get(entry_id) {
            timer.disarm();
        }
    }

    fn hide_now(&self, entry_id: &str) {
        self.cancel_hide(entry_id);
        if self.shown.lock().remove(entry_id).is_some() {
            debug!(entry_id, "bubble hidden");
            let _ = self.tx.send(BubbleEvent::Hide {
                entry_id: entry_id.to_string(),
            });
        }
    }
}
