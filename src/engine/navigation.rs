//! Focus, selection, and the delayed pivot between foci.

pub const DEFAULT_SETTLE_DELAY: f64 = 0.15;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavState {
    Idle { focus: String },
    Pivoting { from: String, to: String },
}

/// What a click on a node resulted in.
#[derive(Clone, Debug, PartialEq)]
pub enum ClickOutcome {
    /// The focus was clicked; it is now selected and nothing else changes.
    Inspected,
    /// A pivot to the clicked node will apply at `due_at` unless superseded.
    PivotScheduled { generation: u64, due_at: f64 },
}

/// A focus change that has just been applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pivot {
    pub from: String,
    pub to: String,
}

#[derive(Clone, Debug, PartialEq)]
struct PendingPivot {
    generation: u64,
    from: String,
    to: String,
    due_at: f64,
}

pub struct Navigator {
    state: NavState,
    previous: Option<String>,
    selected: Option<String>,
    generation: u64,
    pending: Option<PendingPivot>,
    settle_delay: f64,
}

impl Navigator {
    pub fn new(focus: impl Into<String>, settle_delay: f64) -> Self {
        Self {
            state: NavState::Idle {
                focus: focus.into(),
            },
            previous: None,
            selected: None,
            generation: 0,
            pending: None,
            settle_delay: settle_delay.max(0.0),
        }
    }

    pub fn state(&self) -> &NavState {
        &self.state
    }

    /// The applied focus; a pending pivot does not change it until it lands.
    pub fn focus(&self) -> &str {
        match &self.state {
            NavState::Idle { focus } => focus,
            NavState::Pivoting { from, .. } => from,
        }
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn set_selected(&mut self, id: Option<String>) {
        self.selected = id;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn settle_delay(&self) -> f64 {
        self.settle_delay
    }

    pub fn set_settle_delay(&mut self, settle_delay: f64) {
        self.settle_delay = settle_delay.max(0.0);
    }

    pub fn is_pivoting(&self) -> bool {
        self.pending.is_some()
    }

    /// Back to `Idle(focus)` with no history, as after loading a map.
    pub fn reset(&mut self, focus: impl Into<String>) {
        self.generation += 1;
        self.state = NavState::Idle {
            focus: focus.into(),
        };
        self.previous = None;
        self.selected = None;
        self.pending = None;
    }

    /// Clicking the focus only selects it; clicking anything else schedules a pivot.
    ///
    /// Every click supersedes whatever pivot was still waiting.
    pub fn click_node(&mut self, id: &str, now: f64) -> ClickOutcome {
        self.generation += 1;
        let focus = self.focus().to_owned();

        if id == focus {
            if let Some(stale) = self.pending.take() {
                tracing::debug!(to = %stale.to, "pivot superseded by click on focus");
            }
            self.state = NavState::Idle { focus };
            self.selected = Some(id.to_owned());
            return ClickOutcome::Inspected;
        }

        let due_at = now + self.settle_delay;
        if let Some(stale) = self.pending.replace(PendingPivot {
            generation: self.generation,
            from: focus.clone(),
            to: id.to_owned(),
            due_at,
        }) {
            tracing::debug!(to = %stale.to, generation = stale.generation, "pivot superseded");
        }
        self.state = NavState::Pivoting {
            from: focus,
            to: id.to_owned(),
        };
        ClickOutcome::PivotScheduled {
            generation: self.generation,
            due_at,
        }
    }

    /// Pivots to the previous focus, if there is one.
    pub fn go_back(&mut self, now: f64) -> Option<ClickOutcome> {
        let previous = self.previous.clone()?;
        Some(self.click_node(&previous, now))
    }

    /// Applies the pending pivot once it is due. Returns the pivot that landed.
    pub fn poll(&mut self, now: f64) -> Option<Pivot> {
        let pending = self.pending.as_ref()?;
        if pending.generation != self.generation {
            tracing::debug!(to = %pending.to, "dropping stale pivot");
            self.pending = None;
            return None;
        }
        if now < pending.due_at {
            return None;
        }

        let pending = self.pending.take()?;
        self.previous = Some(pending.from.clone());
        self.selected = Some(pending.to.clone());
        self.state = NavState::Idle {
            focus: pending.to.clone(),
        };
        Some(Pivot {
            from: pending.from,
            to: pending.to,
        })
    }

    /// Immediately re-centers on `focus`, e.g. when the old focus left the map.
    pub fn force_focus(&mut self, focus: impl Into<String>, previous: Option<String>) {
        self.generation += 1;
        self.pending = None;
        self.state = NavState::Idle {
            focus: focus.into(),
        };
        self.previous = previous;
    }

    /// Clears references to a node that no longer exists.
    pub fn forget(&mut self, id: &str) {
        if self.previous.as_deref() == Some(id) {
            self.previous = None;
        }
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        if self.pending.as_ref().is_some_and(|pending| pending.to == id) {
            self.pending = None;
            let focus = self.focus().to_owned();
            self.state = NavState::Idle { focus };
        }
    }
}
