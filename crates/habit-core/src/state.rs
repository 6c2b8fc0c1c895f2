//! Single source of truth for habits and completions.
//!
//! Every change is an [`Action`] run through [`reduce`], which never touches its
//! input. [`StateStore`] holds the current snapshot and tells subscribers (the
//! datastore, a renderer) about each new one.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::completions::CompletionStore;
use crate::error::HabitError;
use crate::habit::{Habit, HabitPatch};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerState {
    pub habits: Vec<Habit>,
    pub completions: CompletionStore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AddHabit(Habit),
    UpdateHabit { habit_id: String, patch: HabitPatch },
    /// Removes the habit together with all of its completions.
    DeleteHabit { habit_id: String },
    ToggleCompletion { habit_id: String, date: NaiveDate },
    SetCompletion { habit_id: String, date: NaiveDate, done: bool },
    /// Wholesale swap, used by import.
    Replace(TrackerState),
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::AddHabit(_) => "add-habit",
            Action::UpdateHabit { .. } => "update-habit",
            Action::DeleteHabit { .. } => "delete-habit",
            Action::ToggleCompletion { .. } => "toggle-completion",
            Action::SetCompletion { .. } => "set-completion",
            Action::Replace(_) => "replace",
        }
    }
}

impl TrackerState {
    pub fn habit(&self, habit_id: &str) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == habit_id)
    }

    fn require_habit(&self, habit_id: &str) -> Result<(), HabitError> {
        self.habit(habit_id)
            .map(|_| ())
            .ok_or_else(|| HabitError::UnknownHabit(habit_id.to_string()))
    }
}

/// Computes the state after `action`. Fails without side effects when the
/// action refers to an unknown habit or produces an invalid one.
pub fn reduce(state: &TrackerState, action: Action) -> Result<TrackerState, HabitError> {
    let mut next = state.clone();
    match action {
        Action::AddHabit(habit) => {
            habit.validate()?;
            if next.habit(&habit.id).is_some() {
                return Err(HabitError::DuplicateHabit(habit.id));
            }
            next.habits.push(habit);
        }
        Action::UpdateHabit { habit_id, patch } => {
            let habit = next
                .habits
                .iter_mut()
                .find(|habit| habit.id == habit_id)
                .ok_or_else(|| HabitError::UnknownHabit(habit_id.clone()))?;
            habit.apply(&patch)?;
        }
        Action::DeleteHabit { habit_id } => {
            next.require_habit(&habit_id)?;
            next.habits.retain(|habit| habit.id != habit_id);
            next.completions = next.completions.remove_habit(&habit_id);
        }
        Action::ToggleCompletion { habit_id, date } => {
            next.require_habit(&habit_id)?;
            next.completions = next.completions.toggle(&habit_id, date);
        }
        Action::SetCompletion {
            habit_id,
            date,
            done,
        } => {
            next.require_habit(&habit_id)?;
            next.completions = next.completions.set(&habit_id, date, done);
        }
        Action::Replace(replacement) => {
            next = replacement;
        }
    }
    Ok(next)
}

type Subscriber<'a> = Box<dyn FnMut(&TrackerState) -> anyhow::Result<()> + 'a>;

/// Owns the current [`TrackerState`]. Updates go through [`StateStore::dispatch`];
/// subscribers run in registration order after each successful update.
pub struct StateStore<'a> {
    state: TrackerState,
    subscribers: Vec<Subscriber<'a>>,
}

impl fmt::Debug for StateStore<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl<'a> StateStore<'a> {
    pub fn new(state: TrackerState) -> Self {
        Self {
            state,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(&TrackerState) -> anyhow::Result<()> + 'a,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    /// Applies `action`. The new state is kept even when a subscriber fails;
    /// the first subscriber error is returned.
    #[instrument(skip(self, action), fields(action = action.name()))]
    pub fn dispatch(&mut self, action: Action) -> anyhow::Result<&TrackerState> {
        self.state = reduce(&self.state, action)?;
        debug!(
            habits = self.state.habits.len(),
            subscribers = self.subscribers.len(),
            "state updated"
        );

        let mut first_err = None;
        for subscriber in &mut self.subscribers {
            if let Err(err) = subscriber(&self.state) {
                tracing::error!(error = %err, "state subscriber failed");
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(&self.state),
        }
    }
}
