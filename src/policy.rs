use crate::config::EngagementConfig;
use crate::types::{OngoingThread, OpenLoop, Task};
use serde::{Deserialize, Serialize};

const STATE_PREVIEW_CHARS: usize = 60;

/// Cutoffs for proactive interruption. Both sit deliberately close to 1.0 so
/// most candidates stay silent.
#[derive(Debug, Clone, Copy)]
pub struct PolicyThresholds {
    pub loop_salience: f64,
    pub thread_intensity: f64,
}

impl Default for PolicyThresholds {
    fn default() -> Self {
        Self {
            loop_salience: 0.8,
            thread_intensity: 0.9,
        }
    }
}

impl From<&EngagementConfig> for PolicyThresholds {
    fn from(config: &EngagementConfig) -> Self {
        Self {
            loop_salience: config.loop_salience_threshold,
            thread_intensity: config.thread_intensity_threshold,
        }
    }
}

/// Everything the idle-breaker decision looks at for one evaluation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyInputs<'a> {
    pub open_loop: Option<&'a OpenLoop>,
    pub active_thread: Option<&'a OngoingThread>,
    pub high_priority_tasks: &'a [Task],
    pub checkins_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdleAction {
    AskAboutLoop,
    ShareUrgentThought,
    TaskReminder,
    CheckIn,
}

impl IdleAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AskAboutLoop => "ask_about_loop",
            Self::ShareUrgentThought => "share_urgent_thought",
            Self::TaskReminder => "task_reminder",
            Self::CheckIn => "check_in",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdleBreakerAction {
    pub action: IdleAction,
    pub reason: String,
}

/// Decide whether (and how) to break the silence. At most one action per
/// call; strict priority order, first match wins:
///
/// 1. High-salience open loop.
/// 2. High-intensity ongoing thread.
/// 3. Check-ins disabled → stay silent.
/// 4. High-priority task reminder.
/// 5. Nothing worth saying.
pub fn determine_idle_breaker_action(
    inputs: &PolicyInputs<'_>,
    thresholds: &PolicyThresholds,
) -> Option<IdleBreakerAction> {
    if let Some(open_loop) = inputs.open_loop {
        if open_loop.salience >= thresholds.loop_salience {
            return Some(IdleBreakerAction {
                action: IdleAction::AskAboutLoop,
                reason: format!(
                    "open loop \"{}\" at salience {:.2}",
                    open_loop.topic, open_loop.salience
                ),
            });
        }
    }

    if let Some(thread) = inputs.active_thread {
        if thread.intensity >= thresholds.thread_intensity {
            return Some(IdleBreakerAction {
                action: IdleAction::ShareUrgentThought,
                reason: format!(
                    "urgent thought \"{}\" at intensity {:.2}",
                    preview(&thread.current_state),
                    thread.intensity
                ),
            });
        }
    }

    if !inputs.checkins_enabled {
        return None;
    }

    if let Some(task) = inputs.high_priority_tasks.first() {
        return Some(IdleBreakerAction {
            action: IdleAction::TaskReminder,
            reason: format!("high-priority task: {}", task.text),
        });
    }

    None
}

/// Placeholder input for the downstream generation call, which rejects empty
/// input even when there is no real user message. Never returns an empty
/// string.
pub fn generate_input_topic(action: IdleAction, topic: Option<&str>) -> String {
    let topic = topic.map(str::trim).filter(|t| !t.is_empty());
    let description = match (action, topic) {
        (IdleAction::AskAboutLoop, Some(t)) => format!("ask about {t}"),
        (IdleAction::AskAboutLoop, None) => "ask about an open topic".to_string(),
        (IdleAction::ShareUrgentThought, Some(t)) => format!("share a thought about {t}"),
        (IdleAction::ShareUrgentThought, None) => "share an urgent thought".to_string(),
        (IdleAction::TaskReminder, Some(t)) => format!("remind about task: {t}"),
        (IdleAction::TaskReminder, None) => "remind about a pending task".to_string(),
        (IdleAction::CheckIn, _) => "send a friendly check-in".to_string(),
    };
    format!("[PROACTIVE: {description}]")
}

fn preview(state: &str) -> String {
    let mut out: String = state.chars().take(STATE_PREVIEW_CHARS).collect();
    if state.chars().count() > STATE_PREVIEW_CHARS {
        out.push('…');
    }
    out
}
