use std::fmt::Write as _;
use std::str::FromStr;

use fieldops_application::{ConfirmationState, StepStateMachine, WorkflowProgress, WorkflowSession};
use fieldops_core::AppError;

pub const HELP: &str = "commands: show | select <value> | text <value> | number <value> \
    | check <true|false> | submit | refresh | quit";

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    Select(String),
    Text(String),
    Number(String),
    Check(bool),
    Submit,
    Refresh,
    Quit,
    Help,
}

impl FromStr for Command {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, argument) = match line.split_once(char::is_whitespace) {
            Some((verb, argument)) => (verb, argument.trim()),
            None => (line, ""),
        };

        let require_argument = || {
            if argument.is_empty() {
                Err(AppError::Validation(format!("'{verb}' needs a value")))
            } else {
                Ok(argument.to_owned())
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "" | "show" => Ok(Self::Show),
            "select" => require_argument().map(Self::Select),
            "text" => require_argument().map(Self::Text),
            "number" => require_argument().map(Self::Number),
            "check" => match argument.to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" => Ok(Self::Check(true)),
                "false" | "no" | "n" => Ok(Self::Check(false)),
                _ => Err(AppError::Validation(
                    "'check' needs true or false".to_owned(),
                )),
            },
            "submit" => Ok(Self::Submit),
            "refresh" => Ok(Self::Refresh),
            "quit" | "exit" => Ok(Self::Quit),
            "help" => Ok(Self::Help),
            other => Err(AppError::Validation(format!(
                "unknown command '{other}'; {HELP}"
            ))),
        }
    }
}

/// Renders the session state shown after every command.
pub fn render(session: &WorkflowSession) -> String {
    let task = session.task();
    let mut output = format!(
        "task {} ({:.0}% complete)\n",
        task.id(),
        task.completion_percentage()
    );

    for step in task.steps() {
        let _ = writeln!(
            output,
            "  {:>3}. {:<32} {}",
            step.step_order(),
            step.name(),
            step.status().as_str()
        );
    }

    match session.progress() {
        WorkflowProgress::Complete => output.push_str("workflow complete\n"),
        WorkflowProgress::Stalled => {
            output.push_str(
                "workflow stalled: no step can be worked on, refresh or contact dispatch\n",
            );
        }
        WorkflowProgress::Active(_) => {
            if let Some(step) = session.active_step() {
                let _ = writeln!(output, "active: {}", step.name());
                let actions = StepStateMachine::allowed_actions(step)
                    .iter()
                    .map(|action| format!("{action:?}").to_ascii_lowercase())
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = writeln!(output, "allowed: {actions}");
            }
            if let Some(next) = session.next_step_preview() {
                let _ = writeln!(output, "next: {}", next.name());
            }

            let choices = session.outcome_choices();
            if !choices.is_empty() {
                let listed = choices
                    .iter()
                    .map(|choice| format!("{} ({})", choice.value, choice.label))
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = writeln!(output, "outcomes: {listed}");
            }

            let inputs = session.inputs();
            let _ = writeln!(
                output,
                "inputs: outcome={} text={} number={} check={}",
                inputs.selected_option().unwrap_or("-"),
                inputs.text_value().unwrap_or("-"),
                inputs.number_value().unwrap_or("-"),
                inputs
                    .checkbox_value()
                    .map_or_else(|| "-".to_owned(), |value| value.to_string())
            );
        }
    }

    match session.confirmation() {
        ConfirmationState::Idle => {}
        ConfirmationState::PendingConfirmation(_) => {
            output.push_str("completion pending confirmation, use 'refresh'\n");
        }
        ConfirmationState::Failed { error, .. } => {
            let _ = writeln!(output, "last completion failed: {error}; use 'submit' to retry");
        }
    }

    output
}
