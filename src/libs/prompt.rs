// This module resolves the configuration's choice points into `UserChoices`.
//
// Resolution order for each choice:
// 1. A `--set name=value` preset from the command line.
// 2. One line of interactive input, when the run is interactive.
// 3. The choice's documented default.
// Empty input selects the default. A value outside the allowed set is replaced
// by the default with a visible notice; resolution itself never fails on bad
// input, only on I/O errors while reading.

use crate::schemas::config::ChoicePoint;
use crate::schemas::errors::ProvisionError;
use crate::schemas::plan::UserChoices;
use crate::{log_debug, log_info, log_warn};
use colored::Colorize;
use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use std::collections::BTreeMap;
use std::io;

/// Where interactive answers come from.
pub trait LineSource {
    /// Reads one answer for `choice`. An empty string means "use the default".
    fn read_line(&mut self, choice: &ChoicePoint) -> io::Result<String>;
}

/// Terminal input through `dialoguer`.
pub struct TerminalLineSource;

impl LineSource for TerminalLineSource {
    fn read_line(&mut self, choice: &ChoicePoint) -> io::Result<String> {
        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("{} [{}] (default: {})", choice.prompt, choice.allowed.join("/"), choice.default))
            .allow_empty(true)
            .interact_text()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

/// Resolves every choice point.
///
/// # Arguments
/// * `choice_points`: declared choices, resolved in declaration order.
/// * `presets`: values given on the command line; they skip prompting.
/// * `source`: consulted only when `interactive` is `true`.
pub fn resolve(
    choice_points: &[ChoicePoint],
    presets: &BTreeMap<String, String>,
    source: &mut dyn LineSource,
    interactive: bool,
) -> Result<UserChoices, ProvisionError> {
    let mut choices = UserChoices::default();

    for name in presets.keys() {
        if !choice_points.iter().any(|choice| &choice.name == name) {
            let notice = format!("'{name}' is not a declared choice; ignoring it.");
            log_warn!("[Prompt] {}", notice);
            choices.notices.push(notice);
        }
    }

    for choice in choice_points {
        let (raw, origin) = match presets.get(&choice.name) {
            Some(value) => (value.clone(), "preset"),
            None if interactive => {
                let answer = source
                    .read_line(choice)
                    .map_err(|e| ProvisionError::Prompt(format!("reading '{}': {e}", choice.name)))?;
                (answer, "input")
            }
            None => (String::new(), "default"),
        };

        let answer = raw.trim();
        let value = if answer.is_empty() {
            choice.default.clone()
        } else if choice.accepts(answer) {
            answer.to_string()
        } else {
            let notice = format!(
                "'{}' is not a valid {} ({}); using default '{}'.",
                answer,
                choice.name,
                choice.allowed.join(", "),
                choice.default
            );
            log_warn!("[Prompt] {}", notice.yellow());
            choices.notices.push(notice);
            choice.default.clone()
        };

        log_debug!("[Prompt] {} = {} ({})", choice.name, value, origin);
        choices.set(&choice.name, &value);
    }

    if !choice_points.is_empty() {
        let summary: Vec<String> = choices.values.iter().map(|(k, v)| format!("{k}={v}")).collect();
        log_info!("[Prompt] Choices: {}", summary.join(", ").cyan());
    }
    Ok(choices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted {
        answers: VecDeque<String>,
        asked: Vec<String>,
    }

    impl Scripted {
        fn new(answers: &[&str]) -> Self {
            Scripted {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                asked: Vec::new(),
            }
        }
    }

    impl LineSource for Scripted {
        fn read_line(&mut self, choice: &ChoicePoint) -> io::Result<String> {
            self.asked.push(choice.name.clone());
            Ok(self.answers.pop_front().unwrap_or_default())
        }
    }

    struct Broken;

    impl LineSource for Broken {
        fn read_line(&mut self, _choice: &ChoicePoint) -> io::Result<String> {
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"))
        }
    }

    fn points() -> Vec<ChoicePoint> {
        vec![
            ChoicePoint {
                name: "node_version".into(),
                prompt: "Node.js major version".into(),
                allowed: vec!["18".into(), "20".into(), "22".into()],
                default: "20".into(),
            },
            ChoicePoint {
                name: "reverse_proxy".into(),
                prompt: "Configure nginx?".into(),
                allowed: vec!["yes".into(), "no".into()],
                default: "no".into(),
            },
        ]
    }

    #[test]
    fn test_non_interactive_uses_defaults_without_reading() {
        let mut source = Scripted::new(&["22", "yes"]);
        let choices = resolve(&points(), &BTreeMap::new(), &mut source, false).unwrap();
        assert_eq!(choices.get("node_version"), Some("20"));
        assert_eq!(choices.get("reverse_proxy"), Some("no"));
        assert!(source.asked.is_empty());
        assert!(choices.notices.is_empty());
    }

    #[test]
    fn test_interactive_answers_and_empty_line_default() {
        let mut source = Scripted::new(&["22", ""]);
        let choices = resolve(&points(), &BTreeMap::new(), &mut source, true).unwrap();
        assert_eq!(choices.get("node_version"), Some("22"));
        assert_eq!(choices.get("reverse_proxy"), Some("no"));
        assert_eq!(source.asked, vec!["node_version", "reverse_proxy"]);
    }

    #[test]
    fn test_invalid_input_is_corrected_with_notice() {
        let mut source = Scripted::new(&["16", " yes "]);
        let choices = resolve(&points(), &BTreeMap::new(), &mut source, true).unwrap();
        assert_eq!(choices.get("node_version"), Some("20"));
        assert_eq!(choices.get("reverse_proxy"), Some("yes"));
        assert_eq!(choices.notices.len(), 1);
        assert!(choices.notices[0].contains("'16'"));
    }

    #[test]
    fn test_presets_skip_prompting_and_are_validated() {
        let mut presets = BTreeMap::new();
        presets.insert("reverse_proxy".to_string(), "maybe".to_string());
        presets.insert("tunnel".to_string(), "yes".to_string());
        let mut source = Scripted::new(&["18"]);
        let choices = resolve(&points(), &presets, &mut source, true).unwrap();
        assert_eq!(choices.get("node_version"), Some("18"));
        assert_eq!(choices.get("reverse_proxy"), Some("no"));
        assert_eq!(choices.get("tunnel"), None);
        assert_eq!(source.asked, vec!["node_version"]);
        assert_eq!(choices.notices.len(), 2);
    }

    #[test]
    fn test_read_failure_is_a_prompt_error() {
        let result = resolve(&points(), &BTreeMap::new(), &mut Broken, true);
        assert!(matches!(result, Err(ProvisionError::Prompt(_))));
    }
}
