//! Prompt providers.
//!
//! Command handlers never talk to the terminal directly: they ask a
//! [`Prompter`], which is either the interactive terminal, the "accept every
//! default" provider used by `--yes`, or a scripted provider for headless runs.

use crate::error::{NbrError, Result};
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, MultiSelect, Select};
use std::cell::RefCell;
use std::collections::VecDeque;

pub const INPUT_QUESTION: &str = "请输入 > ";

pub trait Prompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool>;

    /// Ask for one line of text, re-asking until `validator` accepts it
    fn input(
        &self,
        prompt: &str,
        default: Option<&str>,
        validator: &dyn Fn(&str) -> bool,
        error_message: &str,
    ) -> Result<String>;

    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize>;

    fn multi_select(&self, prompt: &str, items: &[String], defaults: &[bool])
    -> Result<Vec<usize>>;

    /// Whether answers come from a human; titles are only printed then
    fn is_interactive(&self) -> bool {
        false
    }
}

/// Collect lines until an empty one, as for superusers or nicknames
pub fn prompt_input_list(prompter: &dyn Prompter, title: &str) -> Result<Vec<String>> {
    if prompter.is_interactive() {
        println!("{}", format!("{}（留空回车结束输入）", title).bold());
    }

    let mut result = Vec::new();
    for counter in 1.. {
        let answer = prompter.input(&format!("第 {} 项 > ", counter), None, &|_| true, "")?;
        let answer = answer.trim();
        if answer.is_empty() {
            break;
        }
        result.push(answer.to_string());
    }
    Ok(result)
}

/// Interactive terminal prompts
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    fn input(
        &self,
        prompt: &str,
        default: Option<&str>,
        validator: &dyn Fn(&str) -> bool,
        error_message: &str,
    ) -> Result<String> {
        let mut input = Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .validate_with(|text: &String| -> std::result::Result<(), String> {
                if validator(text) {
                    Ok(())
                } else {
                    Err(error_message.to_string())
                }
            });
        if let Some(default) = default {
            input = input.default(default.to_string());
        }
        Ok(input.interact_text()?)
    }

    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize> {
        Ok(Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact()?)
    }

    fn multi_select(
        &self,
        prompt: &str,
        items: &[String],
        defaults: &[bool],
    ) -> Result<Vec<usize>> {
        Ok(MultiSelect::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .defaults(defaults)
            .interact()?)
    }

    fn is_interactive(&self) -> bool {
        true
    }
}

/// Accepts every default without asking; backs `--yes`
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPrompter;

impl Prompter for DefaultPrompter {
    fn confirm(&self, _prompt: &str, default: bool) -> Result<bool> {
        Ok(default)
    }

    fn input(
        &self,
        prompt: &str,
        default: Option<&str>,
        validator: &dyn Fn(&str) -> bool,
        error_message: &str,
    ) -> Result<String> {
        let value = default.unwrap_or_default();
        if validator(value) {
            Ok(value.to_string())
        } else {
            Err(NbrError::invalid_argument(format!(
                "{} {}: {}",
                prompt, value, error_message
            )))
        }
    }

    fn select(&self, _prompt: &str, _items: &[String], default: usize) -> Result<usize> {
        Ok(default)
    }

    fn multi_select(
        &self,
        _prompt: &str,
        _items: &[String],
        defaults: &[bool],
    ) -> Result<Vec<usize>> {
        Ok(defaults
            .iter()
            .enumerate()
            .filter_map(|(i, d)| d.then_some(i))
            .collect())
    }
}

/// A queued answer for [`ScriptedPrompter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Text(String),
    Select(usize),
    Multi(Vec<usize>),
    /// Whatever the prompt's default is
    Default,
}

impl Answer {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Replays queued answers in order; running out of answers cancels.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<Answer>>,
    asked: RefCell<Vec<String>>,
    rejected: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: RefCell::new(answers.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Prompts asked so far, in order
    pub fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }

    /// Text answers that failed validation and caused a re-prompt
    pub fn rejected(&self) -> Vec<String> {
        self.rejected.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }

    fn next(&self, prompt: &str) -> Result<Answer> {
        self.asked.borrow_mut().push(prompt.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or(NbrError::Cancelled)
    }

    fn mismatch(prompt: &str, answer: &Answer) -> NbrError {
        NbrError::invalid_argument(format!("unexpected answer {:?} for '{}'", answer, prompt))
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        match self.next(prompt)? {
            Answer::Yes => Ok(true),
            Answer::No => Ok(false),
            Answer::Default => Ok(default),
            other => Err(Self::mismatch(prompt, &other)),
        }
    }

    fn input(
        &self,
        prompt: &str,
        default: Option<&str>,
        validator: &dyn Fn(&str) -> bool,
        _error_message: &str,
    ) -> Result<String> {
        loop {
            let value = match self.next(prompt)? {
                Answer::Text(text) if text.is_empty() => default.unwrap_or_default().to_string(),
                Answer::Text(text) => text,
                Answer::Default => default.unwrap_or_default().to_string(),
                other => return Err(Self::mismatch(prompt, &other)),
            };
            if validator(&value) {
                return Ok(value);
            }
            self.rejected.borrow_mut().push(value);
        }
    }

    fn select(&self, prompt: &str, items: &[String], default: usize) -> Result<usize> {
        match self.next(prompt)? {
            Answer::Select(i) if i < items.len() => Ok(i),
            Answer::Default => Ok(default),
            other => Err(Self::mismatch(prompt, &other)),
        }
    }

    fn multi_select(
        &self,
        prompt: &str,
        items: &[String],
        defaults: &[bool],
    ) -> Result<Vec<usize>> {
        match self.next(prompt)? {
            Answer::Multi(selected) if selected.iter().all(|i| *i < items.len()) => Ok(selected),
            Answer::Default => DefaultPrompter.multi_select(prompt, items, defaults),
            other => Err(Self::mismatch(prompt, &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompter_accepts_defaults() {
        let p = DefaultPrompter;
        assert!(p.confirm("continue?", true).unwrap());
        assert!(!p.confirm("continue?", false).unwrap());
        assert_eq!(p.input("host", Some("127.0.0.1"), &|_| true, "").unwrap(), "127.0.0.1");
        assert_eq!(p.select("pick", &["a".into(), "b".into()], 1).unwrap(), 1);
        assert_eq!(
            p.multi_select("pick", &["a".into(), "b".into(), "c".into()], &[true, false, true])
                .unwrap(),
            vec![0, 2]
        );
        assert!(p.input("port", Some("x"), &|s| s == "8080", "bad").is_err());
    }

    #[test]
    fn test_scripted_prompter_reprompts_on_invalid_input() {
        let p = ScriptedPrompter::new([
            Answer::text("abc"),
            Answer::text("70000"),
            Answer::text("8081"),
        ]);
        let port = p
            .input("port", Some("8080"), &crate::utils::string_utils::validate_port, "bad port")
            .unwrap();
        assert_eq!(port, "8081");
        assert_eq!(p.rejected(), vec!["abc", "70000"]);
        assert_eq!(p.asked().len(), 3);
    }

    #[test]
    fn test_scripted_prompter_cancels_when_exhausted() {
        let p = ScriptedPrompter::new([]);
        assert!(matches!(p.confirm("retry?", true), Err(NbrError::Cancelled)));
        assert_eq!(p.asked(), vec!["retry?"]);
    }

    #[test]
    fn test_prompt_input_list_stops_on_empty_line() {
        let p = ScriptedPrompter::new([
            Answer::text("12345"),
            Answer::text(" 678 "),
            Answer::text(""),
        ]);
        let list = prompt_input_list(&p, "superusers").unwrap();
        assert_eq!(list, vec!["12345", "678"]);
        assert_eq!(p.remaining(), 0);
    }

    #[test]
    fn test_prompt_input_list_with_defaults_is_empty() {
        assert!(prompt_input_list(&DefaultPrompter, "nicknames").unwrap().is_empty());
    }
}
