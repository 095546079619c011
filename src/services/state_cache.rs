//! Last accepted request per category.
//!
//! This records what clients asked for, not what the strip is doing: the IR
//! link gives no feedback and the remote can change the strip at any time.

use super::command_table::{Brightness, Category, Color, Command, Function, Power};
use std::fmt::Write;

pub const UNKNOWN: &str = "unknown";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestedState {
    pub raw: Option<u8>,
    pub brightness: Option<Brightness>,
    pub power: Option<Power>,
    pub function: Option<Function>,
    pub color: Option<Color>,
    pub last_path: Option<String>,
}

impl RequestedState {
    /// Record an accepted table command. Also mirrors the code into `raw`.
    pub fn record(&mut self, command: Command) {
        match command {
            Command::Brightness(value) => self.brightness = Some(value),
            Command::Power(value) => self.power = Some(value),
            Command::Function(value) => self.function = Some(value),
            Command::Color(value) => self.color = Some(value),
        }
        self.raw = Some(command.code());
    }

    pub fn record_raw(&mut self, code: u8) {
        self.raw = Some(code);
    }

    pub fn visit(&mut self, path: &str) {
        self.last_path = Some(path.to_string());
    }

    /// Cached value of a category as shown to clients.
    pub fn value(&self, category: Category) -> String {
        let value = match category {
            Category::Raw => self.raw.map(|code| code.to_string()),
            Category::Brightness => self.brightness.map(|value| value.to_string()),
            Category::Power => self.power.map(|value| value.to_string()),
            Category::Function => self.function.map(|value| value.to_string()),
            Category::Color => self.color.map(|value| value.to_string()),
        };

        value.unwrap_or_else(|| UNKNOWN.to_string())
    }

    /// Multi-line dump served on `/cached-state`.
    pub fn dump(&self) -> String {
        let mut text = String::from("IR Controlled LED Strip Web Service\n\nCached State:\n");

        for category in Category::ALL {
            let _ = writeln!(text, "\t{category}: {}", self.value(category));
        }
        let _ = writeln!(
            text,
            "\turi: {}",
            self.last_path.as_deref().unwrap_or(UNKNOWN)
        );

        text
    }
}
