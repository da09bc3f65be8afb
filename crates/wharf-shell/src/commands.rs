#![forbid(unsafe_code)]
//! Commands and keybindings.
//!
//! A command is an id, a label and an async handler. Keybindings map
//! parsed key combos to command ids; dispatch looks the combo up and runs
//! the command. A binding whose command was never registered is logged
//! and skipped at dispatch time rather than failing registration, so
//! bindings and commands can be installed in any order.

use crate::sync::lock;
use bitflags::bitflags;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// A command with this id is already registered.
    Duplicate(String),
    /// No command with this id exists.
    Unknown(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Duplicate(id) => write!(f, "command '{id}' is already registered"),
            CommandError::Unknown(id) => write!(f, "unknown command '{id}'"),
        }
    }
}

impl std::error::Error for CommandError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyComboError {
    Empty,
    UnknownModifier(String),
    UnknownKey(String),
}

impl fmt::Display for KeyComboError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyComboError::Empty => write!(f, "empty key combo"),
            KeyComboError::UnknownModifier(token) => write!(f, "unknown modifier '{token}'"),
            KeyComboError::UnknownKey(token) => write!(f, "unknown key '{token}'"),
        }
    }
}

impl std::error::Error for KeyComboError {}

// ─────────────────────────────────────────────────────────────────────────────
// Key combos
// ─────────────────────────────────────────────────────────────────────────────

bitflags! {
    /// Modifier keys held as part of a combo.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const CTRL  = 1 << 0;
        const ALT   = 1 << 1;
        const SHIFT = 1 << 2;
        const META  = 1 << 3;
    }
}

/// The non-modifier part of a combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Left,
    Right,
    Up,
    Down,
    Enter,
    Escape,
    Tab,
}

/// A parsed keybinding trigger, e.g. `alt shift w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    pub key: Key,
}

impl KeyCombo {
    #[must_use]
    pub const fn new(modifiers: Modifiers, key: Key) -> Self {
        KeyCombo { modifiers, key }
    }

    /// Parse a space-separated combo: modifiers first, key last.
    /// Accepted modifiers: `ctrl`/`control`, `alt`, `shift`,
    /// `meta`/`cmd`/`super`. Keys are single characters or the named keys
    /// `left`, `right`, `up`, `down`, `enter`, `escape`, `tab`, `space`.
    pub fn parse(text: &str) -> Result<KeyCombo, KeyComboError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let Some((key_token, mod_tokens)) = tokens.split_last() else {
            return Err(KeyComboError::Empty);
        };

        let mut modifiers = Modifiers::empty();
        for token in mod_tokens {
            match token.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers |= Modifiers::CTRL,
                "alt" => modifiers |= Modifiers::ALT,
                "shift" => modifiers |= Modifiers::SHIFT,
                "meta" | "cmd" | "super" => modifiers |= Modifiers::META,
                other => return Err(KeyComboError::UnknownModifier(other.to_owned())),
            }
        }

        let lowered = key_token.to_ascii_lowercase();
        let key = match lowered.as_str() {
            "left" => Key::Left,
            "right" => Key::Right,
            "up" => Key::Up,
            "down" => Key::Down,
            "enter" | "return" => Key::Enter,
            "escape" | "esc" => Key::Escape,
            "tab" => Key::Tab,
            "space" => Key::Char(' '),
            single if single.chars().count() == 1 => {
                Key::Char(single.chars().next().unwrap_or(' '))
            }
            other => return Err(KeyComboError::UnknownKey(other.to_owned())),
        };
        Ok(KeyCombo { modifiers, key })
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, name) in [
            (Modifiers::CTRL, "ctrl"),
            (Modifiers::ALT, "alt"),
            (Modifiers::SHIFT, "shift"),
            (Modifiers::META, "meta"),
        ] {
            if self.modifiers.contains(flag) {
                write!(f, "{name} ")?;
            }
        }
        match self.key {
            Key::Char(c) => write!(f, "{c}"),
            Key::Left => write!(f, "left"),
            Key::Right => write!(f, "right"),
            Key::Up => write!(f, "up"),
            Key::Down => write!(f, "down"),
            Key::Enter => write!(f, "enter"),
            Key::Escape => write!(f, "escape"),
            Key::Tab => write!(f, "tab"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command registry
// ─────────────────────────────────────────────────────────────────────────────

/// Public description of a registered command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub id: String,
    pub label: String,
}

type Handler = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct CommandEntry {
    label: String,
    handler: Handler,
}

/// Registry of executable commands. Cheap to clone.
#[derive(Clone)]
pub struct CommandRegistry {
    entries: Arc<Mutex<HashMap<String, CommandEntry>>>,
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        CommandRegistry {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a command. Re-registering an id is an error so conflicting
    /// features surface at startup instead of silently shadowing.
    pub fn register<F, Fut>(
        &self,
        id: impl Into<String>,
        label: impl Into<String>,
        handler: F,
    ) -> Result<(), CommandError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = id.into();
        let mut entries = lock(&self.entries);
        if entries.contains_key(&id) {
            return Err(CommandError::Duplicate(id));
        }
        entries.insert(
            id,
            CommandEntry {
                label: label.into(),
                handler: Arc::new(move || handler().boxed()),
            },
        );
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        lock(&self.entries).contains_key(id)
    }

    /// Registered commands, sorted by id.
    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        let entries = lock(&self.entries);
        let mut out: Vec<Command> = entries
            .iter()
            .map(|(id, entry)| Command {
                id: id.clone(),
                label: entry.label.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Run a command's handler to completion.
    pub fn execute(&self, id: &str) -> BoxFuture<'static, Result<(), CommandError>> {
        let handler = lock(&self.entries).get(id).map(|e| Arc::clone(&e.handler));
        match handler {
            Some(handler) => {
                let fut = handler();
                async move {
                    fut.await;
                    Ok(())
                }
                .boxed()
            }
            None => {
                let id = id.to_owned();
                async move { Err(CommandError::Unknown(id)) }.boxed()
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Keybinding registry
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct Keybinding {
    combo: KeyCombo,
    command: String,
}

/// Maps key combos to command ids. Cheap to clone.
#[derive(Clone)]
pub struct KeybindingRegistry {
    commands: CommandRegistry,
    bindings: Arc<Mutex<Vec<Keybinding>>>,
}

impl KeybindingRegistry {
    #[must_use]
    pub fn new(commands: CommandRegistry) -> Self {
        KeybindingRegistry {
            commands,
            bindings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Bind a combo to a command id, replacing any previous binding for
    /// the same combo. The command need not exist yet.
    pub fn bind(&self, combo: KeyCombo, command: impl Into<String>) {
        let command = command.into();
        let mut bindings = lock(&self.bindings);
        if let Some(existing) = bindings.iter_mut().find(|b| b.combo == combo) {
            existing.command = command;
        } else {
            bindings.push(Keybinding { combo, command });
        }
    }

    /// The command id bound to a combo.
    #[must_use]
    pub fn lookup(&self, combo: &KeyCombo) -> Option<String> {
        lock(&self.bindings)
            .iter()
            .find(|b| b.combo == *combo)
            .map(|b| b.command.clone())
    }

    /// All bindings as `(combo, command id)` pairs.
    #[must_use]
    pub fn bindings(&self) -> Vec<(KeyCombo, String)> {
        lock(&self.bindings)
            .iter()
            .map(|b| (b.combo, b.command.clone()))
            .collect()
    }

    /// Run the command bound to a combo. Returns whether a command ran.
    /// A combo bound to a command that was never registered is logged and
    /// skipped.
    pub fn dispatch(&self, combo: &KeyCombo) -> BoxFuture<'static, bool> {
        let Some(command) = self.lookup(combo) else {
            return std::future::ready(false).boxed();
        };
        let commands = self.commands.clone();
        let combo = *combo;
        async move {
            match commands.execute(&command).await {
                Ok(()) => {
                    debug!(combo = %combo, command = %command, "dispatched");
                    true
                }
                Err(err) => {
                    warn!(combo = %combo, error = %err, "keybinding points at a missing command");
                    false
                }
            }
        }
        .boxed()
    }
}
