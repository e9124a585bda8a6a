use bytes::Bytes;
use chrono::Utc;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const DEFAULT_COMMAND: &str = "none";

/// Command recorded whenever a new image is stored.
pub const IMAGE_COMMAND: &str = "image";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
}

impl Action {
    /// Case-insensitive; anything other than up/down is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "up" => Some(Action::Up),
            "down" => Some(Action::Down),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Down => "down",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSnapshot {
    pub command: String,
    pub action: Option<Action>,
    pub updated_at_millis: i64,
}

impl Default for CommandSnapshot {
    fn default() -> Self {
        CommandSnapshot {
            command: DEFAULT_COMMAND.to_string(),
            action: None,
            updated_at_millis: 0,
        }
    }
}

// Wire format of GET /lastCommand: `command,action,millis`, no escaping.
impl fmt::Display for CommandSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{}",
            self.command,
            self.action.map(Action::as_str).unwrap_or(""),
            self.updated_at_millis
        )
    }
}

#[derive(Default)]
struct Inner {
    command: CommandSnapshot,
    image: Bytes,
}

impl Inner {
    fn record_command(&mut self, command: String, action: Option<Action>) {
        // Never go backwards, even if the wall clock does.
        let now = Utc::now().timestamp_millis().max(self.command.updated_at_millis);
        self.command = CommandSnapshot {
            command,
            action,
            updated_at_millis: now,
        };
    }
}

/// Latest command and latest image, shared by every connection.
///
/// All operations take the same lock, so a reader always sees the result of
/// exactly one completed write for each field group.
#[derive(Clone, Default)]
pub struct RelayState {
    inner: Arc<Mutex<Inner>>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_command(&self, command: impl Into<String>, action: Action) {
        let command = command.into();
        self.lock().record_command(command, Some(action));
    }

    /// Replaces the image and records an `image` command with no action.
    pub fn update_image(&self, image: Bytes) {
        let mut inner = self.lock();
        inner.image = image;
        inner.record_command(IMAGE_COMMAND.to_string(), None);
    }

    pub fn command_snapshot(&self) -> CommandSnapshot {
        self.lock().command.clone()
    }

    pub fn image_snapshot(&self) -> Bytes {
        self.lock().image.clone()
    }

    // Writes are single assignments, so the data behind a poisoned lock is still whole.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
