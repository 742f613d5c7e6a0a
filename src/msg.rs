use std::sync::mpsc;

/// Severity of a notice pushed through the notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn label(&self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub text: String,
}

/// All messages the engine emits towards its presentation client.
#[derive(Debug)]
pub enum Msg {
    // -- Routine progress, skips and failures
    Notify(Notice),

    // -- Background new-commit queries
    NewCommits {
        name: String,
        lines: Result<Vec<String>, String>,
    },
}

/// Sending half of the notification channel. Every notice is also logged.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::Sender<Msg>,
}

impl Notifier {
    pub fn new(tx: mpsc::Sender<Msg>) -> Self {
        Self { tx }
    }

    pub fn sender(&self) -> &mpsc::Sender<Msg> {
        &self.tx
    }

    pub fn info(&self, text: impl Into<String>) {
        self.push(Level::Info, text.into());
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.push(Level::Warn, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.push(Level::Error, text.into());
    }

    fn push(&self, level: Level, text: String) {
        match level {
            Level::Info => tracing::info!("{text}"),
            Level::Warn => tracing::warn!("{text}"),
            Level::Error => tracing::error!("{text}"),
        }

        // A dropped receiver only means nobody is presenting notices any more.
        let _ = self.tx.send(Msg::Notify(Notice { level, text }));
    }
}
