use std::sync::Mutex;

use log::{info, warn};

/// Machine readable progress notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Warning { message: String },
    /// An encryption finished successfully.
    EndEncryption,
    FileStart { name: String },
    FileDone { name: String },
    FileFailed { name: String, reason: String },
}

/// Receives [`StatusEvent`]s. Shared between operations, so it takes `&self`.
pub trait StatusSink: Send + Sync {
    fn emit(&self, event: StatusEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn emit(&self, event: StatusEvent) {
        match event {
            StatusEvent::Warning { message } => warn!("{}", message),
            StatusEvent::EndEncryption => info!("END_ENCRYPTION"),
            StatusEvent::FileStart { name } => info!("FILE_START {}", name),
            StatusEvent::FileDone { name } => info!("FILE_DONE {}", name),
            StatusEvent::FileFailed { name, reason } => info!("FILE_FAILED {} {}", name, reason),
        }
    }
}

/// Collects all events, mostly useful in tests.
#[derive(Debug, Default)]
pub struct StatusRecorder {
    events: Mutex<Vec<StatusEvent>>,
}

impl StatusRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the events so far.
    pub fn events(&self) -> Vec<StatusEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StatusEvent::Warning { message } => Some(message),
                _ => None,
            })
            .collect()
    }
}

impl StatusSink for StatusRecorder {
    fn emit(&self, event: StatusEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

impl<S: StatusSink + ?Sized> StatusSink for &S {
    fn emit(&self, event: StatusEvent) {
        (**self).emit(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_keeps_order() {
        let recorder = StatusRecorder::new();
        recorder.emit(StatusEvent::FileStart { name: "a".into() });
        recorder.emit(StatusEvent::Warning {
            message: "careful".into(),
        });
        recorder.emit(StatusEvent::FileDone { name: "a".into() });

        assert_eq!(recorder.events().len(), 3);
        assert_eq!(recorder.warnings(), vec!["careful".to_string()]);

        let by_ref: &dyn StatusSink = &recorder;
        by_ref.emit(StatusEvent::EndEncryption);
        assert_eq!(recorder.events()[3], StatusEvent::EndEncryption);
    }

    #[test]
    fn log_status_accepts_everything() {
        let _ = pretty_env_logger::try_init();
        LogStatus.emit(StatusEvent::FileFailed {
            name: "x".into(),
            reason: "boom".into(),
        });
    }
}
