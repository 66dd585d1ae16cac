//! Last-resort termination of the automated application's process.

use tracing::{debug, info, warn};

use crate::automation::ProcessTerminator;
use crate::error::{ProcessError, ReportError};

/// Result of a [`kill_if_alive`] attempt.
#[derive(Debug)]
pub enum KillOutcome {
    Terminated,
    /// No termination handle could be acquired; normally the process exited on its own.
    NotRunning,
    /// The process was found but could not be stopped. Logged, never propagated.
    Failed(ReportError),
}

/// Force-terminate `pid` if it is still running.
pub fn kill_if_alive<T: ProcessTerminator + ?Sized>(terminator: &T, pid: u32) -> KillOutcome {
    if pid == 0 {
        return KillOutcome::NotRunning;
    }
    match terminator.terminate_process(pid) {
        Ok(()) => {
            info!("Terminated residual application process {pid}");
            KillOutcome::Terminated
        }
        Err(ProcessError::NotFound(_)) => {
            debug!("Application process {pid} is no longer running");
            KillOutcome::NotRunning
        }
        Err(source) => {
            let error = ReportError::ProcessTerminationFailed { pid, source };
            warn!("{error}");
            KillOutcome::Failed(error)
        }
    }
}

/// Tracks the process id of one session and terminates it when dropped.
pub struct ProcessWatchdog<'b, T: ProcessTerminator + ?Sized> {
    terminator: &'b T,
    pid: Option<u32>,
}

impl<'b, T: ProcessTerminator + ?Sized> ProcessWatchdog<'b, T> {
    pub fn new(terminator: &'b T) -> Self {
        Self {
            terminator,
            pid: None,
        }
    }

    pub fn track(&mut self, pid: u32) {
        debug!("Watching application process {pid}");
        self.pid = Some(pid);
    }

    pub fn tracked(&self) -> Option<u32> {
        self.pid
    }
}

impl<T: ProcessTerminator + ?Sized> Drop for ProcessWatchdog<'_, T> {
    fn drop(&mut self) {
        if let Some(pid) = self.pid.take() {
            kill_if_alive(self.terminator, pid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::AutomationBackend;
    use crate::fake::{FakeDocument, FakeFaults, FakeWord, TerminateBehavior, FAKE_PROCESS_ID};

    #[test]
    fn test_kill_if_alive_outcomes() {
        let word = FakeWord::with_faults(
            FakeDocument::new(),
            FakeFaults {
                terminate: TerminateBehavior::Refuse,
                ..Default::default()
            },
        );
        assert!(matches!(kill_if_alive(&word, 0), KillOutcome::NotRunning));
        assert!(matches!(kill_if_alive(&word, FAKE_PROCESS_ID), KillOutcome::NotRunning));

        let app = word.create_object("Word.Application").unwrap();
        assert!(matches!(
            kill_if_alive(&word, FAKE_PROCESS_ID),
            KillOutcome::Failed(ReportError::ProcessTerminationFailed { .. })
        ));
        word.release(app).unwrap();
    }

    #[test]
    fn test_watchdog_fires_on_drop() {
        let word = FakeWord::new(FakeDocument::new());
        let app = word.create_object("Word.Application").unwrap();
        {
            let mut watchdog = ProcessWatchdog::new(&word);
            watchdog.track(FAKE_PROCESS_ID);
            assert_eq!(watchdog.tracked(), Some(FAKE_PROCESS_ID));
        }
        assert!(!word.process_alive());
        word.release(app).unwrap();
    }
}
