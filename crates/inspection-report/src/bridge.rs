//! Subprocess management and JSON IPC for the automation bridge process.
//!
//! On Linux the bridge is a Windows executable run under WINE; on Windows it
//! runs natively. Either way it holds the real COM objects and exposes them to
//! this process as [`ObjectId`]s over newline-delimited JSON on stdio.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use word_com_protocol::{Command as BridgeCommand, FaultKind, Request, Response, ResponseResult};

use crate::automation::{expect_object, AutomationBackend, ObjectId, ProcessTerminator, Value};
use crate::error::{AutomationError, ProcessError};

/// Name of the bridge executable.
pub const BRIDGE_EXE_NAME: &str = "word-com-bridge.exe";

/// How to start the bridge process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Path to the bridge executable. Searched for next to the current
    /// binary and in the cross-compilation target directory when unset.
    pub bridge_exe_path: Option<PathBuf>,

    /// WINE launcher. `None` runs the bridge directly.
    pub wine_path: Option<PathBuf>,

    /// Optional WINEPREFIX, for isolating the WINE environment.
    pub wine_prefix: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bridge_exe_path: None,
            wine_path: if cfg!(windows) {
                None
            } else {
                Some(PathBuf::from("wine"))
            },
            wine_prefix: None,
        }
    }
}

type Input = Box<dyn Write + Send>;
type Output = Box<dyn BufRead + Send>;

/// [`AutomationBackend`] backed by the bridge process.
pub struct BridgeBackend {
    child: Mutex<Option<Child>>,
    stdin: Mutex<Input>,
    stdout: Mutex<Output>,
    next_id: AtomicU64,
    wine: bool,
    stopped: AtomicBool,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BridgeBackend {
    /// Start the bridge process and initialize COM inside it.
    pub fn start(config: &BridgeConfig) -> Result<Self, AutomationError> {
        let exe_path = config
            .bridge_exe_path
            .clone()
            .unwrap_or_else(find_bridge_exe);

        if !exe_path.exists() {
            return Err(AutomationError::BridgeExeNotFound(
                exe_path.display().to_string(),
            ));
        }

        let mut cmd = match &config.wine_path {
            Some(wine) => {
                let mut cmd = std::process::Command::new(wine);
                cmd.arg(&exe_path);
                cmd
            }
            None => std::process::Command::new(&exe_path),
        };
        if let Some(prefix) = &config.wine_prefix {
            cmd.env("WINEPREFIX", prefix);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::inherit()); // Bridge diagnostics go to our stderr

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound && config.wine_path.is_some() {
                AutomationError::WineNotFound
            } else {
                AutomationError::SpawnFailed(e)
            }
        })?;
        info!("Started bridge {} (pid {})", exe_path.display(), child.id());

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AutomationError::Protocol("bridge stdin was not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AutomationError::Protocol("bridge stdout was not piped".into()))?;

        let bridge = Self::from_parts(
            Some(child),
            Box::new(stdin),
            Box::new(BufReader::new(stdout)),
            config.wine_path.is_some(),
        );
        bridge.send_command(BridgeCommand::Init)?;
        Ok(bridge)
    }

    fn from_parts(child: Option<Child>, stdin: Input, stdout: Output, wine: bool) -> Self {
        Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(stdout),
            next_id: AtomicU64::new(1),
            wine,
            stopped: AtomicBool::new(false),
        }
    }

    /// Send a command to the bridge and wait for the response.
    fn send_command(&self, command: BridgeCommand) -> Result<Option<Value>, AutomationError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(AutomationError::NotRunning);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let request = Request { id, command };
        let json = serde_json::to_string(&request)?;
        trace!("-> {json}");

        {
            let mut stdin = lock(&self.stdin);
            writeln!(stdin, "{json}")
                .and_then(|()| stdin.flush())
                .map_err(|e| AutomationError::Protocol(format!("send failed: {e}")))?;
        }

        let response: Response = {
            let mut stdout = lock(&self.stdout);
            let mut line = String::new();
            stdout
                .read_line(&mut line)
                .map_err(|e| AutomationError::Protocol(format!("read failed: {e}")))?;

            if line.is_empty() {
                return Err(AutomationError::NotRunning);
            }
            trace!("<- {}", line.trim_end());
            serde_json::from_str(&line)?
        };

        if response.id != id {
            return Err(AutomationError::Protocol(format!(
                "response id {} does not match request id {id}",
                response.id
            )));
        }

        match response.result {
            ResponseResult::Ok { value } => Ok(value),
            ResponseResult::Error { message, kind } => {
                Err(AutomationError::Bridge { kind, message })
            }
        }
    }

    fn send_value(&self, command: BridgeCommand) -> Result<Value, AutomationError> {
        Ok(self.send_command(command)?.unwrap_or(Value::Empty))
    }

    /// Shut down the bridge: release everything it still holds and wait for it to exit.
    pub fn shutdown(self) -> Result<(), AutomationError> {
        self.stop()
    }

    fn stop(&self) -> Result<(), AutomationError> {
        if self.stopped.load(Ordering::Acquire) {
            return Ok(());
        }
        let result = self.send_command(BridgeCommand::Shutdown).map(|_| ());
        self.stopped.store(true, Ordering::Release);

        if let Some(mut child) = lock(&self.child).take() {
            match child.wait() {
                Ok(status) => debug!("Bridge exited with {status}"),
                Err(e) => warn!("Waiting for the bridge to exit failed: {e}"),
            }
        }
        result
    }
}

impl Drop for BridgeBackend {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            debug!("Bridge shutdown failed: {e}");
        }
    }
}

impl ProcessTerminator for BridgeBackend {
    fn terminate_process(&self, pid: u32) -> Result<(), ProcessError> {
        match self.send_command(BridgeCommand::TerminateProcess { pid }) {
            Ok(_) => Ok(()),
            Err(AutomationError::Bridge {
                kind: FaultKind::ProcessNotFound,
                ..
            }) => Err(ProcessError::NotFound(pid)),
            Err(AutomationError::Bridge {
                kind: FaultKind::TerminateFailed,
                message,
            }) => Err(ProcessError::TerminateFailed { pid, message }),
            Err(e) => Err(e.into()),
        }
    }
}

impl AutomationBackend for BridgeBackend {
    fn create_object(&self, prog_id: &str) -> Result<ObjectId, AutomationError> {
        let value = self.send_value(BridgeCommand::CreateObject {
            prog_id: prog_id.to_string(),
        })?;
        expect_object(value, prog_id)
    }

    fn get_property(
        &self,
        object: ObjectId,
        name: &str,
        args: &[Value],
    ) -> Result<Value, AutomationError> {
        self.send_value(BridgeCommand::GetProperty {
            object,
            name: name.to_string(),
            args: args.to_vec(),
        })
    }

    fn set_property(
        &self,
        object: ObjectId,
        name: &str,
        value: Value,
    ) -> Result<(), AutomationError> {
        self.send_command(BridgeCommand::SetProperty {
            object,
            name: name.to_string(),
            value,
        })?;
        Ok(())
    }

    fn invoke(&self, object: ObjectId, name: &str, args: &[Value]) -> Result<Value, AutomationError> {
        self.send_value(BridgeCommand::Invoke {
            object,
            name: name.to_string(),
            args: args.to_vec(),
        })
    }

    fn release(&self, object: ObjectId) -> Result<(), AutomationError> {
        match self.send_command(BridgeCommand::Release { object }) {
            Ok(_) => Ok(()),
            Err(AutomationError::Bridge {
                kind: FaultKind::UnknownObject,
                ..
            }) => Err(AutomationError::UnknownObject(object)),
            Err(e) => Err(e),
        }
    }

    fn native_path(&self, path: &Path) -> String {
        if self.wine {
            linux_to_wine_path(path)
        } else {
            absolute(path).display().to_string()
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

/// Convert a Linux filesystem path to a WINE (Windows) path.
///
/// WINE maps `/` to `Z:\`, so `/home/user/report.docx` becomes `Z:\home\user\report.docx`.
pub fn linux_to_wine_path(linux_path: &Path) -> String {
    format!("Z:{}", absolute(linux_path).display()).replace('/', "\\")
}

/// Attempt to locate the bridge exe relative to the current executable or in common paths.
fn find_bridge_exe() -> PathBuf {
    if let Ok(mut exe) = std::env::current_exe() {
        exe.pop();
        let candidate = exe.join(BRIDGE_EXE_NAME);
        if candidate.exists() {
            return candidate;
        }
    }

    for profile in ["release", "debug"] {
        let candidate = PathBuf::from("target/x86_64-pc-windows-gnu")
            .join(profile)
            .join(BRIDGE_EXE_NAME);
        if candidate.exists() {
            return candidate;
        }
    }

    PathBuf::from(BRIDGE_EXE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::sync::Arc;

    /// Request sink the test can inspect after the backend consumed it.
    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Write for Sink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn scripted(responses: &str) -> (BridgeBackend, Sink) {
        let sink = Sink::default();
        let backend = BridgeBackend::from_parts(
            None,
            Box::new(sink.clone()),
            Box::new(Cursor::new(responses.to_string().into_bytes())),
            true,
        );
        (backend, sink)
    }

    fn requests(sink: &Sink) -> Vec<serde_json::Value> {
        String::from_utf8(sink.0.lock().unwrap().clone())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_get_property_round_trip() {
        let (backend, sink) = scripted(
            "{\"id\":1,\"status\":\"ok\",\"value\":{\"type\":\"Object\",\"value\":7}}\n",
        );
        let value = backend
            .get_property(ObjectId(3), "Item", &[Value::from("Customer")])
            .unwrap();
        assert_eq!(value, Value::Object(ObjectId(7)));

        let sent = requests(&sink);
        assert_eq!(sent[0]["cmd"], "GetProperty");
        assert_eq!(sent[0]["params"]["object"], 3);
        assert_eq!(sent[0]["params"]["name"], "Item");
    }

    #[test]
    fn test_terminate_fault_kinds() {
        let (backend, _) = scripted(concat!(
            "{\"id\":1,\"status\":\"error\",\"message\":\"gone\",\"kind\":\"process_not_found\"}\n",
            "{\"id\":2,\"status\":\"error\",\"message\":\"denied\",\"kind\":\"terminate_failed\"}\n",
        ));
        assert!(matches!(
            backend.terminate_process(11),
            Err(ProcessError::NotFound(11))
        ));
        assert!(matches!(
            backend.terminate_process(11),
            Err(ProcessError::TerminateFailed { pid: 11, message }) if message == "denied"
        ));
    }

    #[test]
    fn test_mismatched_id_is_protocol_error() {
        let (backend, _) = scripted("{\"id\":9,\"status\":\"ok\"}\n");
        assert!(matches!(
            backend.release(ObjectId(1)),
            Err(AutomationError::Protocol(_))
        ));
    }

    #[test]
    fn test_closed_stream_means_not_running() {
        let (backend, _) = scripted("");
        assert!(matches!(
            backend.create_object("Word.Application"),
            Err(AutomationError::NotRunning)
        ));
    }

    #[test]
    fn test_shutdown_stops_further_calls() {
        let (backend, sink) = scripted("{\"id\":1,\"status\":\"ok\"}\n");
        backend.stop().unwrap();
        assert!(matches!(
            backend.invoke(ObjectId(1), "Quit", &[]),
            Err(AutomationError::NotRunning)
        ));
        assert_eq!(requests(&sink)[0]["cmd"], "Shutdown");
    }

    #[test]
    fn test_linux_to_wine_path() {
        assert_eq!(
            linux_to_wine_path(Path::new("/home/qa/report.docx")),
            "Z:\\home\\qa\\report.docx"
        );
    }
}
