//! Word COM Bridge: a Windows process that exposes Word's automation object
//! model through late-bound IDispatch calls, controlled by JSON commands over
//! stdin/stdout.
//!
//! Designed to be cross-compiled from Linux and run under WINE, or run natively.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! - Reads `Request` objects from stdin
//! - Writes `Response` objects to stdout
//! - Diagnostic/log messages go to stderr (never stdout)

#[cfg(windows)]
mod dispatch;
#[cfg(windows)]
mod objects;
#[cfg(windows)]
mod process;

#[cfg(not(windows))]
fn main() {
    eprintln!("word-com-bridge must be compiled for Windows (--target x86_64-pc-windows-gnu)");
    eprintln!("and run natively or under WINE.");
    std::process::exit(1);
}

/// A failed command, as reported back to the client.
#[cfg(windows)]
pub struct Fault {
    kind: word_com_protocol::FaultKind,
    message: String,
}

#[cfg(windows)]
impl Fault {
    pub fn new(kind: word_com_protocol::FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn exception(message: String) -> Self {
        Self::new(word_com_protocol::FaultKind::Exception, message)
    }
}

#[cfg(windows)]
struct Bridge {
    objects: objects::ObjectTable,
    com_initialized: bool,
}

#[cfg(windows)]
fn main() {
    use std::io::{self, BufRead};

    use word_com_protocol::*;

    // Use stderr for all diagnostic output so stdout stays clean for protocol
    eprintln!("[word-com-bridge] Starting up...");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut bridge = Bridge {
        objects: objects::ObjectTable::new(),
        com_initialized: false,
    };

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("[word-com-bridge] stdin read error: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                let shutdown = matches!(request.command, Command::Shutdown);
                let response = handle_command(&mut bridge, &request);
                if !write_response(&mut out, &response) || shutdown {
                    if shutdown {
                        eprintln!("[word-com-bridge] Shutdown complete, exiting.");
                    }
                    break;
                }
                continue;
            }
            Err(e) => {
                eprintln!("[word-com-bridge] JSON parse error: {e}");
                eprintln!("[word-com-bridge] Line was: {line}");
                // id 0 since the request could not be parsed
                Response {
                    id: 0,
                    result: ResponseResult::Error {
                        message: format!("JSON parse error: {e}"),
                        kind: FaultKind::Protocol,
                    },
                }
            }
        };
        if !write_response(&mut out, &response) {
            break;
        }
    }

    if bridge.com_initialized {
        eprintln!("[word-com-bridge] stdin closed, releasing remaining objects...");
        shutdown(&mut bridge);
    }

    eprintln!("[word-com-bridge] Process exiting.");
}

#[cfg(windows)]
fn write_response(out: &mut impl std::io::Write, response: &word_com_protocol::Response) -> bool {
    let json = match serde_json::to_string(response) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("[word-com-bridge] Failed to serialize response: {e}");
            return false;
        }
    };
    writeln!(out, "{json}").and_then(|()| out.flush()).is_ok()
}

#[cfg(windows)]
fn handle_command(
    bridge: &mut Bridge,
    request: &word_com_protocol::Request,
) -> word_com_protocol::Response {
    use word_com_protocol::*;

    let result = match &request.command {
        Command::Init => init_com(bridge).map(|()| None),
        Command::CreateObject { prog_id } => with_com(bridge, |b| {
            let object = dispatch::DispatchObject::create_from_progid(prog_id)
                .map_err(Fault::exception)?;
            eprintln!("[word-com-bridge] {prog_id} created");
            Ok(Some(Value::Object(b.objects.insert(object))))
        }),
        Command::GetProperty { object, name, args } => with_com(bridge, |b| {
            let args = b.objects.to_variants(args)?;
            let result = b
                .objects
                .get(*object)?
                .get_property(name, &args)
                .map_err(Fault::exception)?;
            b.objects.value_from(&result).map(Some)
        }),
        Command::SetProperty {
            object,
            name,
            value,
        } => with_com(bridge, |b| {
            let value = b.objects.to_variant(value)?;
            b.objects
                .get(*object)?
                .set_property(name, value)
                .map_err(Fault::exception)?;
            Ok(None)
        }),
        Command::Invoke { object, name, args } => with_com(bridge, |b| {
            let args = b.objects.to_variants(args)?;
            let result = b
                .objects
                .get(*object)?
                .invoke_method(name, &args)
                .map_err(Fault::exception)?;
            b.objects.value_from(&result).map(Some)
        }),
        Command::Release { object } => with_com(bridge, |b| b.objects.remove(*object).map(|()| None)),
        Command::TerminateProcess { pid } => {
            process::terminate(*pid).map(|()| None)
        }
        Command::Shutdown => {
            shutdown(bridge);
            Ok(None)
        }
    };

    let result = match result {
        Ok(value) => ResponseResult::Ok { value },
        Err(fault) => ResponseResult::Error {
            message: fault.message,
            kind: fault.kind,
        },
    };
    Response {
        id: request.id,
        result,
    }
}

#[cfg(windows)]
fn init_com(bridge: &mut Bridge) -> Result<(), Fault> {
    use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};

    if bridge.com_initialized {
        return Ok(()); // Already initialized
    }

    // Office automation requires a single-threaded apartment
    unsafe {
        CoInitializeEx(None, COINIT_APARTMENTTHREADED)
            .ok()
            .map_err(|e| Fault::exception(format!("CoInitializeEx failed: {e}")))?;
    }
    bridge.com_initialized = true;
    eprintln!("[word-com-bridge] COM initialized (STA)");
    Ok(())
}

#[cfg(windows)]
fn shutdown(bridge: &mut Bridge) {
    if bridge.objects.len() > 0 {
        eprintln!(
            "[word-com-bridge] Releasing {} object(s) the client still held",
            bridge.objects.len()
        );
    }
    bridge.objects.clear();
    if bridge.com_initialized {
        unsafe {
            windows::Win32::System::Com::CoUninitialize();
        }
        bridge.com_initialized = false;
        eprintln!("[word-com-bridge] COM uninitialized");
    }
}

#[cfg(windows)]
fn with_com(
    bridge: &mut Bridge,
    f: impl FnOnce(&mut Bridge) -> Result<Option<word_com_protocol::Value>, Fault>,
) -> Result<Option<word_com_protocol::Value>, Fault> {
    if bridge.com_initialized {
        f(bridge)
    } else {
        Err(Fault::exception(
            "COM not initialized. Send 'Init' command first.".to_string(),
        ))
    }
}
