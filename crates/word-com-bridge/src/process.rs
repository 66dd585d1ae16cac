//! Forced termination of a process that outlived its automation session.

#![cfg(windows)]

use windows::Win32::Foundation::CloseHandle;
use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};
use word_com_protocol::FaultKind;

use crate::Fault;

pub fn terminate(pid: u32) -> Result<(), Fault> {
    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, false, pid).map_err(|e| {
            Fault::new(
                FaultKind::ProcessNotFound,
                format!("OpenProcess({pid}) failed: {e}"),
            )
        })?;
        let result = TerminateProcess(handle, 0).map_err(|e| {
            Fault::new(
                FaultKind::TerminateFailed,
                format!("TerminateProcess({pid}) failed: {e}"),
            )
        });
        let _ = CloseHandle(handle);
        result
    }
}
