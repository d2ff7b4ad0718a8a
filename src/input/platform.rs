use crate::error::AppError;

#[cfg(target_os = "windows")]
use super::executable_name;
use super::ForegroundTarget;

#[cfg(target_os = "windows")]
const PROCESS_PATH_CAPACITY: usize = 1024;

/// 查询前台窗口及其所属进程
///
/// GetForegroundWindow → GetWindowThreadProcessId → OpenProcess →
/// QueryFullProcessImageNameW，任何一步失败都返回 `AppError::Capture`。
#[cfg(target_os = "windows")]
pub fn foreground_target() -> Result<ForegroundTarget, AppError> {
    use windows::core::PWSTR;
    use windows::Win32::Foundation::CloseHandle;
    use windows::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32,
        PROCESS_QUERY_LIMITED_INFORMATION,
    };
    use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

    unsafe {
        let hwnd = GetForegroundWindow();
        if hwnd.is_invalid() {
            return Err(AppError::Capture("没有前台窗口".to_string()));
        }

        let mut pid: u32 = 0;
        GetWindowThreadProcessId(hwnd, Some(&mut pid as *mut u32));
        if pid == 0 {
            return Err(AppError::Capture("无法获取前台窗口的进程 ID".to_string()));
        }

        let process = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid)
            .map_err(|e| AppError::Capture(format!("打开进程 {} 失败: {}", pid, e)))?;

        let mut buf = vec![0u16; PROCESS_PATH_CAPACITY];
        let mut size = buf.len() as u32;
        let queried = QueryFullProcessImageNameW(
            process,
            PROCESS_NAME_WIN32,
            PWSTR(buf.as_mut_ptr()),
            &mut size,
        );
        let _ = CloseHandle(process);
        queried.map_err(|e| AppError::Capture(format!("查询进程 {} 路径失败: {}", pid, e)))?;

        let path = String::from_utf16_lossy(&buf[..size as usize]);
        Ok(ForegroundTarget {
            process_name: executable_name(&path),
            window: Some(hwnd.0 as isize),
        })
    }
}

#[cfg(not(target_os = "windows"))]
pub fn foreground_target() -> Result<ForegroundTarget, AppError> {
    Err(AppError::Capture("前台进程查询仅在 Windows 上支持".to_string()))
}

/// 将焦点还给触发粘贴时的前台窗口
#[cfg(target_os = "windows")]
pub fn restore_focus(window: isize) -> Result<(), AppError> {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::SetForegroundWindow;

    let hwnd = HWND(window as *mut std::ffi::c_void);
    let focused = unsafe { SetForegroundWindow(hwnd) };
    if focused.as_bool() {
        Ok(())
    } else {
        Err(AppError::Replay("恢复前台窗口焦点失败".to_string()))
    }
}

#[cfg(not(target_os = "windows"))]
pub fn restore_focus(_window: isize) -> Result<(), AppError> {
    Ok(())
}
