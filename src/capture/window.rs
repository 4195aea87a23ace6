//! Window discovery and geometry for the game client (Win32).

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;

use tracing::{debug, info};
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    ClientToScreen, GetMonitorInfoW, MonitorFromWindow, MONITORINFO, MONITOR_DEFAULTTONEAREST,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetClientRect, GetWindowPlacement, GetWindowRect, GetWindowTextLengthW,
    GetWindowTextW, GetWindowThreadProcessId, IsWindow, IsWindowVisible, MoveWindow, ShowWindow,
    SW_RESTORE, SW_SHOWMAXIMIZED, WINDOWPLACEMENT,
};

use super::{WindowHandle, WindowLocator, WindowRect};
use crate::error::{CollectorError, Result};

/// Gap kept between the resized window and its monitor's work-area corner.
const RESIZE_MARGIN: i32 = 10;

/// Locates the game window by executable name and manages its geometry.
pub struct Win32Locator {
    /// Reference resolution whose aspect ratio the standard size follows.
    reference: (u32, u32),
}

impl Win32Locator {
    pub fn new(reference_width: u32, reference_height: u32) -> Self {
        Self {
            reference: (reference_width.max(1), reference_height.max(1)),
        }
    }
}

pub(crate) fn hwnd_of(handle: &WindowHandle) -> HWND {
    HWND(handle.raw as *mut std::ffi::c_void)
}

pub(crate) fn is_window(hwnd: HWND) -> bool {
    unsafe { IsWindow(hwnd).as_bool() }
}

impl WindowLocator for Win32Locator {
    fn locate(&self, process_name: &str) -> Result<WindowHandle> {
        info!("Searching for {} window...", process_name);
        let (hwnd, name) = find_window_by_process(process_name)
            .ok_or_else(|| CollectorError::WindowNotFound(process_name.to_string()))?;
        info!("Found process \"{}\" (hwnd {:?})", name, hwnd);
        Ok(WindowHandle {
            raw: hwnd.0 as isize,
            process_name: name,
        })
    }

    fn rectangle(&self, handle: &WindowHandle) -> Result<WindowRect> {
        let hwnd = hwnd_of(handle);
        if !is_window(hwnd) {
            return Err(CollectorError::WindowLost);
        }
        client_rect_on_screen(hwnd)
    }

    fn resize_to_standard(&self, handle: &WindowHandle, width: u32) -> Result<()> {
        let hwnd = hwnd_of(handle);
        if !is_window(hwnd) {
            return Err(CollectorError::WindowLost);
        }

        unsafe {
            let mut placement = WINDOWPLACEMENT {
                length: std::mem::size_of::<WINDOWPLACEMENT>() as u32,
                ..Default::default()
            };
            GetWindowPlacement(hwnd, &mut placement)?;
            if placement.showCmd == SW_SHOWMAXIMIZED.0 as u32 {
                debug!("Window is maximized, restoring before resize");
                let _ = ShowWindow(hwnd, SW_RESTORE);
            }
        }

        // Non-client border size, so the client area lands on the requested width
        let mut window_rect = RECT::default();
        let mut client_rect = RECT::default();
        unsafe {
            GetWindowRect(hwnd, &mut window_rect)?;
            GetClientRect(hwnd, &mut client_rect)?;
        }
        let border_w = (window_rect.right - window_rect.left) - (client_rect.right - client_rect.left);
        let border_h = (window_rect.bottom - window_rect.top) - (client_rect.bottom - client_rect.top);

        let work = monitor_work_area(hwnd);
        let (ref_w, ref_h) = self.reference;
        let max_client_w = (work.right - work.left - border_w - 2 * RESIZE_MARGIN).max(1) as u32;
        let max_client_h = (work.bottom - work.top - border_h - 2 * RESIZE_MARGIN).max(1) as u32;

        let mut client_w = width.min(max_client_w);
        let mut client_h = (client_w as u64 * ref_h as u64 / ref_w as u64) as u32;
        if client_h > max_client_h {
            client_h = max_client_h;
            client_w = (client_h as u64 * ref_w as u64 / ref_h as u64) as u32;
        }

        info!(
            "Resizing window client area to {}x{} (requested width {})",
            client_w, client_h, width
        );
        unsafe {
            MoveWindow(
                hwnd,
                work.left + RESIZE_MARGIN,
                work.top + RESIZE_MARGIN,
                client_w as i32 + border_w,
                client_h as i32 + border_h,
                true,
            )?;
        }
        Ok(())
    }

    fn is_valid(&self, handle: &WindowHandle) -> bool {
        is_window(hwnd_of(handle))
    }
}

/// Client rectangle of `hwnd` translated to screen coordinates.
pub(crate) fn client_rect_on_screen(hwnd: HWND) -> Result<WindowRect> {
    let mut client_rect = RECT::default();
    unsafe { GetClientRect(hwnd, &mut client_rect)? };

    let mut origin = POINT { x: 0, y: 0 };
    unsafe {
        if !ClientToScreen(hwnd, &mut origin).as_bool() {
            return Err(CollectorError::Platform("ClientToScreen failed".into()));
        }
    }

    Ok(WindowRect::new(
        origin.x,
        origin.y,
        (client_rect.right - client_rect.left).max(0) as u32,
        (client_rect.bottom - client_rect.top).max(0) as u32,
    ))
}

/// Offset of the client area relative to the outer window origin.
///
/// Graphics Capture frames include the window frame, so captures are cropped by this.
pub(crate) fn client_offset(hwnd: HWND) -> Result<(u32, u32)> {
    let client = client_rect_on_screen(hwnd)?;
    let mut window_rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut window_rect)? };
    Ok((
        (client.left - window_rect.left).max(0) as u32,
        (client.top - window_rect.top).max(0) as u32,
    ))
}

fn monitor_work_area(hwnd: HWND) -> RECT {
    unsafe {
        let monitor = MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST);
        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        if GetMonitorInfoW(monitor, &mut info).as_bool() {
            info.rcWork
        } else {
            RECT {
                left: 0,
                top: 0,
                right: 1920,
                bottom: 1080,
            }
        }
    }
}

/// Enumerates visible titled windows and returns the first one whose
/// executable name equals `process_name` (case-insensitive).
fn find_window_by_process(process_name: &str) -> Option<(HWND, String)> {
    struct EnumData {
        target: String,
        found: Option<(HWND, String)>,
    }

    unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
        unsafe {
            let data = &mut *(lparam.0 as *mut EnumData);

            if !IsWindowVisible(hwnd).as_bool() {
                return TRUE;
            }

            // Untitled windows are usually not main windows
            let title_len = GetWindowTextLengthW(hwnd);
            if title_len <= 0 {
                return TRUE;
            }
            let mut title_buf: Vec<u16> = vec![0; (title_len + 1) as usize];
            GetWindowTextW(hwnd, &mut title_buf);
            let title = OsString::from_wide(&title_buf[..title_len as usize])
                .to_string_lossy()
                .to_string();

            let mut process_id: u32 = 0;
            GetWindowThreadProcessId(hwnd, Some(&mut process_id));
            if process_id == 0 {
                return TRUE;
            }

            let Ok(process_handle) =
                OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id)
            else {
                return TRUE;
            };

            let mut name_buf: Vec<u16> = vec![0; 1024];
            let mut len = name_buf.len() as u32;
            let result = QueryFullProcessImageNameW(
                process_handle,
                PROCESS_NAME_WIN32,
                windows::core::PWSTR(name_buf.as_mut_ptr()),
                &mut len,
            );
            let _ = windows::Win32::Foundation::CloseHandle(process_handle);
            if result.is_err() || len == 0 {
                return TRUE;
            }

            let full_path = OsString::from_wide(&name_buf[..len as usize])
                .to_string_lossy()
                .to_string();
            let exe_name = full_path
                .rsplit('\\')
                .next()
                .unwrap_or(&full_path)
                .to_string();

            debug!("  [{}] {} - \"{}\"", process_id, exe_name, title);

            // Exact name only, so e.g. "nikke-helper.exe" does not match "nikke.exe"
            if exe_name.to_lowercase() == data.target {
                data.found = Some((hwnd, exe_name));
                return BOOL(0);
            }

            TRUE
        }
    }

    let mut data = EnumData {
        target: process_name.to_lowercase(),
        found: None,
    };
    unsafe {
        // EnumWindows reports FALSE when the callback stops early
        let _ = EnumWindows(Some(enum_callback), LPARAM(&mut data as *mut _ as isize));
    }
    data.found
}
