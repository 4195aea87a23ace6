//! Window capture using the Windows Graphics Capture API.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use tracing::debug;
use windows::core::Interface;
use windows::Foundation::TypedEventHandler;
use windows::Graphics::Capture::{Direct3D11CaptureFramePool, GraphicsCaptureItem};
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Resource, ID3D11Texture2D,
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ, D3D11_SDK_VERSION,
    D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
};
use windows::Win32::System::WinRT::Direct3D11::{
    CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
};
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;

use super::window::{client_offset, client_rect_on_screen, hwnd_of, is_window};
use super::{check_region, crop, Region, ScreenCapturer, WindowHandle};
use crate::error::{CollectorError, Result};

const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Captures the game's client area through a long-lived D3D11 device.
///
/// Requires `RoInitialize` on the calling thread.
pub struct GraphicsCapturer {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    d3d_device: IDirect3DDevice,
}

impl GraphicsCapturer {
    pub fn new() -> Result<Self> {
        let (device, context) = create_d3d11_device()?;
        let d3d_device = create_direct3d_device(&device)?;
        debug!("D3D11 capture device created");
        Ok(Self {
            device,
            context,
            d3d_device,
        })
    }

    /// Grabs one frame of the window and returns the client area as RGBA.
    fn capture_client(&self, hwnd: HWND) -> Result<RgbaImage> {
        let client = client_rect_on_screen(hwnd)?;
        let (offset_x, offset_y) = client_offset(hwnd)?;

        let item = create_capture_item(hwnd)?;
        let size = item.Size()?;
        let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &self.d3d_device,
            DirectXPixelFormat::B8G8R8A8UIntNormalized,
            1,
            size,
        )?;
        let session = frame_pool.CreateCaptureSession(&item)?;

        let frame_arrived = Arc::new(AtomicBool::new(false));
        let frame_arrived_clone = frame_arrived.clone();
        frame_pool.FrameArrived(&TypedEventHandler::new(
            move |_pool: &Option<Direct3D11CaptureFramePool>, _| {
                frame_arrived_clone.store(true, Ordering::SeqCst);
                Ok(())
            },
        ))?;

        session.StartCapture()?;

        let start = Instant::now();
        while !frame_arrived.load(Ordering::SeqCst) {
            if start.elapsed() > FRAME_TIMEOUT {
                let _ = session.Close();
                let _ = frame_pool.Close();
                return Err(CollectorError::Platform(
                    "timeout waiting for capture frame".into(),
                ));
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let frame = frame_pool.TryGetNextFrame()?;
        let access: IDirect3DDxgiInterfaceAccess = frame.Surface()?.cast()?;
        let texture: ID3D11Texture2D = unsafe { access.GetInterface()? };

        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };

        let staging_desc = D3D11_TEXTURE2D_DESC {
            Width: desc.Width,
            Height: desc.Height,
            MipLevels: 1,
            ArraySize: 1,
            Format: desc.Format,
            SampleDesc: desc.SampleDesc,
            Usage: D3D11_USAGE_STAGING,
            BindFlags: Default::default(),
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: Default::default(),
        };
        let staging = unsafe {
            let mut staging: Option<ID3D11Texture2D> = None;
            self.device
                .CreateTexture2D(&staging_desc, None, Some(&mut staging))?;
            staging.ok_or_else(|| CollectorError::Platform("staging texture missing".into()))?
        };
        let staging_resource: ID3D11Resource = staging.cast()?;

        unsafe {
            self.context
                .CopyResource(&staging_resource, &texture.cast::<ID3D11Resource>()?);
        }

        let mapped = unsafe {
            let mut mapped = Default::default();
            self.context
                .Map(&staging_resource, 0, D3D11_MAP_READ, 0, Some(&mut mapped))?;
            mapped
        };

        let src = unsafe {
            std::slice::from_raw_parts(
                mapped.pData as *const u8,
                (mapped.RowPitch * desc.Height) as usize,
            )
        };
        let row_pitch = mapped.RowPitch as usize;

        // Frame includes borders and title bar; keep the client area only
        let mut img = RgbaImage::new(client.width, client.height);
        for y in 0..client.height {
            let src_y = (offset_y + y) as usize;
            if src_y >= desc.Height as usize {
                break;
            }
            for x in 0..client.width {
                let src_x = (offset_x + x) as usize;
                if src_x >= desc.Width as usize {
                    break;
                }
                let o = src_y * row_pitch + src_x * 4;
                // BGRA -> RGBA
                img.put_pixel(x, y, Rgba([src[o + 2], src[o + 1], src[o], src[o + 3]]));
            }
        }

        unsafe { self.context.Unmap(&staging_resource, 0) };
        session.Close()?;
        frame_pool.Close()?;

        Ok(img)
    }
}

impl ScreenCapturer for GraphicsCapturer {
    fn capture(&self, handle: &WindowHandle, region: Option<Region>) -> Result<RgbaImage> {
        let hwnd = hwnd_of(handle);
        if !is_window(hwnd) {
            return Err(CollectorError::WindowLost);
        }
        if let Some(region) = region {
            check_region(region, client_rect_on_screen(hwnd)?)?;
        }

        let full = self.capture_client(hwnd)?;
        match region {
            Some(region) => {
                // The window may have shrunk between the check and the frame
                if !region.fits_within(full.width(), full.height()) {
                    return Err(CollectorError::RegionOutOfBounds {
                        region,
                        rect: client_rect_on_screen(hwnd)?,
                    });
                }
                Ok(crop(&full, region))
            }
            None => Ok(full),
        }
    }
}

fn create_d3d11_device() -> Result<(ID3D11Device, ID3D11DeviceContext)> {
    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;

    unsafe {
        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            None,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )?;
    }

    Ok((
        device.ok_or_else(|| CollectorError::Platform("failed to create D3D11 device".into()))?,
        context.ok_or_else(|| CollectorError::Platform("failed to create D3D11 context".into()))?,
    ))
}

/// WinRT device wrapper required by the capture frame pool.
fn create_direct3d_device(device: &ID3D11Device) -> Result<IDirect3DDevice> {
    let dxgi_device: windows::Win32::Graphics::Dxgi::IDXGIDevice = device.cast()?;
    let inspectable = unsafe { CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device)? };
    Ok(inspectable.cast()?)
}

fn create_capture_item(hwnd: HWND) -> Result<GraphicsCaptureItem> {
    let class_name = windows::core::h!("Windows.Graphics.Capture.GraphicsCaptureItem");
    let interop: IGraphicsCaptureItemInterop =
        unsafe { windows::Win32::System::WinRT::RoGetActivationFactory(class_name)? };
    Ok(unsafe { interop.CreateForWindow(hwnd)? })
}
