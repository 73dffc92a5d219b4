use std::{
    sync::mpsc::Sender,
    time::{Duration, Instant},
};

use anyhow::Result;
use log::info;
use slint::{Rgba8Pixel, SharedPixelBuffer};

use crate::model::{CameraFacing, PermissionState};

#[cfg(target_os = "android")]
mod android;
#[cfg(not(target_os = "android"))]
mod desktop;
pub mod yuv;

pub type FrameBuffer = SharedPixelBuffer<Rgba8Pixel>;

/// Frame counter for the once-a-second FPS log line.
pub(crate) struct FrameStats {
    count: u32,
    since: Instant,
}

impl FrameStats {
    pub(crate) fn new(now: Instant) -> Self {
        Self { count: 0, since: now }
    }

    /// Count one frame; returns the rate once a full second has passed.
    pub(crate) fn record(&mut self, now: Instant) -> Option<u32> {
        self.count += 1;
        if now.duration_since(self.since) < Duration::from_secs(1) {
            return None;
        }
        let fps = self.count;
        self.count = 0;
        self.since = now;
        Some(fps)
    }
}

/// Live viewfinder. Frames are pushed to `frame_sender` from a capture
/// thread; the UI drains them on its timer.
pub struct Camera {
    facing: CameraFacing,
    previewing: bool,
    #[cfg(target_os = "android")]
    app: slint::android::AndroidApp,
    #[cfg(target_os = "android")]
    camera: Box<android::AndroidCamera>,
    #[cfg(not(target_os = "android"))]
    camera: desktop::DesktopCamera,
}

impl Camera {
    pub fn new(
        #[cfg(target_os = "android")] app: slint::android::AndroidApp,
        frame_sender: Sender<FrameBuffer>,
    ) -> Self {
        Camera {
            facing: CameraFacing::Back,
            previewing: false,
            #[cfg(target_os = "android")]
            app,
            #[cfg(target_os = "android")]
            camera: Box::new(android::AndroidCamera::new(frame_sender)),
            #[cfg(not(target_os = "android"))]
            camera: desktop::DesktopCamera::new(frame_sender),
        }
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn is_previewing(&self) -> bool {
        self.previewing
    }

    pub fn permission(&self) -> Result<PermissionState> {
        #[cfg(target_os = "android")]
        {
            let granted = crate::android::check_self_permission(
                &self.app,
                crate::android::CAMERA_PERMISSION,
            )?;
            Ok(PermissionState::from_granted(granted))
        }
        #[cfg(not(target_os = "android"))]
        Ok(PermissionState::Granted)
    }

    pub fn request_permission(&self) -> Result<()> {
        #[cfg(target_os = "android")]
        crate::android::request_camera_permission(&self.app)?;
        Ok(())
    }

    pub fn start_preview(&mut self, width: u32, height: u32) -> Result<()> {
        #[cfg(target_os = "android")]
        {
            let started = self
                .camera
                .open(self.facing)
                .and_then(|()| self.camera.start_preview(width, height));
            if let Err(err) = started {
                self.camera.close();
                return Err(err);
            }
        }
        #[cfg(not(target_os = "android"))]
        {
            info!("desktop preview ignores requested size {width}x{height}");
            self.camera.start_preview(desktop_index(self.facing))?;
        }
        self.previewing = true;
        Ok(())
    }

    pub fn stop_preview(&mut self) {
        #[cfg(target_os = "android")]
        self.camera.close();
        #[cfg(not(target_os = "android"))]
        self.camera.stop_preview();
        self.previewing = false;
    }

    /// Switch lens; a running preview is restarted on the new one.
    pub fn toggle_facing(&mut self, width: u32, height: u32) -> Result<CameraFacing> {
        self.facing = self.facing.toggled();
        info!("camera facing -> {:?}", self.facing);
        if self.previewing {
            self.stop_preview();
            self.start_preview(width, height)?;
        }
        Ok(self.facing)
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.stop_preview();
    }
}

#[cfg(not(target_os = "android"))]
fn desktop_index(facing: CameraFacing) -> usize {
    match facing {
        CameraFacing::Back => 0,
        CameraFacing::Front => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_stats_report_once_per_second() {
        let t0 = Instant::now();
        let mut stats = FrameStats::new(t0);
        assert_eq!(stats.record(t0 + Duration::from_millis(300)), None);
        assert_eq!(stats.record(t0 + Duration::from_millis(600)), None);
        assert_eq!(stats.record(t0 + Duration::from_secs(1)), Some(3));

        let t1 = t0 + Duration::from_secs(1);
        assert_eq!(stats.record(t1 + Duration::from_millis(500)), None);
        assert_eq!(stats.record(t1 + Duration::from_secs(1)), Some(2));
    }
}
