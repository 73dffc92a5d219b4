use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
        Arc,
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use kamera::Camera as KCamera;
use log::{info, warn};
use slint::SharedPixelBuffer;

use super::{yuv::bgra_to_rgba, FrameBuffer, FrameStats};

/// Webcam preview on a capture thread. `kamera` picks its own resolution.
pub struct DesktopCamera {
    running: Option<Arc<AtomicBool>>,
    capture_task: Option<JoinHandle<Result<()>>>,
    frame_sender: Sender<FrameBuffer>,
}

impl DesktopCamera {
    pub fn new(frame_sender: Sender<FrameBuffer>) -> Self {
        Self {
            running: None,
            capture_task: None,
            frame_sender,
        }
    }

    pub fn start_preview(&mut self, index: usize) -> Result<()> {
        self.stop_preview();
        let running = Arc::new(AtomicBool::new(true));
        self.running = Some(running.clone());
        let frame_sender = self.frame_sender.clone();
        self.capture_task = Some(std::thread::spawn(move || {
            let camera = KCamera::new_device(index)
                .ok_or_else(|| anyhow!("camera device {index} does not exist"))?;
            camera.start();
            let mut stats = FrameStats::new(Instant::now());
            while running.load(Ordering::SeqCst) {
                let Some(frame) = camera.wait_for_frame() else {
                    warn!("camera {index} returned no frame");
                    std::thread::sleep(Duration::from_millis(10));
                    continue;
                };

                let (width, height) = frame.size_u32();
                let mut rgba = frame.data().data_u8().to_vec();
                bgra_to_rgba(&mut rgba);
                let buf = SharedPixelBuffer::clone_from_slice(rgba.as_slice(), width, height);
                if frame_sender.send(buf).is_err() {
                    break;
                }

                if let Some(fps) = stats.record(Instant::now()) {
                    info!("preview {width}x{height} {fps}FPS");
                }
            }
            camera.stop();
            Ok(())
        }));
        Ok(())
    }

    pub fn stop_preview(&mut self) {
        if let Some(running) = self.running.take() {
            running.store(false, Ordering::SeqCst);
        }
        if let Some(task) = self.capture_task.take() {
            match task.join() {
                Ok(Ok(())) => info!("preview stopped"),
                Ok(Err(err)) => warn!("preview ended with error: {err:?}"),
                Err(_) => warn!("preview thread panicked"),
            }
        }
    }
}

impl Drop for DesktopCamera {
    fn drop(&mut self) {
        self.stop_preview();
    }
}
