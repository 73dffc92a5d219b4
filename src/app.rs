use std::{
    cell::RefCell,
    rc::Rc,
    sync::mpsc::{channel, Receiver},
    time::{Duration, Instant},
};

use anyhow::Result;
use log::{debug, info, warn};
use slint::{Image, Timer, TimerMode};

use crate::{
    camera::{Camera, FrameBuffer},
    config::AppConfig,
    model::PermissionState,
    pipeline::{self, Pipeline},
    poi::PoiClient,
    screen::{RenderMode, ScreenState},
};

const TICK: Duration = Duration::from_millis(16);
const PERMISSION_RECHECK: Duration = Duration::from_secs(1);
const PREVIEW_RETRY: Duration = Duration::from_secs(2);

slint::slint! {
    import { Button, VerticalBox } from "std-widgets.slint";

    export enum ScreenMode { blank, prompt, camera }

    export component MainWindow inherits Window {
        preferred-width: 430px;
        preferred-height: 932px;
        background: #000000;

        in property <ScreenMode> mode: ScreenMode.blank;
        in property <image> camera-frame;
        in property <string> location-text: "Location:";
        in property <string> poi-text;
        in property <length> details-offset: 750px;
        callback grant-permission();
        callback toggle-details();
        callback open-menu();

        if root.mode == ScreenMode.prompt : VerticalBox {
            alignment: center;
            Text {
                text: "We need your permission to show the camera";
                horizontal-alignment: center;
                wrap: word-wrap;
                color: #EBECF1;
            }
            Button {
                text: "Grant Permission";
                clicked => {
                    root.grant-permission();
                }
            }
        }

        if root.mode == ScreenMode.camera : Rectangle {
            width: 100%;
            height: 100%;

            Image {
                width: 100%;
                height: 100%;
                source: root.camera-frame;
                image-fit: cover;
            }

            details := Rectangle {
                x: 15px;
                y: root.details-offset;
                width: parent.width - 30px;
                height: max(0px, parent.height - root.details-offset - 15px);
                background: #1B1C25;
                border-radius: 36px;
                clip: true;

                Rectangle {
                    x: 20px;
                    y: 10px;
                    width: details.width - 40px;
                    height: poi-label.preferred-height + 6px;
                    background: #007AFF;
                    border-radius: 10px;

                    poi-label := Text {
                        x: 3px;
                        y: 3px;
                        width: parent.width - 6px;
                        text: root.poi-text;
                        wrap: word-wrap;
                        horizontal-alignment: center;
                        font-size: 16px;
                        font-weight: 700;
                        color: #EBECF1;
                    }
                }

                TouchArea {
                    clicked => {
                        root.toggle-details();
                    }
                }
            }

            Rectangle {
                x: 15px;
                y: 55px;
                width: 75px;
                height: 75px;
                border-radius: 40px;
                background: #1F4068;
                Text {
                    text: "☰";
                    font-size: 36px;
                    color: #EBECF1;
                }
                TouchArea {
                    clicked => {
                        root.open-menu();
                    }
                }
            }

            Rectangle {
                x: 105px;
                y: 55px;
                width: 295px;
                height: 75px;
                border-radius: 40px;
                background: #1B1C25;
                Text {
                    text: root.location-text;
                    horizontal-alignment: center;
                    vertical-alignment: center;
                    wrap: word-wrap;
                    font-size: 16px;
                    font-weight: 700;
                    color: #EBECF1;
                }
            }
        }
    }
}

/// Owns everything the screen needs between mount and unmount.
pub struct ScreenController {
    window: slint::Weak<MainWindow>,
    state: ScreenState,
    camera: Camera,
    pipeline: Option<Pipeline>,
    frames: Receiver<FrameBuffer>,
    preview_size: (u32, u32),
    last_permission_check: Instant,
    last_preview_attempt: Instant,
}

impl ScreenController {
    fn mount(
        window: slint::Weak<MainWindow>,
        camera: Camera,
        frames: Receiver<FrameBuffer>,
        pipeline: Pipeline,
        preview_size: (u32, u32),
    ) -> Self {
        let now = Instant::now();
        let mut controller = Self {
            window,
            state: ScreenState::new(now),
            camera,
            pipeline: Some(pipeline),
            frames,
            preview_size,
            last_permission_check: now,
            last_preview_attempt: now,
        };
        controller.refresh_camera_permission();
        controller.render(now);
        controller
    }

    fn refresh_camera_permission(&mut self) {
        self.last_permission_check = Instant::now();
        let permission = match self.camera.permission() {
            Ok(permission) => permission,
            Err(err) => {
                warn!("camera permission check failed: {err:?}");
                PermissionState::Denied
            }
        };
        if permission == self.state.camera_permission() {
            return;
        }
        info!("camera permission: {permission:?}");
        self.state.set_camera_permission(permission);
        if permission == PermissionState::Granted {
            self.ensure_preview(Instant::now());
        }
    }

    fn ensure_preview(&mut self, now: Instant) {
        if self.camera.is_previewing() {
            return;
        }
        self.last_preview_attempt = now;
        let (width, height) = self.preview_size;
        if let Err(err) = self.camera.start_preview(width, height) {
            warn!("camera preview failed to start: {err:?}");
            self.camera.stop_preview();
        }
    }

    fn tick(&mut self, now: Instant) {
        if let Some(pipeline) = &self.pipeline {
            while let Some(event) = pipeline.try_recv() {
                debug!("screen event: {event:?}");
                self.state.apply(event);
            }
        }

        if self.state.render_mode() == RenderMode::PermissionPrompt
            && now.duration_since(self.last_permission_check) >= PERMISSION_RECHECK
        {
            self.refresh_camera_permission();
        }
        if preview_retry_due(
            self.state.render_mode(),
            self.camera.is_previewing(),
            now.duration_since(self.last_preview_attempt),
        ) {
            self.ensure_preview(now);
        }

        self.render(now);
    }

    fn render(&mut self, now: Instant) {
        let Some(window) = self.window.upgrade() else {
            return;
        };

        let mut latest = None;
        while let Ok(frame) = self.frames.try_recv() {
            latest = Some(frame);
        }
        if let Some(frame) = latest {
            window.set_camera_frame(Image::from_rgba8(frame));
        }

        window.set_mode(match self.state.render_mode() {
            RenderMode::Blank => ScreenMode::Blank,
            RenderMode::PermissionPrompt => ScreenMode::Prompt,
            RenderMode::Camera => ScreenMode::Camera,
        });
        window.set_location_text(self.state.location_text().into());
        window.set_poi_text(self.state.panel_text().into());
        window.set_details_offset(self.state.details().offset_at(now));
    }

    fn toggle_details(&mut self) {
        let now = Instant::now();
        self.state.details_mut().toggle(now);
        debug!("details visible: {}", self.state.details().is_visible());
        self.render(now);
    }

    fn grant_permission(&mut self) {
        if let Err(err) = self.camera.request_permission() {
            warn!("camera permission request failed: {err:?}");
        }
    }

    /// Flip between back and front lens. Not bound to any control yet.
    pub fn toggle_camera_facing(&mut self) -> Result<()> {
        let (width, height) = self.preview_size;
        let facing = self.camera.toggle_facing(width, height)?;
        self.state.set_facing(facing);
        Ok(())
    }

    fn unmount(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.cancel();
        }
        self.camera.stop_preview();
        info!("screen unmounted");
    }
}

/// A granted camera whose preview failed to start is retried periodically.
fn preview_retry_due(mode: RenderMode, previewing: bool, since_attempt: Duration) -> bool {
    mode == RenderMode::Camera && !previewing && since_attempt >= PREVIEW_RETRY
}

pub fn run(#[cfg(target_os = "android")] android_app: slint::android::AndroidApp) -> Result<()> {
    let config = AppConfig::from_env()?;
    info!("poi service: {}", config.base_url);

    let window = MainWindow::new()?;

    let (frame_sender, frame_receiver) = channel();

    #[cfg(target_os = "android")]
    let camera = Camera::new(android_app.clone(), frame_sender);
    #[cfg(not(target_os = "android"))]
    let camera = Camera::new(frame_sender);

    #[cfg(target_os = "android")]
    let locator =
        crate::location::android::AndroidLocation::new(android_app, config.permission_wait);
    #[cfg(not(target_os = "android"))]
    let locator = crate::location::fixed::FixedLocation::new(config.fixed_location);

    let source = PoiClient::new(&config.base_url, config.request_timeout)?;
    let pipeline = pipeline::spawn(locator, source);

    let controller = Rc::new(RefCell::new(ScreenController::mount(
        window.as_weak(),
        camera,
        frame_receiver,
        pipeline,
        config.preview_size,
    )));

    let timer = Timer::default();
    {
        let controller = controller.clone();
        timer.start(TimerMode::Repeated, TICK, move || {
            controller.borrow_mut().tick(Instant::now());
        });
    }

    {
        let controller = controller.clone();
        window.on_toggle_details(move || controller.borrow_mut().toggle_details());
    }
    {
        let controller = controller.clone();
        window.on_grant_permission(move || controller.borrow_mut().grant_permission());
    }
    window.on_open_menu(|| debug!("menu pressed; no side panel yet"));

    window.run()?;

    timer.stop();
    controller.borrow_mut().unmount();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_preview_is_retried_after_backoff() {
        assert!(!preview_retry_due(RenderMode::Camera, false, Duration::ZERO));
        assert!(!preview_retry_due(
            RenderMode::Camera,
            false,
            PREVIEW_RETRY - Duration::from_millis(1)
        ));
        assert!(preview_retry_due(RenderMode::Camera, false, PREVIEW_RETRY));
    }

    #[test]
    fn running_or_hidden_preview_is_left_alone() {
        assert!(!preview_retry_due(RenderMode::Camera, true, PREVIEW_RETRY));
        assert!(!preview_retry_due(RenderMode::PermissionPrompt, false, PREVIEW_RETRY));
        assert!(!preview_retry_due(RenderMode::Blank, false, PREVIEW_RETRY));
    }
}
