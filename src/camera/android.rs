//! Camera2 NDK preview. Frames arrive on an image-reader callback thread,
//! are converted to RGBA on the CPU and sent to the UI.

use core::slice;
use std::{
    ffi::{c_int, c_void, CStr},
    mem::zeroed,
    ptr::null_mut,
    sync::{mpsc::Sender, Mutex},
    time::Instant,
};

use anyhow::{anyhow, Result};
use image::RgbaImage;
use log::{error, info, warn};
use ndk_sys::{
    acamera_metadata_tag, camera_status_t, media_status_t, ACameraCaptureSession,
    ACameraCaptureSession_close, ACameraCaptureSession_setRepeatingRequest,
    ACameraCaptureSession_stopRepeating,
    ACameraCaptureSession_stateCallbacks, ACameraDevice, ACameraDevice_StateCallbacks,
    ACameraDevice_close, ACameraDevice_createCaptureRequest, ACameraDevice_createCaptureSession,
    ACameraDevice_getId, ACameraDevice_request_template, ACameraManager,
    ACameraManager_create, ACameraManager_delete, ACameraManager_deleteCameraIdList,
    ACameraManager_getCameraCharacteristics, ACameraManager_getCameraIdList,
    ACameraManager_openCamera, ACameraMetadata_const_entry, ACameraMetadata_free,
    ACameraMetadata_getConstEntry, ACameraOutputTarget, ACameraOutputTarget_create,
    ACameraOutputTarget_free, ACaptureRequest, ACaptureRequest_addTarget, ACaptureRequest_free,
    ACaptureSessionOutput, ACaptureSessionOutputContainer, ACaptureSessionOutputContainer_add,
    ACaptureSessionOutputContainer_create, ACaptureSessionOutputContainer_free,
    ACaptureSessionOutput_create, ACaptureSessionOutput_free, AImage, AImageReader,
    AImageReader_ImageListener, AImageReader_acquireLatestImage, AImageReader_delete,
    AImageReader_getWindow, AImageReader_new, AImageReader_setImageListener, AImage_delete,
    AImage_getHeight, AImage_getPlaneData, AImage_getPlanePixelStride, AImage_getPlaneRowStride,
    AImage_getWidth, ANativeWindow, AIMAGE_FORMATS,
};
use slint::SharedPixelBuffer;

use super::{
    yuv::{rotate_upright, Yuv420Planes},
    FrameBuffer, FrameStats,
};
use crate::model::CameraFacing;

#[link(name = "camera2ndk")]
extern "C" {}

#[link(name = "mediandk")]
extern "C" {}

const LENS_FACING_FRONT: u8 = 0;
const LENS_FACING_BACK: u8 = 1;
const MAX_READER_IMAGES: i32 = 2;

/// Must stay at a fixed address while open: its pointer is the context of
/// every NDK callback. The facade keeps it boxed.
pub struct AndroidCamera {
    camera_device: *mut ACameraDevice,
    capture_request: *mut ACaptureRequest,
    output_target: *mut ACameraOutputTarget,
    session_output: *mut ACaptureSessionOutput,
    output_container: *mut ACaptureSessionOutputContainer,
    capture_session: *mut ACameraCaptureSession,
    image_reader: *mut AImageReader,
    image_listener: AImageReader_ImageListener,
    session_callbacks: ACameraCaptureSession_stateCallbacks,
    device_callbacks: ACameraDevice_StateCallbacks,
    sensor_orientation: i32,
    frame_sender: Sender<FrameBuffer>,
    sink: Option<Box<FrameSink>>,
}

/// What the image callback touches. Boxed separately so the callback
/// thread never holds a reference into `AndroidCamera`.
struct FrameSink {
    frame_sender: Mutex<Sender<FrameBuffer>>,
    sensor_orientation: i32,
    stats: Mutex<FrameStats>,
}

struct CameraChoice {
    id: *const std::os::raw::c_char,
    lens_facing: u8,
    sensor_orientation: i32,
}

impl AndroidCamera {
    pub fn new(frame_sender: Sender<FrameBuffer>) -> Self {
        Self {
            camera_device: null_mut(),
            capture_request: null_mut(),
            output_target: null_mut(),
            session_output: null_mut(),
            output_container: null_mut(),
            capture_session: null_mut(),
            image_reader: null_mut(),
            image_listener: AImageReader_ImageListener {
                context: null_mut(),
                onImageAvailable: None,
            },
            session_callbacks: unsafe { zeroed() },
            device_callbacks: unsafe { zeroed() },
            sensor_orientation: 0,
            frame_sender,
            sink: None,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.camera_device.is_null()
    }

    /// Open the first camera whose lens faces `facing`.
    pub fn open(&mut self, facing: CameraFacing) -> Result<()> {
        self.close();
        let wanted = match facing {
            CameraFacing::Back => LENS_FACING_BACK,
            CameraFacing::Front => LENS_FACING_FRONT,
        };

        unsafe {
            let manager = ACameraManager_create();
            let mut id_list = null_mut();
            let status = ACameraManager_getCameraIdList(manager, &mut id_list);
            if status != camera_status_t::ACAMERA_OK || id_list.is_null() {
                ACameraManager_delete(manager);
                return Err(anyhow!("Failed to get camera id list (reason: {:?})", status));
            }

            let ids = slice::from_raw_parts((*id_list).cameraIds, (*id_list).numCameras.max(0) as usize);
            let mut choice = None;
            for &id in ids {
                match describe_camera(manager, id) {
                    Ok(found) if found.lens_facing == wanted => {
                        choice = Some(found);
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => warn!("skipping camera {:?}: {err:?}", get_cstr(id)),
                }
            }

            let result = match choice {
                None => Err(anyhow!("no {facing:?} camera found among {} devices", ids.len())),
                Some(choice) => {
                    self.sensor_orientation = choice.sensor_orientation;
                    info!(
                        "opening camera {:?} facing {facing:?}, orientation {}",
                        get_cstr(choice.id),
                        choice.sensor_orientation
                    );
                    self.device_callbacks.onDisconnected = Some(on_disconnected);
                    self.device_callbacks.onError = Some(on_error);
                    let status = ACameraManager_openCamera(
                        manager,
                        choice.id,
                        &mut self.device_callbacks,
                        &mut self.camera_device,
                    );
                    if status == camera_status_t::ACAMERA_OK {
                        Ok(())
                    } else {
                        self.camera_device = null_mut();
                        Err(anyhow!("Failed to open camera device (reason: {:?})", status))
                    }
                }
            };

            ACameraManager_deleteCameraIdList(id_list);
            ACameraManager_delete(manager);
            result
        }
    }

    pub fn start_preview(&mut self, width: u32, height: u32) -> Result<()> {
        if !self.is_open() {
            return Err(anyhow!("camera is not open"));
        }
        self.create_image_reader(width, height)?;
        unsafe {
            let status = ACameraDevice_createCaptureRequest(
                self.camera_device,
                ACameraDevice_request_template::TEMPLATE_PREVIEW,
                &mut self.capture_request,
            );
            if status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!("Failed to create preview request (reason: {:?})", status));
            }

            let mut window: *mut ANativeWindow = null_mut();
            if AImageReader_getWindow(self.image_reader, &mut window) != media_status_t::AMEDIA_OK {
                return Err(anyhow!("AImageReader_getWindow failed"));
            }

            ACameraOutputTarget_create(window, &mut self.output_target);
            ACaptureRequest_addTarget(self.capture_request, self.output_target);
            ACaptureSessionOutput_create(window, &mut self.session_output);

            let status = ACaptureSessionOutputContainer_create(&mut self.output_container);
            if status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to create capture session output container (reason: {:?})",
                    status
                ));
            }
            ACaptureSessionOutputContainer_add(self.output_container, self.session_output);

            self.session_callbacks.context = (self as *mut Self).cast::<c_void>();
            self.session_callbacks.onReady = Some(on_session_ready);
            self.session_callbacks.onActive = Some(on_session_active);
            self.session_callbacks.onClosed = Some(on_session_closed);

            let status = ACameraDevice_createCaptureSession(
                self.camera_device,
                self.output_container,
                &self.session_callbacks,
                &mut self.capture_session,
            );
            if status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!("Failed to create capture session (reason: {:?})", status));
            }

            let status = ACameraCaptureSession_setRepeatingRequest(
                self.capture_session,
                null_mut(),
                1,
                &mut self.capture_request,
                null_mut(),
            );
            if status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!("Failed to set repeating request (reason: {:?})", status));
            }
        }
        info!("preview started {width}x{height}");
        Ok(())
    }

    fn create_image_reader(&mut self, width: u32, height: u32) -> Result<()> {
        unsafe {
            let status = AImageReader_new(
                width as i32,
                height as i32,
                AIMAGE_FORMATS::AIMAGE_FORMAT_YUV_420_888.0 as i32,
                MAX_READER_IMAGES,
                &mut self.image_reader,
            );
            if status != media_status_t::AMEDIA_OK {
                return Err(anyhow!("Failed to create image reader (reason: {:?})", status));
            }

            let sink = Box::new(FrameSink {
                frame_sender: Mutex::new(self.frame_sender.clone()),
                sensor_orientation: self.sensor_orientation,
                stats: Mutex::new(FrameStats::new(Instant::now())),
            });
            self.image_listener.context = (&*sink as *const FrameSink).cast_mut().cast::<c_void>();
            self.sink = Some(sink);
            self.image_listener.onImageAvailable = Some(on_image_available);
            let status = AImageReader_setImageListener(self.image_reader, &mut self.image_listener);
            if status != media_status_t::AMEDIA_OK {
                return Err(anyhow!("Failed to set image listener (reason: {:?})", status));
            }
        }
        Ok(())
    }

    /// Frames stop first: the repeating request, the session, then the
    /// reader and its listener. Only then is the callback state dropped
    /// and the device released.
    pub fn close(&mut self) {
        unsafe {
            if !self.capture_session.is_null() {
                ACameraCaptureSession_stopRepeating(self.capture_session);
                ACameraCaptureSession_close(self.capture_session);
                self.capture_session = null_mut();
            }
            if !self.image_reader.is_null() {
                AImageReader_setImageListener(self.image_reader, null_mut());
                AImageReader_delete(self.image_reader);
                self.image_reader = null_mut();
            }
            self.sink = None;
            if !self.camera_device.is_null() {
                if ACameraDevice_close(self.camera_device) != camera_status_t::ACAMERA_OK {
                    error!("Failed to close camera device.");
                }
                self.camera_device = null_mut();
            }
            if !self.capture_request.is_null() {
                ACaptureRequest_free(self.capture_request);
                self.capture_request = null_mut();
            }
            if !self.output_target.is_null() {
                ACameraOutputTarget_free(self.output_target);
                self.output_target = null_mut();
            }
            if !self.output_container.is_null() {
                ACaptureSessionOutputContainer_free(self.output_container);
                self.output_container = null_mut();
            }
            if !self.session_output.is_null() {
                ACaptureSessionOutput_free(self.session_output);
                self.session_output = null_mut();
            }
        }
        info!("camera closed");
    }
}

impl Drop for AndroidCamera {
    fn drop(&mut self) {
        self.close();
    }
}

unsafe fn describe_camera(
    manager: *mut ACameraManager,
    id: *const std::os::raw::c_char,
) -> Result<CameraChoice> {
    let mut metadata = null_mut();
    let status = ACameraManager_getCameraCharacteristics(manager, id, &mut metadata);
    if status != camera_status_t::ACAMERA_OK || metadata.is_null() {
        return Err(anyhow!("no characteristics (reason: {:?})", status));
    }

    let mut lens_facing: ACameraMetadata_const_entry = zeroed();
    let mut orientation: ACameraMetadata_const_entry = zeroed();
    ACameraMetadata_getConstEntry(
        metadata,
        acamera_metadata_tag::ACAMERA_LENS_FACING.0,
        &mut lens_facing,
    );
    ACameraMetadata_getConstEntry(
        metadata,
        acamera_metadata_tag::ACAMERA_SENSOR_ORIENTATION.0,
        &mut orientation,
    );
    let facing = entry_u8(&lens_facing);
    let sensor_orientation = entry_i32(&orientation).unwrap_or(0);
    ACameraMetadata_free(metadata);

    let lens_facing = facing.ok_or_else(|| anyhow!("lens facing unknown"))?;
    Ok(CameraChoice {
        id,
        lens_facing,
        sensor_orientation,
    })
}

unsafe fn entry_u8(entry: &ACameraMetadata_const_entry) -> Option<u8> {
    if entry.count == 0 || entry.data.u8_.is_null() {
        return None;
    }
    Some(*entry.data.u8_)
}

unsafe fn entry_i32(entry: &ACameraMetadata_const_entry) -> Option<i32> {
    if entry.count == 0 || entry.data.i32_.is_null() {
        return None;
    }
    Some(*entry.data.i32_)
}

unsafe fn plane<'a>(image: *mut AImage, index: i32) -> Result<&'a [u8]> {
    let mut data = null_mut();
    let mut len: c_int = 0;
    let status = AImage_getPlaneData(image, index, &mut data, &mut len);
    if status != media_status_t::AMEDIA_OK || data.is_null() {
        return Err(anyhow!("plane {index} unavailable (reason: {:?})", status));
    }
    Ok(slice::from_raw_parts(data, len.max(0) as usize))
}

impl FrameSink {
    unsafe fn deliver(&self, reader: *mut AImageReader) -> Result<()> {
        let mut image: *mut AImage = null_mut();
        let status = AImageReader_acquireLatestImage(reader, &mut image);
        if status != media_status_t::AMEDIA_OK {
            return Err(anyhow!("Failed to acquire image (reason: {:?})", status));
        }
        let result = convert_image(image);
        AImage_delete(image);
        let frame = rotate_upright(result?, self.sensor_orientation);

        let (width, height) = frame.dimensions();
        let buf = SharedPixelBuffer::clone_from_slice(frame.as_raw().as_slice(), width, height);
        self.frame_sender
            .lock()
            .map_err(|_| anyhow!("frame sender poisoned"))?
            .send(buf)
            .map_err(|err| anyhow!("{:?}", err))?;

        if let Ok(mut stats) = self.stats.lock() {
            if let Some(fps) = stats.record(Instant::now()) {
                info!("preview FPS:{fps}");
            }
        }
        Ok(())
    }
}

unsafe fn convert_image(image: *mut AImage) -> Result<RgbaImage> {
    let (mut width, mut height) = (0, 0);
    AImage_getWidth(image, &mut width);
    AImage_getHeight(image, &mut height);
    if width <= 0 || height <= 0 {
        return Err(anyhow!("invalid frame size {width}x{height}"));
    }

    let y = plane(image, 0)?;
    let u = plane(image, 1)?;
    let v = plane(image, 2)?;
    let (mut y_row_stride, mut uv_row_stride, mut uv_pixel_stride) = (0, 0, 0);
    AImage_getPlaneRowStride(image, 0, &mut y_row_stride);
    AImage_getPlaneRowStride(image, 1, &mut uv_row_stride);
    AImage_getPlanePixelStride(image, 1, &mut uv_pixel_stride);

    let planes = Yuv420Planes {
        y,
        u,
        v,
        y_row_stride: y_row_stride as usize,
        uv_row_stride: uv_row_stride as usize,
        uv_pixel_stride: uv_pixel_stride.max(1) as usize,
    };
    let mut rgba = Vec::new();
    planes.to_rgba(width as u32, height as u32, &mut rgba);
    let frame = RgbaImage::from_raw(width as u32, height as u32, rgba)
        .ok_or_else(|| anyhow!("rgba buffer does not match {width}x{height}"))?;
    Ok(frame)
}

unsafe extern "C" fn on_image_available(context: *mut c_void, reader: *mut AImageReader) {
    let sink = &*context.cast::<FrameSink>();
    if let Err(err) = sink.deliver(reader) {
        warn!("frame dropped: {err:?}");
    }
}

unsafe extern "C" fn on_disconnected(_context: *mut c_void, device: *mut ACameraDevice) {
    info!("Camera(id: {:?}) is disconnected.", get_cstr(ACameraDevice_getId(device)));
}

unsafe extern "C" fn on_error(_context: *mut c_void, device: *mut ACameraDevice, error: c_int) {
    error!(
        "Error(code: {}) on Camera(id: {:?}).",
        error,
        get_cstr(ACameraDevice_getId(device))
    );
}

unsafe extern "C" fn on_session_ready(_context: *mut c_void, session: *mut ACameraCaptureSession) {
    info!("Session is ready. {:?}", session);
}

unsafe extern "C" fn on_session_active(_context: *mut c_void, session: *mut ACameraCaptureSession) {
    info!("Session is activated. {:?}", session);
}

unsafe extern "C" fn on_session_closed(_context: *mut c_void, session: *mut ACameraCaptureSession) {
    info!("Session is closed. {:?}", session);
}

unsafe fn get_cstr<'a>(s: *const std::os::raw::c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}
