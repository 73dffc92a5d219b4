//! JNI helpers around the NativeActivity: permissions and system services.

use anyhow::{anyhow, Result};
use jni::{
    objects::{JObject, JValueGen},
    sys::{jint, JNIInvokeInterface_, _jobject},
    AttachGuard, JavaVM,
};
use log::info;

pub const CAMERA_PERMISSION: &str = "android.permission.CAMERA";
pub const FINE_LOCATION_PERMISSION: &str = "android.permission.ACCESS_FINE_LOCATION";
pub const COARSE_LOCATION_PERMISSION: &str = "android.permission.ACCESS_COARSE_LOCATION";

const CAMERA_REQUEST_CODE: i32 = 100;
const LOCATION_REQUEST_CODE: i32 = 101;

/// Runtime permissions only exist from API 23 (Marshmallow).
const RUNTIME_PERMISSION_SDK: i32 = 23;

pub fn java_vm(app: &slint::android::AndroidApp) -> Result<JavaVM> {
    Ok(unsafe { JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)? })
}

/// The activity handle is owned by the Java side; never delete it.
pub fn activity<'a>(app: &slint::android::AndroidApp) -> JObject<'a> {
    unsafe { JObject::from_raw(app.activity_as_ptr() as *mut _jobject) }
}

pub fn attach(vm: &JavaVM) -> Result<AttachGuard<'_>> {
    Ok(vm.attach_current_thread()?)
}

pub fn sdk_version(app: &slint::android::AndroidApp) -> Result<i32> {
    let vm = java_vm(app)?;
    let mut env = attach(&vm)?;
    Ok(env
        .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")?
        .i()?)
}

pub fn check_self_permission(app: &slint::android::AndroidApp, permission: &str) -> Result<bool> {
    if sdk_version(app)? < RUNTIME_PERMISSION_SDK {
        return Ok(true);
    }
    let vm = java_vm(app)?;
    let mut env = attach(&vm)?;
    let granted_int = env
        .get_static_field(
            "android/content/pm/PackageManager",
            "PERMISSION_GRANTED",
            "I",
        )?
        .i()?;
    let permission_str = env.new_string(permission)?;
    let result = env
        .call_method(
            activity(app),
            "checkSelfPermission",
            "(Ljava/lang/String;)I",
            &[JValueGen::Object(&JObject::from(permission_str))],
        )?
        .i()?;
    Ok(result == granted_int)
}

/// Fire the system permission dialog. The answer is not delivered to
/// native code, so callers poll `check_self_permission` afterwards.
pub fn request_permissions(
    app: &slint::android::AndroidApp,
    permissions: &[&str],
    request_code: i32,
) -> Result<()> {
    let vm = java_vm(app)?;
    let mut env = attach(&vm)?;

    let permission_count = permissions.len() as jint;
    let java_permission_array =
        env.new_object_array(permission_count, "java/lang/String", JObject::null())?;
    for (index, permission) in permissions.iter().enumerate() {
        let permission_str = env.new_string(*permission)?;
        env.set_object_array_element(&java_permission_array, index as jint, permission_str)?;
    }

    env.call_method(
        activity(app),
        "requestPermissions",
        "([Ljava/lang/String;I)V",
        &[
            JValueGen::Object(&JObject::from(java_permission_array)),
            request_code.into(),
        ],
    )?;
    Ok(())
}

pub fn request_camera_permission(app: &slint::android::AndroidApp) -> Result<()> {
    if !check_self_permission(app, CAMERA_PERMISSION)? {
        info!("requesting camera permission");
        request_permissions(app, &[CAMERA_PERMISSION], CAMERA_REQUEST_CODE)?;
    }
    Ok(())
}

pub fn request_location_permission(app: &slint::android::AndroidApp) -> Result<()> {
    info!("requesting location permission");
    request_permissions(
        app,
        &[FINE_LOCATION_PERMISSION, COARSE_LOCATION_PERMISSION],
        LOCATION_REQUEST_CODE,
    )
}

/// Cached last-known fix for `provider` ("gps", "network"), as
/// `(latitude, longitude)`. `LocationManager` is not asked for a fresh
/// fix, so the value may be old, and `None` just means nothing is cached.
pub fn last_known_location(
    app: &slint::android::AndroidApp,
    provider: &str,
) -> Result<Option<(f64, f64)>> {
    let vm = java_vm(app)?;
    let mut env = attach(&vm)?;

    let service_name = env.new_string("location")?;
    let manager = env
        .call_method(
            activity(app),
            "getSystemService",
            "(Ljava/lang/String;)Ljava/lang/Object;",
            &[JValueGen::Object(&JObject::from(service_name))],
        )?
        .l()?;
    if manager.is_null() {
        return Err(anyhow!("LocationManager service is not available"));
    }

    let provider_str = env.new_string(provider)?;
    let location = env
        .call_method(
            &manager,
            "getLastKnownLocation",
            "(Ljava/lang/String;)Landroid/location/Location;",
            &[JValueGen::Object(&JObject::from(provider_str))],
        )?
        .l()?;
    if location.is_null() {
        return Ok(None);
    }

    let latitude = env.call_method(&location, "getLatitude", "()D", &[])?.d()?;
    let longitude = env.call_method(&location, "getLongitude", "()D", &[])?.d()?;
    Ok(Some((latitude, longitude)))
}
