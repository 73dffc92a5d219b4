pub mod app;
pub mod camera;
pub mod config;
pub mod location;
pub mod model;
pub mod overlay;
pub mod pipeline;
pub mod poi;
pub mod screen;

#[cfg(target_os = "android")]
mod android;

#[cfg(target_os = "android")]
#[no_mangle]
fn android_main(app: slint::android::AndroidApp) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("poi_lens"),
    );
    if let Err(err) = slint::android::init(app.clone()) {
        log::error!("slint init failed: {err:?}");
        return;
    }
    if let Err(err) = app::run(app) {
        log::error!("screen exited with error: {err:?}");
    }
}
