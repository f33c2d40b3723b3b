// JNI bindings exposing AudioIOStream to the managed AudioIO library

pub mod adapter;
mod jni_bindings;
pub mod native;
pub mod status;

pub use adapter::{BoundaryAdapter, HandleField};
pub use status::{BoundaryError, StatusCode};

/// Initialize logging for the platform
pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("AudioIO"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        let _ = env_logger::try_init();
    }
}
