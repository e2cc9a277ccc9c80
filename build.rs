fn main() {
    // The headless library needs no build step; only the desktop shell
    // generates Tauri context and permissions.
    #[cfg(feature = "desktop")]
    tauri_build::build()
}
