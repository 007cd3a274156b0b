fn main() {
    // Only the libFLAC backend needs a native library
    if std::env::var_os("CARGO_FEATURE_LIBFLAC").is_some() {
        if let Err(e) = pkg_config::Config::new()
            .atleast_version("1.3.0")
            .probe("flac")
        {
            println!("cargo:warning=libFLAC not found via pkg-config: {}", e);
            println!("cargo:rustc-link-lib=FLAC");
        }
    }

    println!("cargo:rerun-if-changed=build.rs");
}
