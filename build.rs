//! Build script for proto compilation.
//!
//! Compiles `proto/provider.proto` into the `generated` module. A `protoc`
//! binary is taken from the `PROTOC` environment variable when set, otherwise
//! the vendored one is used so the crate builds without a system install.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/provider.proto");
    println!("cargo:rerun-if-env-changed=PROTOC");

    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path().map_err(|e| e.to_string())?;
        std::env::set_var("PROTOC", protoc);
    }

    tonic_prost_build::configure()
        .build_client(false)
        .build_server(true)
        .compile_protos(&["proto/provider.proto"], &["proto"])?;

    Ok(())
}
