//! Build script for regenerating the checked-in protobuf bindings
//!
//! The generated code lives in `src/proto/process.rs` so that regular builds
//! do not need `protoc`. Set `ENVD_SDK_REGENERATE_PROTO=1` after editing the
//! proto files.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-env-changed=ENVD_SDK_REGENERATE_PROTO");
    if std::env::var_os("ENVD_SDK_REGENERATE_PROTO").is_none() {
        return Ok(());
    }

    let out_dir = "src/proto";
    std::fs::create_dir_all(out_dir)?;

    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        // The Connect rpc would clash with the generated `connect` constructor
        .build_transport(false)
        .out_dir(out_dir)
        .compile_protos(&["../proto/envd/process/process.proto"], &["../proto"])?;

    println!("cargo:rerun-if-changed=../proto");
    Ok(())
}
