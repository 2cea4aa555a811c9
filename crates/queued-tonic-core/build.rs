//! Generates the gRPC client and server bindings for `proto/queued.proto`
//! using `tonic-prost-build`.
//!
//! The file descriptor set is written alongside the generated code so the
//! server can register it with `tonic-reflection`.

use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
    let descriptor_path = out_dir.join("queued_descriptor.bin");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/queued.proto"], &["proto"])
        .unwrap();
}
