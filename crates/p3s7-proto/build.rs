//! Generates the `rtcl_p3s7_control` messages and client stub.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .type_attribute(".", "#[allow(missing_docs)]")
        .compile(&["proto/rtcl_p3s7_control.proto"], &["proto"])?;

    Ok(())
}
