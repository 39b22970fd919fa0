fn main() {
    let base = env!("CARGO_PKG_VERSION");

    // Optional build metadata, e.g. a CI run id or commit
    let version = match std::env::var("HELIOS_BUILD_ID") {
        Ok(id) if !id.trim().is_empty() => format!("{}+{}", base, id.trim()),
        _ => base.to_string(),
    };

    println!("cargo:rustc-env=APP_VERSION={}", version);
    println!("cargo:rerun-if-env-changed=HELIOS_BUILD_ID");
}
