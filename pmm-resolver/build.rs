//! Emits GIT_HASH, BUILD_PROFILE and BUILD_TIMESTAMP for `pmm --version`

use std::process::Command;

fn git_hash() -> Option<String> {
    let output = Command::new("git").args(["rev-parse", "--short=8", "HEAD"]).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    let env = [
        ("GIT_HASH", git_hash().unwrap_or_else(|| "unknown".to_string())),
        ("BUILD_PROFILE", std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string())),
        ("BUILD_TIMESTAMP", chrono::Utc::now().format("%Y-%m-%dT%H:%MZ").to_string()),
    ];
    for (key, value) in env {
        println!("cargo:rustc-env={}={}", key, value);
    }

    println!("cargo:rerun-if-changed=../.git/HEAD");
}
