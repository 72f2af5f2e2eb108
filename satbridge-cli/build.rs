use std::{env, path::Path, process::Command, str::from_utf8};

fn main() {
    let rustc = env::var("RUSTC").unwrap();
    let package_version = env::var("CARGO_PKG_VERSION").unwrap();

    let rustc_version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|result| result.status.success())
        .expect("Failed to query rustc version");

    let version = Some(Path::new("../.git"))
        .filter(|git_dir| git_dir.exists())
        .and_then(|_| {
            Command::new("git")
                .args(&["describe", "--tags", "--match=v[0-9]*", "--dirty=-d", "--always"])
                .output()
                .ok()
        })
        .filter(|result| result.status.success())
        .and_then(|result| String::from_utf8(result.stdout).ok())
        .map(|described| described.trim().trim_start_matches('v').to_owned())
        .unwrap_or(package_version);

    println!("cargo:rustc-env=SATBRIDGE_VERSION={}", version);
    println!(
        "cargo:rustc-env=SATBRIDGE_RUSTC_VERSION={}",
        from_utf8(rustc_version.stdout.as_slice()).unwrap().trim()
    );
    println!(
        "cargo:rustc-env=SATBRIDGE_PROFILE={}",
        env::var("PROFILE").unwrap()
    );
}
