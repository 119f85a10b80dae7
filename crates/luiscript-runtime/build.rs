use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn main() {
    let version = env!("CARGO_PKG_VERSION");
    let profile = std::env::var("PROFILE").unwrap_or_default();

    // Release builds report the crate version, dev builds the checkout
    let version_str = if profile == "release" {
        version.to_string()
    } else {
        match git(&["rev-parse", "--short", "HEAD"]) {
            Some(hash) => {
                let dirty = Command::new("git")
                    .args(["diff-index", "--quiet", "HEAD"])
                    .status()
                    .map(|status| !status.success())
                    .unwrap_or(false);

                if dirty {
                    format!("{hash}-dirty")
                } else {
                    hash
                }
            }
            None => "unknown".to_string(),
        }
    };

    let branch = git(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=VERSION_STRING={version_str}");
    println!("cargo:rustc-env=GIT_BRANCH={branch}");
    println!("cargo:rerun-if-changed=build.rs");
}
