use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok().map(|s| s.trim().to_string())
}

fn main() {
    // Rebuild when HEAD or refs move.
    if let Some(git_dir) = git(&["rev-parse", "--git-dir"]) {
        for entry in ["HEAD", "packed-refs", "refs/heads", "refs/tags"] {
            let path = std::path::Path::new(&git_dir).join(entry);
            if path.exists() {
                println!("cargo:rerun-if-changed={}", path.display());
            }
        }
    }

    let version = env!("CARGO_PKG_VERSION");
    let describe = match git(&["describe", "--always", "--tags", "--long", "--dirty"]) {
        Some(info) if info.contains(version) => info,
        Some(info) if !info.is_empty() => format!("v{}-{}", version, info),
        _ => version.to_string(),
    };

    println!("cargo:rustc-env=_GIT_INFO={}", describe);
}
