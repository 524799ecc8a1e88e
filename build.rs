//! Build script: embeds the git hash and checks GPU toolkits.
//!
//! The GPU and BLAS features hand whisper.cpp to a GPU toolkit. A
//! missing toolkit fails here with a readable message instead of deep inside
//! whisper-rs-sys.

use std::process::Command;

fn main() {
    // Embed git short hash for version string
    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--short=7", "HEAD"])
        .output()
        && output.status.success()
    {
        let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=GIT_HASH={}", hash);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");

    if cfg!(feature = "cuda") {
        check_cuda();
    }
    if cfg!(feature = "vulkan") {
        require_tool("vulkaninfo", &["--summary"], "Vulkan SDK", "https://vulkan.lunarg.com/");
    }
    if cfg!(feature = "hipblas") {
        require_tool("rocminfo", &[], "ROCm", "https://rocm.docs.amd.com/");
    }
    if cfg!(feature = "openblas") {
        require_tool(
            "pkg-config",
            &["--exists", "openblas"],
            "OpenBLAS",
            "sudo apt install libopenblas-dev",
        );
    }
}

fn check_cuda() {
    let output = Command::new("nvcc").arg("--version").output();
    match output {
        Ok(out) if out.status.success() => {
            let text = String::from_utf8_lossy(&out.stdout);
            match parse_cuda_version(&text) {
                Some((major, minor)) => {
                    println!("cargo::warning=CUDA {}.{} detected", major, minor)
                }
                None => println!("cargo::warning=CUDA detected (version unknown)"),
            }
        }
        _ => require_tool(
            "nvcc",
            &["--version"],
            "CUDA toolkit",
            "https://developer.nvidia.com/cuda-downloads",
        ),
    }
}

fn require_tool(tool: &str, args: &[&str], what: &str, url: &str) {
    let found = Command::new(tool)
        .args(args)
        .output()
        .is_ok_and(|out| out.status.success());
    if !found {
        panic!(
            "\n\n`{}` not found: {} is not installed.\n\
             Install: {}\n\
             Or build without GPU support: cargo build --release\n",
            tool, what, url
        );
    }
    println!("cargo::warning={} detected", what);
}

/// Parse "release X.Y" from nvcc --version output.
fn parse_cuda_version(text: &str) -> Option<(u32, u32)> {
    // nvcc output: "Cuda compilation tools, release 12.4, V12.4.131"
    let release_pos = text.find("release ")?;
    let after = &text[release_pos + 8..];
    let comma = after.find(',')?;
    let mut parts = after[..comma].split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cuda_version_standard() {
        let text = "nvcc: NVIDIA (R) Cuda compiler driver\n\
                    Cuda compilation tools, release 12.4, V12.4.131";
        assert_eq!(parse_cuda_version(text), Some((12, 4)));
    }

    #[test]
    fn parse_cuda_version_no_match() {
        assert_eq!(parse_cuda_version("no version here"), None);
        assert_eq!(parse_cuda_version("release abc, V1"), None);
    }
}
