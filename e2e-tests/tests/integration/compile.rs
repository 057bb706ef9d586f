//! Building the `schnorr-host-test` stand-in guest for the `wasm32-unknown-unknown` target.

use std::{
    env, fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

const WASM_TARGET: &str = "wasm32-unknown-unknown";

/// Cargo profile the guest is built with.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CompilationProfile {
    /// Size-optimized `wasm` profile from the workspace manifest.
    Wasm,
    /// Unoptimized `dev` profile with overflow checks enabled.
    Debug,
}

impl CompilationProfile {
    pub const ALL: [Self; 2] = [Self::Wasm, Self::Debug];

    /// Value of the `--profile` arg passed to cargo.
    fn cargo_arg(self) -> &'static str {
        match self {
            Self::Wasm => "wasm",
            Self::Debug => "dev",
        }
    }

    /// Name of the artifact dir, which differs from the profile name for `dev`.
    fn artifact_dir(self) -> &'static str {
        match self {
            Self::Wasm => "wasm",
            Self::Debug => "debug",
        }
    }

    /// Builds the guest and returns its bytecode.
    pub fn compile(self) -> Vec<u8> {
        let status = Command::new("cargo")
            .args(["build", "--lib", "--target", WASM_TARGET])
            .arg(format!("--profile={}", self.cargo_arg()))
            .stdin(Stdio::null())
            .status()
            .expect("cannot launch cargo");
        assert!(status.success(), "building guest with {self:?} profile failed: {status}");

        let guest_file = artifact_root()
            .join(WASM_TARGET)
            .join(self.artifact_dir())
            .join(format!("{}.wasm", env!("CARGO_PKG_NAME").replace('-', "_")));
        fs::read(&guest_file)
            .unwrap_or_else(|err| panic!("cannot read guest `{}`: {err}", guest_file.display()))
    }
}

/// Finds the cargo target dir by walking up from the test executable
/// (`target/<profile>/deps/<test>`) to the first ancestor with a wasm32 subdir.
fn artifact_root() -> PathBuf {
    let test_exe = env::current_exe().expect("cannot locate test executable");
    test_exe
        .ancestors()
        .skip(1)
        .find(|dir| dir.join(WASM_TARGET).is_dir())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| panic!("no `{WASM_TARGET}` artifacts above `{}`", test_exe.display()))
}
