#![allow(dead_code)]

use std::path::Path;
use std::process::{Command, Stdio};

use oj_runner::config::{EngineConfig, MilliSecond};
use oj_runner::sandbox::Engine;

/// Whether `program` can be spawned on this host
pub fn available(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Skips the calling test when a toolchain program is missing
macro_rules! require {
    ($($program:expr),+) => {
        $(
            if !common::available($program) {
                eprintln!("skipping: `{}` is not installed", $program);
                return;
            }
        )+
    };
}

pub fn engine_config(root: &Path) -> EngineConfig {
    let mut config = EngineConfig {
        workspace_root: Some(root.to_path_buf()),
        ..EngineConfig::default()
    };
    // JVM start-up and g++ are slow on shared CI machines
    config.limits.compile_time_limit = MilliSecond(60_000);
    config
}

pub fn engine(root: &Path) -> Engine {
    Engine::new(engine_config(root)).expect("engine")
}

/// Number of entries left in the workspace root
pub fn leftover_workspaces(root: &Path) -> usize {
    std::fs::read_dir(root).map(|dir| dir.count()).unwrap_or(0)
}
