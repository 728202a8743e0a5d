#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub use stream_runner_test_utils::{init_tracing, wait_until, with_timeout};

/// Write an executable `/bin/sh` script to `dir/name` and return its path.
pub fn write_stub_relay(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write stub relay");
    let mut perms = fs::metadata(&path).expect("stat stub relay").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod stub relay");
    path
}

/// True if `pid` no longer runs: either gone from `/proc` or a zombie
/// waiting for someone else to reap it.
pub fn process_gone(pid: u32) -> bool {
    let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return true;
    };
    // Format: "<pid> (<comm>) <state> ..."; comm may itself contain ')'.
    match stat.rfind(')').and_then(|i| stat[i + 1..].split_whitespace().next()) {
        Some(state) => state == "Z" || state == "X",
        None => true,
    }
}

/// Read a pid that a stub relay wrote to `path`, if it is there yet.
pub fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}
