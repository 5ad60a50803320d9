//! Container memory accounting via the cgroup files visible inside the
//! container, with v1 paths tried before their v2 equivalents.

use bollard::Docker;

use crate::exec;

const V1_USAGE: &str = "/sys/fs/cgroup/memory/memory.usage_in_bytes";
const V1_PEAK: &str = "/sys/fs/cgroup/memory/memory.max_usage_in_bytes";
const V2_CURRENT: &str = "/sys/fs/cgroup/memory.current";
const V2_PEAK: &str = "/sys/fs/cgroup/memory.peak";

/// Memory usage right before a test case starts; 0 when no counter is
/// readable.
pub(crate) async fn baseline(docker: &Docker, container_id: &str) -> u64 {
    read_first(docker, container_id, &[V1_USAGE, V2_CURRENT]).await
}

/// High-water mark after a test case ran. cgroup v2 only exposes
/// `memory.peak` on recent kernels, so `memory.current` is the last resort.
pub(crate) async fn peak(docker: &Docker, container_id: &str) -> u64 {
    read_first(docker, container_id, &[V1_PEAK, V2_PEAK, V2_CURRENT]).await
}

/// Resets the v1 peak counter so the next sample is per-case. Best effort:
/// v2 has no reset knob and the file may be read-only.
pub(crate) async fn reset_peak(docker: &Docker, container_id: &str) {
    let command = format!("echo 0 > {} 2>/dev/null || true", V1_PEAK);
    if let Err(err) = exec::run(docker, container_id, &command, None).await {
        tracing::debug!(container = container_id, error = %err, "peak counter reset failed");
    }
}

async fn read_first(docker: &Docker, container_id: &str, paths: &[&str]) -> u64 {
    for path in paths {
        let command = format!("cat {} 2>/dev/null", path);
        match exec::run(docker, container_id, &command, None).await {
            Ok(out) if out.exit_code == Some(0) => {
                if let Ok(value) = out.stdout.trim().parse::<u64>() {
                    return value;
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(container = container_id, path, error = %err, "cgroup read failed");
            }
        }
    }
    0
}
