use crate::probe::dedup_in_order;
use sysinfo::System;

/// CPU brand strings as reported by `sysinfo`, lower-cased.
pub fn cpu_names() -> Vec<String> {
    let mut system = System::new();
    system.refresh_cpu_all();
    dedup_in_order(
        system
            .cpus()
            .iter()
            .map(|cpu| cpu.brand().trim().to_lowercase()),
    )
}

/// No portable way to enumerate Vulkan devices without the loader.
#[cfg_attr(any(target_os = "linux", target_os = "android"), allow(dead_code))]
pub fn gpu_names() -> Vec<String> {
    Vec::new()
}
