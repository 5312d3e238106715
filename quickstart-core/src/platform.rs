//! Provides platform-specific hardware discovery.
//!
//! Each submodule exposes the same two functions, `gpu_names` and
//! `cpu_names`, so that [`crate::probe::SystemProbe`] can use them without
//! caring which OS it runs on. Linux and Android read sysfs and procfs
//! directly; everything else falls back to what `sysinfo` reports.

mod generic;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use self::linux::*;

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub use self::generic::*;
