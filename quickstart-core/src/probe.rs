//! Read-only hardware queries consumed by the tuning policy and the wizard.
use crate::platform;

/// Ordered capability strings describing the host. The first element of
/// each list is the authoritative one.
pub trait HardwareProbe: Send + Sync {
    /// Vulkan physical device names. Empty when no Vulkan device is present.
    fn gpu_names(&self) -> Vec<String>;

    /// LLVM CPU target names, e.g. `cortex-a710`.
    fn cpu_names(&self) -> Vec<String>;

    /// Whether the runtime can load a user-supplied GPU driver.
    fn supports_custom_driver(&self) -> bool {
        true
    }
}

/// A probe with fixed answers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticProbe {
    pub gpu_names: Vec<String>,
    pub cpu_names: Vec<String>,
    pub custom_driver: bool,
}

impl StaticProbe {
    pub fn new(gpu_names: Vec<String>, cpu_names: Vec<String>) -> Self {
        Self {
            gpu_names,
            cpu_names,
            custom_driver: true,
        }
    }

    pub fn without_custom_driver(mut self) -> Self {
        self.custom_driver = false;
        self
    }
}

impl HardwareProbe for StaticProbe {
    fn gpu_names(&self) -> Vec<String> {
        self.gpu_names.clone()
    }

    fn cpu_names(&self) -> Vec<String> {
        self.cpu_names.clone()
    }

    fn supports_custom_driver(&self) -> bool {
        self.custom_driver
    }
}

/// Probes the running system, with optional overrides for either list.
#[derive(Debug, Clone, Default)]
pub struct SystemProbe {
    gpu_override: Vec<String>,
    cpu_override: Vec<String>,
    custom_driver: bool,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            custom_driver: true,
            ..Self::default()
        }
    }

    pub fn with_gpu_names(mut self, names: Vec<String>) -> Self {
        self.gpu_override = names;
        self
    }

    pub fn with_cpu_names(mut self, names: Vec<String>) -> Self {
        self.cpu_override = names;
        self
    }

    pub fn with_custom_driver(mut self, supported: bool) -> Self {
        self.custom_driver = supported;
        self
    }
}

impl HardwareProbe for SystemProbe {
    fn gpu_names(&self) -> Vec<String> {
        if !self.gpu_override.is_empty() {
            return self.gpu_override.clone();
        }
        platform::gpu_names()
    }

    fn cpu_names(&self) -> Vec<String> {
        if !self.cpu_override.is_empty() {
            return self.cpu_override.clone();
        }
        platform::cpu_names()
    }

    fn supports_custom_driver(&self) -> bool {
        self.custom_driver
    }
}

/// Removes repeated names while keeping first-seen order.
pub(crate) fn dedup_in_order(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_take_precedence_over_the_system() {
        let probe = SystemProbe::new()
            .with_gpu_names(vec!["Adreno (TM) 740".into()])
            .with_cpu_names(vec!["cortex-a710".into(), "cortex-x3".into()]);

        assert_eq!(probe.gpu_names(), vec!["Adreno (TM) 740".to_string()]);
        assert_eq!(probe.cpu_names()[0], "cortex-a710");
        assert!(probe.supports_custom_driver());
    }

    #[test]
    fn static_probe_can_disable_custom_drivers() {
        let probe = StaticProbe::new(vec![], vec![]).without_custom_driver();
        assert!(!probe.supports_custom_driver());
        assert!(probe.gpu_names().is_empty());
    }

    #[test]
    fn dedup_keeps_first_seen_order() {
        let names = ["cortex-a510", "cortex-a510", "cortex-a710", "", "cortex-a510", "cortex-x3"]
            .into_iter()
            .map(String::from);
        assert_eq!(
            dedup_in_order(names),
            vec!["cortex-a510", "cortex-a710", "cortex-x3"]
        );
    }
}
