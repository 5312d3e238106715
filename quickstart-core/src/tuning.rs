//! Hardware-driven overrides applied to a fresh configuration.
//!
//! The rules only look at the first GPU and first CPU reported by the probe.
//! GPU rules are skipped when the user has switched to a custom driver, since
//! the workarounds target the vendor driver.
use crate::config::{ConfigError, ConfigStore};
use crate::probe::HardwareProbe;
use crate::schema::ConfigKey;
use std::collections::BTreeMap;

/// GPU families whose vendor driver mishandles BGRA textures.
pub const GPU_TEXTURE_MARKERS: [&str; 2] = ["Adreno (TM) 7", "Adreno (TM) 8"];
/// GPU family that also needs CPU texture uploads.
pub const GPU_UPLOAD_MARKER: &str = "Adreno (TM) 7";

/// CPU targets the JIT must not be tuned for.
pub const CPU_DENY_LIST: [&str; 10] = [
    "cortex-a510",
    "cortex-a710",
    "cortex-x2",
    "cortex-a715",
    "cortex-x3",
    "cortex-a520",
    "cortex-a720",
    "cortex-a725",
    "cortex-x4",
    "cortex-a925",
];
pub const CPU_FALLBACK: &str = "cortex-x1";

/// An ordered set of entry overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides(BTreeMap<ConfigKey, String>);

impl Overrides {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        self.0.get(&key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConfigKey, &str)> + '_ {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    fn insert(&mut self, key: ConfigKey, value: &str) {
        self.0.insert(key, value.to_string());
    }
}

/// Computes the overrides for the probed hardware.
pub fn tune<G, P>(
    config: &ConfigStore,
    gpu_names: &[G],
    cpu_names: &[P],
) -> Result<Overrides, ConfigError>
where
    G: AsRef<str>,
    P: AsRef<str>,
{
    let mut overrides = Overrides::default();

    if !config.get_bool(ConfigKey::UseCustomDriver)? {
        if let Some(gpu) = gpu_names.first().map(AsRef::as_ref) {
            if GPU_TEXTURE_MARKERS.iter().any(|marker| gpu.contains(marker)) {
                overrides.insert(ConfigKey::UseBgraFormat, "false");
                overrides.insert(ConfigKey::ForceConvertTexture, "true");
            }
            if gpu.contains(GPU_UPLOAD_MARKER) {
                overrides.insert(ConfigKey::TextureUploadMode, "CPU");
            }
        }
    }

    if let Some(cpu) = cpu_names.first().map(AsRef::as_ref) {
        if CPU_DENY_LIST.contains(&cpu) {
            overrides.insert(ConfigKey::UseLlvmCpu, CPU_FALLBACK);
        }
    }

    Ok(overrides)
}

pub fn apply(config: &mut ConfigStore, overrides: &Overrides) -> Result<(), ConfigError> {
    for (key, value) in overrides.iter() {
        config.set(key, value)?;
    }
    Ok(())
}

/// Probes the hardware, then computes and applies the overrides.
pub fn auto_tune(
    config: &mut ConfigStore,
    probe: &dyn HardwareProbe,
) -> Result<Overrides, ConfigError> {
    let gpu_names = probe.gpu_names();
    let cpu_names = probe.cpu_names();
    let overrides = tune(config, &gpu_names, &cpu_names)?;
    apply(config, &overrides)?;

    for (key, value) in overrides.iter() {
        tracing::info!(
            gpu = gpu_names.first().map(String::as_str).unwrap_or(""),
            cpu = cpu_names.first().map(String::as_str).unwrap_or(""),
            %key,
            value,
            "applied hardware override"
        );
    }
    Ok(overrides)
}
