use crate::probe::dedup_in_order;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const ARM_IMPLEMENTER: u32 = 0x41;

/// Helper to read and trim a single sysfs/procfs file.
fn read_sys_file(path: &Path) -> io::Result<String> {
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

/// Maps an Arm `CPU part` number to its LLVM target name.
fn arm_part_name(part: u32) -> Option<&'static str> {
    let name = match part {
        0xd03 => "cortex-a53",
        0xd04 => "cortex-a35",
        0xd05 => "cortex-a55",
        0xd07 => "cortex-a57",
        0xd08 => "cortex-a72",
        0xd09 => "cortex-a73",
        0xd0a => "cortex-a75",
        0xd0b => "cortex-a76",
        0xd0d => "cortex-a77",
        0xd41 => "cortex-a78",
        0xd44 => "cortex-x1",
        0xd46 => "cortex-a510",
        0xd47 => "cortex-a710",
        0xd48 => "cortex-x2",
        0xd4d => "cortex-a715",
        0xd4e => "cortex-x3",
        0xd80 => "cortex-a520",
        0xd81 => "cortex-a720",
        0xd82 => "cortex-x4",
        0xd85 => "cortex-x925",
        0xd87 => "cortex-a725",
        _ => return None,
    };
    Some(name)
}

fn parse_hex(value: &str) -> Option<u32> {
    let value = value.trim();
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u32::from_str_radix(digits, 16).ok()
}

/// Extracts LLVM CPU names from `/proc/cpuinfo`, one per distinct core type,
/// in the order the cores are listed.
pub(crate) fn parse_cpuinfo(cpuinfo: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut implementer = None;

    for line in cpuinfo.lines() {
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        match field.trim() {
            "processor" => implementer = None,
            "CPU implementer" => implementer = parse_hex(value),
            "CPU part" => {
                if implementer != Some(ARM_IMPLEMENTER) {
                    continue;
                }
                if let Some(name) = parse_hex(value).and_then(arm_part_name) {
                    names.push(name.to_string());
                }
            }
            _ => {}
        }
    }

    dedup_in_order(names)
}

/// Turns a KGSL model string (`Adreno740v2`) into the name the Vulkan driver
/// reports (`Adreno (TM) 740`).
pub(crate) fn adreno_device_name(model: &str) -> Option<String> {
    let digits: String = model
        .strip_prefix("Adreno")?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("Adreno (TM) {digits}"))
}

/// Scans for CPU core types on a Linux or Android system.
///
/// Arm cores are identified from `/proc/cpuinfo`. If nothing recognizable is
/// found there (x86 hosts, unknown parts) the `sysinfo` brand strings are
/// used instead.
pub fn cpu_names() -> Vec<String> {
    match read_sys_file(Path::new("/proc/cpuinfo")) {
        Ok(cpuinfo) => {
            let names = parse_cpuinfo(&cpuinfo);
            if !names.is_empty() {
                return names;
            }
        }
        Err(e) => tracing::debug!(error = %e, "cannot read /proc/cpuinfo"),
    }
    super::generic::cpu_names()
}

/// Scans for GPUs.
///
/// Qualcomm devices expose the Adreno model through KGSL. Other systems are
/// described by the kernel driver bound to each DRM card, which is enough for
/// the tuning rules to leave them alone.
pub fn gpu_names() -> Vec<String> {
    let kgsl_model = Path::new("/sys/class/kgsl/kgsl-3d0/gpu_model");
    if let Some(name) = read_sys_file(kgsl_model)
        .ok()
        .and_then(|model| adreno_device_name(&model))
    {
        return vec![name];
    }

    let mut cards: Vec<PathBuf> = match fs::read_dir("/sys/class/drm") {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.starts_with("card") && !name.contains('-')
            })
            .map(|entry| entry.path())
            .collect(),
        Err(_) => return Vec::new(),
    };
    cards.sort();

    let drivers = cards.iter().filter_map(|card| {
        let uevent = read_sys_file(&card.join("device/uevent")).ok()?;
        uevent
            .lines()
            .find_map(|line| line.strip_prefix("DRIVER="))
            .map(str::to_string)
    });
    dedup_in_order(drivers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIG_LITTLE: &str = "\
processor\t: 0
BogoMIPS\t: 38.40
CPU implementer\t: 0x41
CPU architecture: 8
CPU part\t: 0xd46

processor\t: 1
CPU implementer\t: 0x41
CPU part\t: 0xd46

processor\t: 4
CPU implementer\t: 0x41
CPU part\t: 0xd47

processor\t: 7
CPU implementer\t: 0x41
CPU part\t: 0xd48
";

    #[test]
    fn lists_each_core_type_once_in_order() {
        assert_eq!(
            parse_cpuinfo(BIG_LITTLE),
            vec!["cortex-a510", "cortex-a710", "cortex-x2"]
        );
    }

    #[test]
    fn ignores_non_arm_implementers_and_unknown_parts() {
        let cpuinfo = "\
processor\t: 0
CPU implementer\t: 0x51
CPU part\t: 0xd46

processor\t: 1
CPU implementer\t: 0x41
CPU part\t: 0xfff
";
        assert!(parse_cpuinfo(cpuinfo).is_empty());
        assert!(parse_cpuinfo("model name\t: AMD Ryzen 7 5800X\n").is_empty());
    }

    #[test]
    fn converts_kgsl_models_to_vulkan_names() {
        assert_eq!(
            adreno_device_name("Adreno740v2").as_deref(),
            Some("Adreno (TM) 740")
        );
        assert_eq!(
            adreno_device_name("Adreno830").as_deref(),
            Some("Adreno (TM) 830")
        );
        assert_eq!(adreno_device_name("Mali-G710"), None);
        assert_eq!(adreno_device_name("Adreno"), None);
    }
}
