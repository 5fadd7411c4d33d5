// CPU Architecture detection

use once_cell::sync::Lazy;

use crate::common::cpuid::{self, CpuSignature};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuArchitecture {
    /// Pentium 4 / NetBurst Xeon, CPUID family 0xF
    NetBurst { model: u8 },
    Other { family: u32, model: u32 },
}

impl CpuArchitecture {
    pub fn name(&self) -> &'static str {
        match self {
            CpuArchitecture::NetBurst { .. } => "NetBurst",
            CpuArchitecture::Other { .. } => "Other",
        }
    }

    pub fn from_signature(vendor: &str, sig: CpuSignature) -> Self {
        // Extended family is zero on every NetBurst part
        if vendor == cpuid::INTEL_VENDOR && sig.family == 0xF {
            CpuArchitecture::NetBurst {
                model: sig.model as u8,
            }
        } else {
            CpuArchitecture::Other {
                family: sig.family,
                model: sig.model,
            }
        }
    }

    /// Model number used by the IQ_ESCR quirk; `None` off NetBurst
    pub fn netburst_model(&self) -> Option<u8> {
        match self {
            CpuArchitecture::NetBurst { model } => Some(*model),
            CpuArchitecture::Other { .. } => None,
        }
    }
}

pub static CPU_ARCH: Lazy<CpuArchitecture> = Lazy::new(detect_architecture);

fn detect_architecture() -> CpuArchitecture {
    let sig = CpuSignature::current();
    let vendor = cpuid::vendor();

    tracing::info!(
        "CPU: {}, Family {:X}, Model {:X}, Stepping {:X}, {} logical per package",
        vendor,
        sig.family,
        sig.model,
        sig.stepping,
        cpuid::logical_per_package()
    );

    let arch = CpuArchitecture::from_signature(&vendor, sig);
    if arch.netburst_model().is_none() {
        tracing::warn!("Not a NetBurst CPU, hardware sessions are unavailable");
    }
    arch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_detection_is_stable() {
        let arch = *CPU_ARCH;
        println!("Detected architecture: {arch:?}");
        assert_eq!(arch, *CPU_ARCH);
    }

    #[test]
    fn test_netburst_classification() {
        let p4 = CpuArchitecture::from_signature("GenuineIntel", CpuSignature::from_eax(0x0F34));
        assert_eq!(p4, CpuArchitecture::NetBurst { model: 3 });
        assert_eq!(p4.netburst_model(), Some(3));
        assert_eq!(p4.name(), "NetBurst");

        let skylake =
            CpuArchitecture::from_signature("GenuineIntel", CpuSignature::from_eax(0x0005_0654));
        assert_eq!(skylake.netburst_model(), None);
    }

    #[test]
    fn test_amd_family_f_is_not_netburst() {
        // Athlon 64 / Opteron report family 0xF with extended family 0
        let k8 = CpuArchitecture::from_signature("AuthenticAMD", CpuSignature::from_eax(0x0F48));
        assert_eq!(k8.netburst_model(), None);
        assert_eq!(k8, CpuArchitecture::Other { family: 0xF, model: 4 });
    }
}
