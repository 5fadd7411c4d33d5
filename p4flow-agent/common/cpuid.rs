#[cfg(target_arch = "x86_64")]
pub fn cpuid(eax: u32, ecx: u32) -> (u32, u32, u32, u32) {
    let mut ebx: u32;
    let mut edx: u32;
    let mut eax_out = eax;
    let mut ecx_out = ecx;

    unsafe {
        std::arch::asm!(
            "mov {0:r}, rbx",
            "cpuid",
            "xchg {0:r}, rbx",
            out(reg) ebx,
            inout("eax") eax_out,
            inout("ecx") ecx_out,
            out("edx") edx,
            options(nostack, preserves_flags)
        );
    }

    (eax_out, ebx, ecx_out, edx)
}

#[cfg(not(target_arch = "x86_64"))]
pub fn cpuid(_eax: u32, _ecx: u32) -> (u32, u32, u32, u32) {
    (0, 0, 0, 0)
}

/// CPUID leaf 1 EDX bit 28
const HTT_FLAG: u32 = 1 << 28;

/// Family / model / stepping as reported by CPUID leaf 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuSignature {
    pub family: u32,
    pub model: u32,
    pub stepping: u32,
}

impl CpuSignature {
    /// Decode the leaf 1 EAX signature
    pub fn from_eax(eax: u32) -> Self {
        let stepping = eax & 0xF;
        let model = (eax >> 4) & 0xF;
        let family = (eax >> 8) & 0xF;
        let extended_model = (eax >> 16) & 0xF;
        let extended_family = (eax >> 20) & 0xFF;

        let display_family = if family == 0xF {
            family + extended_family
        } else {
            family
        };

        let display_model = if family == 0x6 || family == 0xF {
            (extended_model << 4) + model
        } else {
            model
        };

        Self {
            family: display_family,
            model: display_model,
            stepping,
        }
    }

    pub fn current() -> Self {
        let (eax, _ebx, _ecx, _edx) = cpuid(1, 0);
        Self::from_eax(eax)
    }
}

/// Only Intel family 0xF parts are NetBurst; AMD K8 shares the family number
pub const INTEL_VENDOR: &str = "GenuineIntel";

/// Vendor string from CPUID leaf 0, in EBX, EDX, ECX order
pub fn vendor_from(ebx: u32, ecx: u32, edx: u32) -> String {
    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&ebx.to_le_bytes());
    bytes[4..8].copy_from_slice(&edx.to_le_bytes());
    bytes[8..].copy_from_slice(&ecx.to_le_bytes());
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn vendor() -> String {
    let (_eax, ebx, ecx, edx) = cpuid(0, 0);
    vendor_from(ebx, ecx, edx)
}

/// Logical processors per package from CPUID leaf 1; 1 without HTT
pub fn logical_per_package_from(ebx: u32, edx: u32) -> u32 {
    if edx & HTT_FLAG == 0 {
        return 1;
    }
    ((ebx >> 16) & 0xFF).max(1)
}

pub fn logical_per_package() -> u32 {
    let (_eax, ebx, _ecx, edx) = cpuid(1, 0);
    logical_per_package_from(ebx, edx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::similar_names)] // CPU register names are standard
    fn test_cpuid() {
        let (eax, ebx, ecx, edx) = cpuid(0, 0);
        println!("CPUID(0,0): EAX={eax:08X} EBX={ebx:08X} ECX={ecx:08X} EDX={edx:08X}");
    }

    #[test]
    fn test_netburst_signature() {
        // Prescott, family 0xF model 3 stepping 4
        let sig = CpuSignature::from_eax(0x0000_0F34);
        assert_eq!(sig.family, 0xF);
        assert_eq!(sig.model, 0x3);
        assert_eq!(sig.stepping, 0x4);

        // Northwood, model 2
        assert_eq!(CpuSignature::from_eax(0x0000_0F29).model, 0x2);
    }

    #[test]
    fn test_vendor_string() {
        assert_eq!(vendor_from(0x756e_6547, 0x6c65_746e, 0x4965_6e69), INTEL_VENDOR);
        assert_eq!(vendor_from(0x6874_7541, 0x444d_4163, 0x6974_6e65), "AuthenticAMD");
    }

    #[test]
    fn test_logical_per_package() {
        assert_eq!(logical_per_package_from(0x0002_0800, HTT_FLAG), 2);
        assert_eq!(logical_per_package_from(0x0002_0800, 0), 1);
        assert_eq!(logical_per_package_from(0, HTT_FLAG), 1);
    }
}
