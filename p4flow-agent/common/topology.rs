// Logical CPU topology from sysfs

/// Parse CPU list like "0-3,8-11" into Vec<u32>
pub fn parse_cpu_list(s: &str) -> Option<Vec<u32>> {
    let mut cpus = Vec::new();
    for part in s.trim().split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start.trim().parse().ok()?;
            let end: u32 = end.trim().parse().ok()?;
            if start > end {
                return None;
            }
            cpus.extend(start..=end);
        } else {
            cpus.push(part.parse().ok()?);
        }
    }
    Some(cpus)
}

/// Detect online CPUs from /sys/devices/system/cpu/online
pub fn detect_online_cpus() -> Vec<u32> {
    std::fs::read_to_string("/sys/devices/system/cpu/online")
        .ok()
        .and_then(|s| parse_cpu_list(&s))
        .unwrap_or_else(|| {
            tracing::warn!("Failed to detect online CPUs, using default: 0");
            vec![0]
        })
}

/// Hardware threads sharing a core with `cpu`, `cpu` included
pub fn thread_siblings(cpu: u32) -> Vec<u32> {
    let path = format!("/sys/devices/system/cpu/cpu{cpu}/topology/thread_siblings_list");
    std::fs::read_to_string(&path)
        .ok()
        .and_then(|s| parse_cpu_list(&s))
        .filter(|list| !list.is_empty())
        .unwrap_or_else(|| {
            tracing::debug!("No sibling list at {path}, treating cpu {cpu} as single-threaded");
            vec![cpu]
        })
}

/// Lowest-numbered member of `cpu`'s sibling set
pub fn first_sibling(cpu: u32) -> u32 {
    thread_siblings(cpu).into_iter().min().unwrap_or(cpu)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_list() {
        assert_eq!(parse_cpu_list("0-3,8"), Some(vec![0, 1, 2, 3, 8]));
        assert_eq!(parse_cpu_list("1\n"), Some(vec![1]));
        assert_eq!(parse_cpu_list("0,4"), Some(vec![0, 4]));
        assert_eq!(parse_cpu_list("3-1"), None);
        assert_eq!(parse_cpu_list("x"), None);
    }

    #[test]
    fn test_first_sibling_never_above_cpu() {
        for cpu in detect_online_cpus() {
            assert!(first_sibling(cpu) <= cpu);
        }
    }
}
