//! Kubelet and Linux OS configuration envelopes of managed node pools.

use std::sync::LazyLock;

use regex::Regex;

use super::field::{ErrorList, FieldError, FieldPath};
use crate::crd::{KubeletConfig, LinuxOSConfig};

/// Unsafe sysctls the managed service accepts. Wildcard entries match by
/// prefix, the rest exactly.
static ALLOWED_UNSAFE_SYSCTL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^(kernel\.shm.*|kernel\.msg.*|kernel\.sem|fs\.mqueue\..*|net\..*)$").ok()
});

static PORT_RANGE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([0-9]+) ([0-9]+)$").ok());

pub const MIN_LOCAL_PORT: u32 = 1024;
pub const MAX_LOCAL_PORT: u32 = 65535;

/// Validate kubelet settings.
pub fn validate_kubelet_config(config: &KubeletConfig, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();

    if let Some(period) = &config.cpu_cfs_quota_period {
        if !period.ends_with("ms") {
            errs.push(FieldError::invalid(
                path.child("cpuCfsQuotaPeriod"),
                period,
                "must be a string value in milliseconds with a 'ms' suffix, e.g. '100ms'",
            ));
        }
    }

    for (name, value) in [
        ("imageGcHighThreshold", config.image_gc_high_threshold),
        ("imageGcLowThreshold", config.image_gc_low_threshold),
    ] {
        if let Some(v) = value {
            if !(0..=100).contains(&v) {
                errs.push(FieldError::invalid(path.child(name), &v, "must be between 0 and 100"));
            }
        }
    }
    if let (Some(high), Some(low)) = (config.image_gc_high_threshold, config.image_gc_low_threshold) {
        if low > high {
            errs.push(FieldError::invalid(
                path.child("imageGcLowThreshold"),
                &low,
                format!(
                    "must not be greater than imageGcHighThreshold, imageGcLowThreshold={low}, imageGcHighThreshold={high}"
                ),
            ));
        }
    }

    for (i, sysctl) in config.allowed_unsafe_sysctls.iter().enumerate() {
        let allowed = ALLOWED_UNSAFE_SYSCTL_RE
            .as_ref()
            .is_some_and(|re| re.is_match(sysctl));
        if !allowed {
            errs.push(FieldError::invalid(
                path.child("allowedUnsafeSysctls").index(i),
                sysctl,
                "allowedUnsafeSysctls are \"kernel.shm*\", \"kernel.msg*\", \"kernel.sem\", \"fs.mqueue.*\", \"net.*\"",
            ));
        }
    }

    if let Some(files) = config.container_log_max_files {
        if files < 2 {
            errs.push(FieldError::invalid(
                path.child("containerLogMaxFiles"),
                &files,
                "must be at least 2",
            ));
        }
    }
    errs
}

/// Validate Linux OS settings. Swap requires the kubelet to tolerate it.
pub fn validate_linux_os_config(
    config: &LinuxOSConfig,
    kubelet: Option<&KubeletConfig>,
    path: &FieldPath,
) -> ErrorList {
    let mut errs = ErrorList::new();

    if let Some(size) = config.swap_file_size_mb {
        let fail_swap_on = kubelet.and_then(|k| k.fail_swap_on).unwrap_or(true);
        if fail_swap_on {
            errs.push(FieldError::invalid(
                path.child("swapFileSizeMB"),
                &size,
                "kubeletConfig.failSwapOn must be set to false to enable swap file on nodes",
            ));
        }
    }

    if let Some(range) = config
        .sysctls
        .as_ref()
        .and_then(|s| s.net_ipv4_ip_local_port_range.as_deref())
    {
        errs.append(validate_port_range(
            range,
            &path.child("sysctls").child("netIpv4IPLocalPortRange"),
        ));
    }
    errs
}

fn parse_port_range(range: &str) -> Option<(u32, u32)> {
    let caps = PORT_RANGE_RE.as_ref()?.captures(range)?;
    let first = caps.get(1)?.as_str().parse().ok()?;
    let last = caps.get(2)?.as_str().parse().ok()?;
    Some((first, last))
}

/// Validate a `"<first> <last>"` local port range.
pub fn validate_port_range(range: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some((first, last)) = parse_port_range(range) else {
        errs.push(FieldError::invalid(
            path.clone(),
            range,
            "netIpv4IPLocalPortRange must be of the format \"<int> <int>\"",
        ));
        return errs;
    };
    if first < MIN_LOCAL_PORT {
        errs.push(FieldError::invalid(
            path.clone(),
            range,
            format!("first port must be at least {MIN_LOCAL_PORT}, got {first}"),
        ));
    }
    if last > MAX_LOCAL_PORT {
        errs.push(FieldError::invalid(
            path.clone(),
            range,
            format!("last port must be at most {MAX_LOCAL_PORT}, got {last}"),
        ));
    }
    if first >= last {
        errs.push(FieldError::invalid(
            path.clone(),
            range,
            "first port must be less than last port",
        ));
    }
    errs
}
