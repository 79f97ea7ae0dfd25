//! Primitive validators.
//!
//! Pure functions over single values. Each returns the errors it found at
//! the supplied path; none of them fail in any other way.

use std::net::IpAddr;
use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ipnet::IpNet;
use regex::Regex;
use semver::Version;

use super::field::{ErrorList, FieldError, FieldPath};

/// Maximum length of a subnet name.
pub const MAX_SUBNET_NAME_LENGTH: usize = 80;

/// Maximum length of a resource group name.
pub const MAX_RESOURCE_GROUP_NAME_LENGTH: usize = 90;

static CLUSTER_NAME_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9]$|^[a-zA-Z0-9][-_a-zA-Z0-9]{0,61}[a-zA-Z0-9]$").ok()
});

static SUBNET_NAME_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]([-_.a-zA-Z0-9]*[-_a-zA-Z0-9])?$").ok());

static RESOURCE_GROUP_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_.()]+$").ok());

static K8S_VERSION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^v(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)([-0-9a-zA-Z_.+]*)?$").ok()
});

static DNS_LABEL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]{0,61}[a-z0-9])?$").ok());

fn matches(re: &LazyLock<Option<Regex>>, value: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(value))
}

/// Parse a CIDR block (IPv4 or IPv6).
pub fn parse_cidr(cidr: &str) -> Option<IpNet> {
    cidr.parse::<IpNet>().ok()
}

/// Whether the CIDR parses as an IPv6 block.
pub fn is_ipv6_cidr(cidr: &str) -> bool {
    matches!(parse_cidr(cidr), Some(IpNet::V6(_)))
}

/// Validate a single CIDR block.
pub fn validate_cidr(cidr: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if parse_cidr(cidr).is_none() {
        errs.push(FieldError::invalid(path.clone(), cidr, "invalid CIDR format"));
    }
    errs
}

/// Validate a list of CIDR blocks, addressing errors by index.
pub fn validate_cidrs(cidrs: &[String], path: &FieldPath) -> ErrorList {
    cidrs
        .iter()
        .enumerate()
        .flat_map(|(i, cidr)| validate_cidr(cidr, &path.index(i)))
        .collect()
}

/// Whether an IP address falls inside any of the given CIDR blocks.
pub fn ip_in_any_cidr(ip: IpAddr, cidrs: &[String]) -> bool {
    cidrs
        .iter()
        .filter_map(|c| parse_cidr(c))
        .any(|net| net.contains(&ip))
}

/// Validate a base64-encoded OpenSSH authorized-keys line.
pub fn validate_ssh_key(key: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let decoded = match STANDARD.decode(key.trim()) {
        Ok(decoded) => decoded,
        Err(_) => {
            errs.push(FieldError::invalid_omit_value(
                path.clone(),
                "the SSH public key is not valid base64",
            ));
            return errs;
        }
    };
    let parsed = std::str::from_utf8(&decoded)
        .ok()
        .map(|line| ssh_key::PublicKey::from_openssh(line.trim()));
    if !matches!(parsed, Some(Ok(_))) {
        errs.push(FieldError::invalid_omit_value(
            path.clone(),
            "the SSH public key is not a valid OpenSSH authorized key",
        ));
    }
    errs
}

/// Whether the string is an RFC 4122 UUID in textual form.
pub fn is_uuid(value: &str) -> bool {
    value.len() == 36 && uuid::Uuid::try_parse(value).is_ok()
}

/// Validate a UUID-valued field.
pub fn validate_uuid(value: &str, path: &FieldPath, detail: &str) -> ErrorList {
    let mut errs = ErrorList::new();
    if !is_uuid(value) {
        errs.push(FieldError::invalid(path.clone(), value, detail));
    }
    errs
}

/// Validate a cluster's object name.
pub fn validate_cluster_name(name: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if !matches(&CLUSTER_NAME_RE, name) {
        errs.push(FieldError::invalid(
            path.clone(),
            name,
            "Cluster Name must be between 1 and 63 characters, start and end with an alphanumeric character \
             and contain only alphanumerics, underscores and hyphens",
        ));
    }
    errs
}

/// Validate a subnet name.
pub fn validate_subnet_name(name: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if name.is_empty() {
        errs.push(FieldError::required(path.clone(), "subnet name must not be empty"));
    } else if name.len() > MAX_SUBNET_NAME_LENGTH || !matches(&SUBNET_NAME_RE, name) {
        errs.push(FieldError::invalid(
            path.clone(),
            name,
            "name of subnet doesn't match regex ^[a-zA-Z0-9]([-_.a-zA-Z0-9]*[-_a-zA-Z0-9])?$ \
             and must be at most 80 characters",
        ));
    }
    errs
}

/// Validate a resource group name.
pub fn validate_resource_group(name: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if name.len() > MAX_RESOURCE_GROUP_NAME_LENGTH
        || name.ends_with('.')
        || !matches(&RESOURCE_GROUP_RE, name)
    {
        errs.push(FieldError::invalid(
            path.clone(),
            name,
            "resourceGroup must be at most 90 characters of alphanumerics, underscores, parentheses, \
             hyphens and periods, and must not end with a period",
        ));
    }
    errs
}

/// Validate a DNS zone name made of at least two DNS labels.
pub fn validate_dns_zone_name(name: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let labels: Vec<&str> = name.split('.').collect();
    if name.len() > 253 || labels.len() < 2 || !labels.iter().all(|l| matches(&DNS_LABEL_RE, l)) {
        errs.push(FieldError::invalid(
            path.clone(),
            name,
            "PrivateDNSZoneName must be a valid lowercase DNS name with at least two labels",
        ));
    }
    errs
}

/// Parse a Kubernetes version of the form `vX.Y.Z[suffix]`.
pub fn parse_kubernetes_version(version: &str) -> Option<Version> {
    let re = K8S_VERSION_RE.as_ref()?;
    let caps = re.captures(version)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    let patch = caps.get(3)?.as_str().parse().ok()?;
    Some(Version::new(major, minor, patch))
}

/// Validate a Kubernetes version string.
pub fn validate_kubernetes_version(version: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if parse_kubernetes_version(version).is_none() {
        errs.push(FieldError::invalid(path.clone(), version, "must be a valid semantic version"));
    }
    errs
}

/// Validate that a version update does not go backwards.
///
/// Only the numeric major.minor.patch triple is compared. Unparseable
/// versions are left to [`validate_kubernetes_version`].
pub fn validate_version_upgrade(old: &str, new: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if let (Some(old_v), Some(new_v)) = (parse_kubernetes_version(old), parse_kubernetes_version(new)) {
        if new_v < old_v {
            errs.push(FieldError::invalid(
                path.clone(),
                new,
                format!("field version cannot be downgraded from {old} to {new}"),
            ));
        }
    }
    errs
}

/// Validate that an integer lies within an inclusive range.
pub fn validate_range(value: i64, min: i64, max: i64, path: &FieldPath, detail: &str) -> ErrorList {
    let mut errs = ErrorList::new();
    if value < min || value > max {
        errs.push(FieldError::invalid(path.clone(), &value, detail));
    }
    errs
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn path() -> FieldPath {
        FieldPath::new("spec").child("field")
    }

    #[test]
    fn test_cidr_parsing() {
        assert!(validate_cidr("10.0.0.0/16", &path()).is_empty());
        assert!(validate_cidr("2001:1234:5678:9a00::/56", &path()).is_empty());
        assert_eq!(validate_cidr("10.0.0.0/33", &path()).len(), 1);
        assert_eq!(validate_cidr("not-a-cidr", &path()).len(), 1);
        assert!(is_ipv6_cidr("2001:1234:5678:9a00::/56"));
        assert!(!is_ipv6_cidr("10.0.0.0/8"));
    }

    #[test]
    fn test_ip_in_cidr() {
        let cidrs = vec!["10.0.0.0/8".to_string()];
        assert!(ip_in_any_cidr("10.1.2.3".parse().unwrap(), &cidrs));
        assert!(!ip_in_any_cidr("192.168.0.1".parse().unwrap(), &cidrs));
    }

    #[test]
    fn test_ssh_key_must_be_base64() {
        // A raw (not base64-encoded) authorized key line is rejected.
        let raw = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl test";
        let errs = validate_ssh_key(raw, &path());
        assert_eq!(errs.len(), 1);

        let encoded = STANDARD.encode(raw);
        assert!(validate_ssh_key(&encoded, &path()).is_empty());

        let garbage = STANDARD.encode("not an ssh key");
        assert_eq!(validate_ssh_key(&garbage, &path()).len(), 1);
    }

    #[test]
    fn test_uuid() {
        assert!(is_uuid("c6e3ee2d-6ab4-4d3e-98ee-aed20e2fb8e6"));
        assert!(!is_uuid("not-a-uuid"));
        assert!(!is_uuid("c6e3ee2d6ab44d3e98eeaed20e2fb8e6"));
    }

    #[test]
    fn test_cluster_name() {
        assert!(validate_cluster_name("cluster-test", &path()).is_empty());
        assert!(validate_cluster_name("a", &path()).is_empty());
        assert!(validate_cluster_name("my_cluster1", &path()).is_empty());
        assert_eq!(validate_cluster_name("-bad", &path()).len(), 1);
        assert_eq!(validate_cluster_name(&"a".repeat(64), &path()).len(), 1);
    }

    #[test]
    fn test_subnet_name() {
        assert!(validate_subnet_name("my-subnet", &path()).is_empty());
        assert!(validate_subnet_name("subnet.v1.2", &path()).is_empty());
        assert_eq!(validate_subnet_name("subnet.", &path()).len(), 1);
        assert_eq!(validate_subnet_name(&"s".repeat(81), &path()).len(), 1);
        assert!(validate_subnet_name(&"s".repeat(80), &path()).is_empty());
    }

    #[test]
    fn test_kubernetes_version() {
        assert!(validate_kubernetes_version("v1.28.3", &path()).is_empty());
        assert!(validate_kubernetes_version("v1.28.3-rc.1+build_2", &path()).is_empty());
        assert_eq!(validate_kubernetes_version("1.28.3", &path()).len(), 1);
        assert_eq!(validate_kubernetes_version("v01.2.3", &path()).len(), 1);
    }

    #[test]
    fn test_version_upgrade() {
        assert!(validate_version_upgrade("v1.27.3", "v1.28.0", &path()).is_empty());
        assert!(validate_version_upgrade("v1.27.3", "v1.27.3", &path()).is_empty());
        assert_eq!(validate_version_upgrade("v1.28.0", "v1.27.9", &path()).len(), 1);
    }

    #[test]
    fn test_range() {
        assert!(validate_range(4, 4, 30, &path(), "out of range").is_empty());
        assert!(validate_range(30, 4, 30, &path(), "out of range").is_empty());
        assert_eq!(validate_range(31, 4, 30, &path(), "out of range").len(), 1);
    }
}
