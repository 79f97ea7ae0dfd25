//! AzureManagedControlPlane and AzureManagedControlPlaneTemplate policies.

use std::collections::BTreeMap;
use std::net::IpAddr;

use kube::ResourceExt;

use super::{metadata_name_path, spec_path, template_spec_path};
use crate::crd::{
    AKSExtension, AutoScalerProfile, AzureManagedControlPlane, AzureManagedControlPlaneClassSpec,
    AzureManagedControlPlaneTemplate, ExtensionScopeType, LoadBalancerProfile, ManagedControlPlaneIdentityType,
    NetworkDataplaneType, NetworkPluginMode, NetworkPluginType, NetworkPolicyType,
};
use crate::defaults::set_managed_control_plane_template_defaults;
use crate::validation::primitives::{
    parse_cidr, validate_cidr, validate_cidrs, validate_kubernetes_version, validate_range, validate_ssh_key,
    validate_version_upgrade,
};
use crate::validation::{ErrorList, FieldError, FieldPath};
use crate::webhooks::immutability::{Rule, check_unchanged, compare, template_immutable_detail};

/// Substrings AKS refuses in a cluster name.
const RESERVED_NAME_WORDS: [&str; 2] = ["microsoft", "windows"];

/// Validate an AzureManagedControlPlane.
///
/// `service_cidrs` are the owning Cluster's service CIDR blocks, or `None`
/// when the owner could not be read.
pub fn validate_managed_control_plane(mcp: &AzureManagedControlPlane, service_cidrs: Option<&[String]>) -> ErrorList {
    let path = spec_path();
    let spec = &mcp.spec;
    let mut errs = ErrorList::new();

    errs.append(validate_aks_name(&mcp.name_any(), &metadata_name_path()));
    errs.append(validate_class(&spec.class, &path));
    if let Some(ip) = &spec.class.dns_service_ip {
        errs.append(validate_dns_service_ip(ip, service_cidrs, &path.child("dnsServiceIP")));
    }
    if let Some(key) = spec.ssh_public_key.as_deref().filter(|k| !k.is_empty()) {
        errs.append(validate_ssh_key(key, &path.child("sshPublicKey")));
    }
    errs
}

/// Validate an AzureManagedControlPlaneTemplate.
pub fn validate_managed_control_plane_template(template: &AzureManagedControlPlaneTemplate) -> ErrorList {
    let path = template_spec_path();
    let class = &template.spec.template.spec;
    let mut errs = ErrorList::new();
    errs.append(validate_aks_name(&template.name_any(), &metadata_name_path()));
    errs.append(validate_class(class, &path));
    if let Some(ip) = &class.dns_service_ip {
        errs.append(validate_dns_service_ip(ip, None, &path.child("dnsServiceIP")));
    }
    errs
}

fn validate_aks_name(name: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let lower = name.to_lowercase();
    if RESERVED_NAME_WORDS.iter().any(|word| lower.contains(word)) {
        errs.push(FieldError::invalid(
            path.clone(),
            name,
            "cluster name is invalid because 'MICROSOFT' and 'WINDOWS' can't be used as either a whole word or a substring in the name",
        ));
    }
    errs
}

/// Rules shared by the control plane and its template, rooted at `path`.
fn validate_class(class: &AzureManagedControlPlaneClassSpec, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();

    if !class.version.is_empty() {
        errs.append(validate_kubernetes_version(&class.version, &path.child("version")));
    }

    let vnet = &class.virtual_network;
    let vnet_path = path.child("virtualNetwork");
    if !vnet.cidr_block.is_empty() {
        errs.append(validate_cidr(&vnet.cidr_block, &vnet_path.child("cidrBlock")));
    }
    if !vnet.subnet.cidr_block.is_empty() {
        let subnet_path = vnet_path.child("subnet").child("cidrBlock");
        errs.append(validate_cidr(&vnet.subnet.cidr_block, &subnet_path));
        if let (Some(vnet_net), Some(subnet_net)) = (parse_cidr(&vnet.cidr_block), parse_cidr(&vnet.subnet.cidr_block))
            && !vnet_net.contains(&subnet_net)
        {
            errs.push(FieldError::invalid(
                subnet_path,
                &vnet.subnet.cidr_block,
                "pre-existing virtual networks CIDR block should contain the subnet CIDR block",
            ));
        }
    }

    if let Some(profile) = &class.load_balancer_profile {
        errs.append(validate_load_balancer_profile(profile, &path.child("loadBalancerProfile")));
    }
    if let Some(profile) = &class.auto_scaler_profile {
        errs.append(validate_auto_scaler_profile(profile, &path.child("autoScalerProfile")));
    }
    if let Some(access) = &class.api_server_access_profile {
        errs.append(validate_cidrs(
            &access.authorized_ip_ranges,
            &path.child("apiServerAccessProfile").child("authorizedIPRanges"),
        ));
    }
    if let Some(aad) = &class.aad_profile
        && aad.managed
        && aad.admin_group_object_ids.is_empty()
    {
        errs.push(FieldError::required(
            path.child("aadProfile").child("adminGroupObjectIDs"),
            "length of AKS AAD Admin Group ObjectIDs must be greater than zero",
        ));
    }
    if class.disable_local_accounts == Some(true) && !class.aad_profile.as_ref().is_some_and(|aad| aad.managed) {
        errs.push(FieldError::invalid(
            path.child("disableLocalAccounts"),
            &true,
            "DisableLocalAccounts can be set only for AAD enabled clusters",
        ));
    }
    errs.append(validate_network_dataplane(class, path));
    if let Some(identity) = &class.identity {
        let id_path = path.child("identity").child("userAssignedIdentityResourceID");
        match identity.r#type {
            ManagedControlPlaneIdentityType::UserAssigned if identity.user_assigned_identity_resource_id.is_empty() => {
                errs.push(FieldError::required(
                    id_path,
                    "userAssignedIdentityResourceID is required for the UserAssigned identity type",
                ));
            }
            ManagedControlPlaneIdentityType::SystemAssigned if !identity.user_assigned_identity_resource_id.is_empty() => {
                errs.push(FieldError::forbidden(
                    id_path,
                    "userAssignedIdentityResourceID may only be set for the UserAssigned identity type",
                ));
            }
            _ => {}
        }
    }
    errs.append(validate_extensions(&class.extensions, &path.child("extensions")));
    errs
}

/// DNS service IP checks; containment is only enforced against a single
/// known service CIDR.
fn validate_dns_service_ip(ip: &str, service_cidrs: Option<&[String]>, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let Ok(addr) = ip.parse::<IpAddr>() else {
        errs.push(FieldError::invalid(path.clone(), ip, "DNSServiceIP must be a valid IP"));
        return errs;
    };
    if let Some([cidr]) = service_cidrs
        && parse_cidr(cidr).is_some_and(|net| !net.contains(&addr))
    {
        errs.push(FieldError::invalid(
            path.clone(),
            ip,
            format!("DNSServiceIP must reside within the associated cluster serviceCIDR {cidr}"),
        ));
    }
    if !ip.ends_with(".10") {
        errs.push(FieldError::invalid(
            path.clone(),
            ip,
            "Azure Service IP Addresses must end with .10",
        ));
    }
    errs
}

fn validate_load_balancer_profile(profile: &LoadBalancerProfile, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let kinds = [
        profile.managed_outbound_ips.is_some(),
        !profile.outbound_ip_prefixes.is_empty(),
        !profile.outbound_ips.is_empty(),
    ];
    if kinds.into_iter().filter(|set| *set).count() > 1 {
        errs.push(FieldError::forbidden(
            path.clone(),
            "load balancer profile must specify at most one of ManagedOutboundIPs, OutboundIPPrefixes and OutboundIPs",
        ));
    }
    if let Some(count) = profile.managed_outbound_ips {
        errs.append(validate_range(
            i64::from(count),
            1,
            100,
            &path.child("managedOutboundIPs"),
            "value should be in between 1 and 100",
        ));
    }
    if let Some(ports) = profile.allocated_outbound_ports {
        errs.append(validate_range(
            i64::from(ports),
            0,
            64000,
            &path.child("allocatedOutboundPorts"),
            "value should be in between 0 and 64000",
        ));
    }
    if let Some(timeout) = profile.idle_timeout_in_minutes {
        errs.append(validate_range(
            i64::from(timeout),
            4,
            120,
            &path.child("idleTimeoutInMinutes"),
            "value should be in between 4 and 120",
        ));
    }
    errs
}

/// Whether `value` is a non-negative integer followed by one of `units`.
fn is_duration(value: &str, units: &[char]) -> bool {
    value
        .strip_suffix(|c| units.contains(&c))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn validate_auto_scaler_profile(profile: &AutoScalerProfile, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut check = |name: &str, value: Option<&String>, ok: fn(&str) -> bool, detail: &str| {
        if let Some(value) = value
            && !ok(value)
        {
            errs.push(FieldError::invalid(path.child(name), value, detail));
        }
    };

    let is_bool = |v: &str| v == "true" || v == "false";
    let is_int = |v: &str| v.parse::<u32>().is_ok();
    let minutes = |v: &str| is_duration(v, &['m']);
    let seconds = |v: &str| is_duration(v, &['s']);
    let minutes_or_seconds = |v: &str| is_duration(v, &['m', 's']);
    let percentage = |v: &str| v.parse::<u32>().is_ok_and(|p| p <= 100);
    let ratio = |v: &str| v.parse::<f64>().is_ok_and(|r| (0.0..=1.0).contains(&r));

    let bool_detail = "invalid value, must be true or false";
    check("balanceSimilarNodeGroups", profile.balance_similar_node_groups.as_ref(), is_bool, bool_detail);
    check("maxEmptyBulkDelete", profile.max_empty_bulk_delete.as_ref(), is_int, "invalid value, must be an integer");
    check(
        "maxGracefulTerminationSec",
        profile.max_graceful_termination_sec.as_ref(),
        is_int,
        "invalid value, must be an integer",
    );
    check(
        "maxNodeProvisionTime",
        profile.max_node_provision_time.as_ref(),
        minutes,
        "invalid value, must be an integer followed by 'm'",
    );
    check(
        "maxTotalUnreadyPercentage",
        profile.max_total_unready_percentage.as_ref(),
        percentage,
        "invalid value, must be an integer between 0 and 100",
    );
    check(
        "newPodScaleUpDelay",
        profile.new_pod_scale_up_delay.as_ref(),
        minutes_or_seconds,
        "invalid value, must be an integer followed by 'm' or 's'",
    );
    check("okTotalUnreadyCount", profile.ok_total_unready_count.as_ref(), is_int, "invalid value, must be an integer");
    check(
        "scanInterval",
        profile.scan_interval.as_ref(),
        seconds,
        "invalid value, must be an integer followed by 's'",
    );
    for (name, value) in [
        ("scaleDownDelayAfterAdd", profile.scale_down_delay_after_add.as_ref()),
        ("scaleDownDelayAfterDelete", profile.scale_down_delay_after_delete.as_ref()),
        ("scaleDownDelayAfterFailure", profile.scale_down_delay_after_failure.as_ref()),
        ("scaleDownUnneededTime", profile.scale_down_unneeded_time.as_ref()),
        ("scaleDownUnreadyTime", profile.scale_down_unready_time.as_ref()),
    ] {
        check(name, value, minutes_or_seconds, "invalid value, must be an integer followed by 'm' or 's'");
    }
    check(
        "scaleDownUtilizationThreshold",
        profile.scale_down_utilization_threshold.as_ref(),
        ratio,
        "invalid value, must be a number between 0 and 1",
    );
    check("skipNodesWithLocalStorage", profile.skip_nodes_with_local_storage.as_ref(), is_bool, bool_detail);
    check("skipNodesWithSystemPods", profile.skip_nodes_with_system_pods.as_ref(), is_bool, bool_detail);
    errs
}

fn validate_network_dataplane(class: &AzureManagedControlPlaneClassSpec, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let cilium_dataplane = class.network_dataplane == Some(NetworkDataplaneType::Cilium);

    if cilium_dataplane {
        if class.network_plugin != Some(NetworkPluginType::Azure) {
            errs.push(FieldError::invalid(
                path.child("networkPlugin"),
                &class.network_plugin,
                "cilium dataplane requires network plugin azure",
            ));
        }
        if class.network_policy.is_some_and(|p| p != NetworkPolicyType::Cilium) {
            errs.push(FieldError::invalid(
                path.child("networkPolicy"),
                &class.network_policy,
                "cilium dataplane requires network policy cilium",
            ));
        }
    } else if class.network_policy == Some(NetworkPolicyType::Cilium) {
        errs.push(FieldError::invalid(
            path.child("networkPolicy"),
            &class.network_policy,
            "cilium network policy requires cilium network dataplane",
        ));
    }
    if class.network_plugin_mode == Some(NetworkPluginMode::Overlay)
        && class.network_policy == Some(NetworkPolicyType::Azure)
    {
        errs.push(FieldError::invalid(
            path.child("networkPolicy"),
            &class.network_policy,
            "overlay network plugin mode is not supported with azure network policy",
        ));
    }
    errs
}

fn validate_extensions(extensions: &[AKSExtension], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    for (i, ext) in extensions.iter().enumerate() {
        let ext_path = path.index(i);
        let auto_upgrade = ext.auto_upgrade_minor_version == Some(true);
        if ext.version.as_deref().is_some_and(|v| !v.is_empty()) && auto_upgrade {
            errs.push(FieldError::forbidden(
                ext_path.child("version"),
                "Version must not be given if AutoUpgradeMinorVersion is true",
            ));
        }
        if let Some(train) = ext.release_train.as_deref().filter(|t| !t.is_empty())
            && !auto_upgrade
        {
            errs.push(FieldError::invalid(
                ext_path.child("releaseTrain"),
                train,
                "ReleaseTrain must not be given if AutoUpgradeMinorVersion is false",
            ));
        }
        if let Some(scope) = &ext.scope {
            let scope_path = ext_path.child("scope");
            match scope.scope_type {
                ExtensionScopeType::Cluster if !scope.target_namespace.is_empty() => {
                    errs.push(FieldError::invalid(
                        scope_path.child("targetNamespace"),
                        &scope.target_namespace,
                        "TargetNamespace can only be given if ScopeType is Namespace",
                    ));
                }
                ExtensionScopeType::Namespace if !scope.release_namespace.is_empty() => {
                    errs.push(FieldError::invalid(
                        scope_path.child("releaseNamespace"),
                        &scope.release_namespace,
                        "ReleaseNamespace can only be given if ScopeType is Cluster",
                    ));
                }
                _ => {}
            }
        }
    }
    errs
}

fn managed_control_plane_rules() -> Vec<Rule> {
    vec![
        Rule::equal("spec.subscriptionID"),
        Rule::equal("spec.resourceGroupName"),
        Rule::equal("spec.nodeResourceGroupName"),
        Rule::equal("spec.location"),
        Rule::equal("spec.sshPublicKey"),
        Rule::equal("spec.dnsPrefix"),
        Rule::equal("spec.dnsServiceIP"),
        Rule::equal("spec.networkPlugin"),
        Rule::equal("spec.networkPolicy"),
        Rule::equal("spec.networkDataplane"),
        Rule::equal("spec.loadBalancerSKU"),
        Rule::equal("spec.outboundType"),
        Rule::equal("spec.apiServerAccessProfile.enablePrivateCluster"),
        Rule::equal("spec.apiServerAccessProfile.privateDNSZone"),
        Rule::equal("spec.apiServerAccessProfile.enablePrivateClusterPublicFQDN"),
        Rule::enable_only("spec.aadProfile.managed")
            .with_detail("aadProfile.managed cannot be disabled once enabled"),
        Rule::append_only("spec.aadProfile.adminGroupObjectIDs")
            .with_detail("adminGroupObjectIDs may gain entries but not lose any"),
        Rule::enable_only("spec.oidcIssuerProfile.enabled")
            .with_detail("the OIDC issuer cannot be disabled once enabled"),
    ]
}

/// Extensions are matched by name; type and plan are fixed per name.
fn validate_extensions_update(old: &[AKSExtension], new: &[AKSExtension], path: &FieldPath) -> ErrorList {
    let old_by_name: BTreeMap<&str, &AKSExtension> = old.iter().map(|e| (e.name.as_str(), e)).collect();
    let rules = [Rule::equal("extensionType"), Rule::equal("plan")];
    let mut errs = ErrorList::new();
    for (i, ext) in new.iter().enumerate() {
        if let Some(previous) = old_by_name.get(ext.name.as_str()) {
            errs.append(compare(*previous, ext, &path.index(i), &rules));
        }
    }
    errs
}

/// Immutability rules of an AzureManagedControlPlane update.
pub fn validate_managed_control_plane_immutability(
    old: &AzureManagedControlPlane,
    new: &AzureManagedControlPlane,
) -> ErrorList {
    let path = spec_path();
    let mut errs = compare(old, new, &FieldPath::default(), &managed_control_plane_rules());
    if !new.spec.class.version.is_empty() {
        errs.append(validate_version_upgrade(
            &old.spec.class.version,
            &new.spec.class.version,
            &path.child("version"),
        ));
    }
    errs.append(validate_extensions_update(
        &old.spec.class.extensions,
        &new.spec.class.extensions,
        &path.child("extensions"),
    ));
    errs
}

/// Immutability of an AzureManagedControlPlaneTemplate: the whole embedded
/// spec is frozen.
pub fn validate_managed_control_plane_template_immutability(
    old: &AzureManagedControlPlaneTemplate,
    new: &AzureManagedControlPlaneTemplate,
) -> ErrorList {
    let mut old = old.clone();
    set_managed_control_plane_template_defaults(&mut old);
    check_unchanged(
        &old.spec.template.spec,
        &new.spec.template.spec,
        template_spec_path(),
        &template_immutable_detail("AzureManagedControlPlaneTemplate"),
    )
}
