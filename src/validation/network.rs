//! Network topology rules: VNet, subnets, load balancers, NAT gateways,
//! private DNS and bastion.

use std::collections::HashSet;
use std::net::IpAddr;

use super::field::{ErrorList, FieldError, FieldPath};
use super::primitives::{
    parse_cidr, validate_cidrs, validate_dns_zone_name, validate_resource_group, validate_subnet_name,
};
use super::security::validate_security_rules;
use crate::crd::{
    AzureBastion, BastionHostSku, LBSku, LBType, LoadBalancerClassSpec, LoadBalancerSpec, NatGateway,
    SubnetRole, SubnetSpec, VnetPeeringSpec, VnetSpec,
};

pub const MIN_LB_IDLE_TIMEOUT_MINUTES: i32 = 4;
pub const MAX_LB_IDLE_TIMEOUT_MINUTES: i32 = 30;

/// Most frontend IPs an outbound load balancer may carry.
pub const MAX_LOAD_BALANCER_OUTBOUND_IPS: i32 = 16;

/// Name the cloud requires for a bastion subnet.
pub const AZURE_BASTION_SUBNET_NAME: &str = "AzureBastionSubnet";

/// Validate VNet CIDRs, resource group and peerings.
pub fn validate_vnet(vnet: &VnetSpec, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if !vnet.resource_group.is_empty() {
        errs.append(validate_resource_group(&vnet.resource_group, &path.child("resourceGroup")));
    }
    errs.append(validate_cidrs(&vnet.cidr_blocks, &path.child("cidrBlocks")));
    errs.append(validate_vnet_peerings(&vnet.peerings, &path.child("peerings")));
    errs
}

/// Validate VNet peerings.
pub fn validate_vnet_peerings(peerings: &[VnetPeeringSpec], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut seen = HashSet::new();
    for (i, peering) in peerings.iter().enumerate() {
        let peering_path = path.index(i);
        if peering.remote_vnet_name.is_empty() {
            errs.push(FieldError::required(
                peering_path.child("remoteVnetName"),
                "remote VNet name cannot be empty",
            ));
        }
        if !peering.resource_group.is_empty() {
            errs.append(validate_resource_group(
                &peering.resource_group,
                &peering_path.child("resourceGroup"),
            ));
        }
        if !seen.insert((peering.resource_group.as_str(), peering.remote_vnet_name.as_str())) {
            errs.push(FieldError::duplicate(
                peering_path.child("remoteVnetName"),
                &peering.remote_vnet_name,
            ));
        }
    }
    errs
}

/// Validate that every subnet CIDR parses and lies inside the VNet.
///
/// Containment is only checked when the VNet has usable CIDRs.
pub fn validate_subnet_cidrs(subnet_cidrs: &[String], vnet_cidrs: &[String], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let vnets: Vec<_> = vnet_cidrs.iter().filter_map(|c| parse_cidr(c)).collect();
    for (i, cidr) in subnet_cidrs.iter().enumerate() {
        let Some(subnet) = parse_cidr(cidr) else {
            errs.push(FieldError::invalid(path.index(i), cidr, "invalid CIDR format"));
            continue;
        };
        if !vnets.is_empty() && !vnets.iter().any(|v| v.contains(&subnet.network())) {
            errs.push(FieldError::invalid(
                path.index(i),
                cidr,
                format!("subnet CIDR not in vnet address space: [{}]", vnet_cidrs.join(" ")),
            ));
        }
    }
    errs
}

/// Validate that the subnet roles cover the cluster's needs: exactly one
/// control-plane subnet and at least one node subnet.
pub fn validate_subnet_roles(roles: &[Option<SubnetRole>], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut control_planes = 0;
    let mut nodes = 0;
    for (i, role) in roles.iter().enumerate() {
        match role {
            None => errs.push(FieldError::required(path.index(i).child("role"), "subnet role cannot be empty")),
            Some(SubnetRole::ControlPlane) => {
                control_planes += 1;
                if control_planes > 1 {
                    errs.push(FieldError::duplicate(
                        path.index(i).child("role"),
                        &SubnetRole::ControlPlane,
                    ));
                }
            }
            Some(SubnetRole::Node) => nodes += 1,
            Some(_) => {}
        }
    }
    if control_planes == 0 {
        errs.push(FieldError::required(
            path.clone(),
            format!("required role {} not included in provided subnets", SubnetRole::ControlPlane),
        ));
    }
    if nodes == 0 {
        errs.push(FieldError::required(
            path.clone(),
            format!("required role {} not included in provided subnets", SubnetRole::Node),
        ));
    }
    errs
}

/// Validate the cluster's subnets.
pub fn validate_subnets(subnets: &[SubnetSpec], vnet: &VnetSpec, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let roles: Vec<_> = subnets.iter().map(|s| s.role).collect();
    errs.append(validate_subnet_roles(&roles, path));

    let mut names = HashSet::new();
    for (i, subnet) in subnets.iter().enumerate() {
        let subnet_path = path.index(i);
        errs.append(validate_subnet_name(&subnet.name, &subnet_path.child("name")));
        if !subnet.name.is_empty() && !names.insert(subnet.name.as_str()) {
            errs.push(FieldError::duplicate(subnet_path.child("name"), &subnet.name));
        }
        errs.append(validate_subnet_cidrs(
            &subnet.cidr_blocks,
            &vnet.cidr_blocks,
            &subnet_path.child("cidrBlocks"),
        ));
        errs.append(validate_security_rules(
            &subnet.security_group.security_rules,
            &subnet_path.child("securityGroup").child("securityRules"),
        ));
        errs.append(validate_nat_gateway(subnet, &subnet_path.child("natGateway")));
    }
    errs
}

/// Validate a subnet's NAT gateway.
pub fn validate_nat_gateway(subnet: &SubnetSpec, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let nat: &NatGateway = &subnet.nat_gateway;
    if !subnet.is_nat_gateway_enabled() {
        return errs;
    }
    if subnet.is_ipv6_enabled() {
        errs.push(FieldError::forbidden(
            path.clone(),
            "NAT gateways are not supported on IPv6 subnets",
        ));
    }
    if subnet.role == Some(SubnetRole::Bastion) {
        errs.push(FieldError::forbidden(
            path.clone(),
            "NAT gateways cannot be attached to the bastion subnet",
        ));
    }
    errs.append(validate_subnet_name(&nat.name, &path.child("name")));
    errs
}

/// Validate an idle timeout in minutes.
pub fn validate_idle_timeout(timeout: Option<i32>, path: &FieldPath, what: &str) -> ErrorList {
    let mut errs = ErrorList::new();
    if let Some(t) = timeout {
        if !(MIN_LB_IDLE_TIMEOUT_MINUTES..=MAX_LB_IDLE_TIMEOUT_MINUTES).contains(&t) {
            errs.push(FieldError::invalid(
                path.clone(),
                &t,
                format!(
                    "{what} idle timeout should be between {MIN_LB_IDLE_TIMEOUT_MINUTES} and {MAX_LB_IDLE_TIMEOUT_MINUTES} minutes"
                ),
            ));
        }
    }
    errs
}

/// Validate SKU, type and idle timeout of the API server load balancer.
///
/// Unset values are left for defaulting.
pub fn validate_api_server_lb_class(class: &LoadBalancerClassSpec, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if let Some(sku) = class.sku {
        if sku != LBSku::Standard {
            errs.push(FieldError::not_supported(path.child("sku"), &sku, &["Standard"]));
        }
    }
    errs.append(validate_idle_timeout(
        class.idle_timeout_in_minutes,
        &path.child("idleTimeoutInMinutes"),
        "API server load balancer",
    ));
    errs
}

/// Validate the API server load balancer.
///
/// `control_plane_cidrs` are the control-plane subnet's CIDRs, which must
/// contain an internal load balancer's private IP.
pub fn validate_api_server_lb(
    lb: &LoadBalancerSpec,
    control_plane_cidrs: &[String],
    path: &FieldPath,
) -> ErrorList {
    let mut errs = validate_api_server_lb_class(&lb.class, path);

    let public_ips = lb.frontend_ips.iter().filter(|f| f.public_ip.is_some()).count();
    let private_ips: Vec<(usize, &str)> = lb
        .frontend_ips
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.private_ip_address.is_empty())
        .map(|(i, f)| (i, f.private_ip_address.as_str()))
        .collect();
    let frontends_path = path.child("frontendIPs");

    match lb.class.r#type {
        Some(LBType::Public) => {
            if !lb.frontend_ips.is_empty() && (public_ips != 1 || lb.frontend_ips_count.unwrap_or(1) != 1) {
                errs.push(FieldError::invalid_omit_value(
                    frontends_path.clone(),
                    "API Server Load balancer should have 1 Frontend IP",
                ));
            }
            if !private_ips.is_empty() {
                errs.push(FieldError::forbidden(
                    frontends_path,
                    "Public Load Balancers cannot have a Private IP",
                ));
            }
        }
        Some(LBType::Internal) => {
            if public_ips != 0 {
                errs.push(FieldError::forbidden(
                    frontends_path.clone(),
                    "Internal Load Balancers cannot have a Public IP",
                ));
            }
            match private_ips.as_slice() {
                [] if lb.frontend_ips.is_empty() => {}
                [(i, ip)] => errs.append(validate_internal_lb_ip(
                    ip,
                    control_plane_cidrs,
                    &frontends_path.index(*i).child("privateIP"),
                )),
                _ => errs.push(FieldError::invalid_omit_value(
                    frontends_path,
                    "API Server Load balancer should have 1 Frontend IP",
                )),
            }
        }
        None => {}
    }
    errs
}

fn validate_internal_lb_ip(address: &str, cidrs: &[String], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let Ok(ip) = address.parse::<IpAddr>() else {
        errs.push(FieldError::invalid(
            path.clone(),
            address,
            "Internal LB IP address isn't a valid IPv4 or IPv6 address",
        ));
        return errs;
    };
    let nets: Vec<_> = cidrs.iter().filter_map(|c| parse_cidr(c)).collect();
    if !nets.is_empty() && !nets.iter().any(|n| n.contains(&ip)) {
        errs.push(FieldError::invalid(
            path.clone(),
            address,
            format!(
                "Internal LB IP address needs to be in control plane subnet range ([{}])",
                cidrs.join(" ")
            ),
        ));
    }
    errs
}

fn validate_outbound_frontends_count(count: Option<i32>, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if let Some(count) = count {
        if count > MAX_LOAD_BALANCER_OUTBOUND_IPS {
            errs.push(FieldError::forbidden(
                path.clone(),
                format!("Max front end ips allowed is {MAX_LOAD_BALANCER_OUTBOUND_IPS}"),
            ));
        } else if count < 1 {
            errs.push(FieldError::invalid(path.clone(), &count, "at least one front end ip is required"));
        }
    }
    errs
}

/// Validate the node outbound load balancer.
///
/// It is required when a node subnet is IPv6 and the API server is public,
/// and must itself be public.
pub fn validate_node_outbound_lb(
    lb: Option<&LoadBalancerSpec>,
    needed: bool,
    api_server_type: Option<LBType>,
    path: &FieldPath,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(lb) = lb else {
        if needed && api_server_type != Some(LBType::Internal) {
            errs.push(FieldError::required(
                path.clone(),
                "Node outbound load balancer cannot be nil for public clusters.",
            ));
        }
        return errs;
    };
    if let Some(lb_type) = lb.class.r#type {
        if lb_type != LBType::Public {
            errs.push(FieldError::not_supported(path.child("type"), &lb_type, &["Public"]));
        }
    }
    errs.append(validate_outbound_frontends_count(
        lb.frontend_ips_count,
        &path.child("frontendIPsCount"),
    ));
    errs.append(validate_idle_timeout(
        lb.class.idle_timeout_in_minutes,
        &path.child("idleTimeoutInMinutes"),
        "Node outbound",
    ));
    errs
}

/// Validate the control plane outbound load balancer; only private
/// clusters may have one.
pub fn validate_control_plane_outbound_lb(
    lb: Option<&LoadBalancerSpec>,
    api_server_type: Option<LBType>,
    path: &FieldPath,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(lb) = lb else {
        return errs;
    };
    if api_server_type != Some(LBType::Internal) {
        errs.push(FieldError::forbidden(
            path.clone(),
            "Control plane outbound load balancer cannot be set for public clusters.",
        ));
        return errs;
    }
    errs.append(validate_outbound_frontends_count(
        lb.frontend_ips_count,
        &path.child("frontendIPsCount"),
    ));
    errs.append(validate_idle_timeout(
        lb.class.idle_timeout_in_minutes,
        &path.child("idleTimeoutInMinutes"),
        "Control plane outbound",
    ));
    errs
}

/// Validate the private DNS zone name; it requires an internal API server.
pub fn validate_private_dns_zone_name(
    name: Option<&str>,
    api_server_type: Option<LBType>,
    path: &FieldPath,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(name) = name.filter(|n| !n.is_empty()) else {
        return errs;
    };
    if api_server_type != Some(LBType::Internal) {
        errs.push(FieldError::invalid(
            path.clone(),
            name,
            "PrivateDNSZoneName is available only if APIServerLB.Type is Internal",
        ));
    }
    errs.append(validate_dns_zone_name(name, path));
    errs
}

/// Validate an Azure Bastion host.
pub fn validate_bastion(bastion: &AzureBastion, vnet_cidrs: &[String], path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let subnet_path = path.child("subnet");
    if !bastion.subnet.name.is_empty() && bastion.subnet.name != AZURE_BASTION_SUBNET_NAME {
        errs.push(FieldError::invalid(
            subnet_path.child("name"),
            &bastion.subnet.name,
            format!("Azure Bastion subnet name should be {AZURE_BASTION_SUBNET_NAME}"),
        ));
    }
    if let Some(role) = bastion.subnet.role {
        if role != SubnetRole::Bastion {
            errs.push(FieldError::not_supported(subnet_path.child("role"), &role, &["bastion"]));
        }
    }
    errs.append(validate_subnet_cidrs(
        &bastion.subnet.cidr_blocks,
        vnet_cidrs,
        &subnet_path.child("cidrBlocks"),
    ));
    errs.append(validate_security_rules(
        &bastion.subnet.security_group.security_rules,
        &subnet_path.child("securityGroup").child("securityRules"),
    ));
    if bastion.enable_tunneling && bastion.sku != BastionHostSku::Standard {
        errs.push(FieldError::invalid(
            path.child("enableTunneling"),
            &bastion.enable_tunneling,
            "sku must be Standard when enableTunneling is true",
        ));
    }
    errs
}
