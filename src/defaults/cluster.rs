//! Defaulting for AzureCluster and AzureClusterTemplate.
//!
//! Every derived name is built from the cluster's `metadata.name`, so a
//! cluster defaulted twice ends up with the same VNet, subnets, load
//! balancers and NAT gateways.

use kube::ResourceExt;

use super::{
    DEFAULT_AZURE_BASTION_SUBNET_CIDR, DEFAULT_CLUSTER_SUBNET_CIDR, DEFAULT_CONTROL_PLANE_SUBNET_CIDR,
    DEFAULT_INTERNAL_LB_IP_ADDRESS, DEFAULT_OUTBOUND_RULE_IDLE_TIMEOUT_MINUTES, DEFAULT_VNET_CIDR,
    node_subnet_cidr, with_index,
};
use crate::crd::{
    AzureBastion, AzureCluster, AzureClusterClassSpec, AzureClusterTemplate, DEFAULT_AZURE_ENVIRONMENT,
    FrontendIP, LBSku, LBType, LoadBalancerClassSpec, LoadBalancerSpec, NetworkSpec, NetworkTemplateSpec,
    PublicIPSpec, SubnetRole, SubnetSpec, SubnetTemplateSpec,
};
use crate::validation::network::AZURE_BASTION_SUBNET_NAME;

/// Apply every AzureCluster default.
pub fn set_azure_cluster_defaults(cluster: &mut AzureCluster) {
    let name = cluster.name_any();
    let spec = &mut cluster.spec;

    if spec.resource_group.is_empty() {
        spec.resource_group = name.clone();
    }
    set_class_defaults(&mut spec.class);

    let resource_group = spec.resource_group.clone();
    let network = &mut spec.network_spec;
    set_vnet_defaults(network, &name, &resource_group);
    set_subnet_defaults(network, &name);
    set_api_server_lb_defaults(network, &name);
    set_node_outbound_lb_defaults(network, &name);
    set_control_plane_outbound_lb_defaults(network, &name);

    if let Some(bastion) = spec.bastion_spec.azure_bastion.as_mut() {
        set_bastion_defaults(bastion, &name);
    }
}

/// Apply the AzureClusterTemplate defaults to `spec.template.spec`.
///
/// Templates carry no names, so only roles, CIDRs and load balancer classes
/// are filled in.
pub fn set_azure_cluster_template_defaults(template: &mut AzureClusterTemplate) {
    let spec = &mut template.spec.template.spec;
    set_class_defaults(&mut spec.class);

    let network = &mut spec.network_spec;
    if network.vnet.cidr_blocks.is_empty() {
        network.vnet.cidr_blocks = vec![DEFAULT_VNET_CIDR.to_string()];
    }
    set_subnet_template_defaults(network);

    let api_lb = network.api_server_lb.get_or_insert_with(LoadBalancerClassSpec::default);
    set_lb_class_defaults(api_lb, LBType::Public);

    let api_internal = network.api_server_lb_type() == Some(LBType::Internal);
    if network.node_outbound_lb.is_none() && !api_internal && network.has_ipv6_node_subnet() {
        network.node_outbound_lb = Some(LoadBalancerClassSpec::default());
    }
    if let Some(lb) = network.node_outbound_lb.as_mut() {
        set_lb_class_defaults(lb, LBType::Public);
    }
    if api_internal {
        if let Some(lb) = network.control_plane_outbound_lb.as_mut() {
            set_lb_class_defaults(lb, LBType::Public);
        }
    }

    if let Some(bastion) = spec.bastion_spec.azure_bastion.as_mut() {
        if bastion.subnet.role.is_none() {
            bastion.subnet.role = Some(SubnetRole::Bastion);
        }
        if bastion.subnet.cidr_blocks.is_empty() {
            bastion.subnet.cidr_blocks = vec![DEFAULT_AZURE_BASTION_SUBNET_CIDR.to_string()];
        }
    }
}

fn set_class_defaults(class: &mut AzureClusterClassSpec) {
    if class.azure_environment.is_empty() {
        class.azure_environment = DEFAULT_AZURE_ENVIRONMENT.to_string();
    }
}

fn set_vnet_defaults(network: &mut NetworkSpec, cluster_name: &str, resource_group: &str) {
    let vnet = &mut network.vnet;
    if vnet.resource_group.is_empty() {
        vnet.resource_group = resource_group.to_string();
    }
    if vnet.name.is_empty() {
        vnet.name = format!("{cluster_name}-vnet");
    }
    if vnet.cidr_blocks.is_empty() {
        vnet.cidr_blocks = vec![DEFAULT_VNET_CIDR.to_string()];
    }
    for peering in &mut vnet.peerings {
        if peering.resource_group.is_empty() {
            peering.resource_group = resource_group.to_string();
        }
    }
}

fn set_subnet_defaults(network: &mut NetworkSpec, cluster_name: &str) {
    for subnet in network.subnets.iter_mut() {
        if subnet.role == Some(SubnetRole::Cluster) {
            set_cluster_subnet_defaults(subnet, cluster_name);
        }
    }

    match network
        .subnets
        .iter_mut()
        .find(|s| s.role == Some(SubnetRole::ControlPlane))
    {
        Some(subnet) => set_control_plane_subnet_defaults(subnet, cluster_name),
        None => {
            let mut subnet = SubnetSpec {
                role: Some(SubnetRole::ControlPlane),
                ..Default::default()
            };
            set_control_plane_subnet_defaults(&mut subnet, cluster_name);
            network.subnets.push(subnet);
        }
    }

    let mut node_index = 0;
    for subnet in network.subnets.iter_mut() {
        if subnet.role == Some(SubnetRole::Node) {
            node_index += 1;
            set_node_subnet_defaults(subnet, cluster_name, node_index);
        }
    }
    if node_index == 0 {
        let mut subnet = SubnetSpec {
            role: Some(SubnetRole::Node),
            ..Default::default()
        };
        set_node_subnet_defaults(&mut subnet, cluster_name, 1);
        network.subnets.push(subnet);
    }
}

fn set_control_plane_subnet_defaults(subnet: &mut SubnetSpec, cluster_name: &str) {
    if subnet.name.is_empty() {
        subnet.name = format!("{cluster_name}-controlplane-subnet");
    }
    if subnet.cidr_blocks.is_empty() {
        subnet.cidr_blocks = vec![DEFAULT_CONTROL_PLANE_SUBNET_CIDR.to_string()];
    }
    if subnet.security_group.name.is_empty() {
        subnet.security_group.name = format!("{cluster_name}-controlplane-nsg");
    }
}

fn set_node_subnet_defaults(subnet: &mut SubnetSpec, cluster_name: &str, index: usize) {
    if subnet.name.is_empty() {
        subnet.name = with_index(&format!("{cluster_name}-node-subnet"), index);
    }
    if subnet.cidr_blocks.is_empty() {
        subnet.cidr_blocks = vec![node_subnet_cidr(index)];
    }
    if subnet.security_group.name.is_empty() {
        subnet.security_group.name = format!("{cluster_name}-node-nsg");
    }
    if subnet.route_table.name.is_empty() {
        subnet.route_table.name = format!("{cluster_name}-node-routetable");
    }
    // NAT gateways only route IPv4 traffic; imported subnets keep what they have.
    if subnet.id.is_empty() && !subnet.is_ipv6_enabled() && subnet.nat_gateway.name.is_empty() {
        subnet.nat_gateway.name = with_index(&format!("{cluster_name}-node-natgw"), index);
    }
    set_nat_gateway_ip_defaults(subnet);
}

fn set_cluster_subnet_defaults(subnet: &mut SubnetSpec, cluster_name: &str) {
    if subnet.name.is_empty() {
        subnet.name = format!("{cluster_name}-subnet");
    }
    if subnet.cidr_blocks.is_empty() {
        subnet.cidr_blocks = vec![DEFAULT_CLUSTER_SUBNET_CIDR.to_string()];
    }
    if subnet.security_group.name.is_empty() {
        subnet.security_group.name = format!("{cluster_name}-nsg");
    }
    if subnet.route_table.name.is_empty() {
        subnet.route_table.name = format!("{cluster_name}-routetable");
    }
    if subnet.id.is_empty() && !subnet.is_ipv6_enabled() && subnet.nat_gateway.name.is_empty() {
        subnet.nat_gateway.name = format!("{cluster_name}-natgw");
    }
    set_nat_gateway_ip_defaults(subnet);
}

fn set_nat_gateway_ip_defaults(subnet: &mut SubnetSpec) {
    if subnet.is_nat_gateway_enabled() && subnet.nat_gateway.nat_gateway_ip.name.is_empty() {
        subnet.nat_gateway.nat_gateway_ip.name = format!("pip-{}", subnet.nat_gateway.name);
    }
}

fn set_lb_class_defaults(class: &mut LoadBalancerClassSpec, default_type: LBType) {
    if class.r#type.is_none() {
        class.r#type = Some(default_type);
    }
    if class.sku.is_none() {
        class.sku = Some(LBSku::Standard);
    }
    if class.idle_timeout_in_minutes.is_none() {
        class.idle_timeout_in_minutes = Some(DEFAULT_OUTBOUND_RULE_IDLE_TIMEOUT_MINUTES);
    }
}

fn frontend_ip_name(lb_name: &str) -> String {
    format!("{lb_name}-frontEnd")
}

fn set_api_server_lb_defaults(network: &mut NetworkSpec, cluster_name: &str) {
    let lb = network.api_server_lb.get_or_insert_with(LoadBalancerSpec::default);
    set_lb_class_defaults(&mut lb.class, LBType::Public);

    match lb.class.r#type {
        Some(LBType::Internal) => {
            if lb.name.is_empty() {
                lb.name = format!("{cluster_name}-internal-lb");
            }
            if lb.frontend_ips.is_empty() {
                lb.frontend_ips = vec![FrontendIP {
                    name: frontend_ip_name(&lb.name),
                    private_ip_address: DEFAULT_INTERNAL_LB_IP_ADDRESS.to_string(),
                    public_ip: None,
                }];
            }
        }
        _ => {
            if lb.name.is_empty() {
                lb.name = format!("{cluster_name}-public-lb");
            }
            if lb.frontend_ips.is_empty() {
                lb.frontend_ips = vec![FrontendIP {
                    name: frontend_ip_name(&lb.name),
                    private_ip_address: String::new(),
                    public_ip: Some(PublicIPSpec {
                        name: format!("pip-{cluster_name}-apiserver"),
                        dns_name: String::new(),
                    }),
                }];
            }
        }
    }
    if lb.backend_pool.name.is_empty() {
        lb.backend_pool.name = format!("{}-backendPool", lb.name);
    }
}

/// Frontends of an outbound load balancer, one public IP each.
fn outbound_frontend_ips(lb_name: &str, public_ip_base: &str, count: i32) -> Vec<FrontendIP> {
    let count = usize::try_from(count).unwrap_or_default();
    (1..=count)
        .map(|i| {
            let (name, ip) = if count == 1 {
                (frontend_ip_name(lb_name), public_ip_base.to_string())
            } else {
                (
                    format!("{}-{i}", frontend_ip_name(lb_name)),
                    format!("{public_ip_base}-{i}"),
                )
            };
            FrontendIP {
                name,
                private_ip_address: String::new(),
                public_ip: Some(PublicIPSpec {
                    name: ip,
                    dns_name: String::new(),
                }),
            }
        })
        .collect()
}

fn set_outbound_lb_defaults(lb: &mut LoadBalancerSpec, default_name: String, public_ip_base: &str) {
    set_lb_class_defaults(&mut lb.class, LBType::Public);
    if lb.name.is_empty() {
        lb.name = default_name;
    }
    let count = *lb.frontend_ips_count.get_or_insert(1);
    if lb.frontend_ips.is_empty() {
        lb.frontend_ips = outbound_frontend_ips(&lb.name, public_ip_base, count);
    }
    if lb.backend_pool.name.is_empty() {
        lb.backend_pool.name = format!("{}-outboundBackendPool", lb.name);
    }
}

fn set_node_outbound_lb_defaults(network: &mut NetworkSpec, cluster_name: &str) {
    if network.node_outbound_lb.is_none() {
        if network.api_server_lb_type() == Some(LBType::Internal) || !network.has_ipv6_node_subnet() {
            return;
        }
        network.node_outbound_lb = Some(LoadBalancerSpec::default());
    }
    if let Some(lb) = network.node_outbound_lb.as_mut() {
        set_outbound_lb_defaults(
            lb,
            cluster_name.to_string(),
            &format!("pip-{cluster_name}-node-outbound"),
        );
    }
}

fn set_control_plane_outbound_lb_defaults(network: &mut NetworkSpec, cluster_name: &str) {
    if network.api_server_lb_type() != Some(LBType::Internal) {
        return;
    }
    if let Some(lb) = network.control_plane_outbound_lb.as_mut() {
        set_outbound_lb_defaults(
            lb,
            format!("{cluster_name}-outbound-lb"),
            &format!("pip-{cluster_name}-controlplane-outbound"),
        );
    }
}

fn set_bastion_defaults(bastion: &mut AzureBastion, cluster_name: &str) {
    if bastion.name.is_empty() {
        bastion.name = format!("{cluster_name}-azure-bastion");
    }
    if bastion.subnet.name.is_empty() {
        bastion.subnet.name = AZURE_BASTION_SUBNET_NAME.to_string();
    }
    if bastion.subnet.role.is_none() {
        bastion.subnet.role = Some(SubnetRole::Bastion);
    }
    if bastion.subnet.cidr_blocks.is_empty() {
        bastion.subnet.cidr_blocks = vec![DEFAULT_AZURE_BASTION_SUBNET_CIDR.to_string()];
    }
    if bastion.public_ip.name.is_empty() {
        bastion.public_ip.name = format!("{cluster_name}-azure-bastion-pip");
    }
}

fn set_subnet_template_defaults(network: &mut NetworkTemplateSpec) {
    match network
        .subnets
        .iter_mut()
        .find(|s| s.role == Some(SubnetRole::ControlPlane))
    {
        Some(subnet) => {
            if subnet.cidr_blocks.is_empty() {
                subnet.cidr_blocks = vec![DEFAULT_CONTROL_PLANE_SUBNET_CIDR.to_string()];
            }
        }
        None => network.subnets.push(SubnetTemplateSpec {
            role: Some(SubnetRole::ControlPlane),
            cidr_blocks: vec![DEFAULT_CONTROL_PLANE_SUBNET_CIDR.to_string()],
            ..Default::default()
        }),
    }

    let mut node_index = 0;
    for subnet in network.subnets.iter_mut() {
        if subnet.role == Some(SubnetRole::Node) {
            node_index += 1;
            if subnet.cidr_blocks.is_empty() {
                subnet.cidr_blocks = vec![node_subnet_cidr(node_index)];
            }
        }
    }
    if node_index == 0 {
        network.subnets.push(SubnetTemplateSpec {
            role: Some(SubnetRole::Node),
            cidr_blocks: vec![node_subnet_cidr(1)],
            ..Default::default()
        });
    }
}
