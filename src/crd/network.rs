//! Network topology of a self-managed cluster: VNet, subnets, load
//! balancers, NAT gateways and bastion.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Tags, has_owned_tag};
use crate::validation::primitives::is_ipv6_cidr;

/// Role a subnet plays in the cluster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, JsonSchema)]
pub enum SubnetRole {
    #[serde(rename = "control-plane")]
    ControlPlane,
    #[serde(rename = "node")]
    Node,
    #[serde(rename = "bastion")]
    Bastion,
    #[serde(rename = "cluster")]
    Cluster,
}

impl std::fmt::Display for SubnetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubnetRole::ControlPlane => write!(f, "control-plane"),
            SubnetRole::Node => write!(f, "node"),
            SubnetRole::Bastion => write!(f, "bastion"),
            SubnetRole::Cluster => write!(f, "cluster"),
        }
    }
}

/// Load balancer SKU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum LBSku {
    Basic,
    Standard,
}

/// Load balancer exposure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum LBType {
    Public,
    Internal,
}

impl std::fmt::Display for LBType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LBType::Public => write!(f, "Public"),
            LBType::Internal => write!(f, "Internal"),
        }
    }
}

/// Network specification of a cluster.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    /// Virtual network configuration.
    #[serde(default)]
    pub vnet: VnetSpec,

    /// Subnets of the virtual network.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<SubnetSpec>,

    /// Load balancer in front of the API server.
    #[serde(rename = "apiServerLB", default, skip_serializing_if = "Option::is_none")]
    pub api_server_lb: Option<LoadBalancerSpec>,

    /// Outbound load balancer for worker nodes.
    #[serde(rename = "nodeOutboundLB", default, skip_serializing_if = "Option::is_none")]
    pub node_outbound_lb: Option<LoadBalancerSpec>,

    /// Outbound load balancer for control plane nodes of private clusters.
    #[serde(rename = "controlPlaneOutboundLB", default, skip_serializing_if = "Option::is_none")]
    pub control_plane_outbound_lb: Option<LoadBalancerSpec>,

    /// Private DNS zone for internal API servers.
    #[serde(rename = "privateDNSZoneName", default, skip_serializing_if = "Option::is_none")]
    pub private_dns_zone_name: Option<String>,

    /// Resource group of the private DNS zone.
    #[serde(rename = "privateDNSZoneResourceGroup", default, skip_serializing_if = "Option::is_none")]
    pub private_dns_zone_resource_group: Option<String>,
}

impl NetworkSpec {
    /// Subnets with the given role, paired with their index.
    pub fn subnets_with_role(&self, role: SubnetRole) -> impl Iterator<Item = (usize, &SubnetSpec)> {
        self.subnets
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.role == Some(role))
    }

    /// Whether any node subnet carries an IPv6 CIDR.
    pub fn has_ipv6_node_subnet(&self) -> bool {
        self.subnets_with_role(SubnetRole::Node)
            .any(|(_, s)| s.is_ipv6_enabled())
    }

    /// API server load balancer type, if set.
    pub fn api_server_lb_type(&self) -> Option<LBType> {
        self.api_server_lb.as_ref().and_then(|lb| lb.class.r#type)
    }
}

/// Virtual network configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VnetSpec {
    /// Resource group of an existing or created VNet.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_group: String,

    /// Identifier of an existing VNet.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Name of the VNet.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Address space of the VNet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cidr_blocks: Vec<String>,

    /// Tags of the VNet.
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,

    /// Peerings to other VNets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peerings: Vec<VnetPeeringSpec>,
}

impl VnetSpec {
    /// Whether the VNet is created and owned by the named cluster.
    pub fn is_managed(&self, cluster_name: &str) -> bool {
        self.id.is_empty() || has_owned_tag(&self.tags, cluster_name)
    }
}

/// Peering from the cluster VNet to a remote VNet.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VnetPeeringSpec {
    /// Resource group of the remote VNet.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_group: String,

    /// Name of the remote VNet.
    pub remote_vnet_name: String,
}

/// A subnet within the cluster VNet.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    /// Role of the subnet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<SubnetRole>,

    /// Identifier of a pre-existing subnet.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// Name of the subnet.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Address prefixes of the subnet.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cidr_blocks: Vec<String>,

    /// Network security group of the subnet.
    #[serde(default)]
    pub security_group: SecurityGroup,

    /// Route table of the subnet.
    #[serde(default)]
    pub route_table: RouteTable,

    /// NAT gateway attached to the subnet.
    #[serde(default)]
    pub nat_gateway: NatGateway,
}

impl SubnetSpec {
    /// Whether any of the subnet's CIDR blocks is IPv6.
    pub fn is_ipv6_enabled(&self) -> bool {
        self.cidr_blocks.iter().any(|c| is_ipv6_cidr(c))
    }

    /// Whether a NAT gateway is configured for the subnet.
    pub fn is_nat_gateway_enabled(&self) -> bool {
        !self.nat_gateway.name.is_empty()
    }
}

/// Network security group.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Rules of the security group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_rules: Vec<SecurityRule>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
}

/// Security rule protocol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SecurityGroupProtocol {
    #[default]
    #[serde(rename = "*")]
    All,
    Tcp,
    Udp,
    Icmp,
}

/// Direction of a security rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SecurityRuleDirection {
    #[default]
    Inbound,
    Outbound,
}

/// Access granted by a security rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum SecurityRuleAccess {
    #[default]
    Allow,
    Deny,
}

/// A network security rule.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRule {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub protocol: SecurityGroupProtocol,

    /// Direction of traffic (default: Inbound).
    #[serde(default)]
    pub direction: SecurityRuleDirection,

    /// Priority in [100, 4096]; lower values are evaluated first.
    #[serde(default)]
    pub priority: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ports: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ports: Option<String>,

    /// Multiple source prefixes; exclusive with `source`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,

    /// Allow or deny (default: Allow).
    #[serde(default)]
    pub action: SecurityRuleAccess,
}

/// Route table of a subnet.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteTable {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// NAT gateway attached to a subnet. Enabled when `name` is non-empty.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NatGateway {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Public IP used by the NAT gateway.
    #[serde(rename = "natGatewayIP", default)]
    pub nat_gateway_ip: PublicIPSpec,
}

/// Public IP address resource.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicIPSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_name: String,
}

/// SKU, type and idle timeout shared by load balancer specs and templates.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerClassSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<LBSku>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#type: Option<LBType>,

    /// Idle timeout in minutes, in [4, 30].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_in_minutes: Option<i32>,
}

/// A load balancer.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Frontend IP configurations.
    #[serde(rename = "frontendIPs", default, skip_serializing_if = "Vec::is_empty")]
    pub frontend_ips: Vec<FrontendIP>,

    /// Number of frontend IPs for outbound load balancers.
    #[serde(rename = "frontendIPsCount", default, skip_serializing_if = "Option::is_none")]
    pub frontend_ips_count: Option<i32>,

    /// Backend address pool.
    #[serde(default)]
    pub backend_pool: BackendPool,

    #[serde(flatten)]
    pub class: LoadBalancerClassSpec,
}

/// A frontend IP configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FrontendIP {
    pub name: String,

    /// Private IP for internal load balancers.
    #[serde(rename = "privateIP", default, skip_serializing_if = "String::is_empty")]
    pub private_ip_address: String,

    /// Public IP for public load balancers.
    #[serde(rename = "publicIP", default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<PublicIPSpec>,
}

/// Backend address pool of a load balancer.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendPool {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Bastion configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BastionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_bastion: Option<AzureBastion>,
}

/// Bastion host SKU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum BastionHostSku {
    #[default]
    Basic,
    Standard,
}

/// Azure Bastion host.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureBastion {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Subnet hosting the bastion.
    #[serde(default)]
    pub subnet: SubnetSpec,

    /// Public IP of the bastion.
    #[serde(rename = "publicIP", default)]
    pub public_ip: PublicIPSpec,

    #[serde(default)]
    pub sku: BastionHostSku,

    /// Native client tunneling; requires the Standard SKU.
    #[serde(default)]
    pub enable_tunneling: bool,
}

// === Template variants ===

/// Network specification of a cluster template.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTemplateSpec {
    #[serde(default)]
    pub vnet: VnetTemplateSpec,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<SubnetTemplateSpec>,

    #[serde(rename = "apiServerLB", default, skip_serializing_if = "Option::is_none")]
    pub api_server_lb: Option<LoadBalancerClassSpec>,

    #[serde(rename = "nodeOutboundLB", default, skip_serializing_if = "Option::is_none")]
    pub node_outbound_lb: Option<LoadBalancerClassSpec>,

    #[serde(rename = "controlPlaneOutboundLB", default, skip_serializing_if = "Option::is_none")]
    pub control_plane_outbound_lb: Option<LoadBalancerClassSpec>,

    #[serde(rename = "privateDNSZoneName", default, skip_serializing_if = "Option::is_none")]
    pub private_dns_zone_name: Option<String>,
}

impl NetworkTemplateSpec {
    pub fn has_ipv6_node_subnet(&self) -> bool {
        self.subnets
            .iter()
            .filter(|s| s.role == Some(SubnetRole::Node))
            .any(|s| s.cidr_blocks.iter().any(|c| is_ipv6_cidr(c)))
    }

    pub fn api_server_lb_type(&self) -> Option<LBType> {
        self.api_server_lb.as_ref().and_then(|lb| lb.r#type)
    }
}

/// VNet of a cluster template.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VnetTemplateSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cidr_blocks: Vec<String>,

    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub peerings: Vec<VnetPeeringSpec>,
}

/// Subnet of a cluster template. Names are derived per cluster.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubnetTemplateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<SubnetRole>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cidr_blocks: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_rules: Vec<SecurityRule>,

    /// Name of a NAT gateway to attach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nat_gateway_name: Option<String>,
}

/// Bastion of a cluster template.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BastionTemplateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_bastion: Option<AzureBastionTemplateSpec>,
}

/// Azure Bastion of a cluster template.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureBastionTemplateSpec {
    #[serde(default)]
    pub subnet: SubnetTemplateSpec,
}
