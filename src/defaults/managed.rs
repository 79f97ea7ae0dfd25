//! Defaulting for the managed (AKS) kinds: control planes, node pools and
//! their templates.

use kube::ResourceExt;
use tracing::info;

use super::ssh::generate_ssh_public_key;
use super::{DEFAULT_AKS_NODE_SUBNET_CIDR, DEFAULT_AKS_VNET_CIDR, DEFAULT_MANAGED_KUBERNETES_VERSION};
use crate::crd::{
    AKSSku, AutoScalerProfile, AzureManagedControlPlane, AzureManagedControlPlaneClassSpec,
    AzureManagedControlPlaneSkuTier, AzureManagedControlPlaneTemplate, AzureManagedMachinePool,
    AzureManagedMachinePoolClassSpec, AzureManagedMachinePoolTemplate, Expander, LABEL_AGENT_POOL_MODE, LBSku,
    NetworkPluginType, OSType,
};
use crate::error::Result;

/// Apply every AzureManagedControlPlane default.
pub fn set_managed_control_plane_defaults(mcp: &mut AzureManagedControlPlane) -> Result<()> {
    let name = mcp.name_any();
    let spec = &mut mcp.spec;

    if spec.ssh_public_key.is_none() {
        spec.ssh_public_key = Some(generate_ssh_public_key()?);
    }
    set_class_defaults(&mut spec.class, &name);

    if spec.node_resource_group_name.is_empty() {
        spec.node_resource_group_name = format!(
            "MC_{}_{}_{}",
            spec.resource_group_name, name, spec.class.location
        );
    }
    if spec.class.virtual_network.resource_group.is_empty() {
        spec.class.virtual_network.resource_group = spec.resource_group_name.clone();
    }
    if spec.dns_prefix.as_deref().is_none_or(str::is_empty) {
        spec.dns_prefix = Some(name);
    }
    Ok(())
}

/// Apply the AzureManagedControlPlaneTemplate defaults to `spec.template.spec`.
pub fn set_managed_control_plane_template_defaults(template: &mut AzureManagedControlPlaneTemplate) {
    let name = template.name_any();
    set_class_defaults(&mut template.spec.template.spec, &name);
}

fn set_class_defaults(class: &mut AzureManagedControlPlaneClassSpec, name: &str) {
    if class.network_plugin.is_none() {
        class.network_plugin = Some(NetworkPluginType::Azure);
    }
    if class.load_balancer_sku.is_none() {
        class.load_balancer_sku = Some(LBSku::Standard);
    }

    if class.version.is_empty() {
        class.version = DEFAULT_MANAGED_KUBERNETES_VERSION.to_string();
    } else if !class.version.starts_with('v') {
        class.version = format!("v{}", class.version);
    }

    let vnet = &mut class.virtual_network;
    if vnet.name.is_empty() {
        vnet.name = name.to_string();
    }
    if vnet.cidr_block.is_empty() {
        vnet.cidr_block = DEFAULT_AKS_VNET_CIDR.to_string();
    }
    if vnet.subnet.name.is_empty() {
        vnet.subnet.name = name.to_string();
    }
    if vnet.subnet.cidr_block.is_empty() {
        vnet.subnet.cidr_block = DEFAULT_AKS_NODE_SUBNET_CIDR.to_string();
    }

    match class.sku.as_mut() {
        None => {
            class.sku = Some(AKSSku {
                tier: AzureManagedControlPlaneSkuTier::Free,
            });
        }
        Some(sku) if sku.tier == AzureManagedControlPlaneSkuTier::Paid => {
            info!(name = %name, "Normalizing deprecated SKU tier Paid to Standard");
            sku.tier = AzureManagedControlPlaneSkuTier::Standard;
        }
        Some(_) => {}
    }

    if let Some(profile) = class.auto_scaler_profile.as_mut() {
        set_auto_scaler_profile_defaults(profile);
    }

    if class.enable_preview_features.is_none() {
        class.enable_preview_features = Some(false);
    }
}

fn default_str(field: &mut Option<String>, value: &str) {
    if field.is_none() {
        *field = Some(value.to_string());
    }
}

/// Fill every unset autoscaler field with the managed service's default.
pub fn set_auto_scaler_profile_defaults(profile: &mut AutoScalerProfile) {
    default_str(&mut profile.balance_similar_node_groups, "false");
    if profile.expander.is_none() {
        profile.expander = Some(Expander::Random);
    }
    default_str(&mut profile.max_empty_bulk_delete, "10");
    default_str(&mut profile.max_graceful_termination_sec, "600");
    default_str(&mut profile.max_node_provision_time, "15m");
    default_str(&mut profile.max_total_unready_percentage, "45");
    default_str(&mut profile.new_pod_scale_up_delay, "0s");
    default_str(&mut profile.ok_total_unready_count, "3");
    default_str(&mut profile.scan_interval, "10s");
    default_str(&mut profile.scale_down_delay_after_add, "10m");
    default_str(&mut profile.scale_down_delay_after_delete, "10s");
    default_str(&mut profile.scale_down_delay_after_failure, "3m");
    default_str(&mut profile.scale_down_unneeded_time, "10m");
    default_str(&mut profile.scale_down_unready_time, "20m");
    default_str(&mut profile.scale_down_utilization_threshold, "0.5");
    default_str(&mut profile.skip_nodes_with_local_storage, "false");
    default_str(&mut profile.skip_nodes_with_system_pods, "true");
}

/// Apply every AzureManagedMachinePool default.
pub fn set_managed_machine_pool_defaults(pool: &mut AzureManagedMachinePool) {
    let name = pool.name_any();
    let mode = pool.spec.class.mode.to_string();
    pool.labels_mut().insert(LABEL_AGENT_POOL_MODE.to_string(), mode);
    set_pool_class_defaults(&mut pool.spec.class, &name);
}

/// Apply the AzureManagedMachinePoolTemplate defaults.
pub fn set_managed_machine_pool_template_defaults(template: &mut AzureManagedMachinePoolTemplate) {
    let name = template.name_any();
    let mode = template.spec.template.spec.mode.to_string();
    template.labels_mut().insert(LABEL_AGENT_POOL_MODE.to_string(), mode);
    set_pool_class_defaults(&mut template.spec.template.spec, &name);
}

fn set_pool_class_defaults(class: &mut AzureManagedMachinePoolClassSpec, name: &str) {
    if class.os_type.is_none() {
        class.os_type = Some(OSType::Linux);
    }
    if class.name.as_deref().is_none_or(str::is_empty) {
        class.name = Some(name.to_string());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::{AzureManagedControlPlaneSpec, AzureManagedMachinePoolSpec, NodePoolMode};
    use kube::api::ObjectMeta;

    fn create_mcp(name: &str) -> AzureManagedControlPlane {
        AzureManagedControlPlane {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: AzureManagedControlPlaneSpec {
                resource_group_name: "rg".to_string(),
                ssh_public_key: Some(String::new()),
                class: AzureManagedControlPlaneClassSpec {
                    location: "eastus".to_string(),
                    version: "1.29.2".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_control_plane_defaults() {
        let mut mcp = create_mcp("aks");
        set_managed_control_plane_defaults(&mut mcp).unwrap();
        let spec = &mcp.spec;
        assert_eq!(spec.class.network_plugin, Some(NetworkPluginType::Azure));
        assert_eq!(spec.class.load_balancer_sku, Some(LBSku::Standard));
        assert_eq!(spec.class.version, "v1.29.2");
        assert_eq!(spec.node_resource_group_name, "MC_rg_aks_eastus");
        assert_eq!(spec.dns_prefix.as_deref(), Some("aks"));
        assert_eq!(spec.class.virtual_network.name, "aks");
        assert_eq!(spec.class.virtual_network.cidr_block, DEFAULT_AKS_VNET_CIDR);
        assert_eq!(spec.class.virtual_network.subnet.name, "aks");
        assert_eq!(spec.class.virtual_network.subnet.cidr_block, DEFAULT_AKS_NODE_SUBNET_CIDR);
        assert_eq!(spec.class.virtual_network.resource_group, "rg");
        assert_eq!(spec.class.sku.as_ref().unwrap().tier, AzureManagedControlPlaneSkuTier::Free);
        assert_eq!(spec.class.enable_preview_features, Some(false));
        // An explicitly empty key is kept as is.
        assert_eq!(spec.ssh_public_key.as_deref(), Some(""));
    }

    #[test]
    fn test_paid_sku_is_normalized() {
        let mut mcp = create_mcp("aks");
        mcp.spec.class.sku = Some(AKSSku {
            tier: AzureManagedControlPlaneSkuTier::Paid,
        });
        set_managed_control_plane_defaults(&mut mcp).unwrap();
        assert_eq!(
            mcp.spec.class.sku.as_ref().unwrap().tier,
            AzureManagedControlPlaneSkuTier::Standard
        );
    }

    #[test]
    fn test_auto_scaler_profile_defaults_keep_user_values() {
        let mut profile = AutoScalerProfile {
            scan_interval: Some("20s".to_string()),
            ..Default::default()
        };
        set_auto_scaler_profile_defaults(&mut profile);
        assert_eq!(profile.scan_interval.as_deref(), Some("20s"));
        assert_eq!(profile.expander, Some(Expander::Random));
        assert_eq!(profile.max_node_provision_time.as_deref(), Some("15m"));
        assert_eq!(profile.skip_nodes_with_system_pods.as_deref(), Some("true"));
    }

    #[test]
    fn test_control_plane_defaults_are_idempotent() {
        let mut mcp = create_mcp("aks");
        mcp.spec.ssh_public_key = None;
        set_managed_control_plane_defaults(&mut mcp).unwrap();
        assert!(mcp.spec.ssh_public_key.as_deref().is_some_and(|k| !k.is_empty()));
        let mut again = mcp.clone();
        set_managed_control_plane_defaults(&mut again).unwrap();
        assert_eq!(mcp, again);
    }

    #[test]
    fn test_machine_pool_defaults() {
        let mut pool = AzureManagedMachinePool {
            metadata: ObjectMeta {
                name: Some("pool0".to_string()),
                ..Default::default()
            },
            spec: AzureManagedMachinePoolSpec {
                class: AzureManagedMachinePoolClassSpec {
                    mode: NodePoolMode::System,
                    name: Some(String::new()),
                    ..Default::default()
                },
                ..Default::default()
            },
        };
        set_managed_machine_pool_defaults(&mut pool);
        assert_eq!(pool.labels()[LABEL_AGENT_POOL_MODE], "System");
        assert_eq!(pool.spec.class.os_type, Some(OSType::Linux));
        assert_eq!(pool.spec.class.name.as_deref(), Some("pool0"));
        assert!(pool.spec.class.os_disk_type.is_none());
    }
}
