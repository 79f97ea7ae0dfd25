//! AzureMachinePool and AzureMachinePoolMachine policies.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::spec_path;
use crate::config::FeatureGates;
use crate::crd::{AzureMachinePool, AzureMachinePoolMachine, AzureMachinePoolSpec, MachineRollingUpdateDeployment};
use crate::validation::disks::{validate_data_disks, validate_os_disk};
use crate::validation::identity::validate_vm_identity;
use crate::validation::image::validate_image;
use crate::validation::primitives::{validate_range, validate_ssh_key};
use crate::validation::security::validate_confidential_compute;
use crate::validation::vm::{deprecated_field_warnings, validate_diagnostics, validate_network_interfaces};
use crate::validation::{ErrorList, FieldError, FieldPath};
use crate::webhooks::immutability::{Rule, compare};

/// Bounds of `terminateNotificationTimeout`, in minutes.
pub const MIN_TERMINATE_NOTIFICATION_TIMEOUT: i32 = 5;
pub const MAX_TERMINATE_NOTIFICATION_TIMEOUT: i32 = 15;

/// Forbidden error for machine pool kinds created with the gate off.
pub fn machine_pool_gate_error(gates: &FeatureGates, path: FieldPath) -> Option<FieldError> {
    (!gates.machine_pool).then(|| FieldError::forbidden(path, "can be set only if the MachinePool feature flag is enabled"))
}

/// Validate an AzureMachinePool.
pub fn validate_machine_pool(pool: &AzureMachinePool, gates: &FeatureGates) -> ErrorList {
    let path = spec_path();
    if let Some(err) = machine_pool_gate_error(gates, path.clone()) {
        return ErrorList::from(err);
    }
    let spec = &pool.spec;
    let template = &spec.template;
    let template_path = path.child("template");

    let mut errs = ErrorList::new();
    if let Some(image) = &template.image {
        errs.append(validate_image(Some(image), &template_path.child("image")));
    }
    if !template.ssh_public_key.is_empty() {
        errs.append(validate_ssh_key(&template.ssh_public_key, &template_path.child("sshPublicKey")));
    }
    let os_disk_path = template_path.child("osDisk");
    errs.append(validate_os_disk(&template.os_disk, &os_disk_path));
    errs.append(validate_data_disks(&template.data_disks, &template_path.child("dataDisks")));
    errs.append(validate_vm_identity(
        spec.identity,
        &spec.user_assigned_identities,
        &spec.role_assignment_name,
        spec.system_assigned_identity_role.as_ref(),
        &path,
    ));
    errs.append(validate_network_interfaces(
        &template.network_interfaces,
        &template.subnet_name,
        template.accelerated_networking,
        &template_path,
    ));
    errs.append(validate_diagnostics(template.diagnostics.as_ref(), &template_path.child("diagnostics")));
    errs.append(validate_confidential_compute(
        template.os_disk.managed_disk.as_ref(),
        template.security_profile.as_ref(),
        &template_path.child("securityProfile"),
        &os_disk_path.child("managedDisk"),
    ));
    if let Some(timeout) = template.terminate_notification_timeout {
        errs.append(validate_range(
            i64::from(timeout),
            i64::from(MIN_TERMINATE_NOTIFICATION_TIMEOUT),
            i64::from(MAX_TERMINATE_NOTIFICATION_TIMEOUT),
            &template_path.child("terminateNotificationTimeout"),
            "minimum timeout 5 is allowed for TerminateNotificationTimeout and maximum timeout 15 is allowed",
        ));
    }
    if let Some(rolling) = spec.strategy.as_ref().and_then(|s| s.rolling_update.as_ref()) {
        errs.append(validate_rolling_update(rolling, &path.child("strategy").child("rollingUpdate")));
    }
    errs
}

/// Whether an int-or-percent value is zero; `None` when it is neither.
fn int_or_percent_is_zero(value: &IntOrString) -> Option<bool> {
    match value {
        IntOrString::Int(n) => Some(*n == 0),
        IntOrString::String(s) => {
            let digits = s.strip_suffix('%').unwrap_or(s);
            digits.parse::<u32>().ok().map(|n| n == 0)
        }
    }
}

fn validate_rolling_update(rolling: &MachineRollingUpdateDeployment, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    let mut is_zero = |name: &str, value: Option<&IntOrString>| {
        let value = value?;
        let zero = int_or_percent_is_zero(value);
        if zero.is_none() {
            errs.push(FieldError::invalid(path.child(name), value, "must be an integer or a percentage"));
        }
        zero
    };
    let surge = is_zero("maxSurge", rolling.max_surge.as_ref());
    let unavailable = is_zero("maxUnavailable", rolling.max_unavailable.as_ref());
    if surge == Some(true) && unavailable == Some(true) {
        errs.push(FieldError::invalid_omit_value(
            path.clone(),
            "maxSurge and maxUnavailable may not both be 0",
        ));
    }
    errs
}

/// Warnings for deprecated fields still set on a machine pool.
pub fn machine_pool_warnings(spec: &AzureMachinePoolSpec) -> Vec<String> {
    let path = spec_path();
    deprecated_field_warnings(
        &path.child("template"),
        &spec.template.subnet_name,
        spec.template.accelerated_networking,
        &path,
        &spec.role_assignment_name,
    )
}

fn machine_pool_rules() -> Vec<Rule> {
    vec![
        Rule::equal("spec.location"),
        Rule::equal("spec.orchestrationMode"),
        Rule::equal("spec.identity"),
        Rule::equal("spec.userAssignedIdentities"),
        Rule::equal("spec.roleAssignmentName"),
        Rule::equal("spec.systemAssignedIdentityRole"),
    ]
}

/// Immutability rules of an AzureMachinePool update.
pub fn validate_machine_pool_immutability(old: &AzureMachinePool, new: &AzureMachinePool) -> ErrorList {
    compare(old, new, &FieldPath::default(), &machine_pool_rules())
}

/// Immutability rules of an AzureMachinePoolMachine update: the instance
/// identifiers are assigned once.
pub fn validate_machine_pool_machine_immutability(
    old: &AzureMachinePoolMachine,
    new: &AzureMachinePoolMachine,
) -> ErrorList {
    let rules = [Rule::enable_only("spec.providerID"), Rule::enable_only("spec.instanceID")];
    compare(old, new, &FieldPath::default(), &rules)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::{
        AzureMachinePoolDeploymentStrategy, AzureMachinePoolMachineSpec, OSDisk, OrchestrationModeType,
    };
    use crate::validation::ErrorType;
    use kube::api::ObjectMeta;

    fn pool() -> AzureMachinePool {
        let mut pool = AzureMachinePool {
            metadata: ObjectMeta {
                name: Some("pool".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        pool.spec.location = "westus2".to_string();
        pool.spec.template.os_disk = OSDisk {
            os_type: "Linux".to_string(),
            disk_size_gb: Some(30),
            caching_type: "None".to_string(),
            ..Default::default()
        };
        pool
    }

    fn paths(errs: &ErrorList) -> Vec<String> {
        errs.iter().map(|e| e.path.to_string()).collect()
    }

    fn strategy(surge: IntOrString, unavailable: IntOrString) -> Option<AzureMachinePoolDeploymentStrategy> {
        Some(AzureMachinePoolDeploymentStrategy {
            rolling_update: Some(MachineRollingUpdateDeployment {
                max_surge: Some(surge),
                max_unavailable: Some(unavailable),
                delete_policy: None,
            }),
            ..Default::default()
        })
    }

    #[test]
    fn test_valid_pool() {
        let errs = validate_machine_pool(&pool(), &FeatureGates::default());
        assert!(errs.is_empty(), "{errs}");
    }

    #[test]
    fn test_feature_gate() {
        let gates = FeatureGates {
            machine_pool: false,
            ..Default::default()
        };
        let errs = validate_machine_pool(&pool(), &gates);
        assert_eq!(paths(&errs), vec!["spec"]);
        assert_eq!(errs.iter().next().unwrap().error_type, ErrorType::Forbidden);
    }

    #[test]
    fn test_terminate_notification_timeout() {
        let mut p = pool();
        p.spec.template.terminate_notification_timeout = Some(15);
        assert!(validate_machine_pool(&p, &FeatureGates::default()).is_empty());
        p.spec.template.terminate_notification_timeout = Some(4);
        assert_eq!(
            paths(&validate_machine_pool(&p, &FeatureGates::default())),
            vec!["spec.template.terminateNotificationTimeout"]
        );
    }

    #[test]
    fn test_rolling_update_cannot_be_all_zero() {
        let mut p = pool();
        p.spec.strategy = strategy(IntOrString::Int(0), IntOrString::String("0%".to_string()));
        assert_eq!(
            paths(&validate_machine_pool(&p, &FeatureGates::default())),
            vec!["spec.strategy.rollingUpdate"]
        );

        p.spec.strategy = strategy(IntOrString::Int(1), IntOrString::Int(0));
        assert!(validate_machine_pool(&p, &FeatureGates::default()).is_empty());

        p.spec.strategy = strategy(IntOrString::String("lots".to_string()), IntOrString::Int(0));
        assert_eq!(
            paths(&validate_machine_pool(&p, &FeatureGates::default())),
            vec!["spec.strategy.rollingUpdate.maxSurge"]
        );
    }

    #[test]
    fn test_template_warnings() {
        let mut p = pool();
        p.spec.template.subnet_name = "nodes".to_string();
        let warnings = machine_pool_warnings(&p.spec);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("spec.template.subnetName"));
    }

    #[test]
    fn test_immutable_fields() {
        let old = pool();
        let mut new = old.clone();
        new.spec.orchestration_mode = OrchestrationModeType::Flexible;
        new.spec.location = "eastus".to_string();
        let errs = validate_machine_pool_immutability(&old, &new);
        assert_eq!(paths(&errs), vec!["spec.location", "spec.orchestrationMode"]);

        let mut scaled = old.clone();
        scaled.spec.template.vm_size = "Standard_D4s_v3".to_string();
        assert!(validate_machine_pool_immutability(&old, &scaled).is_empty());
    }

    #[test]
    fn test_pool_machine_ids_are_set_once() {
        let old = AzureMachinePoolMachine::new("m", AzureMachinePoolMachineSpec::default());
        let set = AzureMachinePoolMachine::new(
            "m",
            AzureMachinePoolMachineSpec {
                provider_id: "azure:///subscriptions/x/vm/0".to_string(),
                instance_id: "0".to_string(),
            },
        );
        assert!(validate_machine_pool_machine_immutability(&old, &set).is_empty());

        let mut moved = set.clone();
        moved.spec.instance_id = "1".to_string();
        assert_eq!(
            paths(&validate_machine_pool_machine_immutability(&set, &moved)),
            vec!["spec.instanceID"]
        );
    }
}
