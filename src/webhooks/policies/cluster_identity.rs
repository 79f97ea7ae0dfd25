//! AzureClusterIdentity policy.

use super::spec_path;
use crate::crd::{AzureClusterIdentity, IdentityType};
use crate::validation::primitives::validate_uuid;
use crate::validation::{ErrorList, FieldError};
use crate::webhooks::immutability::{Rule, compare};

/// Validate an AzureClusterIdentity.
pub fn validate_cluster_identity(identity: &AzureClusterIdentity) -> ErrorList {
    let spec = &identity.spec;
    let path = spec_path();
    let mut errs = ErrorList::new();

    if spec.client_id.is_empty() {
        errs.push(FieldError::required(path.child("clientID"), "clientID is required"));
    }
    if spec.tenant_id.is_empty() {
        errs.push(FieldError::required(path.child("tenantID"), "tenantID is required"));
    } else {
        errs.append(validate_uuid(
            &spec.tenant_id,
            &path.child("tenantID"),
            "tenantID must be a valid UUID",
        ));
    }

    if !spec.resource_id.is_empty() && spec.r#type != IdentityType::UserAssignedMSI {
        errs.push(FieldError::forbidden(
            path.child("resourceID"),
            "resourceID is only allowed for the UserAssignedMSI identity type",
        ));
    }
    if spec.r#type.needs_client_secret() && spec.client_secret.is_none() {
        errs.push(FieldError::required(
            path.child("clientSecret"),
            "clientSecret is required for service principal identities",
        ));
    }
    errs
}

/// Immutability rule of an AzureClusterIdentity update.
pub fn validate_cluster_identity_immutability(old: &AzureClusterIdentity, new: &AzureClusterIdentity) -> ErrorList {
    compare(old, new, &Default::default(), &[Rule::equal("spec.type")])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::crd::AzureClusterIdentitySpec;
    use crate::validation::ErrorType;
    use k8s_openapi::api::core::v1::SecretReference;

    const TENANT: &str = "1b9e8c2a-6f0b-4d8e-9d4a-7f2c3b1a0e55";

    fn identity(r#type: IdentityType) -> AzureClusterIdentity {
        AzureClusterIdentity::new(
            "identity",
            AzureClusterIdentitySpec {
                r#type,
                client_id: "client".to_string(),
                tenant_id: TENANT.to_string(),
                client_secret: Some(SecretReference {
                    name: Some("secret".to_string()),
                    namespace: Some("default".to_string()),
                }),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_service_principal_is_valid() {
        assert!(validate_cluster_identity(&identity(IdentityType::ServicePrincipal)).is_empty());
    }

    #[test]
    fn test_missing_ids() {
        let mut id = identity(IdentityType::WorkloadIdentity);
        id.spec.client_id.clear();
        id.spec.tenant_id = "not-a-uuid".to_string();
        let errs = validate_cluster_identity(&id).into_vec();
        assert_eq!(errs.len(), 2);
        assert_eq!(errs[0].path.to_string(), "spec.clientID");
        assert_eq!(errs[0].error_type, ErrorType::Required);
        assert_eq!(errs[1].path.to_string(), "spec.tenantID");
        assert_eq!(errs[1].error_type, ErrorType::Invalid);
    }

    #[test]
    fn test_resource_id_only_for_user_assigned_msi() {
        let mut id = identity(IdentityType::ServicePrincipal);
        id.spec.resource_id = "/subscriptions/x/identity".to_string();
        let errs = validate_cluster_identity(&id).into_vec();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path.to_string(), "spec.resourceID");

        id.spec.r#type = IdentityType::UserAssignedMSI;
        assert!(validate_cluster_identity(&id).is_empty());
    }

    #[test]
    fn test_service_principal_needs_secret() {
        let mut id = identity(IdentityType::ManualServicePrincipal);
        id.spec.client_secret = None;
        let errs = validate_cluster_identity(&id).into_vec();
        assert_eq!(errs[0].path.to_string(), "spec.clientSecret");

        id.spec.r#type = IdentityType::WorkloadIdentity;
        assert!(validate_cluster_identity(&id).is_empty());
    }

    #[test]
    fn test_type_is_immutable() {
        let old = identity(IdentityType::ServicePrincipal);
        let new = identity(IdentityType::WorkloadIdentity);
        let errs = validate_cluster_identity_immutability(&old, &new).into_vec();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path.to_string(), "spec.type");

        let mut rotated = old.clone();
        rotated.spec.client_id = "other".to_string();
        assert!(validate_cluster_identity_immutability(&old, &rotated).is_empty());
    }
}
