//! VM identity rules.

use std::sync::LazyLock;

use regex::Regex;

use super::field::{ErrorList, FieldError, FieldPath};
use super::primitives::is_uuid;
use crate::crd::{SystemAssignedIdentityRole, UserAssignedIdentity, VMIdentity};

static PROVIDER_ID_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(azure://)?/(subscriptions|providers)/.+$").ok());

/// Validate the legacy `roleAssignmentName`.
///
/// It may only be set with a system-assigned identity and must be a UUID.
pub fn validate_role_assignment_name(identity: VMIdentity, name: &str, path: &FieldPath) -> ErrorList {
    let mut errs = ErrorList::new();
    if name.is_empty() {
        return errs;
    }
    if identity != VMIdentity::SystemAssigned {
        errs.push(FieldError::invalid(
            path.clone(),
            name,
            "Role assignment name should only be set when using system assigned identity.",
        ));
    } else if !is_uuid(name) {
        errs.push(FieldError::invalid(
            path.clone(),
            name,
            "Role assignment name must be a valid GUID. It is optional and will be auto-generated when not specified.",
        ));
    }
    errs
}

/// Validate `systemAssignedIdentityRole` against the identity type and the
/// legacy role assignment name.
pub fn validate_system_assigned_identity_role(
    identity: VMIdentity,
    role_assignment_name: &str,
    role: Option<&SystemAssignedIdentityRole>,
    path: &FieldPath,
) -> ErrorList {
    let mut errs = ErrorList::new();
    let Some(role) = role else {
        return errs;
    };

    if identity != VMIdentity::SystemAssigned {
        errs.push(FieldError::forbidden(
            path.clone(),
            "systemAssignedIdentityRole can only be set when identity is set to SystemAssigned",
        ));
        return errs;
    }
    if !role_assignment_name.is_empty() && !role.name.is_empty() {
        errs.push(FieldError::invalid(
            path.child("name"),
            &role.name,
            "cannot set both roleAssignmentName and systemAssignedIdentityRole.name",
        ));
    }
    if !role.name.is_empty() && !is_uuid(&role.name) {
        errs.push(FieldError::invalid(
            path.child("name"),
            &role.name,
            "Role assignment name must be a valid GUID. It is optional and will be auto-generated when not specified.",
        ));
    }
    if role.scope.is_empty() {
        errs.push(FieldError::required(path.child("scope"), "the scope field cannot be empty"));
    }
    if role.definition_id.is_empty() {
        errs.push(FieldError::required(
            path.child("definitionID"),
            "the definitionID field cannot be empty",
        ));
    }
    errs
}

/// Validate user-assigned identities.
pub fn validate_user_assigned_identities(
    identity: VMIdentity,
    identities: &[UserAssignedIdentity],
    path: &FieldPath,
) -> ErrorList {
    let mut errs = ErrorList::new();
    if identity != VMIdentity::UserAssigned {
        return errs;
    }
    if identities.is_empty() {
        errs.push(FieldError::required(
            path.clone(),
            "must be specified for the 'UserAssigned' identity type",
        ));
    }
    for (i, uai) in identities.iter().enumerate() {
        let id_path = path.index(i).child("providerID");
        if uai.provider_id.is_empty() {
            errs.push(FieldError::required(id_path, "providerID cannot be empty"));
        } else if !PROVIDER_ID_RE
            .as_ref()
            .is_some_and(|re| re.is_match(&uai.provider_id))
        {
            errs.push(FieldError::invalid(
                id_path,
                &uai.provider_id,
                "must be a valid Azure resource ID",
            ));
        }
    }
    errs
}

/// All identity rules of a VM or scale set.
pub fn validate_vm_identity(
    identity: VMIdentity,
    user_assigned: &[UserAssignedIdentity],
    role_assignment_name: &str,
    role: Option<&SystemAssignedIdentityRole>,
    spec_path: &FieldPath,
) -> ErrorList {
    let mut errs = ErrorList::new();
    errs.append(validate_user_assigned_identities(
        identity,
        user_assigned,
        &spec_path.child("userAssignedIdentities"),
    ));
    errs.append(validate_role_assignment_name(
        identity,
        role_assignment_name,
        &spec_path.child("roleAssignmentName"),
    ));
    errs.append(validate_system_assigned_identity_role(
        identity,
        role_assignment_name,
        role,
        &spec_path.child("systemAssignedIdentityRole"),
    ));
    errs
}
