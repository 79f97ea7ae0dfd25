//! Unit tests for capz-admission.
//!
//! These tests drive the public admission entry points without a Kubernetes
//! cluster. Owner reads go through an in-memory [`ObjectReader`] mock.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

mod support {
    use std::sync::{Arc, Once};

    use async_trait::async_trait;
    use capz_admission::crd::{
        AzureCluster, AzureClusterSpec, AzureManagedControlPlane, AzureManagedMachinePool, Cluster, ClusterSpec,
    };
    use capz_admission::{AdmissionWebhook, ObjectReader, Result, WebhookConfig};
    use k8s_openapi::api::core::v1::ObjectReference;
    use tracing_subscriber::EnvFilter;

    mockall::mock! {
        pub Reader {}

        #[async_trait]
        impl ObjectReader for Reader {
            async fn get_cluster(&self, namespace: &str, name: &str) -> Result<Option<Cluster>>;
            async fn get_azure_cluster(&self, namespace: &str, name: &str) -> Result<Option<AzureCluster>>;
            async fn get_managed_control_plane(
                &self,
                namespace: &str,
                name: &str,
            ) -> Result<Option<AzureManagedControlPlane>>;
            async fn list_managed_machine_pools(
                &self,
                namespace: &str,
                label_selector: &str,
            ) -> Result<Vec<AzureManagedMachinePool>>;
        }
    }

    static TRACING: Once = Once::new();

    /// Route `RUST_LOG` filtered events to the test writer.
    pub fn init_tracing() {
        TRACING.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }

    pub fn webhook(reader: MockReader) -> AdmissionWebhook {
        init_tracing();
        AdmissionWebhook::new(WebhookConfig::default(), Arc::new(reader))
    }

    /// Webhook whose reader must never be consulted.
    pub fn offline_webhook() -> AdmissionWebhook {
        webhook(MockReader::new())
    }

    /// Reader resolving cluster `c1` to an AzureCluster in `subscription_id`.
    pub fn subscription_reader(subscription_id: &'static str) -> MockReader {
        let mut reader = MockReader::new();
        reader.expect_get_cluster().returning(|_, name| {
            let mut cluster = Cluster::new(name, ClusterSpec::default());
            cluster.spec.infrastructure_ref = Some(ObjectReference {
                kind: Some("AzureCluster".to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            });
            Ok(Some(cluster))
        });
        reader.expect_get_azure_cluster().returning(move |_, name| {
            let mut azure = AzureCluster::new(name, AzureClusterSpec::default());
            azure.spec.class.subscription_id = subscription_id.to_string();
            Ok(Some(azure))
        });
        reader
    }

    // Base64 of an ed25519 authorized-keys line.
    pub const SSH_KEY: &str = "c3NoLWVkMjU1MTkgQUFBQUMzTnphQzFsWkRJMU5URTVBQUFBSU9NcXFua1Z6cm0wU2RHNlVPb3FLTHNhYmdINUM5b2tXaTBkaDJsOUdLSmwgdGVzdA==";
}

mod field_error_tests {
    use capz_admission::{AdmissionError, ErrorList, ErrorType, FieldError, FieldPath};
    use capz_admission::validation::GroupKind;

    #[test]
    fn test_errors_keep_insertion_order() {
        let mut errs = ErrorList::new();
        errs.push(FieldError::required(FieldPath::from_fields(&["spec", "location"]), ""));
        errs.push(FieldError::forbidden(FieldPath::from_fields(&["spec", "osType"]), "no"));
        errs.push(FieldError::invalid(
            FieldPath::from_fields(&["spec", "vmSize"]),
            "tiny",
            "unknown size",
        ));
        let paths: Vec<String> = errs.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(paths, vec!["spec.location", "spec.osType", "spec.vmSize"]);
    }

    #[test]
    fn test_empty_list_is_ok() {
        let group_kind = GroupKind::new("infrastructure.cluster.x-k8s.io", "AzureCluster");
        assert!(ErrorList::new().into_result(&group_kind, "c1").is_ok());

        let errs = ErrorList::from(FieldError::required(FieldPath::from_fields(&["spec", "location"]), ""));
        let err = errs.into_result(&group_kind, "c1").unwrap_err();
        assert_eq!(err.name, "c1");
        assert_eq!(err.errors.len(), 1);
    }

    #[test]
    fn test_immutable_message() {
        let err = FieldError::immutable(FieldPath::from_fields(&["spec", "resourceGroup"]), None);
        assert_eq!(err.error_type, ErrorType::Immutable);
        assert_eq!(err.detail, "field is immutable");
    }

    #[test]
    fn test_status_lists_every_cause() {
        let errs: ErrorList = vec![
            FieldError::required(FieldPath::from_fields(&["spec", "location"]), ""),
            FieldError::immutable(FieldPath::from_fields(&["spec", "resourceGroup"]), None),
        ]
        .into_iter()
        .collect();
        let err = AdmissionError {
            group_kind: GroupKind::new("infrastructure.cluster.x-k8s.io", "AzureCluster"),
            name: "c1".to_string(),
            errors: errs,
        };

        let status = err.to_status();
        assert_eq!(status.code, Some(422));
        assert_eq!(status.reason.as_deref(), Some("Invalid"));
        let causes = status.details.unwrap().causes.unwrap();
        assert_eq!(causes.len(), 2);
        assert_eq!(causes[1].field.as_deref(), Some("spec.resourceGroup"));
        assert!(err.to_string().starts_with("AzureCluster.infrastructure.cluster.x-k8s.io \"c1\" is invalid"));
    }
}

mod config_tests {
    use capz_admission::FeatureGates;

    #[test]
    fn test_feature_gate_parsing() {
        let gates = FeatureGates::parse("MachinePool=false, EdgeZone=true").unwrap();
        assert!(!gates.machine_pool);
        assert!(gates.edge_zone);
    }

    #[test]
    fn test_malformed_feature_gate() {
        assert!(FeatureGates::parse("MachinePool").is_err());
        assert!(FeatureGates::parse("MachinePool=maybe").is_err());
    }
}

mod cluster_tests {
    use super::support::offline_webhook;
    use capz_admission::crd::{AzureCluster, AzureClusterSpec, AzureClusterTemplate, LBSku, LBType, SubnetRole};
    use capz_admission::defaults::{
        DEFAULT_CONTROL_PLANE_SUBNET_CIDR, DEFAULT_NODE_SUBNET_CIDR, DEFAULT_VNET_CIDR,
        set_azure_cluster_template_defaults,
    };
    use capz_admission::{AdmissionContext, ErrorType, Webhook};

    fn cluster(name: &str) -> AzureCluster {
        let mut cluster = AzureCluster::new(name, AzureClusterSpec::default());
        cluster.metadata.namespace = Some("default".to_string());
        cluster.spec.class.location = "westus2".to_string();
        cluster.spec.class.subscription_id = "sub".to_string();
        cluster
    }

    #[tokio::test]
    async fn test_cluster_without_network_gets_full_defaults() {
        let wh = offline_webhook();
        let mut obj = cluster("cluster-test");
        wh.default(&AdmissionContext::default(), &mut obj).await.unwrap();

        let network = &obj.spec.network_spec;
        assert_eq!(network.vnet.name, "cluster-test-vnet");
        assert_eq!(network.vnet.cidr_blocks, vec![DEFAULT_VNET_CIDR]);
        assert_eq!(network.subnets.len(), 2);
        assert_eq!(network.subnets[0].role, Some(SubnetRole::ControlPlane));
        assert_eq!(network.subnets[0].cidr_blocks, vec![DEFAULT_CONTROL_PLANE_SUBNET_CIDR]);
        assert_eq!(network.subnets[1].role, Some(SubnetRole::Node));
        assert_eq!(network.subnets[1].cidr_blocks, vec![DEFAULT_NODE_SUBNET_CIDR]);

        let lb = network.api_server_lb.as_ref().unwrap();
        assert_eq!(lb.class.r#type, Some(LBType::Public));
        assert_eq!(lb.class.sku, Some(LBSku::Standard));
        assert_eq!(lb.class.idle_timeout_in_minutes, Some(4));
        assert_eq!(
            lb.frontend_ips[0].public_ip.as_ref().unwrap().name,
            "pip-cluster-test-apiserver"
        );

        assert!(wh.validate_create(&AdmissionContext::default(), &obj).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resource_group_change_is_rejected() {
        let wh = offline_webhook();
        let ctx = AdmissionContext::default();
        let mut old = cluster("c1");
        old.spec.resource_group = "demoResourceGroup".to_string();
        wh.default(&ctx, &mut old).await.unwrap();
        let mut new = old.clone();
        new.spec.resource_group = "demoResourceGroup-2".to_string();

        let err = wh.validate_update(&ctx, &old, &new).await.unwrap_err();
        let errs = err.errors.into_vec();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path.to_string(), "spec.resourceGroup");
        assert_eq!(errs[0].error_type, ErrorType::Immutable);
        assert_eq!(errs[0].detail, "field is immutable");
    }

    #[tokio::test]
    async fn test_unchanged_update_is_allowed() {
        let wh = offline_webhook();
        let ctx = AdmissionContext::default();
        let mut obj = cluster("c1");
        wh.default(&ctx, &mut obj).await.unwrap();
        assert!(wh.validate_update(&ctx, &obj, &obj.clone()).await.is_ok());
    }

    #[tokio::test]
    async fn test_template_tolerates_newly_defaulted_outbound_lb() {
        let wh = offline_webhook();
        let ctx = AdmissionContext::default();
        let mut old = AzureClusterTemplate::new("tmpl", Default::default());
        old.spec.template.spec.class.location = "westus2".to_string();
        set_azure_cluster_template_defaults(&mut old);
        let network = &mut old.spec.template.spec.network_spec;
        network.vnet.cidr_blocks.push("2001:1234:5678:9a00::/56".to_string());
        network
            .subnets
            .iter_mut()
            .filter(|s| s.role == Some(SubnetRole::Node))
            .for_each(|s| s.cidr_blocks.push("2001:1234:5678:9abd::/64".to_string()));

        let mut new = old.clone();
        set_azure_cluster_template_defaults(&mut new);
        assert!(old.spec.template.spec.network_spec.node_outbound_lb.is_none());
        assert!(new.spec.template.spec.network_spec.node_outbound_lb.is_some());

        assert!(wh.validate_update(&ctx, &old, &new).await.is_ok());
    }

    #[tokio::test]
    async fn test_template_spec_changes_are_rejected() {
        let wh = offline_webhook();
        let ctx = AdmissionContext::default();
        let mut old = AzureClusterTemplate::new("tmpl", Default::default());
        old.spec.template.spec.class.location = "westus2".to_string();
        wh.default(&ctx, &mut old).await.unwrap();
        let mut new = old.clone();
        new.spec.template.spec.class.location = "eastus".to_string();

        let err = wh.validate_update(&ctx, &old, &new).await.unwrap_err();
        assert_eq!(err.errors.iter().next().unwrap().path.to_string(), "spec.template.spec");
    }
}

mod machine_tests {
    use super::support::{MockReader, SSH_KEY, offline_webhook, subscription_reader, webhook};
    use capz_admission::crd::{
        AzureMachine, AzureMachineSpec, CLUSTER_NAME_LABEL, DataDisk, Image, OSDisk, VMIdentity,
    };
    use capz_admission::defaults::CONTRIBUTOR_ROLE_ID;
    use capz_admission::{AdmissionContext, Error, ErrorType, Webhook};
    use kube::ResourceExt;

    fn machine(identity: VMIdentity) -> AzureMachine {
        let mut machine = AzureMachine::new(
            "m1",
            AzureMachineSpec {
                vm_size: "Standard_D2s_v3".to_string(),
                identity,
                image: Some(Image {
                    id: Some("/subscriptions/sub/images/ubuntu".to_string()),
                    ..Default::default()
                }),
                os_disk: OSDisk {
                    os_type: "Linux".to_string(),
                    disk_size_gb: Some(30),
                    ..Default::default()
                },
                ssh_public_key: SSH_KEY.to_string(),
                ..Default::default()
            },
        );
        machine.metadata.namespace = Some("default".to_string());
        machine.labels_mut().insert(CLUSTER_NAME_LABEL.to_string(), "c1".to_string());
        machine
    }

    fn disk(suffix: &str, lun: Option<i32>) -> DataDisk {
        DataDisk {
            name_suffix: suffix.to_string(),
            disk_size_gb: 128,
            lun,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_system_assigned_identity_role() {
        let wh = webhook(subscription_reader("sub-123"));
        let mut obj = machine(VMIdentity::SystemAssigned);
        wh.default(&AdmissionContext::default(), &mut obj).await.unwrap();

        let role = obj.spec.system_assigned_identity_role.as_ref().unwrap();
        assert!(uuid::Uuid::parse_str(&role.name).is_ok());
        assert_eq!(role.scope, "/subscriptions/sub-123/");
        assert!(role.definition_id.starts_with("/subscriptions/sub-123/"));
        assert!(role.definition_id.ends_with(&format!("/{CONTRIBUTOR_ROLE_ID}")));

        assert!(wh.validate_create(&AdmissionContext::default(), &obj).await.is_ok());
    }

    #[tokio::test]
    async fn test_no_identity_skips_owner_lookup() {
        let wh = offline_webhook();
        let mut obj = machine(VMIdentity::None);
        wh.default(&AdmissionContext::default(), &mut obj).await.unwrap();
        assert!(obj.spec.system_assigned_identity_role.is_none());
    }

    #[tokio::test]
    async fn test_data_disk_luns_fill_gaps() {
        let wh = offline_webhook();
        let mut obj = machine(VMIdentity::None);
        obj.spec.data_disks = vec![disk("a", Some(0)), disk("b", None), disk("c", Some(1)), disk("d", None)];
        wh.default(&AdmissionContext::default(), &mut obj).await.unwrap();

        let luns: Vec<Option<i32>> = obj.spec.data_disks.iter().map(|d| d.lun).collect();
        assert_eq!(luns, vec![Some(0), Some(2), Some(1), Some(3)]);
    }

    #[tokio::test]
    async fn test_missing_owner_fails_defaulting_without_mutation() {
        let mut reader = MockReader::new();
        reader.expect_get_cluster().returning(|_, _| Ok(None));
        let wh = webhook(reader);
        let mut obj = machine(VMIdentity::SystemAssigned);
        let before = obj.clone();

        let err = wh.default(&AdmissionContext::default(), &mut obj).await.unwrap_err();
        assert_eq!(err.errors.iter().next().unwrap().error_type, ErrorType::Internal);
        assert_eq!(obj, before);
    }

    #[tokio::test]
    async fn test_owner_read_error_is_internal() {
        let mut reader = MockReader::new();
        reader
            .expect_get_cluster()
            .times(1)
            .returning(|_, _| Err(Error::Config("forbidden".to_string())));
        let wh = webhook(reader);
        let mut obj = machine(VMIdentity::SystemAssigned);

        let err = wh.default(&AdmissionContext::default(), &mut obj).await.unwrap_err();
        let errs = err.errors.into_vec();
        assert_eq!(errs[0].error_type, ErrorType::Internal);
        assert_eq!(errs[0].path.to_string(), "spec.systemAssignedIdentityRole");
    }

    #[tokio::test]
    async fn test_vm_size_can_change() {
        let wh = offline_webhook();
        let ctx = AdmissionContext::default();
        let mut old = machine(VMIdentity::None);
        wh.default(&ctx, &mut old).await.unwrap();
        let mut new = old.clone();
        new.spec.vm_size = "Standard_D4s_v3".to_string();

        assert!(wh.validate_update(&ctx, &old, &new).await.is_ok());
    }

    #[tokio::test]
    async fn test_ssh_public_key_is_immutable() {
        let wh = offline_webhook();
        let ctx = AdmissionContext::default();
        let mut old = machine(VMIdentity::None);
        wh.default(&ctx, &mut old).await.unwrap();
        let mut new = old.clone();
        new.spec.ssh_public_key = "cmVwbGFjZWQ=".to_string();

        let err = wh.validate_update(&ctx, &old, &new).await.unwrap_err();
        let errs = err.errors.into_vec();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path.to_string(), "spec.sshPublicKey");
        assert_eq!(errs[0].error_type, ErrorType::Immutable);
    }
}

mod managed_tests {
    use super::support::{MockReader, offline_webhook, webhook};
    use capz_admission::crd::{
        AzureManagedMachinePool, AzureManagedMachinePoolClassSpec, AzureManagedMachinePoolSpec, CLUSTER_NAME_LABEL,
        Cluster, ClusterSpec, NodePoolMode, OSType,
    };
    use capz_admission::{AdmissionContext, ErrorType, Webhook};
    use kube::ResourceExt;

    fn pool(name: &str, mode: NodePoolMode) -> AzureManagedMachinePool {
        let mut pool = AzureManagedMachinePool::new(
            name,
            AzureManagedMachinePoolSpec {
                class: AzureManagedMachinePoolClassSpec {
                    mode,
                    sku: "Standard_D2s_v3".to_string(),
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        pool.metadata.namespace = Some("default".to_string());
        pool.labels_mut().insert(CLUSTER_NAME_LABEL.to_string(), "c1".to_string());
        pool
    }

    #[tokio::test]
    async fn test_windows_system_pool_is_rejected() {
        let wh = offline_webhook();
        let ctx = AdmissionContext::default();
        let mut obj = pool("pool0", NodePoolMode::System);
        obj.spec.class.os_type = Some(OSType::Windows);
        wh.default(&ctx, &mut obj).await.unwrap();

        let err = wh.validate_create(&ctx, &obj).await.unwrap_err();
        let errs = err.errors.into_vec();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path.to_string(), "spec.osType");
    }

    #[tokio::test]
    async fn test_defaulting_labels_pool_mode() {
        let wh = offline_webhook();
        let mut obj = pool("pool0", NodePoolMode::System);
        wh.default(&AdmissionContext::default(), &mut obj).await.unwrap();
        assert_eq!(
            obj.labels()
                .get("azuremanagedmachinepool.infrastructure.cluster.x-k8s.io/agentpoolmode")
                .map(String::as_str),
            Some("System")
        );
    }

    #[tokio::test]
    async fn test_last_system_pool_delete_is_forbidden() {
        let mut reader = MockReader::new();
        reader
            .expect_get_cluster()
            .returning(|_, name| Ok(Some(Cluster::new(name, ClusterSpec::default()))));
        reader
            .expect_list_managed_machine_pools()
            .times(1)
            .returning(|_, _| Ok(vec![pool("pool0", NodePoolMode::System)]));
        let wh = webhook(reader);

        let err = wh
            .validate_delete(&AdmissionContext::default(), &pool("pool0", NodePoolMode::System))
            .await
            .unwrap_err();
        let errs = err.errors.into_vec();
        assert_eq!(errs[0].error_type, ErrorType::Forbidden);
        assert_eq!(errs[0].path.to_string(), "spec.mode");
    }

    #[tokio::test]
    async fn test_user_pool_delete_skips_lookup() {
        let wh = offline_webhook();
        assert!(
            wh.validate_delete(&AdmissionContext::default(), &pool("pool1", NodePoolMode::User))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_pool_sku_is_immutable() {
        let wh = offline_webhook();
        let ctx = AdmissionContext::default();
        let mut old = pool("pool1", NodePoolMode::User);
        wh.default(&ctx, &mut old).await.unwrap();
        let mut new = old.clone();
        new.spec.class.sku = "Standard_D8s_v3".to_string();

        let err = wh.validate_update(&ctx, &old, &new).await.unwrap_err();
        let errs = err.errors.into_vec();
        assert_eq!(errs[0].path.to_string(), "spec.sku");
        assert_eq!(errs[0].error_type, ErrorType::Immutable);
    }
}
