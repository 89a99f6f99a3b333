// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for arman.rs

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::context::CachedView;
    use crate::errors::ApiError;
    use crate::resources::available_replicas;
    use crate::test_support::{
        arman, owned_deployment, unowned_deployment, with_available_replicas, ApiCall,
        FakeApiClient, FakeCache, FakeRecorder, Operation,
    };

    struct Harness {
        cache: Arc<FakeCache>,
        client: Arc<FakeApiClient>,
        recorder: Arc<FakeRecorder>,
        ctx: Context,
    }

    fn harness() -> Harness {
        let cache = Arc::new(FakeCache::synced());
        let client = Arc::new(FakeApiClient::new(cache.clone()));
        let recorder = Arc::new(FakeRecorder::default());
        let ctx = Context::new(cache.clone(), client.clone(), recorder.clone());
        Harness {
            cache,
            client,
            recorder,
            ctx,
        }
    }

    #[tokio::test]
    async fn test_creates_deployment_and_service() {
        let h = harness();
        let web = arman("default", "web", "web-deploy", "web-svc");
        h.cache.insert_arman(web.clone());

        reconcile_arman(&h.ctx, "default/web").await.unwrap();

        assert_eq!(
            h.client.operations(),
            vec![
                Operation::CreateDeployment,
                Operation::CreateService,
                Operation::UpdateStatus
            ]
        );

        let deployment = h.cache.get_deployment("default", "web-deploy").unwrap();
        assert!(is_controlled_by(&deployment.metadata, &web));
        assert_eq!(deployment_image(&deployment), Some("nginx:1.27"));
        assert_eq!(deployment_replicas(&deployment), Some(1));

        let service = h.cache.get_service("default", "web-svc").unwrap();
        assert!(is_controlled_by(&service.metadata, &web));
        let ports = service.spec.as_ref().unwrap().ports.as_ref().unwrap();
        assert_eq!(ports[0].port, 80);

        assert_eq!(h.recorder.reasons(), vec!["Synced".to_string()]);
        let event = &h.recorder.events()[0];
        assert_eq!(event.severity, Severity::Normal);
        assert_eq!(event.message, "Arman synced successfully");
        assert_eq!(event.subject, "default/web");
    }

    #[tokio::test]
    async fn test_second_pass_only_writes_status() {
        let h = harness();
        h.cache
            .insert_arman(arman("default", "web", "web-deploy", "web-svc"));

        reconcile_arman(&h.ctx, "default/web").await.unwrap();
        let deployment_before = h.cache.get_deployment("default", "web-deploy").unwrap();
        h.client.clear_calls();

        reconcile_arman(&h.ctx, "default/web").await.unwrap();

        assert_eq!(h.client.operations(), vec![Operation::UpdateStatus]);
        assert_eq!(
            h.cache.get_deployment("default", "web-deploy").unwrap(),
            deployment_before
        );
    }

    #[tokio::test]
    async fn test_missing_arman_is_not_an_error() {
        let h = harness();

        reconcile_arman(&h.ctx, "default/gone").await.unwrap();

        assert!(h.client.calls().is_empty());
        assert!(h.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_key_is_dropped() {
        let h = harness();

        reconcile_arman(&h.ctx, "a/b/c").await.unwrap();
        reconcile_arman(&h.ctx, "default/").await.unwrap();

        assert!(h.client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_deployment_name_makes_no_calls() {
        let h = harness();
        h.cache.insert_arman(arman("default", "web", "", "web-svc"));

        reconcile_arman(&h.ctx, "default/web").await.unwrap();

        assert!(h.client.calls().is_empty());
        assert!(h.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_service_name_makes_no_calls() {
        let h = harness();
        h.cache.insert_arman(arman("default", "web", "web-deploy", ""));

        reconcile_arman(&h.ctx, "default/web").await.unwrap();

        assert!(h.client.calls().is_empty());
    }

    #[test]
    fn test_validate_spec() {
        let valid = arman("default", "web", "web-deploy", "web-svc");
        assert!(validate_spec(&valid, "default/web").is_ok());

        let no_deploy = arman("default", "web", "", "web-svc");
        assert_eq!(
            validate_spec(&no_deploy, "default/web"),
            Err(SpecError::MissingDeploymentName {
                key: "default/web".to_string()
            })
        );

        let no_service = arman("default", "web", "web-deploy", "");
        assert_eq!(
            validate_spec(&no_service, "default/web"),
            Err(SpecError::MissingServiceName {
                key: "default/web".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_unowned_deployment_is_a_conflict() {
        let h = harness();
        h.cache
            .insert_arman(arman("default", "web", "web-deploy", "web-svc"));
        let foreign = unowned_deployment("default", "web-deploy");
        h.cache.insert_deployment(foreign.clone());

        let err = reconcile_arman(&h.ctx, "default/web").await.unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::ResourceExists { kind: "Deployment", ref name } if name == "web-deploy"
        ));
        assert!(!h
            .client
            .operations()
            .contains(&Operation::UpdateDeployment));
        assert!(!h.client.operations().contains(&Operation::UpdateStatus));
        assert_eq!(
            *h.cache.get_deployment("default", "web-deploy").unwrap(),
            foreign
        );

        let events = h.recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Warning);
        assert_eq!(events[0].reason, "ErrResourceExists");
        assert_eq!(
            events[0].message,
            "Resource \"web-deploy\" already exists and is not managed by Arman"
        );
    }

    #[tokio::test]
    async fn test_deployment_owned_by_recreated_arman_is_a_conflict() {
        let h = harness();
        let original = arman("default", "web", "web-deploy", "web-svc");
        h.cache
            .insert_deployment(owned_deployment(&original, "web-deploy", 1));

        let mut recreated = original.clone();
        recreated.metadata.uid = Some("uid-web-2".to_string());
        h.cache.insert_arman(recreated);

        let err = reconcile_arman(&h.ctx, "default/web").await.unwrap_err();
        assert_eq!(err.metric_category(), "resource_exists");
    }

    #[tokio::test]
    async fn test_unowned_service_is_a_conflict() {
        let h = harness();
        let web = arman("default", "web", "web-deploy", "web-svc");
        h.cache.insert_arman(web.clone());
        h.cache
            .insert_deployment(owned_deployment(&web, "web-deploy", 1));
        let mut foreign = crate::resources::build_service(&web);
        foreign.metadata.owner_references = None;
        h.cache.insert_service(foreign);

        let err = reconcile_arman(&h.ctx, "default/web").await.unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::ResourceExists { kind: "Service", .. }
        ));
        assert_eq!(h.recorder.reasons(), vec!["ErrResourceExists".to_string()]);
    }

    #[tokio::test]
    async fn test_scales_deployment_with_single_update() {
        let h = harness();
        let mut web = arman("default", "web", "web-deploy", "web-svc");
        web.spec.replicas = Some(5);
        h.cache.insert_arman(web.clone());
        h.cache
            .insert_deployment(owned_deployment(&web, "web-deploy", 2));
        h.cache.insert_service(crate::resources::build_service(&web));

        reconcile_arman(&h.ctx, "default/web").await.unwrap();

        let updates: Vec<Deployment> = h
            .client
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::UpdateDeployment(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(updates.len(), 1);
        assert_eq!(deployment_replicas(&updates[0]), Some(5));
        assert_eq!(updates[0].metadata.resource_version.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_unset_replicas_leaves_deployment_alone() {
        let h = harness();
        let mut web = arman("default", "web", "web-deploy", "web-svc");
        web.spec.replicas = None;
        h.cache.insert_arman(web.clone());
        h.cache
            .insert_deployment(owned_deployment(&web, "web-deploy", 7));
        h.cache.insert_service(crate::resources::build_service(&web));

        reconcile_arman(&h.ctx, "default/web").await.unwrap();

        assert_eq!(h.client.operations(), vec![Operation::UpdateStatus]);
    }

    #[tokio::test]
    async fn test_image_drift_is_corrected() {
        let h = harness();
        let web = arman("default", "web", "web-deploy", "web-svc");
        h.cache.insert_arman(web.clone());
        let mut deployment = owned_deployment(&web, "web-deploy", 1);
        if let Some(spec) = deployment.spec.as_mut() {
            spec.template.spec.as_mut().unwrap().containers[0].image = Some("nginx:1.25".into());
        }
        h.cache.insert_deployment(deployment);
        h.cache.insert_service(crate::resources::build_service(&web));

        reconcile_arman(&h.ctx, "default/web").await.unwrap();

        let stored = h.cache.get_deployment("default", "web-deploy").unwrap();
        assert_eq!(deployment_image(&stored), Some("nginx:1.27"));
        assert_eq!(
            h.client.operations(),
            vec![Operation::UpdateDeployment, Operation::UpdateStatus]
        );
    }

    #[test]
    fn test_desired_deployment_combines_changes() {
        let base = arman("default", "web", "web-deploy", "web-svc");
        let current = owned_deployment(&base, "web-deploy", 2);
        let mut web = base.clone();
        web.spec.replicas = Some(4);
        web.spec.deployment_image = "nginx:1.28".to_string();

        let desired = desired_deployment(&web, &current).unwrap();
        assert_eq!(deployment_replicas(&desired), Some(4));
        assert_eq!(deployment_image(&desired), Some("nginx:1.28"));
        assert_eq!(desired.metadata, current.metadata);
        assert_eq!(deployment_replicas(&current), Some(2));
    }

    #[test]
    fn test_desired_deployment_ignores_empty_image() {
        let mut web = arman("default", "web", "web-deploy", "web-svc");
        web.spec.deployment_image = String::new();
        let current = owned_deployment(&web, "web-deploy", 1);

        assert!(desired_deployment(&web, &current).is_none());
    }

    #[tokio::test]
    async fn test_deployment_create_failure_skips_service() {
        let h = harness();
        h.cache
            .insert_arman(arman("default", "web", "web-deploy", "web-svc"));
        h.client.fail_next(
            Operation::CreateDeployment,
            ApiError::AlreadyExists {
                kind: "Deployment".to_string(),
                namespace: "default".to_string(),
                name: "web-deploy".to_string(),
            },
        );

        let err = reconcile_arman(&h.ctx, "default/web").await.unwrap_err();

        assert!(matches!(err, ReconcileError::Api(ref e) if e.is_conflict()));
        assert_eq!(h.client.operations(), vec![Operation::CreateDeployment]);
        assert!(h.recorder.events().is_empty());
    }

    #[tokio::test]
    async fn test_service_create_failure_is_returned() {
        let h = harness();
        h.cache
            .insert_arman(arman("default", "web", "web-deploy", "web-svc"));
        h.client.fail_next(
            Operation::CreateService,
            ApiError::NotFound {
                kind: "Namespace".to_string(),
                namespace: String::new(),
                name: "default".to_string(),
            },
        );

        let err = reconcile_arman(&h.ctx, "default/web").await.unwrap_err();

        assert!(matches!(err, ReconcileError::Api(_)));
        assert_eq!(
            h.client.operations(),
            vec![Operation::CreateDeployment, Operation::CreateService]
        );
    }

    #[tokio::test]
    async fn test_stale_deployment_update_is_a_conflict() {
        let h = harness();
        let mut web = arman("default", "web", "web-deploy", "web-svc");
        web.spec.replicas = Some(3);
        h.cache.insert_arman(web.clone());
        h.cache
            .insert_deployment(owned_deployment(&web, "web-deploy", 1));
        h.cache.insert_service(crate::resources::build_service(&web));
        h.client.fail_next(
            Operation::UpdateDeployment,
            ApiError::Conflict {
                kind: "Deployment".to_string(),
                namespace: "default".to_string(),
                name: "web-deploy".to_string(),
                message: "the object has been modified".to_string(),
            },
        );

        let err = reconcile_arman(&h.ctx, "default/web").await.unwrap_err();

        assert_eq!(err.metric_category(), "conflict");
        assert!(!h.client.operations().contains(&Operation::UpdateStatus));
    }

    #[tokio::test]
    async fn test_status_follows_observed_available_replicas() {
        let h = harness();
        let web = arman("default", "web", "web-deploy", "web-svc");
        h.cache.insert_arman(web.clone());

        reconcile_arman(&h.ctx, "default/web").await.unwrap();
        let stored = h.cache.get_arman(Some("default"), "web").unwrap();
        assert_eq!(stored.status.as_ref().unwrap().available_replicas, 0);

        // The deployment controller reports progress.
        let current = h.cache.get_deployment("default", "web-deploy").unwrap();
        let progressed = with_available_replicas((*current).clone(), 3);
        assert_eq!(available_replicas(&progressed), 3);
        h.cache.insert_deployment(progressed);

        reconcile_arman(&h.ctx, "default/web").await.unwrap();
        let stored = h.cache.get_arman(Some("default"), "web").unwrap();
        assert_eq!(stored.status.as_ref().unwrap().available_replicas, 3);
    }
}
