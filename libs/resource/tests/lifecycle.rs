use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use machinecfg_reconcile::BackoffPolicy;
use machinecfg_resource::{
    ApplyMode, ApplyOrchestrator, ApplyReport, AttrValue, ClientConfiguration, ConnectionFactory, ConnectionTarget,
    MachineApi, MachineConfigurationApplyResource, NodeReport, PlanStatus, Record, ResourceError,
    Sensitive, Timeouts, RECORD_ID,
};
use tokio::time::Instant;
use tonic::{Code, Status};

#[derive(Debug, Clone, Copy)]
enum Step {
    Fail(Code),
    Succeed,
    Hang,
}

#[derive(Debug, Clone, PartialEq)]
struct SentRequest {
    endpoint: String,
    node: String,
    mode: ApplyMode,
    data: Vec<u8>,
}

#[derive(Clone)]
struct ScriptedFactory {
    script: Arc<Mutex<VecDeque<Step>>>,
    fallback: Step,
    sent: Arc<Mutex<Vec<SentRequest>>>,
}

impl ScriptedFactory {
    fn new(script: Vec<Step>, fallback: Step) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            fallback,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionFactory for ScriptedFactory {
    async fn connect(&self, target: &ConnectionTarget) -> Result<Box<dyn MachineApi>, Status> {
        let step = self.script.lock().unwrap().pop_front().unwrap_or(self.fallback);
        Ok(Box::new(ScriptedApi {
            endpoint: target.endpoint.clone(),
            step,
            sent: Arc::clone(&self.sent),
        }))
    }
}

struct ScriptedApi {
    endpoint: String,
    step: Step,
    sent: Arc<Mutex<Vec<SentRequest>>>,
}

#[async_trait]
impl MachineApi for ScriptedApi {
    async fn apply_configuration(
        &mut self,
        node: &str,
        mode: ApplyMode,
        data: Vec<u8>,
    ) -> Result<ApplyReport, Status> {
        self.sent.lock().unwrap().push(SentRequest {
            endpoint: self.endpoint.clone(),
            node: node.to_string(),
            mode,
            data,
        });

        match self.step {
            Step::Fail(code) => Err(Status::new(code, format!("scripted {code:?}"))),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok(ApplyReport::default())
            }
            Step::Succeed => Ok(ApplyReport {
                nodes: vec![NodeReport {
                    hostname: Some("cp-1".to_string()),
                    mode: Some("AUTO".to_string()),
                    mode_details: "Applied configuration without a reboot".to_string(),
                    warnings: vec![],
                }],
            }),
        }
    }
}

fn pem(label: &str) -> String {
    STANDARD.encode(format!(
        "-----BEGIN {label}-----\nMIIBszCCAVmgAwIBAgIQ\n-----END {label}-----\n"
    ))
}

fn credentials() -> ClientConfiguration {
    ClientConfiguration {
        ca_certificate: pem("CERTIFICATE"),
        client_certificate: pem("CERTIFICATE"),
        client_key: Sensitive::new(pem("ED25519 PRIVATE KEY")),
    }
}

const BASE: &str = "version: v1alpha1\nmachine:\n  type: controlplane\n  network: {}\n";

fn config() -> Record {
    Record {
        node: AttrValue::Known("10.5.0.2".to_string()),
        client_configuration: AttrValue::Known(credentials()),
        machine_configuration_input: AttrValue::Known(Sensitive::new(BASE)),
        config_patches: vec![AttrValue::Known(
            "machine:\n  network:\n    hostname: cp-1\n".to_string(),
        )],
        ..Default::default()
    }
}

fn resource(factory: ScriptedFactory) -> MachineConfigurationApplyResource<ScriptedFactory> {
    MachineConfigurationApplyResource::new("talos", factory).with_backoff(BackoffPolicy::fixed(
        Duration::from_millis(100),
        Duration::from_secs(2),
    ))
}

fn planned(resource: &MachineConfigurationApplyResource<ScriptedFactory>, config: &Record) -> Record {
    let mut plan = Record {
        id: AttrValue::Unknown,
        machine_configuration: AttrValue::Unknown,
        ..config.clone()
    };
    let status = resource
        .modify_plan(config, None, Some(&mut plan))
        .unwrap();
    assert_eq!(status, Some(PlanStatus::Resolved));
    plan
}

#[tokio::test(start_paused = true)]
async fn test_create_sends_planned_document() {
    let factory = ScriptedFactory::new(vec![], Step::Succeed);
    let resource = resource(factory.clone());
    let plan = planned(&resource, &config());

    let state = resource.create(&plan).await.unwrap();

    let sent = factory.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].endpoint, "10.5.0.2");
    assert_eq!(sent[0].node, "10.5.0.2");
    assert_eq!(sent[0].mode, ApplyMode::Auto);
    assert_eq!(
        sent[0].data,
        plan.machine_configuration.known().unwrap().expose().as_bytes()
    );
    assert!(String::from_utf8_lossy(&sent[0].data).contains("hostname: cp-1"));

    assert_eq!(state.id.known().map(String::as_str), Some(RECORD_ID));
    assert_eq!(state.machine_configuration, plan.machine_configuration);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_argument_is_not_retried() {
    let factory = ScriptedFactory::new(vec![], Step::Fail(Code::InvalidArgument));
    let resource = resource(factory.clone());
    let plan = planned(&resource, &config());

    let err = resource.create(&plan).await.unwrap_err();

    assert!(matches!(err, ResourceError::Rejected(_)));
    assert_eq!(err.summary(), "Error applying configuration");
    assert_eq!(factory.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_then_success() {
    let factory = ScriptedFactory::new(
        vec![Step::Fail(Code::Unavailable), Step::Fail(Code::Internal)],
        Step::Succeed,
    );
    let resource = resource(factory.clone());
    let plan = planned(&resource, &config());

    let state = resource.create(&plan).await.unwrap();

    assert_eq!(factory.sent().len(), 3);
    assert_eq!(state.id.known().map(String::as_str), Some(RECORD_ID));
}

#[tokio::test(start_paused = true)]
async fn test_never_succeeding_call_hits_deadline() {
    let factory = ScriptedFactory::new(vec![], Step::Fail(Code::Unavailable));
    let resource = resource(factory.clone());
    let mut plan = planned(&resource, &config());
    plan.timeouts = Timeouts {
        create: Some("30s".to_string()),
        update: None,
    };

    let start = Instant::now();
    let err = resource.create(&plan).await.unwrap_err();
    let elapsed = start.elapsed();

    match err {
        ResourceError::DeadlineExceeded { attempts, last, .. } => {
            assert!(attempts > 1);
            assert!(last.unwrap().contains("scripted"));
        }
        other => panic!("expected deadline error, got {other:?}"),
    }
    assert!(elapsed >= Duration::from_secs(30));
    assert!(elapsed < Duration::from_secs(31));
}

#[tokio::test(start_paused = true)]
async fn test_hung_attempt_is_cut_off_at_deadline() {
    let factory = ScriptedFactory::new(vec![], Step::Hang);
    let resource = resource(factory.clone());
    let mut plan = planned(&resource, &config());
    plan.timeouts.create = Some("5s".to_string());

    let start = Instant::now();
    let err = resource.create(&plan).await.unwrap_err();

    assert!(err.is_deadline_exceeded());
    assert_eq!(factory.sent().len(), 1);
    assert!(start.elapsed() < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_bad_credentials_fail_before_any_attempt() {
    let factory = ScriptedFactory::new(vec![], Step::Succeed);
    let resource = resource(factory.clone());
    let mut plan = planned(&resource, &config());
    plan.client_configuration = AttrValue::Known(ClientConfiguration {
        ca_certificate: "%%%".to_string(),
        ..credentials()
    });

    let err = resource.create(&plan).await.unwrap_err();

    assert!(matches!(err, ResourceError::Credentials(_)));
    assert!(factory.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_timeout_fails_before_any_attempt() {
    let factory = ScriptedFactory::new(vec![], Step::Succeed);
    let resource = resource(factory.clone());
    let mut plan = planned(&resource, &config());
    plan.timeouts.update = Some("forever".to_string());

    let prior = plan.clone();
    let err = resource.update(&plan, &prior).await.unwrap_err();

    assert!(matches!(err, ResourceError::InvalidTimeout { .. }));
    assert!(factory.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_timeout_fails_before_any_attempt() {
    let factory = ScriptedFactory::new(vec![], Step::Succeed);
    let resource = resource(factory.clone());
    let mut plan = planned(&resource, &config());
    plan.timeouts.create = Some("4000000000000000h".to_string());

    let err = resource.create(&plan).await.unwrap_err();

    assert!(matches!(err, ResourceError::InvalidTimeout { .. }));
    assert!(err.is_configuration_error());
    assert!(factory.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_orchestrator_rejects_unrepresentable_deadline() {
    let factory = ScriptedFactory::new(vec![], Step::Succeed);
    let resource = resource(factory.clone());
    let plan = planned(&resource, &config());

    let orchestrator = ApplyOrchestrator::new(factory.clone());
    let err = orchestrator.apply(&plan, Duration::MAX).await.unwrap_err();

    assert!(matches!(err, ResourceError::InvalidTimeout { .. }));
    assert!(factory.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_apply_mode_is_not_defaulted() {
    let factory = ScriptedFactory::new(vec![], Step::Succeed);
    let resource = resource(factory.clone());
    let mut plan = planned(&resource, &config());
    plan.apply_mode = AttrValue::Unknown;

    let err = resource.create(&plan).await.unwrap_err();

    assert!(matches!(err, ResourceError::MissingAttribute("apply_mode")));
    assert!(factory.sent().is_empty());

    plan.apply_mode = AttrValue::Null;
    resource.create(&plan).await.unwrap();
    assert_eq!(factory.sent()[0].mode, ApplyMode::Auto);
}

#[tokio::test(start_paused = true)]
async fn test_update_keeps_identity_and_uses_mode() {
    let factory = ScriptedFactory::new(vec![], Step::Succeed);
    let resource = resource(factory.clone());

    let first = resource.create(&planned(&resource, &config())).await.unwrap();

    let mut changed = config();
    changed.apply_mode = AttrValue::Known(ApplyMode::Staged);
    changed.endpoint = AttrValue::Known("lb.example.com".to_string());
    let mut plan = Record {
        machine_configuration: AttrValue::Unknown,
        ..changed.clone()
    };
    resource
        .modify_plan(&changed, Some(&first), Some(&mut plan))
        .unwrap();

    let second = resource.update(&plan, &first).await.unwrap();

    assert_eq!(second.id, first.id);
    let sent = factory.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].mode, ApplyMode::Staged);
    assert_eq!(sent[1].endpoint, "lb.example.com");
    assert_eq!(sent[1].node, "10.5.0.2");
}

#[test]
fn test_destroy_plan_is_not_resolved() {
    let resource = resource(ScriptedFactory::new(vec![], Step::Succeed));
    let status = resource.modify_plan(&config(), None, None).unwrap();
    assert!(status.is_none());
}

#[test]
fn test_read_and_delete_do_not_touch_state() {
    let factory = ScriptedFactory::new(vec![], Step::Succeed);
    let resource = resource(factory.clone());
    let state = Record {
        id: AttrValue::Known(RECORD_ID.to_string()),
        ..config()
    };

    assert_eq!(resource.read(state.clone()), state);
    resource.delete(&state);
    assert!(factory.sent().is_empty());
    assert_eq!(resource.type_name(), "talos_machine_configuration_apply");
    assert_eq!(resource.schema_version(), 1);
}
