//! End-to-end integration tests wiring every component the CLI's
//! composition root assembles: sandbox validation, healing, consensus,
//! governance approval, commit, and vitality hand-off to the reaper.

use aec_consensus::ConsensusEngine;
use aec_core::{Clock, FixedClock, MemKvStore, TracingNotifier};
use aec_healing::{FrequencyPredictor, HealingDispatcher};
use aec_reaper::{ProtectedPaths, Reaper};
use aec_sandbox::Sandbox;
use aec_token::TokenService;
use aec_workflow::EvolutionWorkflow;
use std::sync::Arc;
use std::time::Duration;

fn build_workflow(clock: Arc<FixedClock>) -> (Arc<EvolutionWorkflow>, Arc<Reaper>) {
    let clock: Arc<dyn Clock> = clock;
    let kv = Arc::new(MemKvStore::new());
    let random = Arc::new(aec_core::OsRandom);
    let tokens = Arc::new(TokenService::new(b"integration-test-secret".to_vec(), clock.clone()).unwrap());
    let sandbox = Arc::new(Sandbox::new(128));
    let predictor = Arc::new(FrequencyPredictor::new());
    let healing = Arc::new(HealingDispatcher::new(clock.clone(), predictor, tokens.clone()));
    let consensus = Arc::new(ConsensusEngine::new(clock.clone(), Duration::from_secs(1)));
    let reaper = Arc::new(Reaper::new(kv.clone(), tokens.clone(), random, ProtectedPaths::empty()));

    let workflow = Arc::new(
        EvolutionWorkflow::new(sandbox, tokens, healing, consensus, kv, Arc::new(TracingNotifier), clock)
            .with_vitality_registrar(reaper.clone()),
    );
    (workflow, reaper)
}

async fn wait_for_terminal(workflow: &Arc<EvolutionWorkflow>, id: &str) -> aec_core::WorkflowInstance {
    for _ in 0..200 {
        let instance = workflow.get(id).unwrap();
        if matches!(
            instance.stage,
            aec_core::WorkflowStage::Done | aec_core::WorkflowStage::Failed | aec_core::WorkflowStage::AwaitingApproval
        ) {
            return instance;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    workflow.get(id).unwrap()
}

/// A low-risk, well-formed mutation should pass the full pipeline
/// unattended and hand a vitality token to the reaper at commit.
#[tokio::test]
async fn benign_low_risk_mutation_commits_and_registers_vitality() {
    let clock = Arc::new(FixedClock::new(0));
    let (workflow, reaper) = build_workflow(clock);

    let id = workflow
        .propose("moduleA".into(), b"return { ok: true }".to_vec(), 0.1)
        .await
        .unwrap();
    let instance = wait_for_terminal(&workflow, &id).await;

    assert_eq!(instance.stage, aec_core::WorkflowStage::Done);
    assert!(reaper.entities_snapshot().iter().any(|e| e.entity_id == "moduleA"));
}

/// A high-risk mutation stops at `AWAITING_APPROVAL`; a correctly signed
/// administrator approval then carries it through to `DONE`.
#[tokio::test]
async fn high_risk_mutation_requires_and_accepts_administrator_signature() {
    let clock = Arc::new(FixedClock::new(0));
    let (vk, sk) = aec_notary::keypair();
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let kv = Arc::new(MemKvStore::new());
    let random = Arc::new(aec_core::OsRandom);
    let tokens = Arc::new(TokenService::new(b"integration-test-secret".to_vec(), clock_dyn.clone()).unwrap());
    let sandbox = Arc::new(Sandbox::new(128));
    let predictor = Arc::new(FrequencyPredictor::new());
    let healing = Arc::new(HealingDispatcher::new(clock_dyn.clone(), predictor, tokens.clone()));
    let consensus = Arc::new(ConsensusEngine::new(clock_dyn.clone(), Duration::from_secs(1)));
    let reaper = Arc::new(Reaper::new(kv.clone(), tokens.clone(), random, ProtectedPaths::empty()));
    let workflow = Arc::new(
        EvolutionWorkflow::new(sandbox, tokens, healing, consensus, kv, Arc::new(TracingNotifier), clock_dyn)
            .with_vitality_registrar(reaper.clone())
            .with_admin_public_key(vk),
    );

    let payload = b"return { ok: true }".to_vec();
    let id = workflow.propose("moduleB".into(), payload.clone(), 0.95).await.unwrap();
    let instance = wait_for_terminal(&workflow, &id).await;
    assert_eq!(instance.stage, aec_core::WorkflowStage::AwaitingApproval);

    let signature = aec_notary::sign(&payload, &sk);
    let outcome = workflow.approve(&id, &hex::encode(signature.to_bytes())).await.unwrap();
    assert!(outcome.accepted);

    let instance = workflow.get(&id).unwrap();
    assert_eq!(instance.stage, aec_core::WorkflowStage::Done);
}
