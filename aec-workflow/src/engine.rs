//! Evolution Workflow (C6): the durable state machine that sequences
//! sandbox validation, healing, consensus, governance approval, and commit
//! for a single proposed mutation (`spec.md` §4.6).

use crate::error::{Result, WorkflowError};
use aec_consensus::ConsensusEngine;
use aec_core::{
    Clock, KvStore, Mutation, Notifier, Proposal, VitalityRegistrar, WorkflowFailureReason,
    WorkflowInstance, WorkflowStage,
};
use aec_healing::{Domain, ErrorSignature, HealContext, HealingDispatcher};
use aec_sandbox::Sandbox;
use aec_token::{TokenService, TokenStatus};
use dashmap::DashMap;
use ed25519_dalek::VerifyingKey;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default deadline the sandbox is given to run a mutation (`spec.md` §4.1).
pub const DEFAULT_EXECUTION_DEADLINE: Duration = Duration::from_secs(5);
/// Default governance window: 24 hours (`spec.md` §4.6 step 5).
pub const DEFAULT_APPROVAL_TIMEOUT_MILLIS: i64 = 24 * 60 * 60 * 1000;
/// Risk above this threshold requires an explicit admin signature.
pub const DEFAULT_HIGH_RISK_THRESHOLD: f64 = 0.8;

fn mutation_key(workflow_id: &str) -> String {
    format!("workflow/{workflow_id}/mutation")
}

fn instance_key(workflow_id: &str) -> String {
    format!("workflow/{workflow_id}/instance")
}

/// Outcome of a call to `approve`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ApprovalOutcome {
    pub accepted: bool,
    pub reason: Option<WorkflowFailureReason>,
}

/// Wires together the five upstream components (C1-C5) into the governed
/// mutation pipeline, per `spec.md` §4.6.
pub struct EvolutionWorkflow {
    sandbox: Arc<Sandbox>,
    tokens: Arc<TokenService>,
    healing: Arc<HealingDispatcher>,
    consensus: Arc<ConsensusEngine>,
    kv: Arc<dyn KvStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    vitality: Option<Arc<dyn VitalityRegistrar>>,
    admin_public_key: Option<VerifyingKey>,
    high_risk_threshold: f64,
    approval_timeout_millis: i64,
    execution_deadline: Duration,
    /// Proof hashes already committed, guarding against a second commit of
    /// the same consensus-approved mutation (`spec.md` §4.6 step 6,
    /// idempotency).
    committed_hashes: Mutex<HashSet<[u8; 32]>>,
    /// Coarse cancellation flags, checked at each stage boundary while a
    /// background `propose` task is running.
    cancel_flags: DashMap<String, Arc<AtomicBool>>,
}

impl EvolutionWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sandbox: Arc<Sandbox>,
        tokens: Arc<TokenService>,
        healing: Arc<HealingDispatcher>,
        consensus: Arc<ConsensusEngine>,
        kv: Arc<dyn KvStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sandbox,
            tokens,
            healing,
            consensus,
            kv,
            notifier,
            clock,
            vitality: None,
            admin_public_key: None,
            high_risk_threshold: DEFAULT_HIGH_RISK_THRESHOLD,
            approval_timeout_millis: DEFAULT_APPROVAL_TIMEOUT_MILLIS,
            execution_deadline: DEFAULT_EXECUTION_DEADLINE,
            committed_hashes: Mutex::new(HashSet::new()),
            cancel_flags: DashMap::new(),
        }
    }

    pub fn with_vitality_registrar(mut self, registrar: Arc<dyn VitalityRegistrar>) -> Self {
        self.vitality = Some(registrar);
        self
    }

    pub fn with_admin_public_key(mut self, key: VerifyingKey) -> Self {
        self.admin_public_key = Some(key);
        self
    }

    pub fn with_high_risk_threshold(mut self, threshold: f64) -> Self {
        self.high_risk_threshold = threshold;
        self
    }

    pub fn with_approval_timeout_millis(mut self, millis: i64) -> Self {
        self.approval_timeout_millis = millis;
        self
    }

    fn persist_instance(&self, instance: &WorkflowInstance) -> Result<()> {
        let bytes = serde_json::to_vec(instance)?;
        aec_core::kv::put_with_retry(self.kv.as_ref(), &instance_key(&instance.workflow_id), bytes)?;
        Ok(())
    }

    /// Load a workflow's current durable snapshot.
    pub fn get(&self, workflow_id: &str) -> Result<WorkflowInstance> {
        let bytes = self
            .kv
            .get(&instance_key(workflow_id))
            .map_err(WorkflowError::Persistence)?
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn load_mutation(&self, workflow_id: &str) -> Result<Mutation> {
        let bytes = self
            .kv
            .get(&mutation_key(workflow_id))
            .map_err(WorkflowError::Persistence)?
            .ok_or_else(|| WorkflowError::NotFound(workflow_id.to_string()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Submit a mutation for evolution. Returns the workflow id immediately;
    /// the pipeline runs in the background up to `AWAITING_APPROVAL` (if the
    /// risk score demands a signature) or straight through to `DONE`/`FAILED`.
    #[tracing::instrument(skip(self, payload), fields(target_id = %target_id, risk_score))]
    pub async fn propose(self: &Arc<Self>, target_id: String, payload: Vec<u8>, risk_score: f64) -> Result<String> {
        let workflow_id = uuid::Uuid::new_v4().to_string();
        let now = self.clock.now_millis();
        let mutation = Mutation::new(payload, target_id.clone(), risk_score, now);

        let instance = WorkflowInstance::new(workflow_id.clone(), target_id, mutation.risk_score);
        self.persist_instance(&instance)?;
        aec_core::kv::put_with_retry(
            self.kv.as_ref(),
            &mutation_key(&workflow_id),
            serde_json::to_vec(&mutation)?,
        )?;

        self.cancel_flags.insert(workflow_id.clone(), Arc::new(AtomicBool::new(false)));

        let this = Arc::clone(self);
        let id = workflow_id.clone();
        tokio::spawn(async move {
            if let Err(err) = this.run_to_decision_point(&id).await {
                tracing::error!(workflow_id = %id, error = %err, "workflow run aborted");
            }
        });

        Ok(workflow_id)
    }

    fn is_cancelled(&self, workflow_id: &str) -> bool {
        self.cancel_flags
            .get(workflow_id)
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Drive a freshly proposed workflow through validation, healing, and
    /// consensus, stopping at `AWAITING_APPROVAL` for high-risk mutations or
    /// committing directly otherwise.
    async fn run_to_decision_point(self: Arc<Self>, workflow_id: &str) -> Result<()> {
        let mut instance = self.get(workflow_id)?;
        let mut mutation = self.load_mutation(workflow_id)?;
        let now = self.clock.now_millis();

        instance.transition(WorkflowStage::Validating, now, "static validation started");
        self.persist_instance(&instance)?;

        let static_check = self.sandbox.validate(&mutation.payload);
        if !static_check.safe {
            instance.fail(WorkflowFailureReason::StaticForbidden, self.clock.now_millis());
            self.persist_instance(&instance)?;
            return Ok(());
        }

        let mut outcome = self.sandbox.execute(&mutation.payload, self.execution_deadline).await;
        if !outcome.ok {
            if self.is_cancelled(workflow_id) {
                instance.fail(WorkflowFailureReason::Cancelled, self.clock.now_millis());
                self.persist_instance(&instance)?;
                return Ok(());
            }

            instance.transition(WorkflowStage::Healing, self.clock.now_millis(), "dynamic validation failed; routing to healing");
            self.persist_instance(&instance)?;

            let signature = ErrorSignature::classify(&outcome.error.clone().unwrap_or_default());
            let ctx = HealContext {
                target_id: instance.mutation_target_id.clone(),
                error_signature: signature,
                from_heal_and_retry: true,
            };
            match self.healing.heal(Domain::Logic, &ctx, &mutation.payload) {
                Ok(artifact) => {
                    mutation.payload = artifact.payload;
                    aec_core::kv::put_with_retry(
                        self.kv.as_ref(),
                        &mutation_key(workflow_id),
                        serde_json::to_vec(&mutation)?,
                    )?;
                    outcome = self.sandbox.execute(&mutation.payload, self.execution_deadline).await;
                    if !outcome.ok {
                        instance.fail(WorkflowFailureReason::HealExhausted, self.clock.now_millis());
                        self.persist_instance(&instance)?;
                        return Ok(());
                    }
                }
                Err(_) => {
                    instance.fail(WorkflowFailureReason::HealExhausted, self.clock.now_millis());
                    self.persist_instance(&instance)?;
                    return Ok(());
                }
            }
        }

        if self.is_cancelled(workflow_id) {
            instance.fail(WorkflowFailureReason::Cancelled, self.clock.now_millis());
            self.persist_instance(&instance)?;
            return Ok(());
        }

        instance.transition(WorkflowStage::Consensus, self.clock.now_millis(), "submitted for consensus review");
        self.persist_instance(&instance)?;

        let proposal = Proposal::new(workflow_id.to_string(), mutation.clone(), Default::default());
        let result = self.consensus.verify(proposal).await;
        instance.proof_hash = Some(result.proof_hash);
        if !result.achieved {
            instance.fail(WorkflowFailureReason::ConsensusVeto, self.clock.now_millis());
            self.persist_instance(&instance)?;
            return Ok(());
        }

        if instance.risk_score > self.high_risk_threshold {
            let now = self.clock.now_millis();
            instance.awaiting_since_millis = Some(now);
            instance.transition(WorkflowStage::AwaitingApproval, now, "awaiting administrator signature");
            self.persist_instance(&instance)?;
            self.notifier.notify(
                "admin",
                &format!("workflow {workflow_id} requires approval (risk {:.2})", instance.risk_score),
            );
            return Ok(());
        }

        self.commit(&mut instance, &mutation).await?;
        self.persist_instance(&instance)?;
        Ok(())
    }

    /// Apply a mutation whose consensus-approved proof hash has not yet been
    /// committed, mint its vitality token, and hand the token to the reaper.
    async fn commit(&self, instance: &mut WorkflowInstance, mutation: &Mutation) -> Result<()> {
        let now = self.clock.now_millis();
        instance.transition(WorkflowStage::Committing, now, "committing");

        let proof_hash = instance
            .proof_hash
            .unwrap_or_else(|| aec_core::proof_hash(&aec_core::FormalProof::default()));
        {
            let mut committed = self.committed_hashes.lock();
            if !committed.insert(proof_hash) {
                instance.fail(WorkflowFailureReason::AlreadyCommitted, self.clock.now_millis());
                return Ok(());
            }
        }

        let status = if instance.history.iter().any(|h| h.stage == WorkflowStage::Healing) {
            TokenStatus::Recovering
        } else {
            TokenStatus::Healthy
        };
        let token = self.tokens.issue(&mutation.target_id, status);
        if let Some(registrar) = &self.vitality {
            if !registrar.register_vitality(&mutation.target_id, &token) {
                tracing::warn!(target_id = %mutation.target_id, "vitality registration declined at commit time");
            }
        }

        instance.transition(WorkflowStage::Done, self.clock.now_millis(), "committed");
        Ok(())
    }

    /// Hand the administrator's Ed25519 signature over the mutation payload
    /// to a workflow parked at `AWAITING_APPROVAL`.
    #[tracing::instrument(skip(self, signature_hex))]
    pub async fn approve(&self, workflow_id: &str, signature_hex: &str) -> Result<ApprovalOutcome> {
        let mut instance = self.get(workflow_id)?;

        if instance.stage != WorkflowStage::AwaitingApproval {
            return Ok(ApprovalOutcome {
                accepted: false,
                reason: instance.failure_reason.or(Some(WorkflowFailureReason::SignatureMissing)),
            });
        }

        let now = self.clock.now_millis();
        if let Some(since) = instance.awaiting_since_millis {
            if now - since > self.approval_timeout_millis {
                instance.fail(WorkflowFailureReason::GovernanceTimeout, now);
                self.persist_instance(&instance)?;
                return Ok(ApprovalOutcome {
                    accepted: false,
                    reason: Some(WorkflowFailureReason::GovernanceTimeout),
                });
            }
        }

        let admin_key = match self.admin_public_key {
            Some(k) => k,
            None => return Err(WorkflowError::NoAdminKey),
        };

        let mutation = self.load_mutation(workflow_id)?;
        let sig_bytes = hex::decode(signature_hex)
            .map_err(|e| WorkflowError::InvalidSignatureEncoding(e.to_string()))?;
        let sig_array: [u8; 64] = sig_bytes
            .as_slice()
            .try_into()
            .map_err(|_| WorkflowError::InvalidSignatureEncoding("signature must be 64 bytes".into()))?;
        let signature = ed25519_dalek::Signature::from_bytes(&sig_array);

        if !aec_notary::verify(&mutation.payload, &signature, &admin_key) {
            instance.fail(WorkflowFailureReason::SignatureInvalid, self.clock.now_millis());
            self.persist_instance(&instance)?;
            return Ok(ApprovalOutcome {
                accepted: false,
                reason: Some(WorkflowFailureReason::SignatureInvalid),
            });
        }

        instance.pending_signature = Some(sig_bytes);
        self.commit(&mut instance, &mutation).await?;
        self.persist_instance(&instance)?;
        Ok(ApprovalOutcome { accepted: true, reason: None })
    }

    /// Cancel a workflow. Honors the stage-dependent semantics of
    /// `spec.md` §5: immediate at `AWAITING_APPROVAL`, a best-effort abort
    /// flag at the earlier stages, a no-op once committing or terminal.
    pub fn cancel(&self, workflow_id: &str) -> Result<bool> {
        let mut instance = self.get(workflow_id)?;
        match instance.stage {
            WorkflowStage::AwaitingApproval => {
                instance.fail(WorkflowFailureReason::Cancelled, self.clock.now_millis());
                self.persist_instance(&instance)?;
                Ok(true)
            }
            WorkflowStage::Committing | WorkflowStage::Done | WorkflowStage::Failed => Ok(false),
            _ => {
                if let Some(flag) = self.cancel_flags.get(workflow_id) {
                    flag.store(true, Ordering::SeqCst);
                }
                Ok(true)
            }
        }
    }
}
