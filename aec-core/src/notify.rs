//! Administrator notification contract, per `spec.md` §6: `notify(channel,
//! message)`. Used by the workflow at `AWAITING_APPROVAL`.

pub trait Notifier: Send + Sync {
    fn notify(&self, channel: &str, message: &str);
}

/// Default notifier: logs instead of delivering anywhere, a `tracing`-backed
/// stub collaborator for whenever a real integration (Slack, email, pager)
/// is outside the component's scope.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, channel: &str, message: &str) {
        tracing::warn!(channel, message, "administrator notification");
    }
}
