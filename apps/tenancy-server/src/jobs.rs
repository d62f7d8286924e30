use std::time::Duration;

use tenancy_db::{DataStoreExt, StoreError, TENANT_FIELD};
use tenancy_security::{JobTarget, run_job};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::routes::Store;

/// Count users per tenant under the platform scope.
pub async fn collect_user_stats(store: &Store) -> Result<usize, StoreError> {
    run_job("user_stats", JobTarget::Platform, async {
        let groups = store.model("SysUser").group_by(None, &[TENANT_FIELD]).await?;
        for group in &groups {
            tracing::debug!(key = ?group.key, users = group.count, "tenant user count");
        }
        Ok::<_, StoreError>(groups.len())
    })
    .await
}

pub fn spawn_user_stats(store: Store, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        tick.tick().await;
        loop {
            tick.tick().await;
            match collect_user_stats(&store).await {
                Ok(tenants) => tracing::info!(tenants, "user stats collected"),
                Err(err) => tracing::warn!(error = %err, "user stats job failed"),
            }
        }
    })
}
