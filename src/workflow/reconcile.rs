//! Ledger reconciliation against the channel's actual state.
//!
//! Ledger entries back both generation context and reply-thread candidates,
//! so entries whose channel message was deleted out-of-band must not be
//! offered to the operator or fed to the thread resolver.

use crate::channel::ChannelApi;
use crate::error::StoreError;
use crate::store::Ledger;

/// Verify every ledger entry still resolves to a live channel message and
/// prune the ones that do not, in one batch at the end. Returns the number
/// of entries removed.
///
/// The liveness probe is a copy-then-delete round trip into the operator
/// chat: copying fails iff the source message is gone. Cost is bounded by
/// the ledger size. Runs on demand before reply resolution, not on a
/// schedule.
pub async fn prune_dead_entries(
    channel: &dyn ChannelApi,
    ledger: &mut Ledger,
    channel_chat: &str,
    probe_chat: &str,
) -> Result<usize, StoreError> {
    let mut dead = Vec::new();

    for post in ledger.posts() {
        match channel
            .copy_message(probe_chat, channel_chat, post.channel_message_id)
            .await
        {
            Ok(copy_id) => {
                // Best effort: a leftover probe copy is cosmetic.
                if let Err(e) = channel.delete_message(probe_chat, copy_id).await {
                    tracing::debug!(copy_id, error = %e, "probe copy cleanup failed");
                }
            }
            Err(e) => {
                tracing::info!(
                    uid = %post.uid,
                    message_id = post.channel_message_id,
                    error = %e,
                    "ledger entry no longer live on channel"
                );
                dead.push(post.channel_message_id);
            }
        }
    }

    ledger.remove_by_message_ids(&dead)
}
