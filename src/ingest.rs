use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::{
    feed::{Feed, FeedError},
    record::{self, Update},
    store::{now_millis, LiveStore},
};

/// Drives the feed-to-store pipeline: pull the next payload, decode it, apply
/// the upsert or cancellation, then sweep expired records. Returns `Ok(())`
/// when the feed is cleanly closed; transport failures propagate. Malformed
/// payloads are logged and dropped, never fatal.
pub async fn run(mut feed: impl Feed, store: Arc<LiveStore>) -> anyhow::Result<()> {
    loop {
        let message = match feed.next().await {
            Ok(Some(message)) => message,
            // The bounded wait elapsed without a message; poll again
            Ok(None) => continue,
            Err(FeedError::Closed) => {
                info!("feed closed, stopping ingestion");
                return Ok(());
            }
            Err(err) => return Err(err).context("inbound feed failed"),
        };

        match record::decode(message.payload.clone()) {
            Ok(Update::Put(record)) => {
                debug!(
                    id = %record.id,
                    topic = %message.topic,
                    offset = message.offset,
                    "record upserted"
                );
                store.upsert(record);
            }
            Ok(Update::Cancel { id }) => {
                debug!(%id, "record cancelled");
                store.delete(&id);
            }
            Err(err) => {
                warn!(
                    error = %err,
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    "dropping undecodable payload"
                );
                continue;
            }
        }

        // Expiry rides on ingestion: every successfully decoded payload
        // triggers a sweep, so an idle feed leaves expired records in place.
        let removed = store.sweep(now_millis());
        if removed > 0 {
            debug!(removed, remaining = store.len(), "swept expired records");
        }
    }
}
