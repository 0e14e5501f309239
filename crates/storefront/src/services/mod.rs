//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `cart` - Cart mutations and the refresh-threshold decision
//! - `suggestions` - Recommendation refresh plus stored/available/clear
//! - `notify` - Cart-change relay to the monitoring endpoint
//! - `background` - Bounded queue and worker pool for follow-up work

pub mod background;
pub mod cart;
pub mod notify;
pub mod suggestions;

use async_trait::async_trait;
use tracing::{debug, warn};

pub use background::{BackgroundJob, BackgroundQueue, JobHandler, JobReceiver, spawn_workers};
pub use cart::{AddOutcome, CartError, CartService};
pub use notify::{NotificationRelay, NotifyError};
pub use suggestions::{SuggestionError, SuggestionService};

/// Runs background jobs against the suggestion service and relay.
///
/// Failures end here: they are logged and never reach the request that
/// queued the job.
#[derive(Clone)]
pub struct JobRunner {
    suggestions: SuggestionService,
    relay: NotificationRelay,
}

impl JobRunner {
    #[must_use]
    pub const fn new(suggestions: SuggestionService, relay: NotificationRelay) -> Self {
        Self { suggestions, relay }
    }
}

#[async_trait]
impl JobHandler for JobRunner {
    async fn handle(&self, job: BackgroundJob) {
        match job {
            BackgroundJob::RefreshSuggestions { user_id } => {
                match self.suggestions.refresh(user_id).await {
                    Ok(stored) => debug!(user_id = %user_id, count = stored.len(), "Background refresh complete"),
                    Err(e) => warn!(user_id = %user_id, error = %e, "Background suggestion refresh failed"),
                }
            }
            BackgroundJob::NotifyCartChange { user_id } => {
                if let Err(e) = self.relay.notify_cart_change(user_id).await {
                    warn!(user_id = %user_id, error = %e, "Cart change notification failed");
                }
            }
        }
    }
}
