// Notification fanout - turns a just-created like/comment/follow into a
// receiver-facing notification record.
//
// Invoked explicitly from the creation branch of the toggle engine and
// from comment creation; never from a delete branch.

use tracing::warn;

use crate::database::SocialDatabase;
use crate::models::{NotificationKind, NotificationTarget};

/// Write the notification for a completed social action.
///
/// Self-notification is suppressed. The write is fire-and-forget: the
/// like/follow/comment row is the transaction of record, so a failure
/// here is logged and swallowed rather than surfaced to the caller.
pub async fn on_action_created(
    db: &SocialDatabase,
    kind: NotificationKind,
    actor_id: i64,
    owner_id: i64,
    target: NotificationTarget,
) {
    if actor_id == owner_id {
        return;
    }

    if let Err(e) = db.create_notification(actor_id, owner_id, kind, target).await {
        warn!(
            "Failed to write {} notification from {} to {}: {}",
            kind.as_str(),
            actor_id,
            owner_id,
            e
        );
    }
}
