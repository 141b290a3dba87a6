// Plain-text rendering of API results. Everything returns lines rather than
// printing, so the stream view can emit them with raw-mode line endings.

use crate::auth::Token;
use crate::error::Error;
use crate::models::{JournalEntry, JournalEvent, JournalPayload, Subscription};
use crate::subscriptions::PortalDeletion;
use chrono::{DateTime, TimeZone, Utc};

pub const LATEST_OFFSET_MESSAGE: &str = "You are already on the latest offset.";

/// Human readable message for an error shown in the menus.
pub fn describe_error(err: &Error) -> String {
    match err {
        Error::NoContent => "Nothing to show: the server returned no content.".to_string(),
        Error::LinkExpired => {
            "The signed journal link has expired. Request the entry again to get a fresh link."
                .to_string()
        }
        Error::Http(e) if e.is_timeout() => format!("The request timed out: {}", e),
        other => other.to_string(),
    }
}

/// Like `describe_error`, for "next after offset" where no content means
/// the caller is caught up.
pub fn describe_next_error(err: &Error) -> String {
    match err {
        Error::NoContent => LATEST_OFFSET_MESSAGE.to_string(),
        other => describe_error(other),
    }
}

/// Epoch millis become a UTC timestamp; anything else is shown as is.
pub fn format_timestamp(raw: &str) -> String {
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt: DateTime<Utc>| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| raw.to_string())
}

pub fn event_line(event: &JournalEvent) -> String {
    let header = event.header();
    let when = format_timestamp(&header.occurred_at);
    let changes = match header.property_changes.as_ref().map(Vec::len) {
        Some(0) | None => String::new(),
        Some(1) => " (1 property change)".to_string(),
        Some(n) => format!(" ({} property changes)", n),
    };
    match event {
        JournalEvent::Object(e) => format!(
            "[{}] OBJECT {} {}/{} portal {}{}",
            when, header.action, e.object_type_id, e.object_id, header.portal_id, changes
        ),
        JournalEvent::Association(e) => {
            let kind = match (&e.association_category, &e.association_type_id) {
                (Some(cat), Some(id)) => format!(" {}:{}", cat, id),
                (None, Some(id)) => format!(" type {}", id),
                (Some(cat), None) => format!(" {}", cat),
                (None, None) => String::new(),
            };
            let primary = if e.is_primary == Some(true) { " primary" } else { "" };
            format!(
                "[{}] ASSOCIATION {} {}/{} -> {}/{}{}{} portal {}{}",
                when,
                header.action,
                e.from_object_type_id,
                e.from_object_id,
                e.to_object_type_id,
                e.to_object_id,
                kind,
                primary,
                header.portal_id,
                changes
            )
        }
    }
}

pub fn journal_lines(entry: &JournalEntry, payload: &JournalPayload) -> Vec<String> {
    let mut lines = vec![format!("Offset {}", entry.current_offset)];
    if let Some(published) = &payload.published_at {
        lines.push(format!("  published {}", format_timestamp(published)));
    }
    if let Some(expires) = &entry.expires_at {
        lines.push(format!("  link expires {}", format_timestamp(expires)));
    }
    if payload.journal_events.is_empty() {
        lines.push("  (no events)".to_string());
    }
    lines.extend(payload.journal_events.iter().map(|e| format!("  {}", event_line(e))));
    lines
}

pub fn subscription_line(sub: &Subscription) -> String {
    let mut line = format!(
        "{:<12} {:<11} {:<8} portal {:<10} [{}]",
        sub.id,
        sub.subscription_type,
        sub.object_type_id,
        sub.portal_id,
        sub.actions.join(", ")
    );
    if let Some(props) = sub.properties.as_ref().filter(|p| !p.is_empty()) {
        line.push_str(&format!(" properties: {}", props.join(", ")));
    }
    if let Some(types) = sub.associated_object_type_ids.as_ref().filter(|t| !t.is_empty()) {
        line.push_str(&format!(" associated: {}", types.join(", ")));
    }
    if let Some(ids) = sub.object_ids.as_ref().filter(|i| !i.is_empty()) {
        line.push_str(&format!(" {} object ids", ids.len()));
    }
    if let Some(deleted) = &sub.deleted_at {
        line.push_str(&format!(" deleted {}", format_timestamp(deleted)));
    }
    line
}

pub fn deletion_lines(portal_id: u64, report: &PortalDeletion) -> Vec<String> {
    match report {
        PortalDeletion::Bulk => vec![format!("Deleted all subscriptions of portal {}.", portal_id)],
        PortalDeletion::Individually(outcomes) if outcomes.is_empty() => {
            vec![format!("Portal {} has no subscriptions.", portal_id)]
        }
        PortalDeletion::Individually(outcomes) => {
            let mut lines = vec![format!(
                "Bulk delete failed; deleted subscriptions of portal {} one by one:",
                portal_id
            )];
            lines.extend(outcomes.iter().map(|o| match &o.result {
                Ok(()) => format!("  {} deleted", o.subscription_id),
                Err(e) => format!("  {} FAILED: {}", o.subscription_id, describe_error(e)),
            }));
            lines.push(format!(
                "{} deleted, {} failed.",
                outcomes.len() - report.failures(),
                report.failures()
            ));
            lines
        }
    }
}

pub fn token_lines(token: Option<&Token>, now_ms: i64) -> Vec<String> {
    let Some(token) = token else {
        return vec!["No token cached. One is fetched on the next API call.".to_string()];
    };
    let remaining = (token.refresh_at_ms() - now_ms) / 1000;
    let status = if token.is_expired_at(now_ms) {
        "expired (refreshed on next call)".to_string()
    } else {
        format!("valid for another {}m {}s", remaining / 60, remaining % 60)
    };
    vec![
        format!("Token type: {}", token.token_type),
        format!(
            "Obtained:   {}",
            format_timestamp(&token.obtained_at_ms.to_string())
        ),
        format!("Status:     {}", status),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventHeader, ObjectEvent};
    use crate::subscriptions::DeletionOutcome;

    #[test]
    fn caught_up_next_is_not_an_error_dump() {
        assert_eq!(
            describe_next_error(&Error::NoContent),
            "You are already on the latest offset."
        );
        assert_eq!(
            describe_next_error(&Error::from_response(500, "boom")),
            "API error 500: boom"
        );
    }

    #[test]
    fn epoch_millis_are_formatted() {
        assert_eq!(format_timestamp("0"), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_timestamp("2024-05-01T10:00:00Z"), "2024-05-01T10:00:00Z");
    }

    #[test]
    fn object_event_line() {
        let event = JournalEvent::Object(ObjectEvent {
            object_type_id: "0-1".into(),
            object_id: "9001".into(),
            header: EventHeader {
                portal_id: 42,
                action: "UPDATE".into(),
                occurred_at: "0".into(),
                property_changes: Some(vec![serde_json::json!({}), serde_json::json!({})]),
                extensions: Default::default(),
            },
        });
        assert_eq!(
            event_line(&event),
            "[1970-01-01 00:00:00 UTC] OBJECT UPDATE 0-1/9001 portal 42 (2 property changes)"
        );
    }

    #[test]
    fn fallback_deletion_lists_each_outcome() {
        let report = PortalDeletion::Individually(vec![
            DeletionOutcome { subscription_id: "1".into(), result: Ok(()) },
            DeletionOutcome {
                subscription_id: "2".into(),
                result: Err(Error::from_response(500, "nope")),
            },
        ]);
        let lines = deletion_lines(42, &report);
        assert_eq!(lines[1], "  1 deleted");
        assert_eq!(lines[2], "  2 FAILED: API error 500: nope");
        assert_eq!(lines[3], "1 deleted, 1 failed.");
    }

    #[test]
    fn token_status_shows_remaining_time() {
        let token = Token {
            access_token: "t".into(),
            token_type: "bearer".into(),
            expires_in_seconds: 1800,
            obtained_at_ms: 0,
        };
        let lines = token_lines(Some(&token), 0);
        assert_eq!(lines[2], "Status:     valid for another 25m 0s");
        assert!(token_lines(None, 0)[0].starts_with("No token cached"));
    }
}
