//! Delivery Tracking Module
//!
//! Delivery status model and the tracking timeline shown on the home screen.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Current state of a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Queued,
    Deployed,
    InTransit,
    Arrived,
    Delivered,
    Failed,
    Cancelled,
}

impl DeliveryStatus {
    /// Statuses of the normal lifecycle, in order
    pub const LIFECYCLE: [DeliveryStatus; 5] = [
        DeliveryStatus::Queued,
        DeliveryStatus::Deployed,
        DeliveryStatus::InTransit,
        DeliveryStatus::Arrived,
        DeliveryStatus::Delivered,
    ];

    /// Label as shown on the status badge
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryStatus::Queued => "Queued",
            DeliveryStatus::Deployed => "Deployed",
            DeliveryStatus::InTransit => "In Transit",
            DeliveryStatus::Arrived => "Arrived",
            DeliveryStatus::Delivered => "Delivered",
            DeliveryStatus::Failed => "Failed",
            DeliveryStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether this status ends the delivery abnormally
    pub fn is_error(&self) -> bool {
        matches!(self, DeliveryStatus::Failed | DeliveryStatus::Cancelled)
    }

    /// Badge palette for this status
    pub fn badge(&self) -> BadgeStyle {
        let (background, text, dot) = match self {
            DeliveryStatus::Queued => ("#e2e8f0", "#64748b", "#94a3b8"),
            DeliveryStatus::Deployed => ("#e0f2fe", "#0284c7", "#0ea5e9"),
            DeliveryStatus::InTransit => ("#ffedd5", "#c2410c", "#f97316"),
            DeliveryStatus::Arrived => ("#dcfce7", "#16a34a", "#22c55e"),
            DeliveryStatus::Delivered => ("#22c55e", "#ffffff", "#ffffff"),
            DeliveryStatus::Failed => ("#fee2e2", "#dc2626", "#ef4444"),
            DeliveryStatus::Cancelled => ("#ef4444", "#ffffff", "#ffffff"),
        };
        BadgeStyle { background, text, dot }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown delivery status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for DeliveryStatus {
    type Err = UnknownStatus;

    /// Accepts badge labels as well as kebab/snake/camel spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "queued" => Ok(DeliveryStatus::Queued),
            "deployed" => Ok(DeliveryStatus::Deployed),
            "intransit" => Ok(DeliveryStatus::InTransit),
            "arrived" => Ok(DeliveryStatus::Arrived),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "failed" => Ok(DeliveryStatus::Failed),
            "cancelled" | "canceled" => Ok(DeliveryStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Badge colours for a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BadgeStyle {
    pub background: &'static str,
    pub text: &'static str,
    pub dot: &'static str,
}

/// One step of a delivery's life cycle, built for a single render pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub status: DeliveryStatus,
    pub timestamp: String,
    pub description: String,
    pub icon_ref: String,
    pub is_terminal_error: bool,
}

/// Display styling of a timeline row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Completed,
    Current,
}

struct Template {
    status: DeliveryStatus,
    time: &'static str,
    description: &'static str,
    icon: &'static str,
}

// Display times are placeholders until the backend reports event times.
const BASE_TEMPLATE: [Template; 5] = [
    Template {
        status: DeliveryStatus::Queued,
        time: "02:06pm",
        description: "Item is lined up and awaiting bot availability.",
        icon: "menu",
    },
    Template {
        status: DeliveryStatus::Deployed,
        time: "02:10pm",
        description: "Item has been loaded onto the bot.",
        icon: "package",
    },
    Template {
        status: DeliveryStatus::InTransit,
        time: "02:15pm",
        description: "Bot is en route to delivery location.",
        icon: "road-variant",
    },
    Template {
        status: DeliveryStatus::Arrived,
        time: "02:35pm",
        description: "Bot has reached the delivery point and is ready for access.",
        icon: "location-sharp",
    },
    Template {
        status: DeliveryStatus::Delivered,
        time: "02:37pm",
        description: "Item has been successfully retrieved.",
        icon: "check-circle",
    },
];

const FAILED: Template = Template {
    status: DeliveryStatus::Failed,
    time: "02:57pm",
    description: "Delivery could not be completed due to a system or route issue.",
    icon: "alert-triangle",
};

const CANCELLED: Template = Template {
    status: DeliveryStatus::Cancelled,
    time: "02:12pm",
    description: "Delivery was cancelled before dispatch.",
    icon: "close-circle",
};

impl Template {
    fn event(&self) -> TrackingEvent {
        TrackingEvent {
            status: self.status,
            timestamp: self.time.to_string(),
            description: self.description.to_string(),
            icon_ref: self.icon.to_string(),
            is_terminal_error: self.status.is_error(),
        }
    }
}

/// Build the ordered timeline for a delivery's current status.
///
/// The last element is always the current status; every earlier element is
/// a completed step. Lifecycle steps after the current status are omitted.
pub fn derive_timeline(status: DeliveryStatus) -> Vec<TrackingEvent> {
    let (prefix, terminal) = match status {
        DeliveryStatus::Failed => (3, Some(&FAILED)),
        DeliveryStatus::Cancelled => (2, Some(&CANCELLED)),
        _ => {
            let mut events = Vec::new();
            for template in &BASE_TEMPLATE {
                events.push(template.event());
                if template.status == status {
                    break;
                }
            }
            return events;
        }
    };

    BASE_TEMPLATE[..prefix]
        .iter()
        .chain(terminal)
        .map(Template::event)
        .collect()
}

/// Timeline for a status label received from elsewhere; unknown labels
/// produce an empty timeline.
pub fn timeline_for_label(label: &str) -> Vec<TrackingEvent> {
    label
        .parse::<DeliveryStatus>()
        .map(derive_timeline)
        .unwrap_or_default()
}

/// Pair each event with its display stage (last one is current)
pub fn stages(events: &[TrackingEvent]) -> impl Iterator<Item = (Stage, &TrackingEvent)> {
    let last = events.len().saturating_sub(1);
    events.iter().enumerate().map(move |(i, event)| {
        let stage = if i == last { Stage::Current } else { Stage::Completed };
        (stage, event)
    })
}

/// A delivery as shown on the home screen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    pub id: String,
    pub order_id: String,
    pub bot_id: String,
    pub bot_name: String,
    pub status: DeliveryStatus,
    pub location: String,
    pub code: String,
}

impl Delivery {
    /// Static delivery used until deliveries are served by the backend
    pub fn placeholder() -> Self {
        Self {
            id: "1".into(),
            order_id: "HZN-JD-001".into(),
            bot_id: "HZN-BOT-001".into(),
            bot_name: "Jellybean".into(),
            status: DeliveryStatus::Queued,
            location: "Faculty of Engineering, University of Lagos.".into(),
            code: "0123".into(),
        }
    }

    pub fn timeline(&self) -> Vec<TrackingEvent> {
        derive_timeline(self.status)
    }

    /// Access code spaced out for the overlay on the bot image
    pub fn spaced_code(&self) -> String {
        let digits: Vec<String> = self.code.chars().map(String::from).collect();
        digits.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(events: &[TrackingEvent]) -> Vec<DeliveryStatus> {
        events.iter().map(|e| e.status).collect()
    }

    #[test]
    fn normal_statuses_end_at_current_position() {
        for (position, status) in DeliveryStatus::LIFECYCLE.iter().enumerate() {
            let events = derive_timeline(*status);
            assert_eq!(events.len(), position + 1, "length for {status}");
            assert_eq!(events.last().map(|e| e.status), Some(*status));
            assert!(events.iter().all(|e| !e.is_terminal_error));
        }
    }

    #[test]
    fn in_transit_shows_first_three_steps() {
        let events = derive_timeline(DeliveryStatus::InTransit);
        assert_eq!(
            statuses(&events),
            vec![
                DeliveryStatus::Queued,
                DeliveryStatus::Deployed,
                DeliveryStatus::InTransit
            ]
        );
        let (stage, current) = stages(&events).last().unwrap();
        assert_eq!(stage, Stage::Current);
        assert_eq!(current.icon_ref, "road-variant");
    }

    #[test]
    fn delivered_shows_whole_lifecycle() {
        let events = derive_timeline(DeliveryStatus::Delivered);
        assert_eq!(statuses(&events), DeliveryStatus::LIFECYCLE.to_vec());
    }

    #[test]
    fn failed_appends_error_after_in_transit() {
        let events = derive_timeline(DeliveryStatus::Failed);
        assert_eq!(
            statuses(&events),
            vec![
                DeliveryStatus::Queued,
                DeliveryStatus::Deployed,
                DeliveryStatus::InTransit,
                DeliveryStatus::Failed
            ]
        );
        assert!(events[3].is_terminal_error);
        assert!(events[..3].iter().all(|e| !e.is_terminal_error));
    }

    #[test]
    fn cancelled_appends_error_after_deployed() {
        let events = derive_timeline(DeliveryStatus::Cancelled);
        assert_eq!(
            statuses(&events),
            vec![
                DeliveryStatus::Queued,
                DeliveryStatus::Deployed,
                DeliveryStatus::Cancelled
            ]
        );
        assert!(events[2].is_terminal_error);
        assert_eq!(events[2].timestamp, "02:12pm");
    }

    #[test]
    fn derivation_is_repeatable() {
        for status in [DeliveryStatus::Arrived, DeliveryStatus::Failed] {
            assert_eq!(derive_timeline(status), derive_timeline(status));
        }
    }

    #[test]
    fn unknown_label_gives_empty_timeline() {
        assert!(timeline_for_label("Lost at sea").is_empty());
        assert!(timeline_for_label("").is_empty());
    }

    #[test]
    fn labels_parse_in_several_spellings() {
        for label in ["In Transit", "in-transit", "in_transit", "InTransit"] {
            assert_eq!(label.parse(), Ok(DeliveryStatus::InTransit));
        }
        assert_eq!("canceled".parse(), Ok(DeliveryStatus::Cancelled));
        assert_eq!(timeline_for_label("arrived").len(), 4);
    }

    #[test]
    fn stages_mark_only_last_as_current() {
        let events = derive_timeline(DeliveryStatus::Arrived);
        let current: Vec<_> = stages(&events)
            .filter(|(stage, _)| *stage == Stage::Current)
            .collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].1.status, DeliveryStatus::Arrived);
        assert_eq!(stages(&[]).count(), 0);
    }

    #[test]
    fn placeholder_delivery_matches_home_card() {
        let delivery = Delivery::placeholder();
        assert_eq!(delivery.spaced_code(), "0 1 2 3");
        assert_eq!(delivery.timeline().len(), 1);
        assert_eq!(delivery.status.badge().dot, "#94a3b8");
    }
}
