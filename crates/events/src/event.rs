//! Realtime events pushed by the backend over the WebSocket channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An inbound realtime event.
///
/// Wire shape is `{"type": "...", "data": {...}}`. The `data` object is
/// forwarded to subscribers as-is; its schema belongs to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    ItemUpdated(Value),
    MovementCreated(Value),
    AlertTriggered(Value),
    StockLevelChanged(Value),
}

/// Discriminant of [`RealtimeEvent`], used to subscribe per variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RealtimeEventKind {
    ItemUpdated,
    MovementCreated,
    AlertTriggered,
    StockLevelChanged,
}

impl RealtimeEvent {
    pub fn kind(&self) -> RealtimeEventKind {
        match self {
            Self::ItemUpdated(_) => RealtimeEventKind::ItemUpdated,
            Self::MovementCreated(_) => RealtimeEventKind::MovementCreated,
            Self::AlertTriggered(_) => RealtimeEventKind::AlertTriggered,
            Self::StockLevelChanged(_) => RealtimeEventKind::StockLevelChanged,
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            Self::ItemUpdated(data)
            | Self::MovementCreated(data)
            | Self::AlertTriggered(data)
            | Self::StockLevelChanged(data) => data,
        }
    }
}

impl RealtimeEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ItemUpdated => "item_updated",
            Self::MovementCreated => "movement_created",
            Self::AlertTriggered => "alert_triggered",
            Self::StockLevelChanged => "stock_level_changed",
        }
    }
}
