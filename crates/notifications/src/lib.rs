//! Notifications domain module: in-app messages and their timestamps.

pub mod notification;
pub mod timestamp;

pub use notification::{
    Notification, NotificationId, NotificationKind, NotificationView, sort_newest_first,
    unread_count,
};
pub use timestamp::{TimestampError, format_absolute, format_relative, parse_timestamp};
