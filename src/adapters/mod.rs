pub mod channel;
pub mod provider;
pub mod telegram;
pub mod webhook;

pub use channel::{LogChannel, MessageReceipt, NotificationChannel};
#[cfg(test)]
pub use channel::MockNotificationChannel;
pub use provider::{
    FileSnapshotProvider, HttpSnapshotProvider, SnapshotProvider, StaticSnapshotProvider,
};
pub use telegram::TelegramChannel;
pub use webhook::WebhookChannel;
