pub mod engine;
pub mod notification;
pub mod sweeper;

pub use engine::WaitlistEngine;
pub use notification::{
    DiscardNotificationGateway, EmailNotificationGateway, NotificationError, NotificationGateway,
};
pub use sweeper::ExpirySweeper;
