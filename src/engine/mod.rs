pub mod availability;
pub mod dispatch;
pub mod fare;
pub mod lifecycle;
pub mod payment;
pub mod saga;
pub mod sweeper;
pub mod transition;
