pub mod dispatch;
pub mod driver;
pub mod event;
pub mod ride;
