// Services module - Business logic

pub mod booking;
pub mod catalog;
pub mod checkout;
pub mod message_hub;
pub mod password;
pub mod payment_gateway;
pub mod storage;
