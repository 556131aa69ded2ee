// Services module - Business logic

pub mod pass_flow;
pub mod pass_qr;
pub mod password;
pub mod signature;
