pub mod application;
pub mod notification;
pub mod subscription;
pub mod user;
