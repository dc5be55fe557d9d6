pub mod applications;
pub mod approval;
pub mod dispatcher;
pub mod notifications;
pub mod session;
pub mod trial;
pub mod user;
