pub mod app_error;
pub mod email_templates;
pub mod entitlement;
pub mod jwt;
pub mod use_cases;
pub mod validators;
