// HTTP handlers, one module per resource

pub mod advice;
pub mod analytics;
pub mod auth;
pub mod bank_accounts;
pub mod fundings;
pub mod health;
pub mod notifications;
pub mod payment_methods;
pub mod platforms;
pub mod subscriptions;
pub mod sync;
pub mod transactions;
pub mod users;
