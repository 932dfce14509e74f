pub mod entities;
pub mod invoice_token;
pub mod plan_catalog;
