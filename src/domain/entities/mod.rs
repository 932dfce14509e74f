pub mod habit;
pub mod payment_status;
pub mod plan;
pub mod promo_code;
pub mod subscription;
pub mod user;
