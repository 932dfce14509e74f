pub mod expiration;
pub mod habit_lock;
pub mod payment;
pub mod promo;
pub mod subscription;
