pub mod audit_event;
pub mod invoice;
pub mod payment;
pub mod subscription;
