pub mod ai;
pub mod availability;
pub mod clock;
pub mod conversation;
pub mod messaging;
pub mod mode;
pub mod pricing;
pub mod rate_limit;
pub mod scheduling;
pub mod validation;
