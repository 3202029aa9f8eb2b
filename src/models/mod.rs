pub mod appointment;
pub mod availability;
pub mod booking;
pub mod catalog;
pub mod conversation;

pub use appointment::{Appointment, AppointmentStatus};
pub use availability::AvailabilityWindow;
pub use booking::BookingRequest;
pub use catalog::{CatalogEnums, CatalogError, CatalogItem, PriceCatalog, ProviderCatalog};
pub use conversation::ConversationMessage;
