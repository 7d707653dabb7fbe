pub mod models;
pub mod services;
pub mod error;
pub mod handlers;
pub mod router;

pub use models::*;
pub use error::*;
pub use services::*;
pub use handlers::WizardState;
pub use router::{create_booking_wizard_router, create_doctor_directory_router};
