pub mod error;
pub mod id;
pub mod types;
pub mod user;

pub use error::{CoreError, Result};
pub use id::generate_id;
pub use types::{
    Beneficiary, Clinic, Doctor, Organization, OrganizationStatus, Plan, Profile, Role, Specialty,
};
pub use user::UserContext;
