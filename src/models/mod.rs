// Models module - Database entity representations

pub mod message;
pub mod payment;
pub mod profile;
pub mod review;
pub mod study_material;
pub mod subject;
pub mod tutoring_session;
pub mod user;

pub use message::Message;
pub use payment::Payment;
pub use profile::{Profile, Role};
pub use review::Review;
pub use study_material::StudyMaterial;
pub use subject::Subject;
pub use tutoring_session::TutoringSession;
pub use user::User;
