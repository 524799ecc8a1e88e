//! Known-people gallery and matching.

pub mod enrollment;
pub mod matcher;
pub mod similarity;

pub use enrollment::{EnrolledPerson, EnrollmentStore};
pub use matcher::{IdentityMatcher, MatchResult};
#[cfg(feature = "remote")]
pub use similarity::HttpFaceComparer;
pub use similarity::{FaceComparer, ScriptedComparer};
