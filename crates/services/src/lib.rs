pub mod common;
pub mod directory;
pub mod error;
pub mod invitation;
pub mod member;
pub mod organisation;
pub mod permission;
pub mod position;

pub use directory::ports::{PartialUser, UserId};
pub use error::ServiceError;
pub use invitation::InvitationService;
pub use member::MemberService;
pub use organisation::{OrganisationId, OrganisationService};
pub use permission::Permission;
pub use position::{CachedPositionResolver, PositionService};

#[cfg(any(test, feature = "test-mocks"))]
pub mod mocks;
