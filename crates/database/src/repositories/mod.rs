pub mod invitation;
pub mod member;
pub mod organisation;
pub mod position;
pub mod utils;

pub use invitation::PgInvitationRepository;
pub use member::PgMemberRepository;
pub use organisation::PgOrganisationRepository;
pub use position::PgPositionRepository;
