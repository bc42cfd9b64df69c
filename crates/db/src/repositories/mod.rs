//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods over a
//! [`sqlx::PgExecutor`] (pool or transaction).

pub mod agency_repo;
pub mod agency_right_repo;
pub mod assessment_repo;
pub mod convention_repo;
pub mod dashboard_repo;
pub mod discussion_repo;
pub mod establishment_repo;
pub mod notification_repo;
pub mod outbox_repo;
pub mod session_repo;
pub mod user_repo;

pub use agency_repo::AgencyRepo;
pub use agency_right_repo::AgencyRightRepo;
pub use assessment_repo::AssessmentRepo;
pub use convention_repo::ConventionRepo;
pub use dashboard_repo::DashboardRepo;
pub use discussion_repo::DiscussionRepo;
pub use establishment_repo::EstablishmentRepo;
pub use notification_repo::NotificationRepo;
pub use outbox_repo::OutboxRepo;
pub use session_repo::SessionRepo;
pub use user_repo::UserRepo;
