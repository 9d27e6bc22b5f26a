// Core infrastructure modules
pub mod database; // SQLite pool, schema and retrying transactions
pub mod id_generator; // ID generation system
pub mod middleware; // Viewer resolution for HTTP requests
pub mod sweeper; // Periodic verification code cleanup
pub mod task_queue; // Background worker pool
pub mod viewer; // Viewer context

pub use database::Database;
pub use id_generator::IdGenerator;
pub use middleware::{DevTokenVerifier, DisabledTokenVerifier, TokenVerifier, Vc};
pub use sweeper::VerificationSweeper;
pub use task_queue::{Job, JobHandler, QueueStats, TaskQueue};
pub use viewer::ViewerContext;
