//! Business logic services
//!
//! Services hold the rules (validation, ownership, token rotation) and talk
//! to storage through the `Repository` seam and to the image host through
//! `MediaUploader`.

pub mod comment;
pub mod follow;
pub mod post;
pub mod user;

pub use comment::CommentService;
pub use follow::FollowService;
pub use post::PostService;
pub use user::{Registration, UserService};
