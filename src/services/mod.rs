//! Services layer - Business logic
//!
//! Services implement the site's rules on top of the repositories:
//! - publication state and slugs for blog posts
//! - temario vocabulary with admin previews
//! - graded readers and their difficulty levels
//! - accounts and sessions
//! - one-off migration from a backup database

pub mod backup;
pub mod backup_copy;
pub mod media;
pub mod password;
pub mod post;
pub mod post_import;
pub mod preview;
pub mod reader;
pub mod user;
pub mod vocabulary;

pub use backup_copy::{copy_backup, copy_into_database, CopyError, CopyReport, CopyStep, StepOutcome};
pub use media::{expand_media_placeholders, media_file_url};
pub use password::{hash_password, verify_password};
pub use post::{
    generate_slug, BulkAction, BulkResult, PostDetail, PostService, PostServiceError, PostView,
};
pub use post_import::{import_into_database, import_posts, ImportError, ImportReport};
pub use reader::{ReaderDetail, ReaderListing, ReaderService, ReaderServiceError, ReaderView};
pub use user::{UserService, UserServiceError};
pub use vocabulary::{
    parse_category_param, VocabularyService, VocabularyServiceError, WordListing, WordView,
};
