//! Data models
//!
//! Database entities, their input types and pagination helpers for the blog,
//! the temario vocabulary and the graded readers.

mod pagination;
mod post;
mod reader;
mod session;
mod user;
mod vocabulary;

pub use pagination::{page_count, parse_page, ListParams, PagedResult};
pub use post::{
    CreatePostAudioInput, CreatePostInput, Post, PostAudio, PostFilter, PublicationState,
    UpdatePostAudioInput, UpdatePostInput,
};
pub use reader::{DifficultyLevel, DifficultyLevelInput, Reader, ReaderFilter, ReaderInput};
pub use session::Session;
pub use user::{CreateUserInput, UpdateUserInput, User, UserRole, NICKNAME_MAX_LEN};
pub use vocabulary::{
    capitalize_first, display_text, normalize_gender, CategoryInput, CategoryWithCount,
    ExampleSentence, ExampleSentenceFilter, ExampleSentenceInput, Gender, ThematicCategory, Word, WordFilter, WordInput,
};
