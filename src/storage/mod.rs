mod accounts;
mod follows;
mod posts;
mod schema;
mod sources;
mod traits;
mod types;

pub use schema::Database;
pub use traits::{PostStore, SourceStore};
pub use types::{
    Account, CreatePost, DatabaseError, Follow, FollowedSource, NewPost, Post, Source,
    SourceListing,
};
