//! Domain records and the operations the API exposes on them.

mod movies;
mod password;
mod runtime;
mod users;

pub use movies::{movie_sort_table, validate_movie, Movie, MovieUpdate, Movies, NewMovie};
pub use password::Password;
pub use runtime::Runtime;
pub use users::{validate_user, NewUser, User, Users, EMAIL_CONSTRAINT};

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::store::MemoryStore;

/// Every model the API serves, sharing one storage configuration.
pub struct Models {
    pub movies: Movies,
    pub users: Users,
}

impl Models {
    /// Models backed by in-memory stores.
    pub fn in_memory(storage: &StorageConfig) -> Self {
        Self {
            movies: Movies::new(Arc::new(MemoryStore::<Movie>::new()), storage),
            users: Users::new(Arc::new(MemoryStore::<User>::new()), storage),
        }
    }
}
