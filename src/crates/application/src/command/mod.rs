pub mod like;
pub mod playlist;
pub mod recency;
pub mod shared;
