pub mod playlist;
pub mod song;

pub use playlist::InMemoryPlaylistRepository;
pub use song::InMemorySongRepository;
