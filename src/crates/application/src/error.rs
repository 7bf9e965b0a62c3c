use domain::playlist::PlaylistError;
use domain::song::SongError;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Song error: {0}")]
    SongError(#[from] SongError),
    #[error("Playlist error: {0}")]
    PlaylistError(#[from] PlaylistError),
    #[error("Aggregate not found: {0}: {1}")]
    AggregateNotFound(String, String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// 结构性禁止的变更，例如删除默认播放列表
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Song {0} already present in playlist {1}")]
    AlreadyPresent(i64, i64),

    /// 补偿本身也失败了：两个聚合已经发生持久分歧，需要带外对账。
    /// 绝不被吞掉，也不会被无限重试。
    #[error("Inconsistent state between song {song_id} and playlist {playlist_id}: {reason}")]
    InconsistentState {
        song_id: i64,
        playlist_id: i64,
        reason: String,
    },

    #[error("Unknown error: {0}")]
    UnknownError(String),
}
