use std::sync::Arc;

use crate::error::AppError;
use domain::playlist::{PlaylistKind, PlaylistRepository};
use domain::value::{SongId, UserId};

/// recently_played 列表的默认容量上限
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// 播放记录命令
#[derive(Debug)]
pub struct RecordPlayCmd {
    pub user_id: i64,
    pub song_id: i64,
    pub duration_secs: i64,
    /// None 使用 [`DEFAULT_RECENT_LIMIT`]
    pub max_size: Option<usize>,
}

/// 最近播放应用服务
///
/// 维护每用户有界的 recently_played 列表：移到队首、按上限截断、
/// 总时长按保留条目重算。单聚合操作，无需补偿。
pub struct RecencyService {
    playlist_repo: Arc<dyn PlaylistRepository>,
}

impl RecencyService {
    pub fn new(playlist_repo: Arc<dyn PlaylistRepository>) -> Self {
        Self { playlist_repo }
    }

    /// 记录一次播放
    ///
    /// recently_played 列表必须已在注册时创建，不存在视为 NotFound。
    pub async fn record_play(&self, cmd: RecordPlayCmd) -> Result<(), AppError> {
        let user_id = UserId::from(cmd.user_id);
        let playlist = self
            .playlist_repo
            .find_by_owner_and_kind(&user_id, &PlaylistKind::RecentlyPlayed)
            .await?
            .ok_or_else(|| {
                AppError::AggregateNotFound(
                    "Playlist".to_string(),
                    format!("recently_played playlist of user {} not found", user_id),
                )
            })?;

        let max_size = cmd.max_size.unwrap_or(DEFAULT_RECENT_LIMIT);
        self.playlist_repo
            .move_to_front_bounded(
                &playlist.id,
                &SongId::from(cmd.song_id),
                cmd.duration_secs,
                max_size,
            )
            .await?;
        Ok(())
    }
}
