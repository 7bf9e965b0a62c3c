use std::sync::Arc;

use super::shared::IdGenerator;
use crate::error::AppError;
use domain::playlist::{Owner, Playlist, PlaylistError, PlaylistKind, PlaylistRepository};
use domain::song::SongRepository;
use domain::value::{PlaylistId, SongId, UserId};

/// 创建播放列表命令
#[derive(Debug)]
pub struct CreatePlaylistCmd {
    pub name: String,
    pub owner_id: i64,
    pub owner_name: String,
    pub song_ids: Vec<i64>,
}

/// 注册时默认播放列表初始化命令
#[derive(Debug)]
pub struct EnsureDefaultPlaylistsCmd {
    pub owner_id: i64,
    pub owner_name: String,
}

/// 向播放列表加入歌曲命令
#[derive(Debug)]
pub struct AddSongCmd {
    pub user_id: i64,
    pub playlist_id: i64,
    pub song_id: i64,
}

/// 从播放列表移除歌曲命令
#[derive(Debug)]
pub struct RemoveSongCmd {
    pub user_id: i64,
    pub playlist_id: i64,
    pub song_id: i64,
}

/// 重命名播放列表命令
#[derive(Debug)]
pub struct RenamePlaylistCmd {
    pub user_id: i64,
    pub playlist_id: i64,
    pub name: String,
}

/// 播放列表应用服务
pub struct PlaylistAppService {
    playlist_repository: Arc<dyn PlaylistRepository>,
    song_repository: Arc<dyn SongRepository>,
    id_generator: Arc<dyn IdGenerator>,
}

impl PlaylistAppService {
    pub fn new(
        playlist_repository: Arc<dyn PlaylistRepository>,
        song_repository: Arc<dyn SongRepository>,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            playlist_repository,
            song_repository,
            id_generator,
        }
    }

    /// 校验调用方拥有目标播放列表
    ///
    /// 所有按调用方传入 ID 写播放列表的路径都必须先经过这里；
    /// like / recency 路径按 (owner, kind) 定位列表，不经过本方法。
    pub async fn assert_ownership(
        &self,
        playlist_id: &PlaylistId,
        user_id: &UserId,
    ) -> Result<Playlist, AppError> {
        let playlist = self
            .playlist_repository
            .find_by_id(playlist_id)
            .await?
            .ok_or_else(|| {
                AppError::AggregateNotFound("Playlist".to_string(), playlist_id.to_string())
            })?;
        if &playlist.owner.id != user_id {
            return Err(AppError::AccessDenied(format!(
                "playlist {} is not owned by user {}",
                playlist_id, user_id
            )));
        }
        Ok(playlist)
    }

    /// 注册时创建默认播放列表（liked / recently_played），幂等
    ///
    /// 重复调用是空操作；并发首次注册由存储层 (owner, kind) 唯一约束
    /// 兜底，冲突视为"已被对端创建"。
    pub async fn ensure_default_playlists(
        &self,
        cmd: EnsureDefaultPlaylistsCmd,
    ) -> Result<(), AppError> {
        let owner = Owner {
            id: UserId::from(cmd.owner_id),
            name: cmd.owner_name,
        };

        for (kind, name) in [
            (PlaylistKind::Liked, "Liked Songs"),
            (PlaylistKind::RecentlyPlayed, "Recently Played"),
        ] {
            let existing = self
                .playlist_repository
                .find_by_owner_and_kind(&owner.id, &kind)
                .await?;
            if existing.is_some() {
                continue;
            }

            let playlist_id = PlaylistId::from(self.id_generator.next_id().await?);
            let playlist = Playlist::new_default(playlist_id, name, owner.clone(), kind);
            match self.playlist_repository.save(&playlist).await {
                Ok(()) => {}
                // 并发注册赢家已经创建过了
                Err(PlaylistError::DefaultConflict { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// 创建自定义播放列表
    pub async fn create_playlist(&self, cmd: CreatePlaylistCmd) -> Result<Playlist, AppError> {
        if cmd.name.is_empty() {
            return Err(AppError::InvalidInput(
                "name is required when creating a playlist".to_string(),
            ));
        }

        let playlist_id = PlaylistId::from(self.id_generator.next_id().await?);
        let owner = Owner {
            id: UserId::from(cmd.owner_id),
            name: cmd.owner_name,
        };
        let mut playlist = Playlist::new(playlist_id, &cmd.name, owner);

        // 初始歌曲：逐个校验存在性并快照时长
        for song_id in cmd.song_ids {
            let song = self
                .song_repository
                .find_by_id(&SongId::from(song_id))
                .await?
                .ok_or_else(|| {
                    AppError::AggregateNotFound("Song".to_string(), song_id.to_string())
                })?;
            playlist.add_song_idempotent(song.id, song.duration_secs);
        }

        self.playlist_repository.save(&playlist).await?;
        Ok(playlist)
    }

    /// 删除播放列表，默认列表不可删除
    pub async fn delete_playlist(
        &self,
        user_id: i64,
        playlist_id: i64,
    ) -> Result<(), AppError> {
        let playlist_id = PlaylistId::from(playlist_id);
        let playlist = self
            .assert_ownership(&playlist_id, &UserId::from(user_id))
            .await?;
        if playlist.is_default {
            return Err(AppError::Forbidden(format!(
                "default playlist {} cannot be deleted",
                playlist_id
            )));
        }
        self.playlist_repository.delete(&playlist_id).await?;
        Ok(())
    }

    /// 向自定义播放列表加入歌曲
    ///
    /// 默认列表禁止直接写入，否则会绕过同步器破坏跨聚合不变式。
    pub async fn add_song_to_playlist(&self, cmd: AddSongCmd) -> Result<Playlist, AppError> {
        let playlist_id = PlaylistId::from(cmd.playlist_id);
        let playlist = self
            .assert_ownership(&playlist_id, &UserId::from(cmd.user_id))
            .await?;
        if playlist.is_default {
            return Err(AppError::Forbidden(format!(
                "songs cannot be added directly to default playlist {}",
                playlist_id
            )));
        }

        let song_id = SongId::from(cmd.song_id);
        let song = self
            .song_repository
            .find_by_id(&song_id)
            .await?
            .ok_or_else(|| {
                AppError::AggregateNotFound("Song".to_string(), song_id.to_string())
            })?;
        if playlist.contains(&song_id) {
            return Err(AppError::AlreadyPresent(
                song_id.as_i64(),
                playlist_id.as_i64(),
            ));
        }

        self.playlist_repository
            .add_song_idempotent(&playlist_id, &song_id, song.duration_secs)
            .await?;
        self.reload(&playlist_id).await
    }

    /// 从播放列表移除歌曲
    ///
    /// recently_played 列表无论所有权一律拒绝（内容只由播放事件驱动）。
    pub async fn remove_song_from_playlist(
        &self,
        cmd: RemoveSongCmd,
    ) -> Result<Playlist, AppError> {
        let playlist_id = PlaylistId::from(cmd.playlist_id);
        let playlist = self
            .playlist_repository
            .find_by_id(&playlist_id)
            .await?
            .ok_or_else(|| {
                AppError::AggregateNotFound("Playlist".to_string(), playlist_id.to_string())
            })?;
        if playlist.kind == PlaylistKind::RecentlyPlayed {
            return Err(AppError::Forbidden(format!(
                "songs cannot be removed from recently_played playlist {}",
                playlist_id
            )));
        }
        if playlist.owner.id != UserId::from(cmd.user_id) {
            return Err(AppError::AccessDenied(format!(
                "playlist {} is not owned by user {}",
                playlist_id, cmd.user_id
            )));
        }

        let song_id = SongId::from(cmd.song_id);
        // 时长取条目自己的快照，避免用陈旧的外部时长做减法
        let duration_secs = playlist
            .entries
            .iter()
            .find(|e| e.song_id == song_id)
            .map(|e| e.duration_secs)
            .unwrap_or(0);

        self.playlist_repository
            .remove_song_if_present(&playlist_id, &song_id, duration_secs)
            .await?;
        self.reload(&playlist_id).await
    }

    /// 重命名播放列表
    pub async fn rename_playlist(&self, cmd: RenamePlaylistCmd) -> Result<(), AppError> {
        let playlist_id = PlaylistId::from(cmd.playlist_id);
        let mut playlist = self
            .assert_ownership(&playlist_id, &UserId::from(cmd.user_id))
            .await?;
        playlist.rename(&cmd.name);
        self.playlist_repository.save(&playlist).await?;
        Ok(())
    }

    async fn reload(&self, playlist_id: &PlaylistId) -> Result<Playlist, AppError> {
        self.playlist_repository
            .find_by_id(playlist_id)
            .await?
            .ok_or_else(|| {
                AppError::AggregateNotFound("Playlist".to_string(), playlist_id.to_string())
            })
    }
}
