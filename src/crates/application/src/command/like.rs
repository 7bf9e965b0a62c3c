use std::sync::Arc;

use crate::error::AppError;
use domain::playlist::{Playlist, PlaylistKind, PlaylistRepository};
use domain::song::SongRepository;
use domain::value::{SongId, UserId};

/// 点赞翻转命令
#[derive(Debug)]
pub struct ToggleLikeCmd {
    pub user_id: i64,
    pub song_id: i64,
}

/// 定向点赞命令
#[derive(Debug)]
pub struct LikeCmd {
    pub user_id: i64,
    pub song_id: i64,
}

/// 定向取消点赞命令
#[derive(Debug)]
pub struct UnlikeCmd {
    pub user_id: i64,
    pub song_id: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToggleLikeResult {
    pub liked: bool,
    pub like_count: i64,
}

/// 播放列表同步失败，携带已解析到的 liked 列表 ID 供分歧上报使用
struct SyncFailure {
    /// None 表示列表本身未解析到
    playlist_id: Option<i64>,
    err: AppError,
}

/// 点赞应用服务
///
/// 维护歌曲聚合（liked_by / like_count）与用户 liked 播放列表之间
/// 的跨聚合一致性。两个聚合没有共同事务，按"歌曲侧条件更新在前、
/// 播放列表同步在后、第二步失败则补偿第一步"的顺序编排；歌曲聚合
/// 是"是否已点赞"的唯一事实来源。
pub struct LikeService {
    song_repo: Arc<dyn SongRepository>,
    playlist_repo: Arc<dyn PlaylistRepository>,
}

impl LikeService {
    pub fn new(
        song_repo: Arc<dyn SongRepository>,
        playlist_repo: Arc<dyn PlaylistRepository>,
    ) -> Self {
        Self {
            song_repo,
            playlist_repo,
        }
    }

    /// 翻转点赞状态
    ///
    /// 并发安全依赖歌曲仓储的条件翻转原语而非互斥：同一 (user, song)
    /// 的两个并发调用至多一个 add 生效，输家观察到 applied=false 后
    /// 走 remove 分支，聚合收敛而不会重复计数。
    pub async fn toggle_like(&self, cmd: ToggleLikeCmd) -> Result<ToggleLikeResult, AppError> {
        let user_id = UserId::from(cmd.user_id);
        let song_id = SongId::from(cmd.song_id);

        // 第一步：条件加入（like 分支）
        let add = self
            .song_repo
            .conditional_toggle_like(&song_id, &user_id, true)
            .await?;
        if add.applied {
            return self
                .sync_then_return(&user_id, &song_id, true, add.like_count, add.duration_secs)
                .await;
        }

        // 已点赞则条件移除（unlike 分支）
        let remove = self
            .song_repo
            .conditional_toggle_like(&song_id, &user_id, false)
            .await?;
        if remove.applied {
            return self
                .sync_then_return(
                    &user_id,
                    &song_id,
                    false,
                    remove.like_count,
                    remove.duration_secs,
                )
                .await;
        }

        // 两个条件都输给了同一 (user, song) 的并发翻转：本次调用已被
        // 吸收，歌曲侧没有产生需要同步的变更，按观察到的最终状态返回。
        Ok(ToggleLikeResult {
            liked: remove.liked,
            like_count: remove.like_count,
        })
    }

    /// 定向点赞，已点赞则失败
    ///
    /// 读-改-写路径，不走条件原语：同一 (user, song) 的并发调用存在
    /// 丢失更新的竞态，是文档化的弱一致入口，交互主流程应使用
    /// [`Self::toggle_like`]。
    pub async fn like(&self, cmd: LikeCmd) -> Result<i64, AppError> {
        let user_id = UserId::from(cmd.user_id);
        let song_id = SongId::from(cmd.song_id);

        let mut song = self
            .song_repo
            .find_by_id(&song_id)
            .await?
            .ok_or_else(|| {
                AppError::AggregateNotFound("Song".to_string(), song_id.to_string())
            })?;
        song.like_by(user_id.clone())?;
        self.song_repo.save(&song).await?;

        if let Err(failure) = self
            .sync_liked_membership(&user_id, &song_id, true, song.duration_secs)
            .await
        {
            // 回滚歌曲侧后再上报原始错误
            let _ = song.unlike_by(&user_id); // 刚加入的成员一定在
            if let Err(save_err) = self.song_repo.save(&song).await {
                return Err(self.report_divergence(
                    &song_id,
                    failure.playlist_id,
                    &failure.err,
                    &save_err,
                ));
            }
            return Err(failure.err);
        }

        Ok(song.like_count)
    }

    /// 定向取消点赞，未点赞则失败
    pub async fn unlike(&self, cmd: UnlikeCmd) -> Result<i64, AppError> {
        let user_id = UserId::from(cmd.user_id);
        let song_id = SongId::from(cmd.song_id);

        let mut song = self
            .song_repo
            .find_by_id(&song_id)
            .await?
            .ok_or_else(|| {
                AppError::AggregateNotFound("Song".to_string(), song_id.to_string())
            })?;
        song.unlike_by(&user_id)?;
        self.song_repo.save(&song).await?;

        if let Err(failure) = self
            .sync_liked_membership(&user_id, &song_id, false, song.duration_secs)
            .await
        {
            let _ = song.like_by(user_id.clone()); // 刚移除的成员一定不在
            if let Err(save_err) = self.song_repo.save(&song).await {
                return Err(self.report_divergence(
                    &song_id,
                    failure.playlist_id,
                    &failure.err,
                    &save_err,
                ));
            }
            return Err(failure.err);
        }

        Ok(song.like_count)
    }

    /// 歌曲侧条件更新已生效，同步 liked 播放列表；失败则补偿歌曲侧
    async fn sync_then_return(
        &self,
        user_id: &UserId,
        song_id: &SongId,
        liked: bool,
        like_count: i64,
        duration_secs: i64,
    ) -> Result<ToggleLikeResult, AppError> {
        match self
            .sync_liked_membership(user_id, song_id, liked, duration_secs)
            .await
        {
            Ok(()) => Ok(ToggleLikeResult { liked, like_count }),
            Err(failure) => {
                // 补偿：把歌曲侧翻回去，对外净效果为无状态变化
                match self
                    .song_repo
                    .conditional_toggle_like(song_id, user_id, !liked)
                    .await
                {
                    Ok(_) => Err(failure.err),
                    Err(comp_err) => Err(self.report_divergence(
                        song_id,
                        failure.playlist_id,
                        &failure.err,
                        &comp_err,
                    )),
                }
            }
        }
    }

    /// 按 (owner, kind=liked) 解析用户的 liked 播放列表并同步成员关系
    ///
    /// 列表严格按所有者定位而非调用方传入的 ID，like 路径在结构上
    /// 不可能发生所有权混淆。
    async fn sync_liked_membership(
        &self,
        user_id: &UserId,
        song_id: &SongId,
        present: bool,
        duration_secs: i64,
    ) -> Result<(), SyncFailure> {
        let playlist = self.liked_playlist(user_id).await.map_err(|err| SyncFailure {
            playlist_id: None,
            err,
        })?;
        let result = if present {
            self.playlist_repo
                .add_song_idempotent(&playlist.id, song_id, duration_secs)
                .await
        } else {
            self.playlist_repo
                .remove_song_if_present(&playlist.id, song_id, duration_secs)
                .await
        };
        result.map_err(|err| SyncFailure {
            playlist_id: Some(playlist.id.as_i64()),
            err: err.into(),
        })
    }

    async fn liked_playlist(&self, user_id: &UserId) -> Result<Playlist, AppError> {
        self.playlist_repo
            .find_by_owner_and_kind(user_id, &PlaylistKind::Liked)
            .await?
            .ok_or_else(|| {
                AppError::AggregateNotFound(
                    "Playlist".to_string(),
                    format!("liked playlist of user {} not found", user_id),
                )
            })
    }

    /// 主写与补偿写双双失败：两聚合已经持久分歧，大声上报
    fn report_divergence(
        &self,
        song_id: &SongId,
        playlist_id: Option<i64>,
        primary: &AppError,
        compensation: &dyn std::fmt::Display,
    ) -> AppError {
        let playlist_id = playlist_id.unwrap_or(0); // 0 表示列表未解析到
        log::error!(
            "like compensation failed, aggregates diverged: song={}, playlist={}, primary={}, compensation={}",
            song_id,
            playlist_id,
            primary,
            compensation
        );
        AppError::InconsistentState {
            song_id: song_id.as_i64(),
            playlist_id,
            reason: format!("primary: {}; compensation: {}", primary, compensation),
        }
    }
}
