use crate::value::{SongId, UserId};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use thiserror::Error;

/// 歌曲领域错误
#[derive(Error, Debug)]
pub enum SongError {
    #[error("Song not found: {0}")]
    NotFound(i64),
    #[error("Song {song_id} already liked by user {user_id}")]
    AlreadyLiked { song_id: i64, user_id: i64 },
    #[error("Song {song_id} not liked by user {user_id}")]
    NotLiked { song_id: i64, user_id: i64 },
    #[error("Validation error: {0}")]
    ValidationErr(String),
    #[error("Database error: {0}")]
    DbErr(String),
}

/// 条件点赞更新的结果
///
/// `applied` 为 false 表示前置条件不满足（已处于目标状态），
/// 此时其余字段反映当前状态而非错误。
#[derive(Debug, Clone, PartialEq)]
pub struct LikeToggleOutcome {
    pub applied: bool,
    pub liked: bool,
    pub like_count: i64,
    /// 歌曲时长（秒），随结果带回，调用方同步播放列表时无需二次读取
    pub duration_secs: i64,
}

/// 歌曲聚合根
///
/// 独占拥有 liked_by 集合与冗余的 like_count 计数。
/// 不变式：持久化时刻 like_count == liked_by.len()。
#[derive(Debug, Clone)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub duration_secs: i64, // 时长（秒），必须为正
    pub liked_by: Vec<UserId>,
    pub like_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub version: i64,
}

impl Song {
    /// 创建新歌曲
    pub fn new(id: SongId, title: &str, duration_secs: i64) -> Result<Self, SongError> {
        if duration_secs <= 0 {
            return Err(SongError::ValidationErr(format!(
                "duration must be positive, got {}",
                duration_secs
            )));
        }
        let now = Utc::now().naive_utc();
        Ok(Self {
            id,
            title: title.to_string(),
            duration_secs,
            liked_by: Vec::new(),
            like_count: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// 用户是否已点赞
    pub fn is_liked_by(&self, user_id: &UserId) -> bool {
        self.liked_by.contains(user_id)
    }

    /// 点赞（读-改-写路径，非条件原语）
    pub fn like_by(&mut self, user_id: UserId) -> Result<(), SongError> {
        if self.is_liked_by(&user_id) {
            return Err(SongError::AlreadyLiked {
                song_id: self.id.as_i64(),
                user_id: user_id.as_i64(),
            });
        }
        self.liked_by.push(user_id);
        self.like_count = self.liked_by.len() as i64;
        self.touch();
        Ok(())
    }

    /// 取消点赞
    pub fn unlike_by(&mut self, user_id: &UserId) -> Result<(), SongError> {
        let idx = self
            .liked_by
            .iter()
            .position(|u| u == user_id)
            .ok_or(SongError::NotLiked {
                song_id: self.id.as_i64(),
                user_id: user_id.as_i64(),
            })?;
        self.liked_by.remove(idx);
        self.like_count = self.liked_by.len() as i64;
        self.touch();
        Ok(())
    }

    /// 条件化的成员翻转：仅当当前状态与目标状态不同才生效
    ///
    /// 仓储实现必须在单键锁内调用本方法，使其对外表现为原子的
    /// compare-and-swap 式操作。
    pub fn conditional_toggle(&mut self, user_id: &UserId, want_liked: bool) -> LikeToggleOutcome {
        let currently = self.is_liked_by(user_id);
        if currently == want_liked {
            return LikeToggleOutcome {
                applied: false,
                liked: currently,
                like_count: self.like_count,
                duration_secs: self.duration_secs,
            };
        }
        if want_liked {
            self.liked_by.push(user_id.clone());
        } else {
            self.liked_by.retain(|u| u != user_id);
        }
        self.like_count = self.liked_by.len() as i64;
        self.touch();
        LikeToggleOutcome {
            applied: true,
            liked: want_liked,
            like_count: self.like_count,
            duration_secs: self.duration_secs,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().naive_utc();
        self.version += 1;
    }
}

/// 歌曲仓储接口
#[async_trait]
pub trait SongRepository: Send + Sync {
    /// 根据 ID 查找
    async fn find_by_id(&self, id: &SongId) -> Result<Option<Song>, SongError>;

    /// 保存歌曲
    async fn save(&self, song: &Song) -> Result<(), SongError>;

    /// 条件点赞翻转，作为存储层一等操作提供
    ///
    /// 加入仅在用户尚未点赞时生效；移除仅在已点赞时生效。
    /// 条件不满足返回 applied=false 与当前状态；歌曲不存在返回
    /// [`SongError::NotFound`]。
    async fn conditional_toggle_like(
        &self,
        song_id: &SongId,
        user_id: &UserId,
        want_liked: bool,
    ) -> Result<LikeToggleOutcome, SongError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song() -> Song {
        Song::new(SongId::from(1), "song", 180).unwrap()
    }

    #[test]
    fn new_rejects_non_positive_duration() {
        assert!(Song::new(SongId::from(1), "s", 0).is_err());
        assert!(Song::new(SongId::from(1), "s", -3).is_err());
    }

    #[test]
    fn like_then_unlike_keeps_count_in_sync() {
        let mut s = song();
        s.like_by(UserId::from(7)).unwrap();
        assert_eq!(s.like_count, 1);
        assert!(s.is_liked_by(&UserId::from(7)));

        s.unlike_by(&UserId::from(7)).unwrap();
        assert_eq!(s.like_count, 0);
        assert_eq!(s.like_count, s.liked_by.len() as i64);
    }

    #[test]
    fn like_twice_is_rejected() {
        let mut s = song();
        s.like_by(UserId::from(7)).unwrap();
        assert!(matches!(
            s.like_by(UserId::from(7)),
            Err(SongError::AlreadyLiked { .. })
        ));
    }

    #[test]
    fn unlike_without_like_is_rejected() {
        let mut s = song();
        assert!(matches!(
            s.unlike_by(&UserId::from(7)),
            Err(SongError::NotLiked { .. })
        ));
    }

    #[test]
    fn conditional_toggle_applies_only_on_state_change() {
        let mut s = song();
        let first = s.conditional_toggle(&UserId::from(7), true);
        assert!(first.applied);
        assert!(first.liked);
        assert_eq!(first.like_count, 1);

        // 已处于目标状态，条件失败但不是错误
        let second = s.conditional_toggle(&UserId::from(7), true);
        assert!(!second.applied);
        assert!(second.liked);
        assert_eq!(second.like_count, 1);

        let third = s.conditional_toggle(&UserId::from(7), false);
        assert!(third.applied);
        assert!(!third.liked);
        assert_eq!(third.like_count, 0);
    }
}
