use async_trait::async_trait;
use dashmap::DashMap;
use domain::song::{LikeToggleOutcome, Song, SongError, SongRepository};
use domain::value::{SongId, UserId};
use std::sync::Arc;

/// 内存歌曲仓储
///
/// 条件翻转在 DashMap 的单键写锁内完成，对同一歌曲的并发调用串行化，
/// 对外表现为存储层的 compare-and-swap 式条件更新。
#[derive(Clone, Default)]
pub struct InMemorySongRepository {
    store: Arc<DashMap<i64, Song>>,
}

impl InMemorySongRepository {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl SongRepository for InMemorySongRepository {
    async fn find_by_id(&self, id: &SongId) -> Result<Option<Song>, SongError> {
        Ok(self.store.get(&id.as_i64()).map(|s| s.clone()))
    }

    async fn save(&self, song: &Song) -> Result<(), SongError> {
        self.store.insert(song.id.as_i64(), song.clone());
        Ok(())
    }

    async fn conditional_toggle_like(
        &self,
        song_id: &SongId,
        user_id: &UserId,
        want_liked: bool,
    ) -> Result<LikeToggleOutcome, SongError> {
        // get_mut 持有该键的写锁直到返回，翻转因此是原子的
        let mut song = self
            .store
            .get_mut(&song_id.as_i64())
            .ok_or(SongError::NotFound(song_id.as_i64()))?;
        Ok(song.conditional_toggle(user_id, want_liked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn conditional_toggle_respects_precondition() {
        let repo = InMemorySongRepository::new();
        let song = Song::new(SongId::from(1), "song", 120).unwrap();
        repo.save(&song).await.unwrap();

        let add = repo
            .conditional_toggle_like(&SongId::from(1), &UserId::from(9), true)
            .await
            .unwrap();
        assert!(add.applied);
        assert_eq!(add.like_count, 1);
        assert_eq!(add.duration_secs, 120);

        // 重复加入条件失败，返回当前状态而非错误
        let again = repo
            .conditional_toggle_like(&SongId::from(1), &UserId::from(9), true)
            .await
            .unwrap();
        assert!(!again.applied);
        assert!(again.liked);
        assert_eq!(again.like_count, 1);

        let remove = repo
            .conditional_toggle_like(&SongId::from(1), &UserId::from(9), false)
            .await
            .unwrap();
        assert!(remove.applied);
        assert_eq!(remove.like_count, 0);
    }

    #[tokio::test]
    async fn conditional_toggle_missing_song_is_not_found() {
        let repo = InMemorySongRepository::new();
        let err = repo
            .conditional_toggle_like(&SongId::from(42), &UserId::from(9), true)
            .await
            .unwrap_err();
        assert!(matches!(err, SongError::NotFound(42)));
    }
}
