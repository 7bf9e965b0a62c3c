use async_trait::async_trait;
use dashmap::DashMap;
use domain::playlist::{Playlist, PlaylistError, PlaylistKind, PlaylistRepository};
use domain::value::{PlaylistId, SongId, UserId};
use std::sync::Arc;

/// 内存播放列表仓储
///
/// 幂等/条件变更在 DashMap 单键写锁内完成；默认列表另有
/// (owner, kind) 唯一索引，关闭并发首次注册的重复创建竞态。
#[derive(Clone, Default)]
pub struct InMemoryPlaylistRepository {
    store: Arc<DashMap<i64, Playlist>>,
    // (owner_id, kind name) -> playlist id，仅默认类型参与
    default_index: Arc<DashMap<(i64, &'static str), i64>>,
}

impl InMemoryPlaylistRepository {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            default_index: Arc::new(DashMap::new()),
        }
    }

    fn with_playlist<T>(
        &self,
        playlist_id: &PlaylistId,
        f: impl FnOnce(&mut Playlist) -> T,
    ) -> Result<T, PlaylistError> {
        let mut playlist = self
            .store
            .get_mut(&playlist_id.as_i64())
            .ok_or(PlaylistError::NotFound(playlist_id.as_i64()))?;
        Ok(f(&mut playlist))
    }
}

#[async_trait]
impl PlaylistRepository for InMemoryPlaylistRepository {
    async fn find_by_id(&self, id: &PlaylistId) -> Result<Option<Playlist>, PlaylistError> {
        Ok(self.store.get(&id.as_i64()).map(|p| p.clone()))
    }

    async fn find_by_owner_and_kind(
        &self,
        owner_id: &UserId,
        kind: &PlaylistKind,
    ) -> Result<Option<Playlist>, PlaylistError> {
        if kind.is_default_kind() {
            // 默认类型走唯一索引
            let id = self
                .default_index
                .get(&(owner_id.as_i64(), kind.name()))
                .map(|id| *id);
            return match id {
                Some(id) => Ok(self.store.get(&id).map(|p| p.clone())),
                None => Ok(None),
            };
        }
        Ok(self
            .store
            .iter()
            .find(|p| &p.owner.id == owner_id && &p.kind == kind)
            .map(|p| p.clone()))
    }

    async fn find_by_owner_id(&self, owner_id: &UserId) -> Result<Vec<Playlist>, PlaylistError> {
        Ok(self
            .store
            .iter()
            .filter(|p| &p.owner.id == owner_id)
            .map(|p| p.clone())
            .collect())
    }

    async fn save(&self, playlist: &Playlist) -> Result<(), PlaylistError> {
        if playlist.is_default {
            let key = (playlist.owner.id.as_i64(), playlist.kind.name());
            // entry 持有该键的写锁，检查加占位是原子的
            let entry = self.default_index.entry(key).or_insert(playlist.id.as_i64());
            if *entry != playlist.id.as_i64() {
                return Err(PlaylistError::DefaultConflict {
                    owner_id: playlist.owner.id.as_i64(),
                    kind: playlist.kind.name().to_string(),
                });
            }
            drop(entry);
        }
        self.store.insert(playlist.id.as_i64(), playlist.clone());
        Ok(())
    }

    async fn delete(&self, id: &PlaylistId) -> Result<(), PlaylistError> {
        if let Some((_, playlist)) = self.store.remove(&id.as_i64()) {
            if playlist.is_default {
                self.default_index
                    .remove(&(playlist.owner.id.as_i64(), playlist.kind.name()));
            }
        }
        Ok(())
    }

    async fn add_song_idempotent(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
        duration_secs: i64,
    ) -> Result<(), PlaylistError> {
        self.with_playlist(playlist_id, |p| {
            p.add_song_idempotent(song_id.clone(), duration_secs);
        })
    }

    async fn remove_song_if_present(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
        duration_secs: i64,
    ) -> Result<(), PlaylistError> {
        self.with_playlist(playlist_id, |p| {
            p.remove_song_if_present(song_id, duration_secs);
        })
    }

    async fn move_to_front_bounded(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
        duration_secs: i64,
        max_size: usize,
    ) -> Result<(), PlaylistError> {
        self.with_playlist(playlist_id, |p| {
            p.move_to_front_bounded(song_id.clone(), duration_secs, max_size);
        })
    }
}
