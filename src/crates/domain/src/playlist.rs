use crate::value::{PlaylistId, SongId, UserId};
use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// 播放列表领域错误
#[derive(Error, Debug)]
pub enum PlaylistError {
    #[error("Playlist not found: {0}")]
    NotFound(i64),
    #[error("Default playlist conflict for owner {owner_id}, kind {kind}")]
    DefaultConflict { owner_id: i64, kind: String },
    #[error("Unknown kind: {0}")]
    UnknownKind(String),
    #[error("Database error: {0}")]
    DbErr(String),
}

/// 播放列表类型
#[derive(Debug, PartialEq, Eq, Hash, Clone, Default)]
pub enum PlaylistKind {
    #[default]
    Custom,
    Liked,
    RecentlyPlayed,
    Favorites,
}

impl PlaylistKind {
    pub fn name(&self) -> &'static str {
        match self {
            PlaylistKind::Custom => "custom",
            PlaylistKind::Liked => "liked",
            PlaylistKind::RecentlyPlayed => "recently_played",
            PlaylistKind::Favorites => "favorites",
        }
    }

    /// 是否为注册时自动创建的默认类型
    pub fn is_default_kind(&self) -> bool {
        matches!(self, PlaylistKind::Liked | PlaylistKind::RecentlyPlayed)
    }
}

impl FromStr for PlaylistKind {
    type Err = PlaylistError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "custom" => Ok(PlaylistKind::Custom),
            "liked" => Ok(PlaylistKind::Liked),
            "recently_played" => Ok(PlaylistKind::RecentlyPlayed),
            "favorites" => Ok(PlaylistKind::Favorites),
            _ => Err(PlaylistError::UnknownKind(s.to_string())),
        }
    }
}

impl fmt::Display for PlaylistKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 播放列表所有者值对象
#[derive(Debug, Clone, PartialEq)]
pub struct Owner {
    pub id: UserId,
    pub name: String,
}

impl Default for Owner {
    fn default() -> Self {
        Self {
            id: UserId::from(0),
            name: String::new(),
        }
    }
}

/// 播放列表条目实体
///
/// 条目保存加入时刻的歌曲时长快照，总时长重算只依赖保留下来的
/// 条目自身，不回查歌曲聚合。
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub song_id: SongId,
    pub duration_secs: i64,
    pub added_at: NaiveDateTime,
}

impl PlaylistEntry {
    fn new(song_id: SongId, duration_secs: i64) -> Self {
        Self {
            song_id,
            duration_secs,
            added_at: Utc::now().naive_utc(),
        }
    }
}

/// 播放列表聚合根
///
/// 独占拥有歌曲引用序列与冗余的总时长。
/// 不变式：total_duration == 当前条目时长之和，且不为负；
/// 默认列表的类型与 is_default 标志创建后不可变。
#[derive(Debug, Clone)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub owner: Owner,
    pub kind: PlaylistKind,
    pub is_default: bool,
    pub entries: Vec<PlaylistEntry>,
    pub total_duration: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub version: i64,
}

impl Playlist {
    /// 创建自定义播放列表
    pub fn new(id: PlaylistId, name: &str, owner: Owner) -> Self {
        Self::with_kind(id, name, owner, PlaylistKind::Custom, false)
    }

    /// 创建默认播放列表（liked / recently_played）
    pub fn new_default(id: PlaylistId, name: &str, owner: Owner, kind: PlaylistKind) -> Self {
        Self::with_kind(id, name, owner, kind, true)
    }

    fn with_kind(
        id: PlaylistId,
        name: &str,
        owner: Owner,
        kind: PlaylistKind,
        is_default: bool,
    ) -> Self {
        let now = Utc::now().naive_utc();
        Self {
            id,
            name: name.to_string(),
            owner,
            kind,
            is_default,
            entries: Vec::new(),
            total_duration: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// 是否包含指定歌曲
    pub fn contains(&self, song_id: &SongId) -> bool {
        self.entries.iter().any(|e| &e.song_id == song_id)
    }

    /// 幂等加入歌曲，已存在则不做任何事
    ///
    /// 返回是否实际加入。
    pub fn add_song_idempotent(&mut self, song_id: SongId, duration_secs: i64) -> bool {
        if self.contains(&song_id) {
            return false;
        }
        self.entries.push(PlaylistEntry::new(song_id, duration_secs));
        self.total_duration += duration_secs;
        self.touch();
        true
    }

    /// 移除歌曲（若存在），总时长减去对应时长并以零为下界
    ///
    /// 返回是否实际移除。
    pub fn remove_song_if_present(&mut self, song_id: &SongId, duration_secs: i64) -> bool {
        let idx = match self.entries.iter().position(|e| &e.song_id == song_id) {
            Some(idx) => idx,
            None => return false,
        };
        self.entries.remove(idx);
        self.total_duration = (self.total_duration - duration_secs).max(0);
        self.touch();
        true
    }

    /// 移到队首并按上限截断
    ///
    /// 移除所有既有出现，再插入到队首，从队首保留 max_size 条；
    /// 总时长按保留条目重算，被截掉的条目直接丢弃其时长。
    pub fn move_to_front_bounded(&mut self, song_id: SongId, duration_secs: i64, max_size: usize) {
        self.entries.retain(|e| e.song_id != song_id);
        self.entries.insert(0, PlaylistEntry::new(song_id, duration_secs));
        self.entries.truncate(max_size);
        self.total_duration = self.entries.iter().map(|e| e.duration_secs).sum();
        self.touch();
    }

    /// 更新名称
    pub fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        self.touch();
    }

    /// 当前歌曲 ID 序列
    pub fn song_ids(&self) -> Vec<SongId> {
        self.entries.iter().map(|e| e.song_id.clone()).collect()
    }

    /// 获取条目数量
    pub fn song_count(&self) -> usize {
        self.entries.len()
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().naive_utc();
        self.version += 1;
    }
}

/// 播放列表仓储接口
///
/// 条件/幂等变更以存储层一等操作提供，实现必须保证单键原子性，
/// 调用方不得以读-改-写自行拼装（那会重新引入本设计要关闭的竞态）。
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// 根据 ID 查找
    async fn find_by_id(&self, id: &PlaylistId) -> Result<Option<Playlist>, PlaylistError>;

    /// 根据所有者与类型查找（默认列表定位入口）
    async fn find_by_owner_and_kind(
        &self,
        owner_id: &UserId,
        kind: &PlaylistKind,
    ) -> Result<Option<Playlist>, PlaylistError>;

    /// 根据所有者 ID 查找
    async fn find_by_owner_id(&self, owner_id: &UserId) -> Result<Vec<Playlist>, PlaylistError>;

    /// 保存播放列表
    ///
    /// 默认类型受 (owner, kind) 唯一约束保护，冲突返回
    /// [`PlaylistError::DefaultConflict`]。
    async fn save(&self, playlist: &Playlist) -> Result<(), PlaylistError>;

    /// 删除播放列表
    async fn delete(&self, id: &PlaylistId) -> Result<(), PlaylistError>;

    /// 幂等加入歌曲
    async fn add_song_idempotent(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
        duration_secs: i64,
    ) -> Result<(), PlaylistError>;

    /// 移除歌曲（若存在）
    async fn remove_song_if_present(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
        duration_secs: i64,
    ) -> Result<(), PlaylistError>;

    /// 移到队首并按上限截断
    async fn move_to_front_bounded(
        &self,
        playlist_id: &PlaylistId,
        song_id: &SongId,
        duration_secs: i64,
        max_size: usize,
    ) -> Result<(), PlaylistError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Owner {
        Owner {
            id: UserId::from(1),
            name: "alice".to_string(),
        }
    }

    #[test]
    fn add_song_is_idempotent() {
        let mut p = Playlist::new(PlaylistId::from(10), "mix", owner());
        assert!(p.add_song_idempotent(SongId::from(1), 100));
        assert!(!p.add_song_idempotent(SongId::from(1), 100));
        assert_eq!(p.song_count(), 1);
        assert_eq!(p.total_duration, 100);
    }

    #[test]
    fn remove_song_floors_duration_at_zero() {
        let mut p = Playlist::new(PlaylistId::from(10), "mix", owner());
        p.add_song_idempotent(SongId::from(1), 100);
        // 陈旧的时长值也不会把总时长减成负数
        assert!(p.remove_song_if_present(&SongId::from(1), 500));
        assert_eq!(p.total_duration, 0);
        assert!(!p.remove_song_if_present(&SongId::from(1), 100));
    }

    #[test]
    fn move_to_front_bounded_trims_and_recomputes() {
        let mut p = Playlist::new_default(
            PlaylistId::from(10),
            "Recently Played",
            owner(),
            PlaylistKind::RecentlyPlayed,
        );
        p.move_to_front_bounded(SongId::from(3), 30, 3); // [C]
        p.move_to_front_bounded(SongId::from(2), 20, 3); // [B,C]
        p.move_to_front_bounded(SongId::from(1), 10, 3); // [A,B,C]
        p.move_to_front_bounded(SongId::from(4), 40, 3); // [D,A,B]，C 被挤出

        assert_eq!(
            p.song_ids(),
            vec![SongId::from(4), SongId::from(1), SongId::from(2)]
        );
        assert_eq!(p.total_duration, 40 + 10 + 20);
    }

    #[test]
    fn move_to_front_relocates_existing_occurrence() {
        let mut p = Playlist::new_default(
            PlaylistId::from(10),
            "Recently Played",
            owner(),
            PlaylistKind::RecentlyPlayed,
        );
        p.move_to_front_bounded(SongId::from(1), 10, 3);
        p.move_to_front_bounded(SongId::from(2), 20, 3);
        p.move_to_front_bounded(SongId::from(1), 10, 3);

        assert_eq!(p.song_ids(), vec![SongId::from(1), SongId::from(2)]);
        assert_eq!(p.total_duration, 30);
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in [
            PlaylistKind::Custom,
            PlaylistKind::Liked,
            PlaylistKind::RecentlyPlayed,
            PlaylistKind::Favorites,
        ] {
            assert_eq!(kind.name().parse::<PlaylistKind>().unwrap(), kind);
        }
        assert!("playlist".parse::<PlaylistKind>().is_err());
    }
}
