use application::command::shared::IdGenerator;
use application::error::AppError;
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

const NODE_ID_BITS: i64 = 10;
const SEQUENCE_BITS: i64 = 12;
const MAX_NODE_ID: i64 = (1 << NODE_ID_BITS) - 1;
const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;
const TIMESTAMP_SHIFT: i64 = NODE_ID_BITS + SEQUENCE_BITS;
const NODE_ID_SHIFT: i64 = SEQUENCE_BITS;
const EPOCH: i64 = 1609459200000; // 2021-01-01 00:00:00 UTC

/// 雪花算法ID生成器
pub struct SnowflakeIdGenerator {
    node_id: i64,
    // (上一个时间戳, 序列号)，单锁保护避免两把锁的获取顺序问题
    state: Mutex<(i64, i64)>,
}

impl SnowflakeIdGenerator {
    /// 创建新的雪花算法ID生成器
    pub fn new(node_id: i64) -> Result<Self, AppError> {
        if node_id > MAX_NODE_ID {
            return Err(AppError::InvalidInput(format!(
                "node id must not exceed {}",
                MAX_NODE_ID
            )));
        }
        Ok(Self {
            node_id,
            state: Mutex::new((0, 0)),
        })
    }

    fn now_millis() -> Result<i64, AppError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .map_err(|e| AppError::UnknownError(format!("system clock error: {}", e)))
    }

    fn compose(&self, timestamp: i64, sequence: i64) -> i64 {
        ((timestamp - EPOCH) << TIMESTAMP_SHIFT) | (self.node_id << NODE_ID_SHIFT) | sequence
    }

    /// 等待下一个毫秒
    async fn wait_next_millis(last_timestamp: i64) -> Result<i64, AppError> {
        let mut timestamp = Self::now_millis()?;
        while timestamp <= last_timestamp {
            tokio::time::sleep(tokio::time::Duration::from_micros(100)).await;
            timestamp = Self::now_millis()?;
        }
        Ok(timestamp)
    }
}

#[async_trait]
impl IdGenerator for SnowflakeIdGenerator {
    async fn next_id(&self) -> Result<i64, AppError> {
        let mut state = self.state.lock().await;
        let (last_timestamp, sequence) = *state;

        let mut timestamp = Self::now_millis()?;
        if timestamp < last_timestamp {
            return Err(AppError::UnknownError(
                "clock moved backwards, refusing to generate id".to_string(),
            ));
        }

        let sequence = if timestamp == last_timestamp {
            let next = (sequence + 1) & MAX_SEQUENCE;
            if next == 0 {
                timestamp = Self::wait_next_millis(last_timestamp).await?;
            }
            next
        } else {
            0
        };

        *state = (timestamp, sequence);
        Ok(self.compose(timestamp, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn generated_ids_are_unique_and_monotonic() {
        let generator = SnowflakeIdGenerator::new(1).unwrap();
        let mut ids = HashSet::new();
        let mut prev = 0;
        for _ in 0..1000 {
            let id = generator.next_id().await.unwrap();
            assert!(ids.insert(id), "duplicate id: {}", id);
            assert!(id > prev);
            prev = id;
        }
    }

    #[test]
    fn rejects_out_of_range_node_id() {
        assert!(SnowflakeIdGenerator::new(MAX_NODE_ID + 1).is_err());
        assert!(SnowflakeIdGenerator::new(MAX_NODE_ID).is_ok());
    }
}
