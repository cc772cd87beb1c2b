//! Atomic command batches against Redis (`MULTI`/`EXEC`).

use std::collections::HashMap;

use anyhow::{Result, bail};
use async_trait::async_trait;

/// A single key-value command queued into an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Get(String),
    Set(String, String),
    Del(String),
    Expire(String, u64),
    HSet(String, Vec<(String, String)>),
    HGetAll(String),
    LPush(String, String),
    LRem(String, i64, String),
    LTrim(String, i64, i64),
    LRange(String, i64, i64),
    SAdd(String, String),
    SRem(String, String),
    SCard(String),
    SMembers(String),
}

/// Result of one queued command, in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Nil,
    Ok,
    Int(i64),
    Text(String),
    List(Vec<String>),
    Hash(HashMap<String, String>),
}

impl Reply {
    pub fn into_text(self) -> Option<String> {
        match self {
            Reply::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_int(self) -> Result<i64> {
        match self {
            Reply::Int(n) => Ok(n),
            other => bail!("expected integer reply, got {other:?}"),
        }
    }

    pub fn into_list(self) -> Vec<String> {
        match self {
            Reply::List(items) => items,
            _ => Vec::new(),
        }
    }

    /// Missing keys come back from `HGETALL` as an empty hash.
    pub fn into_hash(self) -> Option<HashMap<String, String>> {
        match self {
            Reply::Hash(hash) if !hash.is_empty() => Some(hash),
            _ => None,
        }
    }
}

/// Executes batches of commands as one indivisible unit.
///
/// Either every command in the batch is applied or, on error, callers must
/// assume none were. There is no retry here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AtomicStore: Send + Sync {
    /// Execute `ops` atomically, returning one reply per op.
    async fn execute_atomic(&self, ops: Vec<Op>) -> Result<Vec<Reply>>;

    /// Round-trip to the store, for health checks.
    async fn ping(&self) -> Result<()>;
}

/// Redis implementation of AtomicStore.
#[derive(Clone)]
pub struct RedisAtomicStore {
    client: redis::Client,
}

impl RedisAtomicStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AtomicStore for RedisAtomicStore {
    async fn execute_atomic(&self, ops: Vec<Op>) -> Result<Vec<Reply>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            match op {
                Op::Get(key) => pipe.cmd("GET").arg(key),
                Op::Set(key, value) => pipe.cmd("SET").arg(key).arg(value),
                Op::Del(key) => pipe.cmd("DEL").arg(key),
                Op::Expire(key, secs) => pipe.cmd("EXPIRE").arg(key).arg(*secs),
                Op::HSet(key, fields) => {
                    let cmd = pipe.cmd("HSET").arg(key);
                    for (field, value) in fields {
                        cmd.arg(field).arg(value);
                    }
                    cmd
                }
                Op::HGetAll(key) => pipe.cmd("HGETALL").arg(key),
                Op::LPush(key, value) => pipe.cmd("LPUSH").arg(key).arg(value),
                Op::LRem(key, count, value) => pipe.cmd("LREM").arg(key).arg(*count).arg(value),
                Op::LTrim(key, start, stop) => pipe.cmd("LTRIM").arg(key).arg(*start).arg(*stop),
                Op::LRange(key, start, stop) => {
                    pipe.cmd("LRANGE").arg(key).arg(*start).arg(*stop)
                }
                Op::SAdd(key, member) => pipe.cmd("SADD").arg(key).arg(member),
                Op::SRem(key, member) => pipe.cmd("SREM").arg(key).arg(member),
                Op::SCard(key) => pipe.cmd("SCARD").arg(key),
                Op::SMembers(key) => pipe.cmd("SMEMBERS").arg(key),
            };
        }

        let values: Vec<redis::Value> = pipe.query_async(&mut conn).await?;
        if values.len() != ops.len() {
            bail!(
                "atomic batch returned {} replies for {} commands",
                values.len(),
                ops.len()
            );
        }

        ops.iter()
            .zip(values)
            .map(|(op, value)| reply_from_value(op, &value))
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

fn reply_from_value(op: &Op, value: &redis::Value) -> Result<Reply> {
    let reply = match op {
        Op::Get(_) => match redis::from_redis_value::<Option<String>>(value)? {
            Some(text) => Reply::Text(text),
            None => Reply::Nil,
        },
        Op::Set(..) | Op::LTrim(..) => Reply::Ok,
        Op::HGetAll(_) => Reply::Hash(redis::from_redis_value(value)?),
        Op::LRange(..) | Op::SMembers(_) => Reply::List(redis::from_redis_value(value)?),
        Op::Del(_)
        | Op::Expire(..)
        | Op::HSet(..)
        | Op::LPush(..)
        | Op::LRem(..)
        | Op::SAdd(..)
        | Op::SRem(..)
        | Op::SCard(_) => Reply::Int(redis::from_redis_value(value)?),
    };
    Ok(reply)
}

#[cfg(test)]
pub use memory::MemoryStore;


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn s(value: &str) -> String {
        value.to_string()
    }

    #[tokio::test]
    async fn replies_follow_submission_order() {
        let store = MemoryStore::new();

        let replies = store
            .execute_atomic(vec![
                Op::Set(s("k"), s("v")),
                Op::Get(s("k")),
                Op::SAdd(s("set"), s("a")),
                Op::SCard(s("set")),
                Op::Get(s("missing")),
            ])
            .await
            .unwrap();

        assert_eq!(
            replies,
            vec![
                Reply::Ok,
                Reply::Text(s("v")),
                Reply::Int(1),
                Reply::Int(1),
                Reply::Nil
            ]
        );
    }

    #[tokio::test]
    async fn failing_command_does_not_roll_back_the_batch() {
        let store = MemoryStore::new();
        store
            .execute_atomic(vec![Op::Set(s("text"), s("v"))])
            .await
            .unwrap();

        let result = store
            .execute_atomic(vec![
                Op::SAdd(s("set"), s("a")),
                Op::LPush(s("text"), s("x")),
                Op::Del(s("text")),
            ])
            .await;

        assert!(result.is_err());
        assert!(store.exists("set"));
        assert!(!store.exists("text"));
    }

    #[tokio::test]
    async fn ttl_is_exact_on_the_virtual_clock() {
        let store = MemoryStore::new();
        store
            .execute_atomic(vec![Op::Set(s("k"), s("v")), Op::Expire(s("k"), 30)])
            .await
            .unwrap();

        assert_eq!(store.ttl("k"), Some(30));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.ttl("k"), Some(30));

        store.advance(Duration::from_secs(10));
        assert_eq!(store.ttl("k"), Some(20));
    }

    #[tokio::test]
    async fn unavailable_store_fails_whole_batch() {
        let store = MemoryStore::new();
        store.set_unavailable(true);

        let result = store.execute_atomic(vec![Op::Set(s("k"), s("v"))]).await;

        assert!(result.is_err());
        store.set_unavailable(false);
        assert!(!store.exists("k"));
    }

    #[tokio::test]
    async fn keys_expire_with_virtual_clock() {
        let store = MemoryStore::new();
        store
            .execute_atomic(vec![
                Op::HSet(s("h"), vec![(s("f"), s("v"))]),
                Op::Expire(s("h"), 30),
            ])
            .await
            .unwrap();

        store.advance(Duration::from_secs(29));
        assert!(store.exists("h"));

        store.advance(Duration::from_secs(1));
        let replies = store.execute_atomic(vec![Op::HGetAll(s("h"))]).await.unwrap();
        assert_eq!(replies[0].clone().into_hash(), None);
    }

    #[tokio::test]
    async fn ltrim_keeps_newest_entries() {
        let store = MemoryStore::new();
        let mut ops: Vec<Op> = (0..6).map(|i| Op::LPush(s("l"), i.to_string())).collect();
        ops.push(Op::LTrim(s("l"), 0, 3));
        ops.push(Op::LRange(s("l"), 0, 5));

        let replies = store.execute_atomic(ops).await.unwrap();

        assert_eq!(
            replies.last().cloned().unwrap().into_list(),
            vec![s("5"), s("4"), s("3"), s("2")]
        );
    }

    #[tokio::test]
    async fn empty_set_is_removed() {
        let store = MemoryStore::new();
        let replies = store
            .execute_atomic(vec![
                Op::SAdd(s("set"), s("a")),
                Op::SRem(s("set"), s("a")),
                Op::SCard(s("set")),
            ])
            .await
            .unwrap();

        assert_eq!(replies[2], Reply::Int(0));
        assert!(!store.exists("set"));
    }

    #[test]
    fn missing_hash_reads_as_none() {
        assert_eq!(Reply::Hash(Default::default()).into_hash(), None);
        assert_eq!(Reply::Nil.into_text(), None);
    }
}
