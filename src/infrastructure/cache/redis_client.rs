// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use redis::{AsyncCommands, Direction};

/// Redis客户端
///
/// 提供任务队列与取消登记所需的列表和集合操作
#[derive(Clone)]
pub struct RedisClient {
    /// Redis客户端
    client: redis::Client,
}

impl RedisClient {
    /// 创建新的Redis客户端实例
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    ///
    /// # 返回值
    ///
    /// * `Ok(RedisClient)` - Redis客户端实例
    /// * `Err(anyhow::Error)` - URL 无法解析
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// 检查连接是否可用
    pub async fn ping(&self) -> Result<()> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<()>(&mut con).await?;
        Ok(())
    }

    /// 将值推入列表头部
    ///
    /// # 参数
    ///
    /// * `key` - 列表键
    /// * `value` - 值
    ///
    /// # 返回值
    ///
    /// * `Ok(usize)` - 推入后的列表长度
    /// * `Err(anyhow::Error)` - 推入过程中出现的错误
    pub async fn lpush(&self, key: &str, value: &str) -> Result<usize> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let len: usize = con.lpush(key, value).await?;
        Ok(len)
    }

    /// 原子地从一个列表移动元素到另一个列表
    ///
    /// # 参数
    ///
    /// * `source` - 源列表键
    /// * `destination` - 目标列表键
    /// * `from` - 从源列表的哪一端弹出
    /// * `to` - 推入目标列表的哪一端
    ///
    /// # 返回值
    ///
    /// * `Ok(Some(String))` - 被移动的元素
    /// * `Ok(None)` - 源列表为空
    pub async fn lmove(
        &self,
        source: &str,
        destination: &str,
        from: Direction,
        to: Direction,
    ) -> Result<Option<String>> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let value: Option<String> = con.lmove(source, destination, from, to).await?;
        Ok(value)
    }

    /// 从列表中移除一个等于 `value` 的元素
    ///
    /// # 返回值
    ///
    /// * `Ok(usize)` - 实际移除的数量
    pub async fn lrem(&self, key: &str, value: &str) -> Result<usize> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let removed: usize = con.lrem(key, 1, value).await?;
        Ok(removed)
    }

    /// 获取列表长度
    pub async fn llen(&self, key: &str) -> Result<usize> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let len: usize = con.llen(key).await?;
        Ok(len)
    }

    /// 向集合添加成员
    pub async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.sadd::<_, _, ()>(key, member).await?;
        Ok(())
    }

    /// 从集合移除成员
    pub async fn srem(&self, key: &str, member: &str) -> Result<()> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.srem::<_, _, ()>(key, member).await?;
        Ok(())
    }

    /// 判断成员是否在集合中
    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let found: bool = con.sismember(key, member).await?;
        Ok(found)
    }
}
