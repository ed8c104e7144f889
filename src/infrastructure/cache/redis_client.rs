// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use async_trait::async_trait;
use redis::AsyncCommands;

use crate::presentation::middleware::rate_limit_middleware::WindowCounter;

/// Redis客户端
///
/// 提供对Redis数据库的异步操作接口
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
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// 增加键的值
    ///
    /// # 返回值
    ///
    /// * `Ok(i64)` - 增加后的值
    pub async fn incr(&self, key: &str) -> Result<i64> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        let value: i64 = con.incr(key, 1).await?;
        Ok(value)
    }

    /// 设置键的过期时间（秒）
    pub async fn expire(&self, key: &str, seconds: u64) -> Result<()> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        con.expire::<_, ()>(key, seconds as i64).await?;
        Ok(())
    }

    /// 检查连接是否可用
    pub async fn ping(&self) -> Result<()> {
        let mut con = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut con).await?;
        Ok(())
    }
}

#[async_trait]
impl WindowCounter for RedisClient {
    async fn hit(&self, key: &str, window_secs: u64) -> Result<i64> {
        let count = self.incr(key).await?;
        // 窗口内第一次请求时设置过期，过期后计数归零
        if count == 1 {
            self.expire(key, window_secs).await?;
        }
        Ok(count)
    }
}
