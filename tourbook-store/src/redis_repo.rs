use redis::RedisResult;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Fixed-window counter. Returns `true` while `key` is within `limit`
    /// hits for the current window.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

pub fn rate_limit_key(client_ip: &str) -> String {
    format!("rate_limit:{}", client_ip)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key() {
        assert_eq!(rate_limit_key("10.0.0.1"), "rate_limit:10.0.0.1");
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(RedisClient::new("not-a-redis-url").is_err());
    }
}
