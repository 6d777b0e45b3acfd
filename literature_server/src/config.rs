//! 服务器配置，来自环境变量 (可以放在 .env 文件里)，命令行参数优先。

use std::net::SocketAddr;
use std::str::FromStr;

use thiserror::Error;

const DEFAULT_BIND: &str = "0.0.0.0:25917";
const DEFAULT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 监听地址
    pub bind: SocketAddr,
    /// 每个连接的待发送消息队列长度
    pub channel_capacity: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("环境变量 {var} 的值 {value:?} 无效")]
    InvalidValue { var: &'static str, value: String },
    #[error("{0} 必须大于 0")]
    MustBePositive(&'static str),
}

impl ServerConfig {
    pub fn from_env(bind_override: Option<SocketAddr>) -> Result<Self, ConfigError> {
        Self::from_lookup(bind_override, |var| std::env::var(var).ok())
    }

    fn from_lookup(
        bind_override: Option<SocketAddr>,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(addr) => addr,
            None => parse_or("LITERATURE_BIND", &lookup, DEFAULT_BIND.parse().ok())?,
        };
        let channel_capacity = parse_or("LITERATURE_CHANNEL_CAPACITY", &lookup, Some(DEFAULT_CHANNEL_CAPACITY))?;
        if channel_capacity == 0 {
            return Err(ConfigError::MustBePositive("LITERATURE_CHANNEL_CAPACITY"));
        }
        Ok(ServerConfig { bind, channel_capacity })
    }
}

fn parse_or<T: FromStr>(
    var: &'static str,
    lookup: &impl Fn(&'static str) -> Option<String>,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue { var, value }),
        None => default.ok_or(ConfigError::InvalidValue { var, value: String::new() }),
    }
}
