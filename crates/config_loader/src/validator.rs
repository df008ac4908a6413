//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个监听或外呼端点
//! - host 非空
//! - max_connections >= 1
//! - 插件名非空
//! - chunk_size / tick 非零
//! - initial_timeout_ms <= max_timeout_ms

use contracts::{HubConfig, HubError, LogFormat};

/// 校验 HubConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &HubConfig) -> Result<(), HubError> {
    validate_endpoint_presence(config)?;
    validate_listen_specs(config)?;
    validate_remote_specs(config)?;
    validate_logging(config)?;
    validate_engine(config)?;
    validate_reconnect(config)?;
    Ok(())
}

/// 至少需要一个端点
fn validate_endpoint_presence(config: &HubConfig) -> Result<(), HubError> {
    if config.endpoint_count() == 0 {
        return Err(HubError::config_validation(
            "listen / remote",
            "you must specify at least one --local or --remote endpoint",
        ));
    }
    Ok(())
}

/// 校验监听端点
fn validate_listen_specs(config: &HubConfig) -> Result<(), HubError> {
    for (idx, spec) in config.listen.iter().enumerate() {
        if spec.host.is_empty() {
            return Err(HubError::config_validation(
                format!("listen[{idx}].host"),
                "host cannot be empty",
            ));
        }
        if spec.max_connections < 1 {
            return Err(HubError::config_validation(
                format!("listen[{idx}].max_connections"),
                format!(
                    "max_connections must be a positive number, got {}",
                    spec.max_connections
                ),
            ));
        }
    }
    Ok(())
}

/// 校验外呼端点
fn validate_remote_specs(config: &HubConfig) -> Result<(), HubError> {
    for (idx, spec) in config.remote.iter().enumerate() {
        if spec.host.is_empty() {
            return Err(HubError::config_validation(
                format!("remote[{idx}].host"),
                "host cannot be empty",
            ));
        }
        if spec.port == 0 {
            return Err(HubError::config_validation(
                format!("remote[{idx}].port"),
                "cannot dial port 0",
            ));
        }
    }
    Ok(())
}

/// 校验流量日志配置
fn validate_logging(config: &HubConfig) -> Result<(), HubError> {
    if let LogFormat::Plugin(name) = &config.logging.format {
        if name.is_empty() {
            return Err(HubError::config_validation(
                "logging.format",
                "plugin name cannot be empty",
            ));
        }
    }
    Ok(())
}

/// 校验事件循环参数
fn validate_engine(config: &HubConfig) -> Result<(), HubError> {
    let engine = &config.engine;
    if engine.chunk_size == 0 {
        return Err(HubError::config_validation(
            "engine.chunk_size",
            "chunk_size must be > 0",
        ));
    }
    if engine.tick_ms == 0 {
        return Err(HubError::config_validation(
            "engine.tick_ms",
            "tick_ms must be > 0",
        ));
    }
    if engine.max_pending_bytes < engine.chunk_size {
        return Err(HubError::config_validation(
            "engine.max_pending_bytes",
            format!(
                "max_pending_bytes ({}) must be >= chunk_size ({})",
                engine.max_pending_bytes, engine.chunk_size
            ),
        ));
    }
    Ok(())
}

/// 校验重连策略
fn validate_reconnect(config: &HubConfig) -> Result<(), HubError> {
    let reconnect = &config.reconnect;
    if reconnect.initial_timeout_ms == 0 {
        return Err(HubError::config_validation(
            "reconnect.initial_timeout_ms",
            "initial_timeout_ms must be > 0",
        ));
    }
    if reconnect.initial_timeout_ms > reconnect.max_timeout_ms {
        return Err(HubError::config_validation(
            "reconnect.initial_timeout_ms / reconnect.max_timeout_ms",
            format!(
                "initial_timeout_ms ({}) must be <= max_timeout_ms ({})",
                reconnect.initial_timeout_ms, reconnect.max_timeout_ms
            ),
        ));
    }
    Ok(())
}
