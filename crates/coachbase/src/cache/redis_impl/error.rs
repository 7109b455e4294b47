use coachbase_core::cache::CacheError;

/// Converts a Redis failure, keeping connectivity problems distinguishable
/// from rejected commands.
pub fn map_redis_error(err: redis::RedisError) -> CacheError {
    let message = err.to_string();
    match err.kind() {
        _ if err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() => {
            CacheError::ConnectionFailed(message)
        }
        redis::ErrorKind::IoError => CacheError::ConnectionFailed(message),
        redis::ErrorKind::TypeError => CacheError::Serialization(message),
        _ => CacheError::OperationFailed(message),
    }
}
