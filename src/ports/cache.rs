use std::time::Duration;

pub trait SnapshotCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str, ttl: Duration);
    fn invalidate(&self, key: &str);
}
