use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

/// Process-wide per-origin concurrency cap: every in-flight request against
/// a given host, across every download the engine is running, shares one
/// semaphore of width `per_host_requests`.
#[derive(Clone)]
pub struct HostSemaphores {
    permits: usize,
    inner: Arc<Mutex<HashMap<String, Arc<Semaphore>>>>,
}

impl HostSemaphores {
    pub fn new(permits: usize) -> Self {
        Self { permits: permits.max(1), inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub fn for_host(&self, host: &str) -> Arc<Semaphore> {
        let mut map = self.inner.lock().expect("host semaphore map poisoned");
        map.entry(host.to_string()).or_insert_with(|| Arc::new(Semaphore::new(self.permits))).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_host_shares_one_semaphore_instance() {
        let hosts = HostSemaphores::new(4);
        let a = hosts.for_host("example.com");
        let b = hosts.for_host("example.com");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn distinct_hosts_get_distinct_semaphores() {
        let hosts = HostSemaphores::new(4);
        let a = hosts.for_host("a.example.com");
        let b = hosts.for_host("b.example.com");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
