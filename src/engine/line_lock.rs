// ==========================================
// 产线排产系统 - 产线互斥锁
// ==========================================
// 约束: 同一产线的读-改-写串行化; 不同产线互不阻塞
// 范围: 注册表自身的锁只在取句柄时持有
// ==========================================

use crate::repository::error::RepositoryError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 产线锁注册表
#[derive(Default)]
pub struct LineLockRegistry {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LineLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, line_uuid: &str) -> Result<Arc<Mutex<()>>, RepositoryError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        Ok(locks
            .entry(line_uuid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone())
    }

    /// 在产线锁内执行闭包
    ///
    /// 锁内不保护内存数据（数据在 SQLite 事务中）, 持有者 panic 导致的中毒直接恢复
    pub fn with_line_lock<T, E, F>(&self, line_uuid: &str, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let handle = self.handle(line_uuid)?;
        let _guard = handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        tracing::trace!(line_uuid, "产线锁已获取");
        f()
    }

    /// 已登记的产线数
    pub fn tracked_lines(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_different_lines_do_not_block() {
        let registry = Arc::new(LineLockRegistry::new());
        let (a_in, a_rx) = mpsc::channel::<()>();
        let (b_in, b_rx) = mpsc::channel::<()>();

        let r1 = registry.clone();
        let t1 = thread::spawn(move || {
            r1.with_line_lock::<_, RepositoryError, _>("L1", || {
                a_in.send(()).unwrap();
                // 持有 L1 期间等待 L2 持有者进入
                Ok(b_rx.recv_timeout(Duration::from_secs(5)).is_ok())
            })
        });

        let r2 = registry.clone();
        let t2 = thread::spawn(move || {
            a_rx.recv_timeout(Duration::from_secs(5)).unwrap();
            r2.with_line_lock::<_, RepositoryError, _>("L2", || {
                b_in.send(()).unwrap();
                Ok(())
            })
        });

        assert!(t1.join().unwrap().unwrap(), "L2 应在 L1 持有期间获取成功");
        t2.join().unwrap().unwrap();
        assert_eq!(registry.tracked_lines(), 2);
    }

    #[test]
    fn test_same_line_serializes() {
        let registry = Arc::new(LineLockRegistry::new());
        let counter = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                let counter = counter.clone();
                thread::spawn(move || {
                    registry
                        .with_line_lock::<_, RepositoryError, _>("L1", || {
                            counter.lock().unwrap().push(("enter", i));
                            thread::sleep(Duration::from_millis(5));
                            counter.lock().unwrap().push(("leave", i));
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // 进入/离开必须成对相邻
        let events = counter.lock().unwrap();
        for pair in events.chunks(2) {
            assert_eq!(pair[0].0, "enter");
            assert_eq!(pair[1].0, "leave");
            assert_eq!(pair[0].1, pair[1].1);
        }
    }
}
