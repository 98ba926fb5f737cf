//! 串行请求队列
//!
//! 保证同一时刻最多只有一个出站任务在执行，按入队顺序执行，
//! 两个任务之间固定间隔。队列空时工作任务退出，下次入队时重新启动。

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::{debug, error};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queued request was aborted before completing")]
    JobAborted,
}

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Clone)]
pub struct SerialRequestQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    state: Mutex<QueueState>,
    delay: Duration,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Job>,
    running: bool,
}

impl SerialRequestQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                delay,
            }),
        }
    }

    /// 等待执行的任务数（不含正在执行的任务）
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// 入队并等待该任务的结果
    pub async fn enqueue<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<QueueError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            async move {
                let outcome = operation().await;
                // 调用方可能已经放弃等待
                let _ = tx.send(outcome);
            }
            .boxed()
        });

        let start_worker = {
            let mut state = self.inner.lock();
            state.pending.push_back(job);
            debug!("Request queued, {} pending", state.pending.len());
            !std::mem::replace(&mut state.running, true)
        };

        if start_worker {
            tokio::spawn(Self::process(self.inner.clone()));
        }

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(QueueError::JobAborted.into()),
        }
    }

    async fn process(inner: Arc<QueueInner>) {
        loop {
            let job = {
                let mut state = inner.lock();
                match state.pending.pop_front() {
                    Some(job) => job,
                    None => {
                        state.running = false;
                        return;
                    }
                }
            };

            // 单个任务 panic 不影响后续任务
            if AssertUnwindSafe(async move { job().await })
                .catch_unwind()
                .await
                .is_err()
            {
                error!("Queued request panicked");
            }

            let more = {
                let mut state = inner.lock();
                if state.pending.is_empty() {
                    state.running = false;
                    false
                } else {
                    true
                }
            };
            if !more {
                return;
            }

            tokio::time::sleep(inner.delay).await;
        }
    }
}

impl QueueInner {
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
