//! バルク操作の fan-out / fan-in
//!
//! 対象 1 件につき 1 タスクを起動し、ちょうど件数分の結果を受け取ってから返る。
//! 結果の送信はワーカーではなくコーディネータ側のタスクが行うため、
//! ワーカーがエラーを返しても panic しても必ず 1 件ずつ結果が届く。

use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, warn};

/// 1 件分の結果。発生元の id を持つので完了順が前後しても行を特定できる。
#[derive(Debug)]
pub struct BatchResult<T> {
    pub id: String,
    pub outcome: anyhow::Result<T>,
}

pub struct BatchOperationCoordinator {
    /// 同時実行数の上限。None なら件数分すべて同時に走らせる。
    concurrency: Option<usize>,
}

impl BatchOperationCoordinator {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: (concurrency > 0).then_some(concurrency),
        }
    }

    pub fn unbounded() -> Self {
        Self { concurrency: None }
    }

    /// `items` (id, 記述子) ごとに `worker` を実行し、結果ごとに `on_result` を呼ぶ。
    ///
    /// コールバックは受信ループの中で完了順に同期的に呼ばれる。受け取った件数を返す。
    pub async fn run<D, T, W, Fut>(
        &self,
        items: Vec<(String, D)>,
        worker: W,
        mut on_result: impl FnMut(BatchResult<T>),
    ) -> usize
    where
        D: Send + 'static,
        T: Send + 'static,
        W: Fn(D) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let total = items.len();
        if total == 0 {
            return 0;
        }

        // 受信側が 1 件ずつ取り出すまで送信側は待つ
        let (tx, mut rx) = mpsc::channel::<BatchResult<T>>(1);
        let semaphore = self.concurrency.map(|n| Arc::new(Semaphore::new(n)));
        let worker = Arc::new(worker);

        for (id, descriptor) in items {
            let tx = tx.clone();
            let worker = Arc::clone(&worker);
            let semaphore = semaphore.clone();
            tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let handle = tokio::spawn(async move { worker(descriptor).await });
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        warn!("Batch worker for {} aborted: {}", id, e);
                        Err(anyhow!("worker failed: {}", e))
                    }
                };
                if tx.send(BatchResult { id, outcome }).await.is_err() {
                    debug!("Batch receiver dropped before all results arrived");
                }
            });
        }
        drop(tx);

        let mut received = 0;
        while received < total {
            match rx.recv().await {
                Some(result) => {
                    received += 1;
                    on_result(result);
                }
                None => break,
            }
        }
        received
    }
}
