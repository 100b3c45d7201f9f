//! Worker-Pool – feste Anzahl Worker, gemeinsame Aufgaben-Queue
//!
//! Beim Start werden `worker_count` Worker-Tasks gestartet. Aufgaben landen
//! in einer FIFO-Queue; `add_task` weckt genau einen wartenden Worker.
//! `stop` setzt das Stop-Flag, weckt alle Worker und wartet auf sie. Worker
//! arbeiten die Queue vor dem Beenden noch ab.
//!
//! Eine Aufgabe, die panict, wird protokolliert; der Worker laeuft weiter.

use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

type Aufgabe = BoxFuture<'static, ()>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("Worker-Pool ist gestoppt")]
    Stopped,
}

struct PoolInner {
    queue: Mutex<VecDeque<Aufgabe>>,
    signal: Notify,
    gestoppt: AtomicBool,
}

/// Pool aus tokio-Tasks, die Aufgaben aus einer gemeinsamen Queue abarbeiten
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    worker: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl WorkerPool {
    /// Startet den Pool; muss innerhalb einer tokio-Runtime aufgerufen werden
    pub fn start(worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let inner = Arc::new(PoolInner {
            queue: Mutex::new(VecDeque::new()),
            signal: Notify::new(),
            gestoppt: AtomicBool::new(false),
        });

        let worker = (0..worker_count)
            .map(|nr| tokio::spawn(worker_schleife(nr, Arc::clone(&inner))))
            .collect();

        tracing::debug!(worker = worker_count, "Worker-Pool gestartet");

        Self {
            inner,
            worker: Mutex::new(worker),
            worker_count,
        }
    }

    /// Reiht eine Aufgabe ein und weckt einen Worker
    pub fn add_task<F>(&self, aufgabe: F) -> Result<(), PoolError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        {
            // Flag unter der Queue-Sperre pruefen, sonst koennte die Aufgabe
            // nach dem letzten Worker-Durchlauf liegen bleiben
            let mut queue = self.inner.queue.lock();
            if self.inner.gestoppt.load(Ordering::Acquire) {
                return Err(PoolError::Stopped);
            }
            queue.push_back(Box::pin(aufgabe));
        }
        self.inner.signal.notify_one();
        Ok(())
    }

    /// Stoppt den Pool und wartet, bis alle Worker beendet sind
    pub async fn stop(&self) {
        {
            let _queue = self.inner.queue.lock();
            self.inner.gestoppt.store(true, Ordering::Release);
        }
        self.inner.signal.notify_waiters();

        let worker = std::mem::take(&mut *self.worker.lock());
        for handle in worker {
            if let Err(e) = handle.await {
                tracing::error!(fehler = %e, "Worker konnte nicht beendet werden");
            }
        }
        tracing::debug!("Worker-Pool gestoppt");
    }

    /// Anzahl wartender Aufgaben
    pub fn queued(&self) -> usize {
        self.inner.queue.lock().len()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn ist_gestoppt(&self) -> bool {
        self.inner.gestoppt.load(Ordering::Acquire)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.inner.gestoppt.store(true, Ordering::Release);
        self.inner.signal.notify_waiters();
    }
}

async fn worker_schleife(nr: usize, inner: Arc<PoolInner>) {
    loop {
        // Vor dem Pruefen der Queue anmelden, damit kein Signal verloren geht
        let benachrichtigt = inner.signal.notified();
        tokio::pin!(benachrichtigt);
        benachrichtigt.as_mut().enable();

        let aufgabe = {
            let mut queue = inner.queue.lock();
            match queue.pop_front() {
                Some(aufgabe) => Some(aufgabe),
                None if inner.gestoppt.load(Ordering::Acquire) => break,
                None => None,
            }
        };

        match aufgabe {
            Some(aufgabe) => {
                if AssertUnwindSafe(aufgabe).catch_unwind().await.is_err() {
                    tracing::error!(worker = nr, "Aufgabe ist abgestuerzt");
                }
            }
            None => benachrichtigt.await,
        }
    }
    tracing::trace!(worker = nr, "Worker beendet");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn alle_aufgaben_werden_ausgefuehrt() {
        let pool = WorkerPool::start(4);
        let zaehler = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let zaehler = Arc::clone(&zaehler);
            pool.add_task(async move {
                tokio::task::yield_now().await;
                zaehler.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.stop().await;
        assert_eq!(zaehler.load(Ordering::SeqCst), 100);
        assert_eq!(pool.queued(), 0);
    }

    #[tokio::test]
    async fn nach_stop_abgelehnt() {
        let pool = WorkerPool::start(2);
        pool.stop().await;
        assert!(pool.ist_gestoppt());
        assert_eq!(pool.add_task(async {}), Err(PoolError::Stopped));
    }

    #[tokio::test]
    async fn panik_beendet_worker_nicht() {
        let pool = WorkerPool::start(1);
        let (tx, rx) = tokio::sync::oneshot::channel();

        pool.add_task(async { panic!("absichtlich") }).unwrap();
        pool.add_task(async move {
            let _ = tx.send(());
        })
        .unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .expect("zweite Aufgabe nicht ausgefuehrt")
            .unwrap();
        pool.stop().await;
    }

    #[tokio::test]
    async fn worker_anzahl_begrenzt_parallelitaet() {
        let pool = WorkerPool::start(2);
        let aktiv = Arc::new(AtomicUsize::new(0));
        let maximum = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let aktiv = Arc::clone(&aktiv);
            let maximum = Arc::clone(&maximum);
            pool.add_task(async move {
                let jetzt = aktiv.fetch_add(1, Ordering::SeqCst) + 1;
                maximum.fetch_max(jetzt, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                aktiv.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.stop().await;
        assert_eq!(pool.worker_count(), 2);
        assert!(maximum.load(Ordering::SeqCst) <= 2);
    }
}
