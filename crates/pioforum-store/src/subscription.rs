//! Live query handle.
//!
//! A [`Subscription`] yields the full result of a query once on open and
//! again after every write that may have changed it. The feeding task is
//! aborted when the handle is dropped, so releasing a subscription is just
//! dropping it.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;

pub struct Subscription<T> {
    rx: mpsc::Receiver<Result<T>>,
    task: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    /// Wrap a snapshot queue fed by `task`.
    pub fn new(rx: mpsc::Receiver<Result<T>>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// Wrap a snapshot queue fed by something the caller owns.
    pub fn from_receiver(rx: mpsc::Receiver<Result<T>>) -> Self {
        Self { rx, task: None }
    }

    /// Next snapshot. `None` once the subscription has ended; an `Err` item is
    /// always the last one.
    pub async fn recv(&mut self) -> Option<Result<T>> {
        self.rx.recv().await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T> Stream for Subscription<T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("owns_task", &self.task.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn test_stream_yields_until_sender_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let mut sub = Subscription::from_receiver(rx);

        tx.send(Ok(1)).await.unwrap();
        tx.send(Ok(2)).await.unwrap();
        drop(tx);

        assert_eq!(sub.next().await.unwrap().unwrap(), 1);
        assert_eq!(sub.recv().await.unwrap().unwrap(), 2);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_aborts_task() {
        let (_tx, rx) = mpsc::channel::<Result<u32>>(1);
        let (guard_tx, guard_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _guard = guard_tx;
            std::future::pending::<()>().await;
        });

        drop(Subscription::new(rx, task));
        assert!(guard_rx.await.is_err());
    }
}
