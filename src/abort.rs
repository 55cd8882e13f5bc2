// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接中断信号
//!
//! `AbortSignal` 是一个只能触发一次的取消信号：
//! - 一个单次赋值的标志位，可随时轮询；
//! - 一组回调，在触发时各执行一次，触发后再注册的回调会被立即执行；
//! - 一个可等待的 `aborted()`，供流式任务在 `select!` 中监听。
//!
//! 引擎在底层连接断开时调用 `abort()`，`Ctx` 与文件响应器只负责观察。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use tokio::sync::Notify;

type Callback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Inner {
    aborted: AtomicBool,
    callbacks: Mutex<Vec<Callback>>,
    notify: Notify,
}

impl Inner {
    fn callbacks(&self) -> MutexGuard<'_, Vec<Callback>> {
        match self.callbacks.lock() {
            Ok(lock) => lock,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// 可克隆的中断信号，所有克隆共享同一状态。
#[derive(Clone, Default)]
pub struct AbortSignal {
    inner: Arc<Inner>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发信号。只有第一次调用会生效并返回 `true`。
    pub fn abort(&self) -> bool {
        if self.inner.aborted.swap(true, Ordering::SeqCst) {
            return false;
        }
        let callbacks = std::mem::take(&mut *self.inner.callbacks());
        debug!("中断信号触发，执行{}个回调", callbacks.len());
        for callback in callbacks {
            callback();
        }
        self.inner.notify.notify_waiters();
        true
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// 注册一次性回调。若信号已经触发，回调在当前线程上立即执行。
    pub fn on_abort<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut callbacks = self.inner.callbacks();
        if self.is_aborted() {
            drop(callbacks);
            callback();
            return;
        }
        callbacks.push(Box::new(callback));
    }

    /// 等待信号触发；已触发时立即返回。
    pub async fn aborted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
