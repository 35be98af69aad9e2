//! パネル間を疎結合にする同期 publish/subscribe
//!
//! コールバックは `Send` でない `Box<dyn FnMut>` なので、バスそのものも `!Send` になる。
//! そのためバックグラウンドタスクから直接 publish することはできず、
//! 結果は必ずチャネル経由で描画ループに戻してから publish する。

use std::collections::HashMap;
use std::hash::Hash;

pub type Subscriber<C, E> = Box<dyn FnMut(&mut C, &E)>;

pub struct EventBus<T, C, E> {
    subscribers: HashMap<T, Vec<Subscriber<C, E>>>,
}

impl<T, C, E> Default for EventBus<T, C, E> {
    fn default() -> Self {
        Self {
            subscribers: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash, C, E> EventBus<T, C, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// トピックの購読者リストの末尾に追加する。解除はできない。
    pub fn subscribe(&mut self, topic: T, callback: impl FnMut(&mut C, &E) + 'static) {
        self.subscribers
            .entry(topic)
            .or_default()
            .push(Box::new(callback));
    }

    /// 登録順に購読者を同期的に呼び出し、呼び出した数を返す
    pub fn publish(&mut self, topic: &T, ctx: &mut C, data: &E) -> usize {
        let Some(subscribers) = self.subscribers.get_mut(topic) else {
            return 0;
        };
        for subscriber in subscribers.iter_mut() {
            subscriber(ctx, data);
        }
        subscribers.len()
    }

    pub fn subscriber_count(&self, topic: &T) -> usize {
        self.subscribers.get(topic).map_or(0, Vec::len)
    }
}
