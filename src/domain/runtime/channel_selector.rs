use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Picks the output channels a record is written to.
pub trait ChannelSelector<T>: Send {
    fn select_channels(&mut self, record: &T, number_of_channels: usize) -> Vec<usize>;
}

#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    next: usize,
}

impl<T> ChannelSelector<T> for RoundRobinSelector {
    fn select_channels(&mut self, _record: &T, number_of_channels: usize) -> Vec<usize> {
        if number_of_channels == 0 {
            return Vec::new();
        }
        let selected = self.next % number_of_channels;
        self.next = (selected + 1) % number_of_channels;
        vec![selected]
    }
}

/// Routes records with equal keys to the same channel.
pub struct KeyHashSelector<F> {
    key: F,
}

impl<F> KeyHashSelector<F> {
    pub fn new(key: F) -> Self {
        KeyHashSelector { key }
    }
}

impl<T, K, F> ChannelSelector<T> for KeyHashSelector<F>
where
    K: Hash,
    F: Fn(&T) -> K + Send,
{
    fn select_channels(&mut self, record: &T, number_of_channels: usize) -> Vec<usize> {
        if number_of_channels == 0 {
            return Vec::new();
        }
        let mut hasher = DefaultHasher::new();
        (self.key)(record).hash(&mut hasher);
        vec![(hasher.finish() % number_of_channels as u64) as usize]
    }
}

#[derive(Debug, Default)]
pub struct BroadcastSelector;

impl<T> ChannelSelector<T> for BroadcastSelector {
    fn select_channels(&mut self, _record: &T, number_of_channels: usize) -> Vec<usize> {
        (0..number_of_channels).collect()
    }
}
