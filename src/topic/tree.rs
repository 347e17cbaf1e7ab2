use std::collections::{BTreeSet, HashMap};

use super::path::{segments, ROOT};
use crate::identity::ClientId;

/// Узел дерева топиков.
///
/// Узлы создаются лениво при первом обращении и никогда не удаляются.
#[derive(Debug, Default)]
pub struct TopicNode {
    children: HashMap<String, TopicNode>,
    subscribers: BTreeSet<ClientId>,
    publishers: BTreeSet<ClientId>,
}

/// Иерархический индекс топиков.
///
/// Каждый путь (после канонизации) соответствует ровно одному узлу. Узел
/// хранит множества подписчиков и издателей; повторная вставка того же
/// идентификатора ничего не меняет.
#[derive(Debug, Default)]
pub struct TopicTree {
    root: TopicNode,
}

/// Размер дерева для диагностики.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub nodes: usize,
    pub subscriptions: usize,
    pub publications: usize,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl TopicNode {
    pub fn subscribers(&self) -> impl Iterator<Item = &ClientId> {
        self.subscribers.iter()
    }

    pub fn publishers(&self) -> impl Iterator<Item = &ClientId> {
        self.publishers.iter()
    }

    pub fn child(
        &self,
        segment: &str,
    ) -> Option<&TopicNode> {
        self.children.get(segment)
    }

    fn purge(
        &mut self,
        id: &ClientId,
    ) -> usize {
        let mut removed = usize::from(self.subscribers.remove(id));
        removed += usize::from(self.publishers.remove(id));
        for child in self.children.values_mut() {
            removed += child.purge(id);
        }
        removed
    }

    fn accumulate(
        &self,
        stats: &mut TreeStats,
    ) {
        stats.nodes += 1;
        stats.subscriptions += self.subscribers.len();
        stats.publications += self.publishers.len();
        for child in self.children.values() {
            child.accumulate(stats);
        }
    }
}

impl TopicTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Спускается от корня, создавая недостающие узлы. Всегда успешен.
    pub fn resolve(
        &mut self,
        path: &str,
    ) -> &mut TopicNode {
        segments(path).fold(&mut self.root, |node, seg| {
            node.children.entry(seg.to_string()).or_default()
        })
    }

    /// Ищет узел без создания.
    pub fn find(
        &self,
        path: &str,
    ) -> Option<&TopicNode> {
        let mut node = &self.root;
        for seg in segments(path) {
            node = node.children.get(seg)?;
        }
        Some(node)
    }

    /// Добавляет подписчика. Возвращает `false`, если он уже был подписан.
    pub fn subscribe(
        &mut self,
        id: &ClientId,
        path: &str,
    ) -> bool {
        self.resolve(path).subscribers.insert(id.clone())
    }

    /// Удаляет подписчика. Возвращает `false`, если подписки не было.
    pub fn unsubscribe(
        &mut self,
        id: &ClientId,
        path: &str,
    ) -> bool {
        self.resolve(path).subscribers.remove(id)
    }

    /// Фиксирует намерение публиковать. Проверки прав нет.
    pub fn grant_publish(
        &mut self,
        id: &ClientId,
        path: &str,
    ) -> bool {
        self.resolve(path).publishers.insert(id.clone())
    }

    pub fn revoke_publish(
        &mut self,
        id: &ClientId,
        path: &str,
    ) -> bool {
        self.resolve(path).publishers.remove(id)
    }

    /// Обходит путь от корня и вызывает `visit(ancestor_path, subscriber)`
    /// для каждого подписчика каждого узла на пути.
    ///
    /// Порядок: корень (как `/`), затем каждый следующий префикс, последним
    /// идёт сам `path`. Потомки `path` не посещаются. Отсутствующие узлы
    /// не создаются: обход просто останавливается.
    pub fn publish<F>(
        &self,
        path: &str,
        mut visit: F,
    ) where
        F: FnMut(&str, &ClientId),
    {
        let mut node = &self.root;
        for id in &node.subscribers {
            visit(ROOT, id);
        }

        let mut acc = String::new();
        for seg in segments(path) {
            let Some(next) = node.children.get(seg) else {
                return;
            };
            node = next;
            acc.push('/');
            acc.push_str(seg);
            for id in &node.subscribers {
                visit(&acc, id);
            }
        }
    }

    /// Удаляет `id` из всех множеств дерева. Возвращает число удалённых
    /// записей.
    pub fn purge(
        &mut self,
        id: &ClientId,
    ) -> usize {
        self.root.purge(id)
    }

    pub fn is_subscribed(
        &self,
        id: &ClientId,
        path: &str,
    ) -> bool {
        self.find(path)
            .is_some_and(|node| node.subscribers.contains(id))
    }

    pub fn is_publisher(
        &self,
        id: &ClientId,
        path: &str,
    ) -> bool {
        self.find(path)
            .is_some_and(|node| node.publishers.contains(id))
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.root.accumulate(&mut stats);
        stats
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
