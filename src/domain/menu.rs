//! Navigation menu cache.
//!
//! Menus are loaded with their flat item lists; the snapshot also keeps each
//! menu's items nested by `parent_id` and ordered by `position`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::CacheStats;
use crate::domain::snapshot::LazySnapshot;
use crate::error::Result;
use crate::source::{DataSource, Menu, MenuItem};

#[derive(Debug, Default)]
struct MenuSnapshot {
    by_name: HashMap<String, Menu>,
    name_by_id: HashMap<i64, String>,
    trees: HashMap<String, Vec<MenuItem>>,
}

impl MenuSnapshot {
    fn build(menus: Vec<Menu>) -> Self {
        let mut snapshot = Self::default();
        for menu in menus {
            snapshot.trees.insert(menu.name.clone(), build_tree(&menu.items));
            snapshot.name_by_id.insert(menu.id, menu.name.clone());
            snapshot.by_name.insert(menu.name.clone(), menu);
        }
        snapshot
    }
}

/// Nests flat items under their parents. Items whose parent is missing become
/// roots; items caught in a parent cycle are dropped.
fn build_tree(items: &[MenuItem]) -> Vec<MenuItem> {
    let ids: HashSet<i64> = items.iter().map(|item| item.id).collect();
    let mut children: HashMap<Option<i64>, Vec<&MenuItem>> = HashMap::new();
    for item in items {
        let parent = item.parent_id.filter(|p| ids.contains(p) && *p != item.id);
        children.entry(parent).or_default().push(item);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
    }

    let mut visited = HashSet::new();
    attach(None, &children, &mut visited)
}

fn attach(
    parent: Option<i64>,
    children: &HashMap<Option<i64>, Vec<&MenuItem>>,
    visited: &mut HashSet<i64>,
) -> Vec<MenuItem> {
    let Some(siblings) = children.get(&parent) else {
        return Vec::new();
    };
    let mut nodes = Vec::with_capacity(siblings.len());
    for item in siblings {
        if !visited.insert(item.id) {
            continue;
        }
        let mut node = (*item).clone();
        node.children = attach(Some(item.id), children, visited);
        nodes.push(node);
    }
    nodes
}

// == Menu Cache ==
/// Every menu with name and id indices, loaded together.
pub struct MenuCache {
    source: Arc<dyn DataSource>,
    snapshot: LazySnapshot<MenuSnapshot>,
}

impl MenuCache {
    /// Creates an unloaded cache reading from `source`.
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self {
            source,
            snapshot: LazySnapshot::new("menus", |s: &MenuSnapshot| s.by_name.len()),
        }
    }

    async fn load(&self) -> Result<MenuSnapshot> {
        Ok(MenuSnapshot::build(self.source.list_menus().await?))
    }

    /// Every menu, sorted by name.
    pub async fn get_all(&self) -> Result<Vec<Menu>> {
        let snapshot = self.snapshot.read(|| self.load()).await?;
        let mut menus: Vec<Menu> = snapshot.by_name.values().cloned().collect();
        menus.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(menus)
    }

    /// Menu with this name.
    ///
    /// # Arguments
    /// * `name` - Menu name, e.g. `main`
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Menu>> {
        Ok(self.snapshot.read(|| self.load()).await?.by_name.get(name).cloned())
    }

    /// Menu with this id.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Menu>> {
        let snapshot = self.snapshot.read(|| self.load()).await?;
        Ok(snapshot
            .name_by_id
            .get(&id)
            .and_then(|name| snapshot.by_name.get(name))
            .cloned())
    }

    /// The named menu's items as a tree; empty if the menu does not exist.
    pub async fn get_tree(&self, name: &str) -> Result<Vec<MenuItem>> {
        Ok(self
            .snapshot
            .read(|| self.load())
            .await?
            .trees
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    // == Invalidation ==

    /// Drops the loaded menus; the next read reloads it.
    pub async fn invalidate(&self) {
        self.snapshot.invalidate().await;
    }

    /// True once a load has succeeded and no invalidation followed.
    pub async fn is_loaded(&self) -> bool {
        self.snapshot.is_loaded().await
    }

    // == Introspection ==

    /// Hit/miss/set counters plus the current item count.
    pub fn stats(&self) -> CacheStats {
        self.snapshot.stats()
    }

    /// Zeroes the counters and records the reset time.
    pub fn reset_stats(&self) {
        self.snapshot.reset_stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ContentData, InMemorySource};

    fn item(id: i64, parent_id: Option<i64>, position: i32) -> MenuItem {
        MenuItem {
            id,
            parent_id,
            title: format!("item {id}"),
            url: format!("/{id}"),
            position,
            children: Vec::new(),
        }
    }

    fn cache() -> (Arc<InMemorySource>, MenuCache) {
        let source = Arc::new(InMemorySource::new(ContentData {
            menus: vec![
                Menu {
                    id: 1,
                    name: "main".to_string(),
                    items: vec![
                        item(10, None, 2),
                        item(11, None, 1),
                        item(12, Some(10), 1),
                        item(13, Some(99), 3),
                    ],
                },
                Menu {
                    id: 2,
                    name: "footer".to_string(),
                    items: vec![],
                },
            ],
            ..ContentData::default()
        }));
        (source.clone(), MenuCache::new(source))
    }

    #[tokio::test]
    async fn test_lookups_share_one_load() {
        let (source, cache) = cache();

        assert_eq!(cache.get_by_name("main").await.unwrap().map(|m| m.id), Some(1));
        assert_eq!(cache.get_by_id(2).await.unwrap().map(|m| m.name).as_deref(), Some("footer"));
        assert!(cache.get_by_name("sidebar").await.unwrap().is_none());
        let names: Vec<String> = cache.get_all().await.unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["footer", "main"]);

        assert_eq!(source.calls().menus, 1);
        assert_eq!(cache.stats().items, 2);
    }

    #[tokio::test]
    async fn test_tree_nesting_and_order() {
        let (_, cache) = cache();
        let tree = cache.get_tree("main").await.unwrap();

        let roots: Vec<i64> = tree.iter().map(|i| i.id).collect();
        assert_eq!(roots, vec![11, 10, 13]);
        assert_eq!(tree[1].children.iter().map(|i| i.id).collect::<Vec<_>>(), vec![12]);
        assert!(cache.get_tree("missing").await.unwrap().is_empty());
    }

    #[test]
    fn test_cycle_is_dropped() {
        let items = vec![item(1, Some(2), 0), item(2, Some(1), 0), item(3, None, 0)];
        let tree = build_tree(&items);
        assert_eq!(tree.iter().map(|i| i.id).collect::<Vec<_>>(), vec![3]);
    }
}
