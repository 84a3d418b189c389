//! Catalog document model.
//!
//! The whole catalog is one document: a mapping from category to an
//! ordered sequence of [`App`] records. Position inside a sequence is the
//! display order, so edits address records by index.
//!
//! Decoding is forgiving about the shapes the remote store produces:
//!
//! - missing or `null` categories become empty sequences
//! - `null` holes inside a sequence are dropped
//! - records stored under a category sequence take that category

mod app;
mod category;
mod latest;

pub use app::App;
pub use category::Category;

use serde::{Deserialize, Deserializer, Serialize};

/// The root catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCatalog")]
pub struct Catalog {
    #[serde(rename = "top-rated")]
    pub top_rated: Vec<App>,
    pub latest: Vec<App>,
    pub pc: Vec<App>,
    pub game: Vec<App>,
    pub editing: Vec<App>,
}

/// Wire shape before normalization.
#[derive(Deserialize)]
struct RawCatalog {
    #[serde(rename = "top-rated", default, deserialize_with = "sparse_seq")]
    top_rated: Vec<App>,
    #[serde(default, deserialize_with = "sparse_seq")]
    latest: Vec<App>,
    #[serde(default, deserialize_with = "sparse_seq")]
    pc: Vec<App>,
    #[serde(default, deserialize_with = "sparse_seq")]
    game: Vec<App>,
    #[serde(default, deserialize_with = "sparse_seq")]
    editing: Vec<App>,
}

impl From<RawCatalog> for Catalog {
    fn from(raw: RawCatalog) -> Self {
        let mut catalog = Catalog {
            top_rated: raw.top_rated,
            latest: raw.latest,
            pc: raw.pc,
            game: raw.game,
            editing: raw.editing,
        };
        for category in Category::ALL {
            if category.is_latest() {
                continue;
            }
            for app in catalog.get_mut(category) {
                app.category = category;
            }
        }
        catalog
    }
}

fn sparse_seq<'de, D>(deserializer: D) -> Result<Vec<App>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Option::<Vec<Option<App>>>::deserialize(deserializer)?;
    Ok(items.unwrap_or_default().into_iter().flatten().collect())
}

impl Catalog {
    /// The structurally valid empty catalog: every category present, all empty.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Decode a document as returned by the remote store. `null` decodes
    /// to the empty catalog.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.is_null() {
            return Ok(Self::empty());
        }
        serde_json::from_value(value)
    }

    pub fn get(&self, category: Category) -> &[App] {
        match category {
            Category::TopRated => &self.top_rated,
            Category::Latest => &self.latest,
            Category::Pc => &self.pc,
            Category::Game => &self.game,
            Category::Editing => &self.editing,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut Vec<App> {
        match category {
            Category::TopRated => &mut self.top_rated,
            Category::Latest => &mut self.latest,
            Category::Pc => &mut self.pc,
            Category::Game => &mut self.game,
            Category::Editing => &mut self.editing,
        }
    }

    /// True when every category sequence is empty.
    ///
    /// An empty document is indistinguishable from one that was never
    /// loaded, so the service never serves it from cache.
    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.get(*c).is_empty())
    }

    /// Total number of records across all sequences, duplicates included.
    pub fn len(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c).len()).sum()
    }

    /// Find a record by id, scanning categories in display order.
    pub fn find_by_id(&self, id: &str) -> Option<(Category, &App)> {
        Category::ALL
            .into_iter()
            .find_map(|c| self.get(c).iter().find(|app| app.id == id).map(|app| (c, app)))
    }

    /// Every record once, first occurrence in display order wins.
    ///
    /// Records without an id are skipped.
    pub fn unique_apps(&self) -> Vec<&App> {
        let mut seen = std::collections::HashSet::new();
        Category::ALL
            .into_iter()
            .flat_map(|c| self.get(c).iter())
            .filter(|app| !app.id.is_empty() && seen.insert(app.id.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: &str, category: Category) -> App {
        let mut app = App::new(format!("App {id}"), category);
        app.id = id.to_string();
        app
    }

    #[test]
    fn test_missing_categories_normalize_to_empty() {
        let catalog: Catalog = serde_json::from_str(r#"{"pc":[{"id":"1","title":"Tool","category":"pc"}]}"#).unwrap();
        assert_eq!(catalog.pc.len(), 1);
        assert!(catalog.top_rated.is_empty());
        assert!(catalog.latest.is_empty());

        let value = serde_json::to_value(&catalog).unwrap();
        for category in Category::ALL {
            assert!(value[category.as_str()].is_array());
        }
    }

    #[test]
    fn test_null_categories_and_holes() {
        let json = r#"{"top-rated":null,"game":[null,{"id":"g1","title":"Chess"},null]}"#;
        let catalog: Catalog = serde_json::from_str(json).unwrap();
        assert!(catalog.top_rated.is_empty());
        assert_eq!(catalog.game.len(), 1);
        assert_eq!(catalog.game[0].category, Category::Game);
    }

    #[test]
    fn test_null_document_is_empty_catalog() {
        let catalog = Catalog::from_json_value(serde_json::Value::Null).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_is_empty_and_len() {
        let mut catalog = Catalog::empty();
        assert!(catalog.is_empty());
        catalog.editing.push(app("e1", Category::Editing));
        assert!(!catalog.is_empty());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_find_by_id_prefers_display_order() {
        let mut catalog = Catalog::empty();
        catalog.pc.push(app("x", Category::Pc));
        catalog.latest.push(app("x", Category::Pc));

        let (category, found) = catalog.find_by_id("x").unwrap();
        assert_eq!(category, Category::Latest);
        assert_eq!(found.id, "x");
        assert!(catalog.find_by_id("missing").is_none());
    }

    #[test]
    fn test_unique_apps_collapses_latest_copies() {
        let mut catalog = Catalog::empty();
        catalog.latest.push(app("a", Category::Pc));
        catalog.pc.push(app("a", Category::Pc));
        catalog.game.push(app("b", Category::Game));

        let ids: Vec<&str> = catalog.unique_apps().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
