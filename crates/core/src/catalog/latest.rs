//! Record mutators that keep the `latest` sequence in step.
//!
//! A record listed in any other category also appears, identical, in
//! `latest`. Every mutation here computes the full resulting document in
//! one pass so the caller issues a single remote write.

use super::{App, Catalog, Category};
use crate::Error;

impl Catalog {
    /// Add a new record at the front of its category and of `latest`.
    pub fn insert_app(&mut self, app: App) {
        self.latest.retain(|a| a.id != app.id);
        if app.category.is_latest() {
            self.latest.insert(0, app);
            return;
        }
        self.latest.insert(0, app.clone());
        self.get_mut(app.category).insert(0, app);
    }

    /// Replace the record at `section[index]`.
    ///
    /// A record whose category changed is moved to the front of its new
    /// category. The `latest` copy is replaced in place, or added at the
    /// front when there was none. Editing from `latest` updates the primary
    /// copy as well.
    pub fn replace_app(&mut self, section: Category, index: usize, app: App) -> Result<(), Error> {
        let previous_id = self.checked(section, index)?.id.clone();

        if section.is_latest() {
            self.latest[index] = app.clone();
            self.dedup_latest(index);
            self.sync_primary(&previous_id, app);
            return Ok(());
        }

        if app.category == section {
            self.get_mut(section)[index] = app.clone();
        } else {
            self.get_mut(section).remove(index);
            if !app.category.is_latest() {
                self.get_mut(app.category).insert(0, app.clone());
            }
        }
        self.upsert_latest(&previous_id, app);
        Ok(())
    }

    /// Remove the record at `section[index]` and its `latest` copy.
    pub fn remove_app(&mut self, section: Category, index: usize) -> Result<App, Error> {
        self.checked(section, index)?;
        let removed = self.get_mut(section).remove(index);
        self.latest.retain(|a| a.id != removed.id);
        Ok(removed)
    }

    fn checked(&self, section: Category, index: usize) -> Result<&App, Error> {
        self.get(section).get(index).ok_or_else(|| {
            Error::InvalidInput(format!("no app at {section}[{index}] ({} entries)", self.get(section).len()))
        })
    }

    fn upsert_latest(&mut self, previous_id: &str, app: App) {
        match self.latest.iter().position(|a| a.id == previous_id || a.id == app.id) {
            Some(pos) => {
                self.latest[pos] = app;
                self.dedup_latest(pos);
            }
            None => self.latest.insert(0, app),
        }
    }

    /// Drop every other `latest` entry sharing the id at `keep`.
    fn dedup_latest(&mut self, keep: usize) {
        let id = self.latest[keep].id.clone();
        let mut pos = 0;
        self.latest.retain(|a| {
            let retain = pos == keep || a.id != id;
            pos += 1;
            retain
        });
    }

    /// Mirror an edit made through `latest` onto the primary copy.
    fn sync_primary(&mut self, previous_id: &str, app: App) {
        let primary = Category::ALL.into_iter().filter(|c| !c.is_latest()).find_map(|c| {
            self.get(c)
                .iter()
                .position(|a| a.id == previous_id || a.id == app.id)
                .map(|pos| (c, pos))
        });

        match primary {
            Some((category, pos)) if category == app.category => self.get_mut(category)[pos] = app,
            Some((category, pos)) => {
                self.get_mut(category).remove(pos);
                if !app.category.is_latest() {
                    self.get_mut(app.category).insert(0, app);
                }
            }
            None => {}
        }
    }
}
