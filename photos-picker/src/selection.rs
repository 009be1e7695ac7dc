use crate::models::Photo;

/// Ordered photo selection with ids deduplicated
///
/// Order is first-selection order; selecting an already-present photo is a
/// no-op and deselecting removes exactly that id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    photos: Vec<Photo>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a selection from an iterator, dropping duplicate ids
    pub fn from_photos(photos: impl IntoIterator<Item = Photo>) -> Self {
        let mut set = Self::new();
        set.select_all(photos);
        set
    }

    pub fn contains(&self, id: &str) -> bool {
        self.photos.iter().any(|p| p.id == id)
    }

    /// Returns true if the photo was newly added
    pub fn select(&mut self, photo: Photo) -> bool {
        if self.contains(&photo.id) {
            return false;
        }
        self.photos.push(photo);
        true
    }

    /// Returns true if the id was present and removed
    pub fn deselect(&mut self, id: &str) -> bool {
        let before = self.photos.len();
        self.photos.retain(|p| p.id != id);
        self.photos.len() != before
    }

    /// Bulk select (e.g. a whole album); returns how many were newly added
    pub fn select_all(&mut self, photos: impl IntoIterator<Item = Photo>) -> usize {
        photos
            .into_iter()
            .filter(|photo| self.select(photo.clone()))
            .count()
    }

    /// Bulk deselect; returns how many were actually removed
    pub fn deselect_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> usize {
        ids.into_iter().filter(|id| self.deselect(id)).count()
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn into_photos(self) -> Vec<Photo> {
        self.photos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(id: &str) -> Photo {
        Photo {
            id: id.to_string(),
            base_url: format!("https://media.example.com/{}", id),
            filename: format!("{}.jpg", id),
            mime_type: "image/jpeg".to_string(),
            metadata: None,
        }
    }

    #[test]
    fn test_selecting_twice_is_idempotent() {
        let mut set = SelectionSet::new();
        assert!(set.select(photo("a")));
        assert!(!set.select(photo("a")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_deselect_removes_exactly_one_id() {
        let mut set = SelectionSet::from_photos([photo("a"), photo("b"), photo("c")]);
        assert!(set.deselect("b"));
        assert_eq!(set.len(), 2);
        assert!(set.contains("a"));
        assert!(!set.contains("b"));
        assert!(set.contains("c"));

        // Deselecting an absent id changes nothing
        assert!(!set.deselect("b"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_selection_preserves_first_selection_order() {
        let mut set = SelectionSet::from_photos([photo("a"), photo("b")]);
        set.select(photo("a"));
        set.select(photo("c"));
        let ids: Vec<&str> = set.photos().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn test_bulk_select_counts_only_new_ids() {
        let mut set = SelectionSet::from_photos([photo("a"), photo("b")]);
        // An album containing one overlap and two new photos
        let added = set.select_all([photo("b"), photo("c"), photo("d")]);
        assert_eq!(added, 2);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_bulk_deselect_removes_only_matching_ids() {
        let mut set = SelectionSet::from_photos([photo("a"), photo("b"), photo("c")]);
        let removed = set.deselect_all(["b", "c", "x"]);
        assert_eq!(removed, 2);
        assert_eq!(set.len(), 1);
        assert!(set.contains("a"));
    }

    #[test]
    fn test_duplicate_ids_in_input_are_dropped() {
        let set = SelectionSet::from_photos([photo("a"), photo("a"), photo("b")]);
        assert_eq!(set.len(), 2);
    }
}
