/// A (container, item) pair resolved from a request path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageCoordinate {
    pub container: String,
    pub item: String,
}

/// The operation a coordinate dispatches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route<'a> {
    ListContainers,
    ListItems { container: &'a str },
    GetItem { container: &'a str, item: &'a str },
    /// An item without a container. The resolver never builds one, but
    /// dispatch still has to answer it.
    Invalid,
}

impl StorageCoordinate {
    pub fn new(container: &str, item: &str) -> Self {
        Self {
            container: container.to_string(),
            item: item.to_string(),
        }
    }

    /// Cache key, unique per (container, item).
    pub fn key(&self) -> String {
        format!("{}/{}", self.container, self.item)
    }

    pub fn route(&self) -> Route<'_> {
        match (self.container.is_empty(), self.item.is_empty()) {
            (true, true) => Route::ListContainers,
            (true, false) => Route::Invalid,
            (false, true) => Route::ListItems {
                container: &self.container,
            },
            (false, false) => Route::GetItem {
                container: &self.container,
                item: &self.item,
            },
        }
    }
}
