use rusqlite::{params, OptionalExtension};

use crate::{Catalog, LibraryError};

impl Catalog {
    pub fn cached_artist_image(&self, artist_name: &str) -> Result<Option<String>, LibraryError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT image_url FROM artist_images WHERE artist_name = ?1",
                params![artist_name],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
    }

    /// Stores the first URL seen for an artist; later writes are ignored.
    pub fn store_artist_image(&self, artist_name: &str, image_url: &str) -> Result<(), LibraryError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO artist_images (artist_name, image_url) VALUES (?1, ?2)",
                params![artist_name, image_url],
            )
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::Catalog;

    #[test]
    fn artist_images_are_write_once() {
        let catalog = Catalog::open_in_memory().unwrap();
        catalog.init_tables().unwrap();
        assert_eq!(catalog.cached_artist_image("Queen").unwrap(), None);
        catalog.store_artist_image("Queen", "https://img/1.jpg").unwrap();
        catalog.store_artist_image("Queen", "https://img/2.jpg").unwrap();
        assert_eq!(
            catalog.cached_artist_image("Queen").unwrap().as_deref(),
            Some("https://img/1.jpg")
        );
        assert_eq!(catalog.cached_artist_image("queen").unwrap(), None);
    }
}
