use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, warn};

use keepsake_images::EntityImageStore;
use keepsake_store::{KvStore, KvStoreExt};
use keepsake_types::asset::{is_ephemeral, is_persistable_image};
use keepsake_types::keys::LISTINGS_KEY;
use keepsake_types::{EntityId, ImageScope, Listing, NewListing};

use crate::error::ListingResult;
use crate::id::generate_id;

/// Listing collection stored as one JSON array.
pub struct ListingStore {
    store: Arc<dyn KvStore>,
    images: Arc<EntityImageStore>,
}

impl ListingStore {
    pub fn new(store: Arc<dyn KvStore>, images: Arc<EntityImageStore>) -> Self {
        Self { store, images }
    }

    /// Every stored listing, or none when the collection is unreadable.
    pub fn list(&self) -> Vec<Listing> {
        match self.store.get_json::<Vec<Listing>>(LISTINGS_KEY) {
            Ok(listings) => listings.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "listing collection unreadable; treating as empty");
                Vec::new()
            }
        }
    }

    pub fn get(&self, id: &EntityId) -> Option<Listing> {
        self.list().into_iter().find(|l| &l.id == id)
    }

    /// Add a listing under a fresh id.
    ///
    /// Rating starts at zero and `dates` is today's date. Images staged before
    /// the listing existed are moved to its id.
    pub fn create(&self, new: NewListing) -> ListingResult<Listing> {
        let mut listings = self.list();
        let id = loop {
            let id = EntityId::new(generate_id())?;
            if !listings.iter().any(|l| l.id == id) {
                break id;
            }
        };

        let dates = Local::now().format("%d/%m/%Y").to_string();
        let mut listing = new.into_listing(id, dates);
        if self.images.finalize_staged_images(&listing.id) {
            listing = self.hydrate(listing);
        }

        listings.push(listing.clone());
        self.save(&listings)?;
        info!(id = %listing.id, title = %listing.title, "created listing");
        Ok(listing)
    }

    /// Replace the stored listing with the same id.
    ///
    /// A listing whose id is not stored is returned as given and not written.
    pub fn update(&self, listing: Listing) -> ListingResult<Listing> {
        let mut listings = self.list();
        let Some(slot) = listings.iter_mut().find(|l| l.id == listing.id) else {
            debug!(id = %listing.id, "ignoring update of unknown listing");
            return Ok(listing);
        };

        let normalized = listing.normalize();
        *slot = normalized.clone();
        self.save(&listings)?;
        debug!(id = %normalized.id, "updated listing");
        Ok(normalized)
    }

    /// Remove a listing and its image set. Returns whether it existed.
    pub fn delete(&self, id: &EntityId) -> ListingResult<bool> {
        let mut listings = self.list();
        let before = listings.len();
        listings.retain(|l| &l.id != id);
        if listings.len() == before {
            return Ok(false);
        }

        self.save(&listings)?;
        self.images.clear_images(id);
        info!(id = %id, "deleted listing");
        Ok(true)
    }

    /// Restore images from the image store and drop ephemeral references.
    ///
    /// A listing whose images and main image are all persistable is returned
    /// unchanged.
    pub fn hydrate(&self, mut listing: Listing) -> Listing {
        let main_ok = listing.image.as_deref().is_some_and(is_persistable_image);
        let images_ok = !listing.images.is_empty()
            && listing.images.iter().all(|img| is_persistable_image(img));
        if main_ok && images_ok {
            return listing;
        }

        let scope = ImageScope::from(&listing.id);
        let saved = self.images.get_images(&scope);
        if !saved.is_empty() {
            debug!(id = %listing.id, count = saved.len(), "restored listing images");
            listing.images = saved;
            if listing.image.as_deref().map_or(true, str::is_empty) {
                listing.image = Some(self.images.get_featured_image(&scope));
            }
        }

        let placeholder = &self.images.config().placeholder;
        if listing.image.as_deref().is_some_and(is_ephemeral) {
            warn!(id = %listing.id, "replacing ephemeral main image");
            listing.image = Some(placeholder.clone());
        }
        if listing.images.iter().any(|img| is_ephemeral(img)) {
            warn!(id = %listing.id, "dropping ephemeral images");
            listing.images.retain(|img| !is_ephemeral(img));
            if listing.images.is_empty() {
                listing.images.push(placeholder.clone());
            }
        }
        listing
    }

    fn save(&self, listings: &[Listing]) -> ListingResult<()> {
        self.store.set_json(LISTINGS_KEY, listings)?;
        Ok(())
    }
}

impl std::fmt::Debug for ListingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingStore").finish_non_exhaustive()
    }
}
