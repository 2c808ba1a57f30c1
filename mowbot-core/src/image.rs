//! Camera image storage.
//!
//! Every binary message from the robot is one complete JPEG image. The
//! store replaces its previous image in full; partial images are never
//! visible.

use core::future::Future;

/// Error type for image storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Image larger than the store can hold. The previous image is kept.
    TooLarge { len: usize },
}

/// Async trait for the image sink.
pub trait ImageStore {
    /// Replace the stored image with `image`.
    fn store(&mut self, image: &[u8]) -> impl Future<Output = Result<(), StoreError>>;
}

impl<S: ImageStore> ImageStore for &mut S {
    fn store(&mut self, image: &[u8]) -> impl Future<Output = Result<(), StoreError>> {
        (**self).store(image)
    }
}

/// RAM image slot of at most `N` bytes.
///
/// `generation` increases on every stored image so a display can tell
/// whether it already drew the current one.
pub struct MemoryImageStore<const N: usize> {
    data: heapless::Vec<u8, N>,
    generation: u32,
}

impl<const N: usize> MemoryImageStore<N> {
    /// An empty store, generation `0`.
    pub const fn new() -> Self {
        Self {
            data: heapless::Vec::new(),
            generation: 0,
        }
    }

    /// The current image, empty before the first one arrives.
    #[inline]
    pub fn image(&self) -> &[u8] {
        &self.data
    }

    /// Number of images stored so far.
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Replace the image synchronously.
    pub fn replace(&mut self, image: &[u8]) -> Result<(), StoreError> {
        if image.len() > N {
            return Err(StoreError::TooLarge { len: image.len() });
        }
        self.data.clear();
        self.data
            .extend_from_slice(image)
            .map_err(|_| StoreError::TooLarge { len: image.len() })?;
        self.generation = self.generation.wrapping_add(1);
        Ok(())
    }
}

impl<const N: usize> Default for MemoryImageStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ImageStore for MemoryImageStore<N> {
    fn store(&mut self, image: &[u8]) -> impl Future<Output = Result<(), StoreError>> {
        core::future::ready(self.replace(image))
    }
}
